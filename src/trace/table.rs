use nalgebra::{Matrix2, Vector2};

use super::{TraceError, TraceResult};

/// Rectilinear (wavelength × slit) grid of focal plane samples
///
/// Nodes are stored wavelength-major: node `(iw, is)` is at `iw * n_slit + is`.
/// Inside a cell the mapping is bilinear in wavelength and slit position; a
/// single slit column reduces to a piecewise-linear curve in wavelength.
#[derive(Debug, Clone, PartialEq)]
pub struct SampleGrid {
    waves: Vec<f64>,
    slits: Vec<f64>,
    x: Vec<f64>,
    y: Vec<f64>,
}

// sample coordinates closer than this (relative) are the same grid line
const GRID_EPS: f64 = 1e-9;

fn unique_sorted(values: &[f64]) -> Vec<f64> {
    let mut v = values.to_vec();
    v.sort_by(|a, b| a.total_cmp(b));
    v.dedup_by(|a, b| (*a - *b).abs() <= GRID_EPS * a.abs().max(b.abs()).max(1.));
    v
}

fn grid_index(axis: &[f64], value: f64) -> Option<usize> {
    let i = axis.partition_point(|&a| a < value);
    [i.checked_sub(1), Some(i)]
        .into_iter()
        .flatten()
        .filter(|&j| j < axis.len())
        .find(|&j| (axis[j] - value).abs() <= GRID_EPS * axis[j].abs().max(value.abs()).max(1.))
}

// lower node of the cell holding `value`, clamped so that edge cells extrapolate
fn cell_index(axis: &[f64], value: f64) -> usize {
    axis.partition_point(|&a| a <= value)
        .saturating_sub(1)
        .min(axis.len().saturating_sub(2))
}

impl SampleGrid {
    /// Builds the grid from a long table of samples, one row per (wave, slit) node
    pub fn from_samples(wave: &[f64], slit: &[f64], x: &[f64], y: &[f64]) -> TraceResult<Self> {
        let n = wave.len();
        if slit.len() != n || x.len() != n || y.len() != n {
            return Err(TraceError::Table(format!(
                "ragged columns: {} wavelengths, {} slit positions, {} x, {} y",
                n,
                slit.len(),
                x.len(),
                y.len()
            )));
        }
        if let Some(i) = (0..n).find(|&i| {
            !(wave[i].is_finite() && slit[i].is_finite() && x[i].is_finite() && y[i].is_finite())
        }) {
            return Err(TraceError::Table(format!("non-finite value in row {i}")));
        }
        let waves = unique_sorted(wave);
        let slits = unique_sorted(slit);
        if waves.len() < 2 {
            return Err(TraceError::Table(
                "at least 2 distinct wavelengths are needed".into(),
            ));
        }
        let n_slit = slits.len();
        let n_node = waves.len() * n_slit;
        let mut gx = vec![f64::NAN; n_node];
        let mut gy = vec![f64::NAN; n_node];
        for i in 0..n {
            let (Some(iw), Some(is)) = (grid_index(&waves, wave[i]), grid_index(&slits, slit[i]))
            else {
                return Err(TraceError::Table(format!("row {i} is off the sample grid")));
            };
            let k = iw * n_slit + is;
            if !gx[k].is_nan() {
                return Err(TraceError::Table(format!(
                    "duplicated node at wavelength {} and slit position {}",
                    wave[i], slit[i]
                )));
            }
            gx[k] = x[i];
            gy[k] = y[i];
        }
        if let Some(k) = gx.iter().position(|v| v.is_nan()) {
            return Err(TraceError::Table(format!(
                "missing node at wavelength {} and slit position {}",
                waves[k / n_slit],
                slits[k % n_slit]
            )));
        }
        Ok(Self {
            waves,
            slits,
            x: gx,
            y: gy,
        })
    }
    pub fn waves(&self) -> &[f64] {
        &self.waves
    }
    pub fn slits(&self) -> &[f64] {
        &self.slits
    }
    pub fn n_slit(&self) -> usize {
        self.slits.len()
    }
    /// Focal plane coordinates of node `(iw, is)`
    pub fn node(&self, iw: usize, is: usize) -> (f64, f64) {
        let k = iw * self.n_slit() + is;
        (self.x[k], self.y[k])
    }
    /// Iterates nodes as `(slit, wave, x, y)`
    pub fn nodes(&self) -> impl Iterator<Item = (f64, f64, f64, f64)> + '_ {
        self.waves.iter().enumerate().flat_map(move |(iw, &w)| {
            self.slits.iter().enumerate().map(move |(is, &s)| {
                let (x, y) = self.node(iw, is);
                (s, w, x, y)
            })
        })
    }
    pub fn wave_bounds(&self) -> (f64, f64) {
        (self.waves[0], self.waves[self.waves.len() - 1])
    }
    pub fn slit_bounds(&self) -> (f64, f64) {
        (self.slits[0], self.slits[self.slits.len() - 1])
    }

    // cell corner values and local coordinates (u along wavelength, v along slit)
    fn cell(&self, slit: f64, wave: f64) -> Cell {
        let iw = cell_index(&self.waves, wave);
        let u = (wave - self.waves[iw]) / (self.waves[iw + 1] - self.waves[iw]);
        if self.n_slit() == 1 {
            Cell {
                iw,
                is: 0,
                u,
                v: 0.,
            }
        } else {
            let is = cell_index(&self.slits, slit);
            let v = (slit - self.slits[is]) / (self.slits[is + 1] - self.slits[is]);
            Cell { iw, is, u, v }
        }
    }
    fn corners(&self, iw: usize, is: usize) -> [(f64, f64); 4] {
        if self.n_slit() == 1 {
            let a = self.node(iw, 0);
            let b = self.node(iw + 1, 0);
            [a, b, a, b]
        } else {
            [
                self.node(iw, is),
                self.node(iw + 1, is),
                self.node(iw, is + 1),
                self.node(iw + 1, is + 1),
            ]
        }
    }
    fn bilinear(c: &[(f64, f64); 4], u: f64, v: f64) -> Vector2<f64> {
        let w = [(1. - u) * (1. - v), u * (1. - v), (1. - u) * v, u * v];
        c.iter()
            .zip(w)
            .fold(Vector2::zeros(), |acc, (p, w)| acc + Vector2::new(p.0, p.1) * w)
    }
    // d(x,y)/d(u,v)
    fn local_jacobian(c: &[(f64, f64); 4], u: f64, v: f64) -> Matrix2<f64> {
        let du = Vector2::new(
            (1. - v) * (c[1].0 - c[0].0) + v * (c[3].0 - c[2].0),
            (1. - v) * (c[1].1 - c[0].1) + v * (c[3].1 - c[2].1),
        );
        let dv = Vector2::new(
            (1. - u) * (c[2].0 - c[0].0) + u * (c[3].0 - c[1].0),
            (1. - u) * (c[2].1 - c[0].1) + u * (c[3].1 - c[1].1),
        );
        Matrix2::from_columns(&[du, dv])
    }
    /// Bilinear evaluation, linear extrapolation from the edge cells
    pub fn eval(&self, slit: f64, wave: f64) -> (f64, f64) {
        let Cell { iw, is, u, v } = self.cell(slit, wave);
        let p = Self::bilinear(&self.corners(iw, is), u, v);
        (p.x, p.y)
    }
    /// Jacobian with columns d/dslit and d/dwave
    pub fn jacobian(&self, slit: f64, wave: f64) -> Matrix2<f64> {
        let Cell { iw, is, u, v } = self.cell(slit, wave);
        let j = Self::local_jacobian(&self.corners(iw, is), u, v);
        let dw = self.waves[iw + 1] - self.waves[iw];
        let ds_dw = j.column(0) / dw;
        let ds_ds = if self.n_slit() == 1 {
            Vector2::zeros()
        } else {
            j.column(1) / (self.slits[is + 1] - self.slits[is])
        };
        Matrix2::from_columns(&[ds_ds, ds_dw])
    }

    /// Inverse mapping: finds the cell holding (`x`,`y`) and inverts the
    /// bilinear map inside it, trying the cells around the hint first
    pub fn invert(&self, x: f64, y: f64, hint: (f64, f64)) -> Option<(f64, f64)> {
        let target = Vector2::new(x, y);
        let n_wcell = self.waves.len() - 1;
        if self.n_slit() == 1 {
            return self.invert_curve(target);
        }
        let n_scell = self.slits.len() - 1;
        let Cell { iw, is, .. } = self.cell(hint.0, hint.1);
        let near = (iw.saturating_sub(1)..(iw + 2).min(n_wcell))
            .flat_map(|iw| (is.saturating_sub(1)..(is + 2).min(n_scell)).map(move |is| (iw, is)));
        let all = (0..n_wcell).flat_map(|iw| (0..n_scell).map(move |is| (iw, is)));
        near.chain(all).find_map(|(iw, is)| {
            let c = self.corners(iw, is);
            let (u, v) = Self::invert_cell(&c, target)?;
            let wave = self.waves[iw] + u * (self.waves[iw + 1] - self.waves[iw]);
            let slit = self.slits[is] + v * (self.slits[is + 1] - self.slits[is]);
            Some((slit, wave))
        })
    }
    fn invert_cell(c: &[(f64, f64); 4], target: Vector2<f64>) -> Option<(f64, f64)> {
        let (x_min, x_max, y_min, y_max) = c.iter().fold(
            (f64::INFINITY, f64::NEG_INFINITY, f64::INFINITY, f64::NEG_INFINITY),
            |(a, b, d, e), p| (a.min(p.0), b.max(p.0), d.min(p.1), e.max(p.1)),
        );
        let margin = 1e-9 * (x_max - x_min).abs().max((y_max - y_min).abs()).max(1e-12);
        if target.x < x_min - margin
            || target.x > x_max + margin
            || target.y < y_min - margin
            || target.y > y_max + margin
        {
            return None;
        }
        let mut uv = Vector2::new(0.5, 0.5);
        for _ in 0..50 {
            let r = Self::bilinear(c, uv.x, uv.y) - target;
            let step = Self::local_jacobian(c, uv.x, uv.y).lu().solve(&r)?;
            uv -= step;
            if step.norm() < 1e-13 {
                break;
            }
        }
        let eps = 1e-7;
        (uv.x >= -eps && uv.x <= 1. + eps && uv.y >= -eps && uv.y <= 1. + eps)
            .then(|| (uv.x.clamp(0., 1.), uv.y.clamp(0., 1.)))
    }
    // closest point on the polyline of a single slit column
    fn invert_curve(&self, target: Vector2<f64>) -> Option<(f64, f64)> {
        (0..self.waves.len() - 1)
            .map(|iw| {
                let (ax, ay) = self.node(iw, 0);
                let (bx, by) = self.node(iw + 1, 0);
                let a = Vector2::new(ax, ay);
                let ab = Vector2::new(bx, by) - a;
                let t = ((target - a).dot(&ab) / ab.norm_squared()).clamp(0., 1.);
                let d = (a + ab * t - target).norm();
                (d, self.waves[iw] + t * (self.waves[iw + 1] - self.waves[iw]))
            })
            .filter(|(d, _)| d.is_finite())
            .min_by(|a, b| a.0.total_cmp(&b.0))
            .map(|(_, wave)| (self.slits[0], wave))
    }
}

struct Cell {
    iw: usize,
    is: usize,
    u: f64,
    v: f64,
}

#[cfg(test)]
mod tests {
    use super::*;

    // x = 10 * slit, y = 100 * (wave - 1.5) with a slight curvature
    fn grid() -> SampleGrid {
        let mut rows = (vec![], vec![], vec![], vec![]);
        for iw in 0..11 {
            let w = 1. + 0.1 * iw as f64;
            for s in [-1., 0., 1.] {
                rows.0.push(w);
                rows.1.push(s);
                rows.2.push(10. * s + 0.5 * (w - 1.5).powi(2));
                rows.3.push(100. * (w - 1.5) + 0.2 * s);
            }
        }
        SampleGrid::from_samples(&rows.0, &rows.1, &rows.2, &rows.3).unwrap()
    }

    #[test]
    fn nodes_are_reproduced() {
        let g = grid();
        let (x, y) = g.eval(1., 2.);
        assert!((x - 10.125).abs() < 1e-12);
        assert!((y - 50.2).abs() < 1e-12);
        assert_eq!(g.nodes().count(), 33);
    }

    #[test]
    fn cell_inverse() {
        let g = grid();
        let (x, y) = g.eval(0.37, 1.234);
        let (s, w) = g.invert(x, y, (0., 1.5)).unwrap();
        assert!((s - 0.37).abs() < 1e-9);
        assert!((w - 1.234).abs() < 1e-9);
    }

    #[test]
    fn missing_node() {
        let e = SampleGrid::from_samples(
            &[1., 1., 2.],
            &[0., 1., 0.],
            &[0., 1., 0.],
            &[0., 0., 1.],
        );
        assert!(matches!(e, Err(TraceError::Table(_))));
    }

    #[test]
    fn single_column_curve() {
        let g = SampleGrid::from_samples(&[1., 2., 3.], &[0.; 3], &[0., 1., 3.], &[0.; 3]).unwrap();
        assert_eq!(g.eval(0., 2.5), (2., 0.));
        let (s, w) = g.invert(2., 0.1, (0., 1.)).unwrap();
        assert_eq!(s, 0.);
        assert!((w - 2.5).abs() < 1e-12);
        let j = g.jacobian(0., 1.5);
        assert_eq!(j[(0, 0)], 0.);
        assert!((j[(0, 1)] - 1.).abs() < 1e-12);
    }
}
