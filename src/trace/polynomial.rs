use nalgebra::Matrix2;
use serde::{Deserialize, Serialize};

use super::{TraceError, TraceResult};

/// Focal plane axis a coefficient contributes to
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Axis {
    X,
    Y,
}

/// One term `value * wave^wave_power * slit^slit_power` of a focal plane coordinate
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Coefficient {
    pub axis: Axis,
    pub wave_power: u32,
    #[serde(default)]
    pub slit_power: u32,
    pub value: f64,
}

/// Bivariate polynomial forward mapping
#[derive(Debug, Clone, PartialEq)]
pub struct PolynomialMap {
    x: Vec<Coefficient>,
    y: Vec<Coefficient>,
}

fn eval_terms(terms: &[Coefficient], slit: f64, wave: f64) -> f64 {
    terms
        .iter()
        .map(|c| c.value * wave.powi(c.wave_power as i32) * slit.powi(c.slit_power as i32))
        .sum()
}
// partial derivatives (d/dslit, d/dwave)
fn grad_terms(terms: &[Coefficient], slit: f64, wave: f64) -> (f64, f64) {
    terms.iter().fold((0., 0.), |(ds, dw), c| {
        let (i, j) = (c.wave_power as i32, c.slit_power as i32);
        let d_slit = if j > 0 {
            c.value * j as f64 * wave.powi(i) * slit.powi(j - 1)
        } else {
            0.
        };
        let d_wave = if i > 0 {
            c.value * i as f64 * wave.powi(i - 1) * slit.powi(j)
        } else {
            0.
        };
        (ds + d_slit, dw + d_wave)
    })
}

impl PolynomialMap {
    pub fn new(coefficients: &[Coefficient]) -> TraceResult<Self> {
        if let Some(c) = coefficients.iter().find(|c| !c.value.is_finite()) {
            return Err(TraceError::Polynomial(format!(
                "non-finite coefficient for wave power {} and slit power {}",
                c.wave_power, c.slit_power
            )));
        }
        let (x, y): (Vec<Coefficient>, Vec<Coefficient>) =
            coefficients.iter().copied().partition(|c| c.axis == Axis::X);
        if x.is_empty() || y.is_empty() {
            return Err(TraceError::Polynomial(
                "both x and y need at least one coefficient".into(),
            ));
        }
        Ok(Self { x, y })
    }
    pub fn eval(&self, slit: f64, wave: f64) -> (f64, f64) {
        (
            eval_terms(&self.x, slit, wave),
            eval_terms(&self.y, slit, wave),
        )
    }
    /// Jacobian with columns d/dslit and d/dwave
    pub fn jacobian(&self, slit: f64, wave: f64) -> Matrix2<f64> {
        let (xs, xw) = grad_terms(&self.x, slit, wave);
        let (ys, yw) = grad_terms(&self.y, slit, wave);
        Matrix2::new(xs, xw, ys, yw)
    }
    pub fn coefficients(&self) -> impl Iterator<Item = &Coefficient> {
        self.x.iter().chain(self.y.iter())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn c(axis: Axis, wave_power: u32, slit_power: u32, value: f64) -> Coefficient {
        Coefficient {
            axis,
            wave_power,
            slit_power,
            value,
        }
    }

    #[test]
    fn eval_and_jacobian() {
        let p = PolynomialMap::new(&[
            c(Axis::X, 0, 1, 2.),
            c(Axis::Y, 1, 0, 10.),
            c(Axis::Y, 2, 1, 0.5),
        ])
        .unwrap();
        let (x, y) = p.eval(2., 3.);
        assert_eq!(x, 4.);
        assert_eq!(y, 30. + 0.5 * 9. * 2.);
        let j = p.jacobian(2., 3.);
        assert_eq!(j[(0, 0)], 2.);
        assert_eq!(j[(0, 1)], 0.);
        assert_eq!(j[(1, 0)], 4.5);
        assert_eq!(j[(1, 1)], 10. + 0.5 * 2. * 3. * 2.);
    }

    #[test]
    fn needs_both_axes() {
        assert!(PolynomialMap::new(&[c(Axis::X, 0, 0, 1.)]).is_err());
    }
}
