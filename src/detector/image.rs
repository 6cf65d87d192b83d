use serde::{Deserialize, Serialize};

use super::{DetectorError, DetectorRegion, Result};

/// Unit of the accumulated counts
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CountUnit {
    #[default]
    Photons,
    Electrons,
}

/// Pixel grid of accumulated counts of one detector
///
/// Pixel `(i, j)` is stored at `j * n_x + i`.
#[derive(Debug, Clone, PartialEq)]
pub struct DetectorImage {
    region: DetectorRegion,
    n_x: usize,
    n_y: usize,
    unit: CountUnit,
    data: Vec<f64>,
}

impl DetectorImage {
    /// Zeroed image of a detector
    pub fn new(region: DetectorRegion, unit: CountUnit) -> Self {
        let (n_x, n_y) = region.shape();
        Self {
            region,
            n_x,
            n_y,
            unit,
            data: vec![0.; n_x * n_y],
        }
    }
    pub fn id(&self) -> usize {
        self.region.id
    }
    pub fn region(&self) -> &DetectorRegion {
        &self.region
    }
    pub fn shape(&self) -> (usize, usize) {
        (self.n_x, self.n_y)
    }
    pub fn unit(&self) -> CountUnit {
        self.unit
    }
    pub fn data(&self) -> &[f64] {
        &self.data
    }
    pub fn get(&self, i: usize, j: usize) -> Option<f64> {
        (i < self.n_x && j < self.n_y).then(|| self.data[j * self.n_x + i])
    }
    /// Focal plane to pixel coordinates
    pub fn to_pixel(&self, x: f64, y: f64) -> (f64, f64) {
        self.region.to_pixel(x, y)
    }
    /// Splits `flux` at pixel coordinates (`px`,`py`) between the 4 nearest
    /// pixel centres with bilinear weights
    ///
    /// Returns the deposited part of `flux`; the shares of neighbours off the
    /// detector are lost.
    pub fn deposit(&mut self, px: f64, py: f64, flux: f64) -> f64 {
        if !(px.is_finite() && py.is_finite()) {
            return 0.;
        }
        let (i0, j0) = (px.floor(), py.floor());
        let (fx, fy) = (px - i0, py - j0);
        let mut deposited = 0.;
        for (di, wx) in [(0., 1. - fx), (1., fx)] {
            for (dj, wy) in [(0., 1. - fy), (1., fy)] {
                let w = wx * wy;
                if w == 0. {
                    continue;
                }
                let (i, j) = (i0 + di, j0 + dj);
                if i < 0. || j < 0. || i >= self.n_x as f64 || j >= self.n_y as f64 {
                    continue;
                }
                let share = flux * w;
                self.data[j as usize * self.n_x + i as usize] += share;
                deposited += share;
            }
        }
        deposited
    }
    pub fn sum(&self) -> f64 {
        self.data.iter().sum()
    }
    pub fn max(&self) -> f64 {
        self.data.iter().copied().fold(f64::NEG_INFINITY, f64::max)
    }
    pub fn median(&self) -> f64 {
        let mut v = self.data.clone();
        v.sort_by(|a, b| a.total_cmp(b));
        let n = v.len();
        match n {
            0 => f64::NAN,
            n if n % 2 == 1 => v[n / 2],
            n => 0.5 * (v[n / 2 - 1] + v[n / 2]),
        }
    }
    /// Index and value of the brightest pixel
    pub fn argmax(&self) -> Option<((usize, usize), f64)> {
        self.data
            .iter()
            .enumerate()
            .max_by(|a, b| a.1.total_cmp(b.1))
            .map(|(k, &v)| ((k % self.n_x, k / self.n_x), v))
    }
    /// Intensity weighted centroid in pixel coordinates
    pub fn centroid(&self) -> Option<(f64, f64)> {
        let (s, sx, sy) = self.data.iter().enumerate().fold((0., 0., 0.), |(s, sx, sy), (k, &v)| {
            (
                s + v,
                sx + v * (k % self.n_x) as f64,
                sy + v * (k / self.n_x) as f64,
            )
        });
        (s != 0.).then(|| (sx / s, sy / s))
    }
    /// Multiplies every pixel by `factor`
    pub fn scale(&mut self, factor: f64) {
        self.data.iter_mut().for_each(|v| *v *= factor);
    }
    /// Image sharing the geometry with the given counts
    pub fn with_data(&self, data: Vec<f64>, unit: CountUnit) -> Result<Self> {
        if data.len() != self.data.len() {
            return Err(DetectorError::ShapeMismatch {
                id: self.id(),
                expected: self.data.len(),
                found: data.len(),
            });
        }
        Ok(Self {
            data,
            unit,
            ..self.clone()
        })
    }
    /// Adds the counts of an image of the same detector
    pub fn accumulate(&mut self, other: &DetectorImage) -> Result<()> {
        if other.id() != self.id() || other.shape() != self.shape() {
            return Err(DetectorError::ShapeMismatch {
                id: self.id(),
                expected: self.data.len(),
                found: other.data.len(),
            });
        }
        self.data
            .iter_mut()
            .zip(&other.data)
            .for_each(|(a, b)| *a += b);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn image() -> DetectorImage {
        DetectorImage::new(DetectorRegion::new(1, (0., 0.), (4., 3.), 1.), CountUnit::Photons)
    }

    #[test]
    fn bilinear_deposit() {
        let mut img = image();
        assert_eq!(img.deposit(1.25, 0.5, 8.), 8.);
        assert_eq!(img.get(1, 0), Some(3.));
        assert_eq!(img.get(2, 0), Some(1.));
        assert_eq!(img.get(1, 1), Some(3.));
        assert_eq!(img.get(2, 1), Some(1.));
        assert_eq!(img.sum(), 8.);
    }

    #[test]
    fn edge_loss() {
        let mut img = image();
        assert_eq!(img.deposit(-0.5, 1., 2.), 1.);
        assert_eq!(img.deposit(3., 2., 5.), 5.);
        assert_eq!(img.deposit(10., 1., 5.), 0.);
        assert_eq!(img.sum(), 6.);
    }

    #[test]
    fn statistics() {
        let mut img = image();
        img.deposit(2., 1., 4.);
        assert_eq!(img.median(), 0.);
        assert_eq!(img.argmax(), Some(((2, 1), 4.)));
        assert_eq!(img.centroid(), Some((2., 1.)));
        let other = img.clone();
        img.accumulate(&other).unwrap();
        assert_eq!(img.max(), 8.);
    }

    #[test]
    fn accumulate_same_detector_only() {
        let mut img = image();
        let other = DetectorImage::new(
            DetectorRegion::new(2, (0., 0.), (4., 3.), 1.),
            CountUnit::Photons,
        );
        assert!(matches!(
            img.accumulate(&other),
            Err(DetectorError::ShapeMismatch { id: 1, .. })
        ));
        let smaller = DetectorImage::new(
            DetectorRegion::new(1, (0., 0.), (2., 3.), 1.),
            CountUnit::Photons,
        );
        assert!(img.accumulate(&smaller).is_err());
        assert_eq!(img.sum(), 0.);
    }
}
