use nalgebra::{Rotation2, Vector2};
use serde::{Deserialize, Serialize};

use super::{DetectorError, Result};

/// A detector of the focal plane array
///
/// Positions and sizes are in the focal plane length unit, the angle is the
/// rotation of the pixel grid about the detector centre in radians.
/// Pixel `(i, j)` is centred on pixel coordinates `(i, j)` and spans
/// `[i - 0.5, i + 0.5) x [j - 0.5, j + 0.5)`.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct DetectorRegion {
    pub id: usize,
    pub x_cen: f64,
    pub y_cen: f64,
    pub x_size: f64,
    pub y_size: f64,
    pub pixel_size: f64,
    #[serde(default)]
    pub angle: f64,
    #[serde(default = "unit_gain")]
    pub gain: f64,
}
fn unit_gain() -> f64 {
    1.
}

impl DetectorRegion {
    /// Unrotated detector with a unit gain
    pub fn new(id: usize, center: (f64, f64), size: (f64, f64), pixel_size: f64) -> Self {
        Self {
            id,
            x_cen: center.0,
            y_cen: center.1,
            x_size: size.0,
            y_size: size.1,
            pixel_size,
            angle: 0.,
            gain: 1.,
        }
    }
    /// Sets the pixel grid rotation in radians
    pub fn angle(self, angle: f64) -> Self {
        Self { angle, ..self }
    }
    pub fn gain(self, gain: f64) -> Self {
        Self { gain, ..self }
    }
    pub fn validate(&self) -> Result<()> {
        let finite = [
            self.x_cen,
            self.y_cen,
            self.x_size,
            self.y_size,
            self.pixel_size,
            self.angle,
            self.gain,
        ]
        .iter()
        .all(|v| v.is_finite());
        if !finite || self.pixel_size <= 0. || self.gain <= 0. {
            return Err(DetectorError::Invalid {
                id: self.id,
                reason: "non-finite value or non-positive pixel size or gain".into(),
            });
        }
        let (n_x, n_y) = self.shape();
        if n_x == 0 || n_y == 0 {
            return Err(DetectorError::Invalid {
                id: self.id,
                reason: format!(
                    "{}x{} size is smaller than a {} pixel",
                    self.x_size, self.y_size, self.pixel_size
                ),
            });
        }
        Ok(())
    }
    /// Number of pixels along x and y
    pub fn shape(&self) -> (usize, usize) {
        let n = |size: f64| (size / self.pixel_size).round().max(0.) as usize;
        (n(self.x_size), n(self.y_size))
    }
    pub fn n_pixel(&self) -> usize {
        let (n_x, n_y) = self.shape();
        n_x * n_y
    }
    fn half_extent(&self) -> Vector2<f64> {
        let (n_x, n_y) = self.shape();
        Vector2::new(n_x as f64 - 1., n_y as f64 - 1.) * 0.5
    }
    /// Focal plane to pixel coordinates
    pub fn to_pixel(&self, x: f64, y: f64) -> (f64, f64) {
        let local = Rotation2::new(-self.angle)
            * Vector2::new(x - self.x_cen, y - self.y_cen)
            / self.pixel_size;
        let p = local + self.half_extent();
        (p.x, p.y)
    }
    /// Pixel to focal plane coordinates
    pub fn to_focal(&self, px: f64, py: f64) -> (f64, f64) {
        let local = (Vector2::new(px, py) - self.half_extent()) * self.pixel_size;
        let p = Rotation2::new(self.angle) * local;
        (p.x + self.x_cen, p.y + self.y_cen)
    }
    /// Whether pixel coordinates fall on the detector
    pub fn contains_pixel(&self, px: f64, py: f64) -> bool {
        let (n_x, n_y) = self.shape();
        px >= -0.5 && px < n_x as f64 - 0.5 && py >= -0.5 && py < n_y as f64 - 0.5
    }
    /// Focal plane bounding box `(x_min, x_max, y_min, y_max)` of the pixel grid
    pub fn footprint(&self) -> (f64, f64, f64, f64) {
        let (n_x, n_y) = self.shape();
        let (u1, v1) = (n_x as f64 - 0.5, n_y as f64 - 0.5);
        [(-0.5, -0.5), (u1, -0.5), (-0.5, v1), (u1, v1)]
            .into_iter()
            .map(|(u, v)| self.to_focal(u, v))
            .fold(
                (
                    f64::INFINITY,
                    f64::NEG_INFINITY,
                    f64::INFINITY,
                    f64::NEG_INFINITY,
                ),
                |(a, b, c, d), (x, y)| (a.min(x), b.max(x), c.min(y), d.max(y)),
            )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::f64::consts::FRAC_PI_2;

    #[test]
    fn pixel_centres() {
        let det = DetectorRegion::new(1, (0., 0.), (16., 16.), 1.);
        assert_eq!(det.shape(), (16, 16));
        assert_eq!(det.to_pixel(0., 0.), (7.5, 7.5));
        assert_eq!(det.to_pixel(-7.5, -7.5), (0., 0.));
        assert_eq!(det.footprint(), (-8., 8., -8., 8.));
        assert!(det.contains_pixel(-0.5, 15.49));
        assert!(!det.contains_pixel(15.5, 0.));
    }

    #[test]
    fn rotation() {
        let det = DetectorRegion::new(2, (10., 5.), (4., 2.), 0.5).angle(FRAC_PI_2);
        assert_eq!(det.shape(), (8, 4));
        let (px, py) = det.to_pixel(10., 6.);
        assert!((px - 5.5).abs() < 1e-12 && (py - 1.5).abs() < 1e-12);
        let (x, y) = det.to_focal(px, py);
        assert!((x - 10.).abs() < 1e-12 && (y - 6.).abs() < 1e-12);
        let (x0, x1, y0, y1) = det.footprint();
        assert!((x1 - x0 - 2.).abs() < 1e-12 && (y1 - y0 - 4.).abs() < 1e-12);
    }

    #[test]
    fn invalid() {
        assert!(DetectorRegion::new(1, (0., 0.), (0.1, 1.), 1.).validate().is_err());
        assert!(DetectorRegion::new(1, (0., 0.), (1., 1.), 1.)
            .gain(0.)
            .validate()
            .is_err());
    }
}
