use crate::source::SkyBox;

/// Interval `[min, max)`, or `[min, max]` when `closed`
///
/// Adjacent spans of a decomposition share their bounds and only the last
/// one is closed, so that every value is owned by exactly one span.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Span {
    pub min: f64,
    pub max: f64,
    pub closed: bool,
}
impl Span {
    pub fn new(min: f64, max: f64, closed: bool) -> Self {
        Self { min, max, closed }
    }
    /// Closed span
    pub fn closed(min: f64, max: f64) -> Self {
        Self::new(min, max, true)
    }
    pub fn width(&self) -> f64 {
        self.max - self.min
    }
    pub fn mid(&self) -> f64 {
        0.5 * (self.min + self.max)
    }
    pub fn contains(&self, v: f64) -> bool {
        v >= self.min && (v < self.max || (self.closed && v <= self.max))
    }
    /// Splits the span in `n` equal parts, only the last one inherits `closed`
    pub fn split(&self, n: usize) -> Vec<Span> {
        let n = n.max(1);
        let step = self.width() / n as f64;
        (0..n)
            .map(|i| {
                let last = i + 1 == n;
                let min = self.min + i as f64 * step;
                let max = if last { self.max } else { self.min + (i + 1) as f64 * step };
                Span::new(min, max, last && self.closed)
            })
            .collect()
    }
    /// Splits the span at the `cuts` lying strictly inside it
    pub fn cut(&self, cuts: &[f64]) -> Vec<Span> {
        let mut bounds: Vec<f64> = cuts
            .iter()
            .copied()
            .filter(|&c| c > self.min && c < self.max)
            .collect();
        bounds.sort_by(f64::total_cmp);
        bounds.dedup();
        let mut spans = Vec::with_capacity(bounds.len() + 1);
        let mut lo = self.min;
        for c in bounds {
            spans.push(Span::new(lo, c, false));
            lo = c;
        }
        spans.push(Span::new(lo, self.max, self.closed));
        spans
    }
    /// Splits the span at multiples of `step` from its lower bound
    pub fn chunks(&self, step: f64) -> Vec<Span> {
        if !(step > 0.) || self.width() <= step {
            return vec![*self];
        }
        let n = (self.width() / step).ceil() as usize;
        (0..n)
            .map(|i| {
                let last = i + 1 == n;
                let min = self.min + i as f64 * step;
                let max = if last { self.max } else { self.min + (i + 1) as f64 * step };
                Span::new(min, max, last && self.closed)
            })
            .collect()
    }
}

/// Half-open pixel index box `[x_min, x_max) x [y_min, y_max)`
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PixelBox {
    pub x_min: usize,
    pub x_max: usize,
    pub y_min: usize,
    pub y_max: usize,
}
impl PixelBox {
    /// Pixel box holding the pixel coordinates `points`, grown by one pixel
    /// and clipped to a `shape` detector; `None` if it misses the detector
    pub fn around<I>(points: I, shape: (usize, usize)) -> Option<Self>
    where
        I: IntoIterator<Item = (f64, f64)>,
    {
        let (x0, x1, y0, y1) = points
            .into_iter()
            .filter(|(x, y)| x.is_finite() && y.is_finite())
            .fold(
                (
                    f64::INFINITY,
                    f64::NEG_INFINITY,
                    f64::INFINITY,
                    f64::NEG_INFINITY,
                ),
                |(a, b, c, d), (x, y)| (a.min(x), b.max(x), c.min(y), d.max(y)),
            );
        let clip = |lo: f64, hi: f64, n: usize| -> Option<(usize, usize)> {
            let lo = (lo - 1.).floor().max(0.);
            let hi = ((hi + 1.).floor() + 1.).min(n as f64);
            (lo < hi).then_some((lo as usize, hi as usize))
        };
        if !(x0 <= x1 && y0 <= y1) {
            return None;
        }
        let (x_min, x_max) = clip(x0, x1, shape.0)?;
        let (y_min, y_max) = clip(y0, y1, shape.1)?;
        Some(Self {
            x_min,
            x_max,
            y_min,
            y_max,
        })
    }
    pub fn n_pixel(&self) -> usize {
        (self.x_max - self.x_min) * (self.y_max - self.y_min)
    }
    pub fn is_empty(&self) -> bool {
        self.n_pixel() == 0
    }
}

/// Whether a tile is the reference tile of its sky and wavelength cell or an
/// additional projection accumulated on top of it
///
/// The primary tile of a cell is cut from the trace with the lowest
/// `wave_min` (then name) covering the cell, on the first detector it lands
/// on. A cell whose owning trace misses every detector has no primary tile.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TileRole {
    Primary,
    Overlap,
}

/// A bounded (sky × wavelength) chunk projected through one trace onto one
/// detector
///
/// The tile owns the sky positions inside `x` × `y` and the wavelengths inside
/// `wave`. Extended components are sampled on a grid anchored on their
/// intersection with `region`, shared by all the tiles cut from it. In
/// spectroscopy `x` is the slit position and `y` is integrated across the
/// slit.
#[derive(Debug, Clone, PartialEq)]
pub struct FovTile {
    pub index: usize,
    /// Trace name, `None` in imaging mode
    pub trace: Option<String>,
    pub detector_id: usize,
    pub role: TileRole,
    /// First of the tiles projecting the same trace samples onto several
    /// detectors; only the lead tile accounts for their input flux
    pub lead: bool,
    pub region: SkyBox,
    pub x: Span,
    pub y: Span,
    pub wave: Span,
    pub n_wave_samples: usize,
    /// Focal plane drift across `wave` in detector pixels
    pub drift: f64,
    pub pixels: PixelBox,
}
impl FovTile {
    pub fn sky(&self) -> SkyBox {
        SkyBox::new(self.x.min, self.x.max, self.y.min, self.y.max)
    }
    /// Whether the tile owns sky position (`x`,`y`) at wavelength `wave`
    pub fn covers(&self, x: f64, y: f64, wave: f64) -> bool {
        self.x.contains(x) && self.y.contains(y) && self.wave.contains(wave)
    }
    pub fn is_primary(&self) -> bool {
        self.role == TileRole::Primary
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn span_ownership() {
        let parts = Span::closed(0., 1.).split(4);
        assert_eq!(parts.len(), 4);
        for v in [0., 0.25, 0.6, 1.] {
            assert_eq!(parts.iter().filter(|s| s.contains(v)).count(), 1, "{v}");
        }
        assert!(Span::closed(2., 2.).contains(2.));
        assert!(!Span::new(2., 2., false).contains(2.));
    }

    #[test]
    fn cut_at_bounds() {
        let parts = Span::closed(1., 2.).cut(&[0.5, 1.4, 1.4, 2., 1.8]);
        assert_eq!(
            parts,
            vec![
                Span::new(1., 1.4, false),
                Span::new(1.4, 1.8, false),
                Span::closed(1.8, 2.)
            ]
        );
        assert_eq!(Span::closed(3., 3.).cut(&[3.]), vec![Span::closed(3., 3.)]);
    }

    #[test]
    fn chunks() {
        let parts = Span::closed(-1., 1.5).chunks(1.);
        assert_eq!(parts.len(), 3);
        assert_eq!(parts[2], Span::closed(1., 1.5));
        assert!(!parts[1].closed);
    }

    #[test]
    fn pixel_box() {
        let b = PixelBox::around([(2.5, 3.), (4., 3.2)], (10, 10)).unwrap();
        assert_eq!(
            b,
            PixelBox {
                x_min: 1,
                x_max: 6,
                y_min: 2,
                y_max: 5
            }
        );
        assert!(PixelBox::around([(20., 3.)], (10, 10)).is_none());
        assert!(PixelBox::around([(-3., -3.)], (10, 10)).is_none());
    }
}
