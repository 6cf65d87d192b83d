//!
//! # Spectral traces
//!
//! A [`TraceModel`] maps a (slit position, wavelength) pair onto focal plane
//! coordinates in millimeters. It is either a bivariate polynomial or a table
//! of sampled nodes interpolated piecewise-bilinearly, see [`TraceKind`].
//!
//! ```
//! use tracesim::{Builder, DomainPolicy, FromBuilder, TraceModel};
//! let trace = TraceModel::builder()
//!     .name("order_1")
//!     .samples(
//!         vec![1.0, 1.0, 2.0, 2.0],
//!         vec![-1.0, 1.0, -1.0, 1.0],
//!         vec![-2.0, 2.0, -2.0, 2.0],
//!         vec![0.0, 0.0, 10.0, 10.0],
//!     )
//!     .build()
//!     .unwrap();
//! let (x, y) = trace.forward(0.5, 1.5, DomainPolicy::Strict).unwrap();
//! assert_eq!((x, y), (1.0, 5.0));
//! assert!(trace.forward(0.5, 2.5, DomainPolicy::Strict).is_err());
//! ```

use nalgebra::{Matrix2, Vector2};

use crate::{
    units::{AngleUnit, LengthUnit, WaveUnit},
    FromBuilder,
};

mod builder;
mod polynomial;
mod table;
pub use builder::{TraceData, TraceModelBuilder};
pub use polynomial::{Axis, Coefficient, PolynomialMap};
pub use table::SampleGrid;

#[derive(Debug, thiserror::Error, PartialEq)]
pub enum TraceError {
    #[error("trace {trace:?}: (slit={slit}, wave={wave}) is outside the validity domain")]
    OutOfRange { trace: String, slit: f64, wave: f64 },
    #[error("trace {trace:?}: cannot pair {n_slit} slit positions with {n_wave} wavelengths")]
    LengthMismatch {
        trace: String,
        n_slit: usize,
        n_wave: usize,
    },
    #[error("trace {trace:?}: no inverse found for focal plane point ({x}, {y})")]
    NoInverse { trace: String, x: f64, y: f64 },
    #[error("invalid trace domain: {0}")]
    InvalidDomain(String),
    #[error("invalid sample table: {0}")]
    Table(String),
    #[error("invalid polynomial: {0}")]
    Polynomial(String),
    #[error("trace {0:?} has no mapping data")]
    NoData(String),
}
pub type TraceResult<T> = std::result::Result<T, TraceError>;

/// Behaviour of the forward mapping outside the validity domain
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub enum DomainPolicy {
    /// Out-of-range error
    #[default]
    Strict,
    /// NaN coordinates
    Nan,
    /// Explicit extrapolation of the mapping
    Extrapolate,
}

/// Input pairing of [`TraceModel::evaluate_forward`]
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub enum Sampling {
    /// Element-wise, a length-1 input is broadcast
    #[default]
    Paired,
    /// Cartesian product, slit-major
    Grid,
}

/// Rectangular (slit × wavelength) validity domain
#[derive(Debug, Clone, Copy, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct TraceDomain {
    pub wave_min: f64,
    pub wave_max: f64,
    pub slit_min: f64,
    pub slit_max: f64,
}
impl TraceDomain {
    pub fn new(wave_min: f64, wave_max: f64, slit_min: f64, slit_max: f64) -> TraceResult<Self> {
        let all_finite = [wave_min, wave_max, slit_min, slit_max]
            .iter()
            .all(|v| v.is_finite());
        if !all_finite || wave_min > wave_max || slit_min > slit_max {
            return Err(TraceError::InvalidDomain(format!(
                "wave [{wave_min}, {wave_max}] x slit [{slit_min}, {slit_max}]"
            )));
        }
        Ok(Self {
            wave_min,
            wave_max,
            slit_min,
            slit_max,
        })
    }
    fn eps(lo: f64, hi: f64) -> f64 {
        1e-12 * lo.abs().max(hi.abs()).max(1.)
    }
    pub fn contains(&self, slit: f64, wave: f64) -> bool {
        self.excess(slit, wave) == 0.
    }
    pub fn contains_wave(&self, wave: f64) -> bool {
        wave >= self.wave_min - Self::eps(self.wave_min, self.wave_max)
            && wave <= self.wave_max + Self::eps(self.wave_min, self.wave_max)
    }
    /// How far outside the domain a point lies, as a fraction of the domain
    /// width along the worst axis; zero inside
    ///
    /// A zero-width axis measures the overshoot in its own units.
    pub fn excess(&self, slit: f64, wave: f64) -> f64 {
        let axis = |v: f64, lo: f64, hi: f64| {
            let eps = Self::eps(lo, hi);
            let over = if v < lo - eps {
                lo - v
            } else if v > hi + eps {
                v - hi
            } else {
                return 0.;
            };
            let width = hi - lo;
            if width > 0. {
                over / width
            } else {
                over
            }
        };
        let e = axis(wave, self.wave_min, self.wave_max).max(axis(slit, self.slit_min, self.slit_max));
        if e.is_nan() {
            f64::INFINITY
        } else {
            e
        }
    }
    /// Closest point of the domain
    pub fn clamp(&self, slit: f64, wave: f64) -> (f64, f64) {
        (
            slit.clamp(self.slit_min, self.slit_max),
            wave.clamp(self.wave_min, self.wave_max),
        )
    }
    pub fn wave_width(&self) -> f64 {
        self.wave_max - self.wave_min
    }
    pub fn slit_width(&self) -> f64 {
        self.slit_max - self.slit_min
    }
}

/// Forward mapping kinds
#[derive(Debug, Clone, PartialEq)]
pub enum TraceKind {
    Polynomial(PolynomialMap),
    Table(SampleGrid),
}
impl TraceKind {
    fn eval(&self, slit: f64, wave: f64) -> (f64, f64) {
        match self {
            TraceKind::Polynomial(p) => p.eval(slit, wave),
            TraceKind::Table(t) => t.eval(slit, wave),
        }
    }
    fn jacobian(&self, slit: f64, wave: f64) -> Matrix2<f64> {
        match self {
            TraceKind::Polynomial(p) => p.jacobian(slit, wave),
            TraceKind::Table(t) => t.jacobian(slit, wave),
        }
    }
}

/// Focal plane coordinates in the trace length unit
#[derive(Debug, Clone, Default, PartialEq)]
pub struct FocalCoords {
    pub x: Vec<f64>,
    pub y: Vec<f64>,
}

/// Spectral trace
#[derive(Debug, Clone, PartialEq)]
pub struct TraceModel {
    name: String,
    domain: TraceDomain,
    kind: TraceKind,
    aperture_id: usize,
    image_plane_id: usize,
    wave_unit: WaveUnit,
    slit_unit: AngleUnit,
    length_unit: LengthUnit,
    // (slit, wave, x, y) seeds of the inverse search
    nodes: Vec<[f64; 4]>,
}
impl FromBuilder for TraceModel {
    type ComponentBuilder = TraceModelBuilder;
}

impl TraceModel {
    pub fn name(&self) -> &str {
        &self.name
    }
    pub fn domain(&self) -> &TraceDomain {
        &self.domain
    }
    pub fn kind(&self) -> &TraceKind {
        &self.kind
    }
    pub fn wave_min(&self) -> f64 {
        self.domain.wave_min
    }
    pub fn wave_max(&self) -> f64 {
        self.domain.wave_max
    }
    pub fn slit_min(&self) -> f64 {
        self.domain.slit_min
    }
    pub fn slit_max(&self) -> f64 {
        self.domain.slit_max
    }
    pub fn aperture_id(&self) -> usize {
        self.aperture_id
    }
    pub fn image_plane_id(&self) -> usize {
        self.image_plane_id
    }
    pub fn wave_unit(&self) -> WaveUnit {
        self.wave_unit
    }
    pub fn slit_unit(&self) -> AngleUnit {
        self.slit_unit
    }
    pub fn length_unit(&self) -> LengthUnit {
        self.length_unit
    }
    pub fn in_domain(&self, slit: f64, wave: f64) -> bool {
        self.domain.contains(slit, wave)
    }
    /// Focal plane position of a single (slit, wave) pair
    pub fn forward(&self, slit: f64, wave: f64, policy: DomainPolicy) -> TraceResult<(f64, f64)> {
        if self.in_domain(slit, wave) || policy == DomainPolicy::Extrapolate {
            return Ok(self.kind.eval(slit, wave));
        }
        match policy {
            DomainPolicy::Nan => Ok((f64::NAN, f64::NAN)),
            _ => Err(TraceError::OutOfRange {
                trace: self.name.clone(),
                slit,
                wave,
            }),
        }
    }
    /// Focal plane positions of arrays of slit positions and wavelengths
    ///
    /// With [`Sampling::Grid`] the output holds `slits.len() * waves.len()`
    /// points, point `(i, j)` at `i * waves.len() + j`.
    pub fn evaluate_forward(
        &self,
        slits: &[f64],
        waves: &[f64],
        sampling: Sampling,
        policy: DomainPolicy,
    ) -> TraceResult<FocalCoords> {
        let pairs: Vec<(f64, f64)> = match sampling {
            Sampling::Grid => slits
                .iter()
                .flat_map(|&s| waves.iter().map(move |&w| (s, w)))
                .collect(),
            Sampling::Paired => match (slits.len(), waves.len()) {
                (n, m) if n == m => slits.iter().copied().zip(waves.iter().copied()).collect(),
                (1, _) => waves.iter().map(|&w| (slits[0], w)).collect(),
                (_, 1) => slits.iter().map(|&s| (s, waves[0])).collect(),
                (n_slit, n_wave) => {
                    return Err(TraceError::LengthMismatch {
                        trace: self.name.clone(),
                        n_slit,
                        n_wave,
                    })
                }
            },
        };
        pairs
            .into_iter()
            .map(|(s, w)| self.forward(s, w, policy))
            .collect::<TraceResult<Vec<_>>>()
            .map(|xy| {
                let (x, y) = xy.into_iter().unzip();
                FocalCoords { x, y }
            })
    }
    // forward mapping without domain check
    pub(crate) fn eval(&self, slit: f64, wave: f64) -> (f64, f64) {
        self.kind.eval(slit, wave)
    }
    /// Jacobian of the forward mapping, columns d/dslit and d/dwave
    pub fn jacobian(&self, slit: f64, wave: f64) -> Matrix2<f64> {
        self.kind.jacobian(slit, wave)
    }
    /// Best effort inverse of a single focal plane position
    pub fn inverse(&self, x: f64, y: f64) -> TraceResult<(f64, f64)> {
        let no_inverse = || TraceError::NoInverse {
            trace: self.name.clone(),
            x,
            y,
        };
        if !(x.is_finite() && y.is_finite()) {
            return Err(no_inverse());
        }
        let seed = self
            .nodes
            .iter()
            .min_by(|a, b| {
                let da = (a[2] - x).powi(2) + (a[3] - y).powi(2);
                let db = (b[2] - x).powi(2) + (b[3] - y).powi(2);
                da.total_cmp(&db)
            })
            .map(|n| (n[0], n[1]))
            .ok_or_else(no_inverse)?;
        match &self.kind {
            TraceKind::Table(t) => t.invert(x, y, seed),
            TraceKind::Polynomial(_) => self.newton(x, y, seed),
        }
        .ok_or_else(no_inverse)
    }
    /// Inverse of paired arrays of focal plane positions
    pub fn evaluate_inverse(&self, x: &[f64], y: &[f64]) -> TraceResult<(Vec<f64>, Vec<f64>)> {
        if x.len() != y.len() {
            return Err(TraceError::LengthMismatch {
                trace: self.name.clone(),
                n_slit: x.len(),
                n_wave: y.len(),
            });
        }
        x.iter()
            .zip(y)
            .map(|(&x, &y)| self.inverse(x, y))
            .collect::<TraceResult<Vec<_>>>()
            .map(|sw| sw.into_iter().unzip())
    }

    // Newton iterations on the forward map; a zero-width slit domain is
    // solved along the wavelength only
    fn newton(&self, x: f64, y: f64, seed: (f64, f64)) -> Option<(f64, f64)> {
        let target = Vector2::new(x, y);
        let (mut slit, mut wave) = seed;
        let degenerate = self.domain.slit_width() == 0.;
        let scale = self
            .nodes
            .iter()
            .fold(0f64, |m, n| m.max(n[2].abs()).max(n[3].abs()))
            .max(1.);
        for _ in 0..100 {
            let (fx, fy) = self.kind.eval(slit, wave);
            let r = Vector2::new(fx, fy) - target;
            let j = self.kind.jacobian(slit, wave);
            let (ds, dw) = if degenerate {
                let d = j.column(1).into_owned();
                let n2 = d.norm_squared();
                if n2 == 0. {
                    return None;
                }
                (0., r.dot(&d) / n2)
            } else {
                let step = j.lu().solve(&r)?;
                (step.x, step.y)
            };
            let (s, w) = self.domain.clamp(slit - ds, wave - dw);
            let converged = (s - slit).abs() <= 1e-14 * scale && (w - wave).abs() <= 1e-14 * scale;
            slit = s;
            wave = w;
            if converged || r.norm() <= 1e-12 * scale {
                break;
            }
        }
        let (fx, fy) = self.kind.eval(slit, wave);
        let miss = (Vector2::new(fx, fy) - target).norm();
        (degenerate || miss <= 1e-6 * scale).then_some((slit, wave))
    }
}
