//!
//! # Spectral trace projection
//!
//! `tracesim` projects the flux of a sky source field through the spectral
//! traces of an instrument onto its detector pixels.
//!
//! The main elements are:
//!  * [`TraceModel`]: the (slit position, wavelength) to focal plane mapping of one spectral order,
//!  * [`TraceCatalogue`]: the set of traces of an instrument mode, loaded from a TOML catalogue,
//!  * [`FovDecomposer`]: the splitting of a [`SourceField`] into sky and wavelength tiles
//!    small enough for the trace to be locally linear,
//!  * [`FluxProjector`]: the accumulation of the tile fluxes into [`DetectorImage`]s.
//!
//! Elements are created with the builder associated to each of them,
//! and the [`Observation`] pipeline chains them together:
//! ```
//! use tracesim::{
//!     Builder, DetectorGeometry, FromBuilder, Observation, ObservationConfig, SourceField,
//!     Spectrum, TraceCatalogue, TraceDomain, TraceModel,
//! };
//! use tracesim::trace::{Axis, Coefficient};
//!
//! let c = |axis, wave_power, slit_power, value| Coefficient { axis, wave_power, slit_power, value };
//! let order = TraceModel::builder()
//!     .name("order_1")
//!     .coefficients(
//!         vec![c(Axis::X, 0, 1, 1.), c(Axis::Y, 1, 0, 4.), c(Axis::Y, 0, 0, -6.)],
//!         TraceDomain::new(1., 2., -1., 1.)?,
//!     )
//!     .build()?;
//! let observation = Observation::builder()
//!     .config(ObservationConfig::default())
//!     .catalogue(TraceCatalogue::builder().trace(order).build()?)
//!     .detectors(DetectorGeometry::single((8., 8.), 0.5)?)
//!     .build()?;
//! let mut source = SourceField::new();
//! let s = source.add_spectrum(Spectrum::Line { wave: 1.5, flux: 10. });
//! source.point(0., 0., s, 1.)?;
//! let exposure = observation.observe(&source)?;
//! assert!((exposure.total_counts() - 10.).abs() < 1e-9);
//! # Ok::<(), Box<dyn std::error::Error>>(())
//! ```

pub mod catalogue;
pub mod config;
pub mod detector;
pub mod effects;
pub mod error;
pub mod fov;
pub mod observation;
pub mod projector;
pub mod source;
pub mod spectrum;
pub mod trace;
pub mod units;

#[doc(inline)]
pub use self::catalogue::{ExpectedUnits, TraceCatalogue};
#[doc(inline)]
pub use self::config::{EdgePolicy, InstrumentMode, ObservationConfig, TilingConfig};
#[doc(inline)]
pub use self::detector::{CountUnit, DetectorGeometry, DetectorImage, DetectorRegion};
#[doc(inline)]
pub use self::effects::{Effect, EffectList};
#[doc(inline)]
pub use self::error::TraceSimError;
#[doc(inline)]
pub use self::fov::{FovDecomposer, FovDiagnostic, FovPlan, FovTile};
#[doc(inline)]
pub use self::observation::{Exposure, GainReadout, Observation, Readout};
#[doc(inline)]
pub use self::projector::{CancelToken, FluxProjector, ProjectionSummary};
#[doc(inline)]
pub use self::source::{FieldComponent, SkyBox, SourceField};
#[doc(inline)]
pub use self::spectrum::{Spectrum, TransmissionCurve};
#[doc(inline)]
pub use self::trace::{DomainPolicy, Sampling, TraceDomain, TraceModel};
#[doc(inline)]
pub use self::units::{AngleUnit, LengthUnit, WaveUnit};

pub type Result<T> = std::result::Result<T, TraceSimError>;

/// Component builder trait
pub trait Builder: Default {
    type Component;
    fn new() -> Self {
        Default::default()
    }
    fn build(self) -> Result<Self::Component>;
}

/// Access to the builder of a component
pub trait FromBuilder: Sized {
    type ComponentBuilder: Builder<Component = Self>;
    fn builder() -> Self::ComponentBuilder {
        Self::ComponentBuilder::new()
    }
}
