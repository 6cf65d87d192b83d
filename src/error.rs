use crate::{
    catalogue::CatalogueError, config::ConfigError, detector::DetectorError,
    effects::EffectError, fov::FovError, projector::ProjectionError, source::SourceError,
    spectrum::SpectrumError, trace::TraceError, units::UnitParseError,
};

#[derive(Debug, thiserror::Error)]
pub enum TraceSimError {
    #[error("cannot build `::tracesim::TraceModel`")]
    Trace(#[from] TraceError),
    #[error("cannot build `::tracesim::TraceCatalogue`")]
    Catalogue(#[from] CatalogueError),
    #[error("detector geometry failure")]
    Detector(#[from] DetectorError),
    #[error("invalid observation configuration")]
    Config(#[from] ConfigError),
    #[error("field of view decomposition failed")]
    Fov(#[from] FovError),
    #[error("flux projection failed")]
    Projection(#[from] ProjectionError),
    #[error("invalid source field")]
    Source(#[from] SourceError),
    #[error("invalid effect list")]
    Effect(#[from] EffectError),
    #[error("invalid spectrum")]
    Spectrum(#[from] SpectrumError),
    #[error("invalid unit")]
    Unit(#[from] UnitParseError),
}
