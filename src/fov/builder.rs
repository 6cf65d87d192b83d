use std::sync::Arc;

use crate::{
    catalogue::TraceCatalogue, config::ObservationConfig, detector::DetectorGeometry,
    effects::EffectList, units::LengthUnit, Builder,
};

use super::{FovDecomposer, FovError, Result};

/// [`FovDecomposer`] builder
///
/// Default properties:
///  * config    : [`ObservationConfig::default`]
///  * catalogue : none, required in spectroscopy
///  * detectors : none, required
///  * effects   : none
#[derive(Debug, Clone, Default)]
pub struct FovDecomposerBuilder {
    config: ObservationConfig,
    catalogue: Option<Arc<TraceCatalogue>>,
    detectors: Option<Arc<DetectorGeometry>>,
    effects: EffectList,
}
impl FovDecomposerBuilder {
    pub fn config(self, config: ObservationConfig) -> Self {
        Self { config, ..self }
    }
    pub fn catalogue<C: Into<Arc<TraceCatalogue>>>(self, catalogue: C) -> Self {
        Self {
            catalogue: Some(catalogue.into()),
            ..self
        }
    }
    pub fn detectors<D: Into<Arc<DetectorGeometry>>>(self, detectors: D) -> Self {
        Self {
            detectors: Some(detectors.into()),
            ..self
        }
    }
    /// Sets the effects, the enabled field stops clip the source
    pub fn effects(self, effects: EffectList) -> Self {
        Self { effects, ..self }
    }
    pub(crate) fn try_build(self) -> Result<FovDecomposer> {
        self.config.validate()?;
        let detectors = self.detectors.ok_or(FovError::NoDetector)?;
        if self.config.mode == crate::InstrumentMode::Spectroscopy && self.catalogue.is_none() {
            return Err(FovError::NoCatalogue);
        }
        let cfg = &self.config;
        let mismatch = |what: &str, found: String, expected: String| FovError::UnitMismatch {
            what: what.to_owned(),
            found,
            expected,
        };
        if let Some(units) = self.catalogue.as_deref().map(|c| c.units()) {
            if units.wave != cfg.wave_unit {
                return Err(mismatch(
                    "catalogue wavelength",
                    units.wave.into(),
                    cfg.wave_unit.into(),
                ));
            }
            if units.length != detectors.length_unit() {
                return Err(mismatch(
                    "detector geometry length",
                    detectors.length_unit().into(),
                    units.length.into(),
                ));
            }
        }
        // the plate scale is given in arcsec/mm
        if cfg.mode == crate::InstrumentMode::Imaging
            && detectors.length_unit() != LengthUnit::Millimeter
        {
            return Err(mismatch(
                "detector geometry length",
                detectors.length_unit().into(),
                LengthUnit::Millimeter.into(),
            ));
        }
        for det in detectors.iter() {
            let on_sky = det.pixel_size * cfg.plate_scale;
            if ((on_sky - cfg.pixel_scale) / cfg.pixel_scale).abs() > 1e-2 {
                log::warn!(
                    "detector {}: {:.6}arcsec pixels from the plate scale, {:.6}arcsec/px configured",
                    det.id,
                    on_sky,
                    cfg.pixel_scale
                );
            }
        }
        Ok(FovDecomposer {
            field_stop: self.effects.field_stop(),
            config: self.config,
            catalogue: self.catalogue,
            detectors,
        })
    }
}

impl Builder for FovDecomposerBuilder {
    type Component = FovDecomposer;

    fn build(self) -> crate::Result<Self::Component> {
        Ok(self.try_build()?)
    }
}
