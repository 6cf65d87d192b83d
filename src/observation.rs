//!
//! # Observation pipeline
//!
//! An [`Observation`] ties the [`FovDecomposer`] and the [`FluxProjector`]
//! of one instrument configuration together: [`Observation::observe`]
//! decomposes the source field into tiles, projects them and returns the
//! finalised [`Exposure`].
//! The exposure is then handed off, in a single call, to a [`Readout`].
//!
//! ```
//! use tracesim::{
//!     Builder, DetectorGeometry, FromBuilder, GainReadout, InstrumentMode, Observation,
//!     ObservationConfig, SourceField, Spectrum,
//! };
//!
//! let config = ObservationConfig {
//!     mode: InstrumentMode::Imaging,
//!     plate_scale: 1.,
//!     pixel_scale: 1.,
//!     ..Default::default()
//! };
//! let observation = Observation::builder()
//!     .config(config)
//!     .detectors(DetectorGeometry::single((8., 8.), 1.)?)
//!     .build()?;
//! let mut source = SourceField::new();
//! let s = source.add_spectrum(Spectrum::Line { wave: 1.5, flux: 100. });
//! source.point(0., 0., s, 1.)?;
//! let exposure = observation.observe(&source)?;
//! assert!((exposure.total_counts() - 100.).abs() < 1e-9);
//! let frames = exposure.hand_off(&mut GainReadout)?;
//! assert_eq!(frames.len(), 1);
//! # Ok::<(), Box<dyn std::error::Error>>(())
//! ```

use std::sync::Arc;

use crate::{
    catalogue::TraceCatalogue,
    config::ObservationConfig,
    detector::{CountUnit, DetectorGeometry, DetectorImage},
    effects::EffectList,
    fov::{FovDecomposer, FovDiagnostic, FovPlan},
    projector::{CancelToken, FluxProjector, ProjectionSummary},
    source::SourceField,
    Builder, FromBuilder,
};

/// Detector images of a completed observation with its diagnostics
#[derive(Debug, Clone)]
pub struct Exposure {
    images: Vec<DetectorImage>,
    summary: ProjectionSummary,
    diagnostics: Vec<FovDiagnostic>,
}
impl Exposure {
    pub fn images(&self) -> &[DetectorImage] {
        &self.images
    }
    pub fn image(&self, id: usize) -> Option<&DetectorImage> {
        self.images.iter().find(|i| i.id() == id)
    }
    pub fn summary(&self) -> &ProjectionSummary {
        &self.summary
    }
    /// Field-of-view decomposition diagnostics
    pub fn diagnostics(&self) -> &[FovDiagnostic] {
        &self.diagnostics
    }
    pub fn unit(&self) -> Option<CountUnit> {
        self.images.first().map(|i| i.unit())
    }
    /// Counts summed over all the detectors
    pub fn total_counts(&self) -> f64 {
        self.images.iter().map(|i| i.sum()).sum()
    }
    pub fn into_images(self) -> Vec<DetectorImage> {
        self.images
    }
    /// Passes the exposure on to `readout`
    pub fn hand_off<R: Readout>(self, readout: &mut R) -> crate::Result<R::Output> {
        log::info!(
            "handing off {} detector image(s) ({:.6e} counts)",
            self.images.len(),
            self.total_counts()
        );
        readout.read_out(self)
    }
}

/// Detector readout collaborator
///
/// Noise, saturation and file formats are the business of the implementors.
pub trait Readout {
    type Output;
    fn read_out(&mut self, exposure: Exposure) -> crate::Result<Self::Output>;
}

/// Readout converting counts to ADU with the gain of each detector
#[derive(Debug, Clone, Copy, Default)]
pub struct GainReadout;
impl Readout for GainReadout {
    type Output = Vec<DetectorImage>;
    fn read_out(&mut self, exposure: Exposure) -> crate::Result<Self::Output> {
        Ok(exposure
            .into_images()
            .into_iter()
            .map(|mut image| {
                let gain = image.region().gain;
                image.scale(gain.recip());
                image
            })
            .collect())
    }
}

/// [`Observation`] builder
///
/// Default properties:
///  * config    : [`ObservationConfig::default`]
///  * catalogue : none, required in spectroscopy
///  * detectors : none, required
///  * effects   : none
///  * progress  : false
#[derive(Debug, Clone, Default)]
pub struct ObservationBuilder {
    config: ObservationConfig,
    catalogue: Option<Arc<TraceCatalogue>>,
    detectors: Option<Arc<DetectorGeometry>>,
    effects: EffectList,
    progress: bool,
}
impl ObservationBuilder {
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
    pub fn effects(self, effects: EffectList) -> Self {
        Self { effects, ..self }
    }
    pub fn progress(self) -> Self {
        Self {
            progress: true,
            ..self
        }
    }
}
impl Builder for ObservationBuilder {
    type Component = Observation;

    fn build(self) -> crate::Result<Self::Component> {
        let mut decomposer = FovDecomposer::builder()
            .config(self.config)
            .effects(self.effects.clone());
        if let Some(catalogue) = self.catalogue {
            decomposer = decomposer.catalogue(catalogue);
        }
        if let Some(detectors) = self.detectors {
            decomposer = decomposer.detectors(detectors);
        }
        let decomposer = decomposer.build()?;
        let projector = FluxProjector::new(&decomposer, self.effects).progress(self.progress);
        Ok(Observation {
            decomposer,
            projector,
        })
    }
}

/// Source field to detector images pipeline
#[derive(Debug, Clone)]
pub struct Observation {
    decomposer: FovDecomposer,
    projector: FluxProjector,
}
impl FromBuilder for Observation {
    type ComponentBuilder = ObservationBuilder;
}
impl Observation {
    pub fn config(&self) -> &ObservationConfig {
        self.decomposer.config()
    }
    pub fn decomposer(&self) -> &FovDecomposer {
        &self.decomposer
    }
    pub fn projector(&self) -> &FluxProjector {
        &self.projector
    }
    /// Handle to cancel [observe](Observation::observe) from another thread
    pub fn cancel_handle(&self) -> CancelToken {
        self.projector.cancel_handle()
    }
    pub fn plan(&self, source: &SourceField) -> crate::Result<FovPlan> {
        Ok(self.decomposer.decompose(source)?)
    }
    /// Decomposes and projects `source`
    pub fn observe(&self, source: &SourceField) -> crate::Result<Exposure> {
        let plan = self.plan(source)?;
        self.observe_plan(plan, source)
    }
    /// Projects `source` with an existing decomposition
    pub fn observe_plan(&self, plan: FovPlan, source: &SourceField) -> crate::Result<Exposure> {
        let (images, summary) = self.projector.project(&plan, source)?;
        Ok(Exposure {
            images,
            summary,
            diagnostics: plan.diagnostics,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{detector::DetectorRegion, InstrumentMode, Spectrum};

    fn imaging(detectors: DetectorGeometry) -> Observation {
        Observation::builder()
            .config(ObservationConfig {
                mode: InstrumentMode::Imaging,
                plate_scale: 1.,
                pixel_scale: 1.,
                ..Default::default()
            })
            .detectors(detectors)
            .build()
            .unwrap()
    }

    #[test]
    fn gain_readout() {
        let detectors = DetectorGeometry::new(vec![
            DetectorRegion::new(1, (0., 0.), (4., 4.), 1.).gain(2.),
            DetectorRegion::new(2, (10., 0.), (4., 4.), 1.).gain(4.),
        ])
        .unwrap();
        let observation = imaging(detectors);
        let mut source = SourceField::new();
        let s = source.add_spectrum(Spectrum::Line { wave: 1.5, flux: 8. });
        source.point(0., 0., s, 1.).unwrap();
        source.point(10., 0., s, 1.).unwrap();
        let exposure = observation.observe(&source).unwrap();
        assert!((exposure.image(1).unwrap().sum() - 8.).abs() < 1e-9);
        assert!((exposure.image(2).unwrap().sum() - 8.).abs() < 1e-9);
        let frames = exposure.hand_off(&mut GainReadout).unwrap();
        assert!((frames[0].sum() - 4.).abs() < 1e-9);
        assert!((frames[1].sum() - 2.).abs() < 1e-9);
    }

    #[test]
    fn empty_source() {
        let observation = imaging(DetectorGeometry::single((4., 4.), 1.).unwrap());
        let exposure = observation.observe(&SourceField::new()).unwrap();
        assert_eq!(exposure.total_counts(), 0.);
        assert!(exposure
            .diagnostics()
            .iter()
            .any(|d| matches!(d, FovDiagnostic::EmptySource)));
    }

    #[test]
    fn missing_catalogue() {
        let result = Observation::builder()
            .detectors(DetectorGeometry::single((4., 4.), 1.).unwrap())
            .build();
        assert!(matches!(
            result,
            Err(crate::TraceSimError::Fov(crate::fov::FovError::NoCatalogue))
        ));
    }
}
