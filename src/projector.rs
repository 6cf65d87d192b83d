//!
//! # Flux projection
//!
//! The [`FluxProjector`] samples the source inside every tile of a
//! [`FovPlan`], maps the samples to the focal plane through the tile trace
//! (or the plate scale in imaging), and deposits the counts on the detector
//! pixels with bilinear, flux conserving, weights.
//!
//! Tiles are independent: [`FluxProjector::project`] spreads them over the
//! rayon thread pool, each worker accumulating into private images that are
//! summed at the end.

use indicatif::{ProgressBar, ProgressStyle};
use rayon::prelude::*;
use std::sync::{
    atomic::{AtomicBool, Ordering},
    Arc,
};

use crate::{
    catalogue::TraceCatalogue,
    config::{FarEdge, InstrumentMode, NearEdge, ObservationConfig},
    detector::{CountUnit, DetectorError, DetectorGeometry, DetectorImage},
    effects::EffectList,
    fov::{FovDecomposer, FovPlan, FovTile},
    source::SourceField,
};

pub mod sampling;
mod summary;
pub use summary::ProjectionSummary;

#[derive(Debug, thiserror::Error)]
pub enum ProjectionError {
    #[error("tile {tile} references unknown trace {trace:?}")]
    UnknownTrace { tile: usize, trace: String },
    #[error("tile {tile} references unknown detector {detector}")]
    UnknownDetector { tile: usize, detector: usize },
    #[error("tile {0} needs a trace catalogue")]
    NoCatalogue(usize),
    #[error("failed to combine detector images")]
    Detector(#[from] DetectorError),
}
pub type Result<T> = std::result::Result<T, ProjectionError>;

/// Shared flag to stop a projection between tiles
///
/// A cancellation stops the projection in progress, or the next one, and is
/// cleared when that projection returns.
#[derive(Debug, Clone, Default)]
pub struct CancelToken(Arc<AtomicBool>);
impl CancelToken {
    pub fn new() -> Self {
        Default::default()
    }
    pub fn cancel(&self) {
        self.0.store(true, Ordering::Relaxed);
    }
    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::Relaxed)
    }
    /// Clears a pending cancellation
    pub fn reset(&self) {
        self.0.store(false, Ordering::Relaxed);
    }
}

// a source sample ready for the focal plane mapping
struct FluxSample {
    x: f64,
    y: f64,
    wave: f64,
    flux: f64,
}

/// Projection of field-of-view tiles onto detector images
#[derive(Debug, Clone)]
pub struct FluxProjector {
    config: ObservationConfig,
    catalogue: Option<Arc<TraceCatalogue>>,
    detectors: Arc<DetectorGeometry>,
    effects: EffectList,
    progress: bool,
    cancel: CancelToken,
}

impl FluxProjector {
    /// Projector sharing the instrument of `decomposer`
    pub fn new(decomposer: &FovDecomposer, effects: EffectList) -> Self {
        Self {
            config: decomposer.config.clone(),
            catalogue: decomposer.catalogue.clone(),
            detectors: decomposer.detectors.clone(),
            effects,
            progress: false,
            cancel: CancelToken::new(),
        }
    }
    /// Shows a progress bar during [project](FluxProjector::project)
    pub fn progress(self, progress: bool) -> Self {
        Self { progress, ..self }
    }
    pub fn cancel_token(self, cancel: CancelToken) -> Self {
        Self { cancel, ..self }
    }
    /// Handle to cancel the projection from another thread
    pub fn cancel_handle(&self) -> CancelToken {
        self.cancel.clone()
    }
    pub fn count_unit(&self) -> CountUnit {
        if self.effects.converts_to_electrons() {
            CountUnit::Electrons
        } else {
            CountUnit::Photons
        }
    }
    /// Zeroed images of all the detectors
    pub fn blank_images(&self) -> Vec<DetectorImage> {
        self.detectors.blank_images(self.count_unit())
    }

    fn samples(&self, tile: &FovTile, source: &SourceField) -> Vec<FluxSample> {
        let cfg = &self.config;
        let spectroscopy = tile.trace.is_some();
        let scale = cfg.area * cfg.exposure;
        let step = cfg.spatial_step();
        let mut samples = vec![];
        for (component, spectrum) in source.iter() {
            let sky = sampling::sky_samples(component, tile, step, spectroscopy);
            if sky.is_empty() {
                continue;
            }
            let spectral: Vec<_> = sampling::spectral_samples(spectrum, tile)
                .into_iter()
                .map(|s| (s.wave, s.flux * self.effects.transmission(s.wave)))
                .filter(|(_, flux)| *flux != 0.)
                .collect();
            for s in &sky {
                let weight = component.weight() * s.weight * scale;
                samples.extend(spectral.iter().map(|&(wave, flux)| FluxSample {
                    x: s.x,
                    y: s.y,
                    wave,
                    flux: flux * weight,
                }));
            }
        }
        samples
    }

    /// Projects one tile into `images`
    pub fn project_tile(
        &self,
        tile: &FovTile,
        source: &SourceField,
        images: &mut [DetectorImage],
    ) -> Result<ProjectionSummary> {
        let image = images
            .iter_mut()
            .find(|i| i.id() == tile.detector_id)
            .ok_or(ProjectionError::UnknownDetector {
                tile: tile.index,
                detector: tile.detector_id,
            })?;
        let trace = match &tile.trace {
            Some(name) => {
                let catalogue = self
                    .catalogue
                    .as_deref()
                    .ok_or(ProjectionError::NoCatalogue(tile.index))?;
                Some(
                    catalogue
                        .get(name)
                        .ok_or_else(|| ProjectionError::UnknownTrace {
                            tile: tile.index,
                            trace: name.clone(),
                        })?,
                )
            }
            None => None,
        };
        let samples = self.samples(tile, source);
        let mut summary = ProjectionSummary {
            tiles_processed: 1,
            input_flux: if tile.lead {
                samples.iter().map(|s| s.flux).sum()
            } else {
                0.
            },
            ..Default::default()
        };
        let edge = self.config.edge;
        let plate_scale = self.config.plate_scale;
        let mut focal = Vec::with_capacity(samples.len());
        for s in &samples {
            let (fx, fy) = match trace {
                None => (s.x / plate_scale, s.y / plate_scale),
                Some(trace) => {
                    let domain = trace.domain();
                    let excess = domain.excess(s.x, s.wave);
                    if excess == 0. {
                        trace.eval(s.x, s.wave)
                    } else if excess <= edge.band {
                        match edge.near {
                            NearEdge::Clamp => {
                                summary.samples_clamped += 1;
                                let (slit, wave) = domain.clamp(s.x, s.wave);
                                trace.eval(slit, wave)
                            }
                            NearEdge::Drop => {
                                summary.samples_dropped += 1;
                                continue;
                            }
                        }
                    } else {
                        match edge.far {
                            FarEdge::Drop => {
                                summary.samples_dropped += 1;
                                continue;
                            }
                            FarEdge::RejectTile => {
                                log::debug!(
                                    "tile {}: sample (slit={}, wave={}) outside trace {:?}, tile rejected",
                                    tile.index,
                                    s.x,
                                    s.wave,
                                    trace.name()
                                );
                                return Ok(ProjectionSummary {
                                    tiles_rejected: 1,
                                    samples_dropped: samples.len(),
                                    ..summary
                                });
                            }
                        }
                    }
                }
            };
            focal.push((image.to_pixel(fx, fy), s.flux));
        }
        for ((px, py), flux) in focal {
            let deposited = image.deposit(px, py, flux);
            if deposited != 0. {
                summary.samples_deposited += 1;
                summary.deposited_flux += deposited;
            }
        }
        if summary.samples_deposited == 0 && !samples.is_empty() {
            log::debug!("tile {} is off detector {}", tile.index, tile.detector_id);
            summary.tiles_off_detector = 1;
        }
        Ok(summary)
    }

    /// Projects `tiles` one after the other into `images`, stopping early
    /// when cancelled
    pub fn accumulate<'a, I>(
        &self,
        tiles: I,
        source: &SourceField,
        images: &mut [DetectorImage],
    ) -> Result<ProjectionSummary>
    where
        I: IntoIterator<Item = &'a FovTile>,
    {
        let mut summary = ProjectionSummary::default();
        for tile in tiles {
            if self.cancel.is_cancelled() {
                summary.cancelled = true;
                break;
            }
            summary += self.project_tile(tile, source, images)?;
        }
        if summary.cancelled {
            self.cancel.reset();
        }
        Ok(summary)
    }

    /// Projects all the tiles of `plan` in parallel
    pub fn project(
        &self,
        plan: &FovPlan,
        source: &SourceField,
    ) -> Result<(Vec<DetectorImage>, ProjectionSummary)> {
        let pb = self.progress.then(|| {
            let pb = ProgressBar::new(plan.len() as u64);
            if let Ok(style) = ProgressStyle::with_template(
                "{msg} [{eta_precise}] {bar:50.cyan/blue} {pos:>7}/{len:7}",
            ) {
                pb.set_style(style);
            }
            pb.set_message("Projecting tiles");
            pb
        });
        let blank = || (self.blank_images(), ProjectionSummary::default());
        let (images, summary) = plan
            .tiles
            .par_iter()
            .try_fold(blank, |(mut images, mut summary), tile| {
                if self.cancel.is_cancelled() {
                    summary.cancelled = true;
                } else {
                    summary += self.project_tile(tile, source, &mut images)?;
                    if let Some(pb) = &pb {
                        pb.inc(1);
                    }
                }
                Ok::<_, ProjectionError>((images, summary))
            })
            .try_reduce(blank, |(mut a, sa), (b, sb)| {
                for (a, b) in a.iter_mut().zip(&b) {
                    a.accumulate(b)?;
                }
                Ok((a, sa + sb))
            })?;
        if let Some(pb) = pb {
            pb.finish();
        }
        if summary.cancelled {
            self.cancel.reset();
            log::warn!(
                "projection cancelled after {} of {} tile(s)",
                summary.tiles_processed,
                plan.len()
            );
        }
        if summary.tiles_rejected > 0 || summary.samples_dropped > 0 {
            log::warn!(
                "{} tile(s) rejected, {} sample(s) dropped",
                summary.tiles_rejected,
                summary.samples_dropped
            );
        }
        log::info!(
            "{} tile(s) projected, {:.6e} of {:.6e} counts deposited",
            summary.tiles_processed,
            summary.deposited_flux,
            summary.input_flux
        );
        Ok((images, summary))
    }

    pub fn mode(&self) -> InstrumentMode {
        self.config.mode
    }
}
