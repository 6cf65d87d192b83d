//!
//! # Field-of-view decomposition
//!
//! The [`FovDecomposer`] cuts the (sky × wavelength) domain of a
//! [`SourceField`](crate::SourceField) into [`FovTile`]s:
//!
//!  * in spectroscopy, the slit and wavelength ranges of each trace are first
//!    cut where other traces start or stop, so that every cell has a single
//!    owning trace, then the wavelength range is split so that the focal plane
//!    drift across a tile stays below the drift tolerance, and the slit range
//!    is narrowed to the detectors and halved until the tile footprint fits
//!    the tile size ceiling,
//!  * in imaging, the source is split per detector into square sky chunks.
//!
//! A source outside the instrument yields an empty [`FovPlan`] and a
//! diagnostic rather than an error.

use roots::{find_root_brent, SimpleConvergency};
use std::sync::Arc;

use crate::{
    catalogue::TraceCatalogue,
    config::{ConfigError, InstrumentMode, ObservationConfig},
    detector::{DetectorGeometry, DetectorRegion},
    source::{SkyBox, SourceField},
    trace::TraceModel,
    FromBuilder,
};

mod builder;
mod tile;
pub use builder::FovDecomposerBuilder;
pub use tile::{FovTile, PixelBox, Span, TileRole};

// recursion depth of the tile size splits
const MAX_SPLIT_DEPTH: usize = 24;

#[derive(Debug, thiserror::Error)]
pub enum FovError {
    #[error("spectroscopy needs a trace catalogue")]
    NoCatalogue,
    #[error("no detector geometry")]
    NoDetector,
    #[error("the decomposition exceeds the ceiling of {limit} tiles, check the drift tolerance and the tile size ceiling")]
    TooManyTiles { limit: usize },
    #[error("adaptive tiling of trace {trace:?} failed: {reason}")]
    Tiling { trace: String, reason: String },
    #[error("{what} unit mismatch: found {found:?}, expected {expected:?}")]
    UnitMismatch {
        what: String,
        found: String,
        expected: String,
    },
    #[error("invalid observation configuration")]
    Config(#[from] ConfigError),
}
pub type Result<T> = std::result::Result<T, FovError>;

/// Recoverable conditions met during a decomposition
#[derive(Debug, Clone, PartialEq)]
pub enum FovDiagnostic {
    /// The source has no component
    EmptySource,
    /// The source misses the field stop, the slit, every trace or every detector
    NoSpatialOverlap,
    /// The source, instrument and catalogue wavelength ranges do not intersect
    NoSpectralOverlap,
    /// No part of the trace lands on any detector
    TraceOffDetector { trace: String },
    /// A tile could not be split below the tile size ceiling
    OversizedTile { index: usize, n_pixel: usize },
}

/// Outcome of a decomposition
#[derive(Debug, Clone, Default, PartialEq)]
pub struct FovPlan {
    pub tiles: Vec<FovTile>,
    pub diagnostics: Vec<FovDiagnostic>,
}
impl FovPlan {
    pub fn len(&self) -> usize {
        self.tiles.len()
    }
    pub fn is_empty(&self) -> bool {
        self.tiles.is_empty()
    }
    pub fn iter(&self) -> impl Iterator<Item = &FovTile> {
        self.tiles.iter()
    }
    pub fn primary(&self) -> impl Iterator<Item = &FovTile> {
        self.tiles.iter().filter(|t| t.is_primary())
    }
    /// Tiles owning sky position (`x`,`y`) at wavelength `wave`
    pub fn covering(&self, x: f64, y: f64, wave: f64) -> impl Iterator<Item = &FovTile> {
        self.tiles.iter().filter(move |t| t.covers(x, y, wave))
    }
    /// Whether the source missed the instrument altogether
    pub fn no_overlap(&self) -> bool {
        self.tiles.is_empty()
            && self.diagnostics.iter().any(|d| {
                matches!(
                    d,
                    FovDiagnostic::NoSpatialOverlap | FovDiagnostic::NoSpectralOverlap
                )
            })
    }
    fn diagnose(&mut self, diagnostic: FovDiagnostic) {
        log::warn!("field of view decomposition: {:?}", diagnostic);
        self.diagnostics.push(diagnostic);
    }
}

// smallest float above `v`
fn next_up(v: f64) -> f64 {
    if v.is_nan() || v == f64::INFINITY {
        v
    } else if v == 0. {
        f64::from_bits(1)
    } else if v > 0. {
        f64::from_bits(v.to_bits() + 1)
    } else {
        f64::from_bits(v.to_bits() - 1)
    }
}

// coordinates where closed ranges start or stop covering
fn coverage_changes<I: IntoIterator<Item = (f64, f64)>>(ranges: I) -> Vec<f64> {
    ranges
        .into_iter()
        .flat_map(|(lo, hi)| [lo, next_up(hi)])
        .collect()
}

fn linspace(lo: f64, hi: f64, n: usize) -> Vec<f64> {
    if hi <= lo || n < 2 {
        return vec![lo];
    }
    let step = (hi - lo) / (n - 1) as f64;
    (0..n)
        .map(|i| if i + 1 == n { hi } else { lo + i as f64 * step })
        .collect()
}

/// Sky and wavelength tiling of a source against an instrument
#[derive(Debug, Clone)]
pub struct FovDecomposer {
    pub(crate) config: ObservationConfig,
    pub(crate) catalogue: Option<Arc<TraceCatalogue>>,
    pub(crate) detectors: Arc<DetectorGeometry>,
    field_stop: Option<SkyBox>,
}
impl FromBuilder for FovDecomposer {
    type ComponentBuilder = FovDecomposerBuilder;
}

impl FovDecomposer {
    pub fn config(&self) -> &ObservationConfig {
        &self.config
    }
    pub fn catalogue(&self) -> Option<&TraceCatalogue> {
        self.catalogue.as_deref()
    }
    pub fn detectors(&self) -> &DetectorGeometry {
        &self.detectors
    }
    /// Decomposes `source` into tiles
    pub fn decompose(&self, source: &SourceField) -> Result<FovPlan> {
        let mut plan = FovPlan::default();
        let Some(sky) = source.bounding_box() else {
            plan.diagnose(FovDiagnostic::EmptySource);
            return Ok(plan);
        };
        let sky = match self.field_stop {
            Some(stop) => sky.intersect(&stop),
            None => Some(sky),
        };
        let Some(sky) = sky else {
            plan.diagnose(FovDiagnostic::NoSpatialOverlap);
            return Ok(plan);
        };
        let mut wave = (self.config.wave_min, self.config.wave_max);
        if let Some((a, b)) = source.wave_support() {
            wave = (wave.0.max(a), wave.1.min(b));
        }
        match self.config.mode {
            InstrumentMode::Imaging => self.imaging(sky, wave, &mut plan)?,
            InstrumentMode::Spectroscopy => self.spectroscopy(sky, wave, &mut plan)?,
        }
        log::info!(
            "{} field of view tile(s) ({} primary)",
            plan.len(),
            plan.primary().count()
        );
        Ok(plan)
    }

    fn check_ceiling(&self, n_tile: usize) -> Result<()> {
        let limit = self.config.tiling.max_tiles;
        if n_tile > limit {
            Err(FovError::TooManyTiles { limit })
        } else {
            Ok(())
        }
    }

    fn imaging(&self, sky: SkyBox, wave: (f64, f64), plan: &mut FovPlan) -> Result<()> {
        let (a, b) = wave;
        if a > b {
            plan.diagnose(FovDiagnostic::NoSpectralOverlap);
            return Ok(());
        }
        let cfg = &self.config;
        let wave = Span::closed(a, b);
        let n_wave_samples = ((b - a) / cfg.spectral_sampling).ceil().max(1.) as usize;
        let side = (cfg.tiling.max_tile_pixels as f64).sqrt().floor().max(1.) * cfg.pixel_scale;
        let ps = cfg.plate_scale;
        for det in self.detectors.iter() {
            let (x0, x1, y0, y1) = det.footprint();
            let Some(region) = sky.intersect(&SkyBox::new(x0 * ps, x1 * ps, y0 * ps, y1 * ps))
            else {
                continue;
            };
            let xs = Span::closed(region.x_min, region.x_max).chunks(side);
            let ys = Span::closed(region.y_min, region.y_max).chunks(side);
            for y in &ys {
                for x in &xs {
                    let corners = [(x.min, y.min), (x.max, y.min), (x.min, y.max), (x.max, y.max)]
                        .map(|(u, v)| det.to_pixel(u / ps, v / ps));
                    let Some(pixels) = PixelBox::around(corners, det.shape()) else {
                        continue;
                    };
                    self.check_ceiling(plan.tiles.len() + 1)?;
                    plan.tiles.push(FovTile {
                        index: plan.tiles.len(),
                        trace: None,
                        detector_id: det.id,
                        role: TileRole::Primary,
                        lead: true,
                        region,
                        x: *x,
                        y: *y,
                        wave,
                        n_wave_samples,
                        drift: 0.,
                        pixels,
                    });
                }
            }
        }
        if plan.tiles.is_empty() {
            plan.diagnose(FovDiagnostic::NoSpatialOverlap);
        }
        Ok(())
    }

    fn spectroscopy(&self, sky: SkyBox, wave: (f64, f64), plan: &mut FovPlan) -> Result<()> {
        let catalogue = self.catalogue.as_deref().ok_or(FovError::NoCatalogue)?;
        let (cw0, cw1) = catalogue.overall_domain();
        let (a, b) = (wave.0.max(cw0), wave.1.min(cw1));
        if a > b {
            plan.diagnose(FovDiagnostic::NoSpectralOverlap);
            return Ok(());
        }
        let half_slit = 0.5 * self.config.slit_width;
        let Some(sky) = sky.intersect(&SkyBox::new(sky.x_min, sky.x_max, -half_slit, half_slit))
        else {
            plan.diagnose(FovDiagnostic::NoSpatialOverlap);
            return Ok(());
        };
        let traces: Vec<&TraceModel> = catalogue
            .iter()
            .filter(|t| {
                let d = t.domain();
                let seen = a.max(d.wave_min) <= b.min(d.wave_max)
                    && sky.x_min.max(d.slit_min) <= sky.x_max.min(d.slit_max);
                if !seen {
                    log::debug!("trace {:?} misses the source", t.name());
                }
                seen
            })
            .collect();
        if traces.is_empty() {
            plan.diagnose(FovDiagnostic::NoSpatialOverlap);
            return Ok(());
        }
        // the set of traces covering a cell is constant between these cuts
        let wave_cuts = coverage_changes(traces.iter().map(|t| (t.wave_min(), t.wave_max())));
        let slit_cuts = coverage_changes(traces.iter().map(|t| (t.slit_min(), t.slit_max())));
        let owner = |slit: f64, wave: f64| {
            traces
                .iter()
                .copied()
                .filter(|t| {
                    let d = t.domain();
                    (d.slit_min..=d.slit_max).contains(&slit)
                        && (d.wave_min..=d.wave_max).contains(&wave)
                })
                .min_by(|p, q| {
                    p.wave_min()
                        .total_cmp(&q.wave_min())
                        .then_with(|| p.name().cmp(q.name()))
                })
                .map(|t| t.name())
        };
        let pixel_size = self
            .detectors
            .iter()
            .map(|d| d.pixel_size)
            .fold(f64::INFINITY, f64::min);
        for trace in &traces {
            let d = trace.domain();
            let (wa, wb) = (a.max(d.wave_min), b.min(d.wave_max));
            let (s0, s1) = (sky.x_min.max(d.slit_min), sky.x_max.min(d.slit_max));
            let region = SkyBox::new(s0, s1, sky.y_min, sky.y_max);
            let n_before = plan.tiles.len();
            for slit_cell in Span::closed(s0, s1).cut(&slit_cuts) {
                let slits = linspace(slit_cell.min, slit_cell.max, self.config.tiling.slit_probes);
                for wave_cell in Span::closed(wa, wb).cut(&wave_cuts) {
                    let role = if owner(slit_cell.min, wave_cell.min) == Some(trace.name()) {
                        TileRole::Primary
                    } else {
                        TileRole::Overlap
                    };
                    for (wave, drift) in
                        self.wave_tiles(trace, wave_cell, &slits, pixel_size, plan.tiles.len())?
                    {
                        let n_wave_samples = ((wave.width() / self.config.spectral_sampling)
                            .ceil())
                        .max((2. * drift).ceil())
                        .max(1.) as usize;
                        let Some(x) = self
                            .detectors
                            .iter()
                            .filter_map(|det| self.narrow(trace, det, wave, slit_cell))
                            .reduce(|p, q| {
                                let max = p.max.max(q.max);
                                let closed = slit_cell.closed && max == slit_cell.max;
                                Span::new(p.min.min(q.min), max, closed)
                            })
                        else {
                            continue;
                        };
                        for (x, boxes) in self.fit(trace, wave, x, 0) {
                            for (rank, (detector_id, pixels)) in boxes.into_iter().enumerate() {
                                self.check_ceiling(plan.tiles.len() + 1)?;
                                let index = plan.tiles.len();
                                if pixels.n_pixel() > self.config.tiling.max_tile_pixels {
                                    plan.diagnose(FovDiagnostic::OversizedTile {
                                        index,
                                        n_pixel: pixels.n_pixel(),
                                    });
                                }
                                plan.tiles.push(FovTile {
                                    index,
                                    trace: Some(trace.name().to_owned()),
                                    detector_id,
                                    role: if rank == 0 { role } else { TileRole::Overlap },
                                    lead: rank == 0,
                                    region,
                                    x,
                                    y: Span::closed(sky.y_min, sky.y_max),
                                    wave,
                                    n_wave_samples,
                                    drift,
                                    pixels,
                                });
                            }
                        }
                    }
                }
            }
            if plan.tiles.len() == n_before {
                plan.diagnose(FovDiagnostic::TraceOffDetector {
                    trace: trace.name().to_owned(),
                });
            }
        }
        Ok(())
    }

    // wavelength sub-intervals with a focal plane drift below the tolerance
    fn wave_tiles(
        &self,
        trace: &TraceModel,
        wave: Span,
        slits: &[f64],
        pixel_size: f64,
        n_tile: usize,
    ) -> Result<Vec<(Span, f64)>> {
        let drift = |w0: f64, w: f64| {
            slits
                .iter()
                .map(|&s| {
                    let (x0, y0) = trace.eval(s, w0);
                    let (x, y) = trace.eval(s, w);
                    (x - x0).hypot(y - y0) / pixel_size
                })
                .fold(0f64, f64::max)
        };
        let (a, b) = (wave.min, wave.max);
        if a == b {
            return Ok(vec![(wave, 0.)]);
        }
        let tolerance = self.config.tiling.drift_tolerance;
        let min_width = 1e-12 * (b - a);
        let mut spans = vec![];
        let mut w0 = a;
        loop {
            let w1 = if drift(w0, b) <= tolerance * (1. + 1e-6) {
                b
            } else {
                let f = |w: f64| drift(w0, w) - tolerance;
                let mut convergency = SimpleConvergency {
                    eps: 1e-12 * b.abs().max(1.),
                    max_iter: 200,
                };
                find_root_brent(w0, b, &f, &mut convergency)
                    .map_err(|e| FovError::Tiling {
                        trace: trace.name().to_owned(),
                        reason: format!("{e:?}"),
                    })?
                    .clamp(w0 + min_width, b)
            };
            let last = w1 >= b;
            spans.push((Span::new(w0, w1, last && wave.closed), drift(w0, w1)));
            self.check_ceiling(n_tile + spans.len())?;
            if last {
                break;
            }
            w0 = w1;
        }
        Ok(spans)
    }

    // sample points of a tile in the detector pixel coordinates
    fn footprint(
        &self,
        trace: &TraceModel,
        det: &DetectorRegion,
        wave: Span,
        x: Span,
    ) -> Vec<(f64, (f64, f64))> {
        let waves = if wave.width() > 0. {
            vec![wave.min, wave.mid(), wave.max]
        } else {
            vec![wave.min]
        };
        linspace(x.min, x.max, self.config.tiling.slit_probes)
            .into_iter()
            .flat_map(|s| waves.iter().map(move |&w| (s, w)))
            .map(|(s, w)| {
                let (fx, fy) = trace.eval(s, w);
                (s, det.to_pixel(fx, fy))
            })
            .collect()
    }

    // slit sub-range landing on the detector, one probe spacing of margin
    fn narrow(&self, trace: &TraceModel, det: &DetectorRegion, wave: Span, x: Span) -> Option<Span> {
        let (n_x, n_y) = det.shape();
        let slits = linspace(x.min, x.max, self.config.tiling.slit_probes);
        let on: Vec<f64> = self
            .footprint(trace, det, wave, x)
            .into_iter()
            .filter(|(_, (px, py))| {
                *px >= -1.5 && *px < n_x as f64 + 0.5 && *py >= -1.5 && *py < n_y as f64 + 0.5
            })
            .map(|(s, _)| s)
            .collect();
        let lo = on.iter().copied().fold(f64::INFINITY, f64::min);
        let hi = on.iter().copied().fold(f64::NEG_INFINITY, f64::max);
        if lo > hi {
            return None;
        }
        let below = slits.iter().rev().copied().find(|&s| s < lo).unwrap_or(x.min);
        let above = slits.iter().copied().find(|&s| s > hi).unwrap_or(x.max);
        Some(Span::new(below, above, x.closed && above == x.max))
    }

    // halves the slit range until the pixel footprint on every detector fits
    // the ceiling
    fn fit(
        &self,
        trace: &TraceModel,
        wave: Span,
        x: Span,
        depth: usize,
    ) -> Vec<(Span, Vec<(usize, PixelBox)>)> {
        let boxes: Vec<(usize, PixelBox)> = self
            .detectors
            .iter()
            .filter_map(|det| {
                let points = self.footprint(trace, det, wave, x).into_iter().map(|(_, p)| p);
                PixelBox::around(points, det.shape()).map(|pixels| (det.id, pixels))
            })
            .collect();
        if boxes.is_empty() {
            return vec![];
        }
        let largest = boxes.iter().map(|(_, p)| p.n_pixel()).max().unwrap_or(0);
        if largest > self.config.tiling.max_tile_pixels && x.width() > 0. && depth < MAX_SPLIT_DEPTH
        {
            x.split(2)
                .into_iter()
                .flat_map(|half| self.fit(trace, wave, half, depth + 1))
                .collect()
        } else {
            vec![(x, boxes)]
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        trace::{Axis, Coefficient, TraceDomain},
        Builder,
    };

    // y = 100 (wave - 1.5) mm, x = slit / 2 mm
    fn order(name: &str, domain: TraceDomain) -> TraceModel {
        let c = |axis, wave_power, slit_power, value| Coefficient {
            axis,
            wave_power,
            slit_power,
            value,
        };
        TraceModel::builder()
            .name(name)
            .coefficients(
                vec![
                    c(Axis::X, 0, 1, 0.5),
                    c(Axis::Y, 1, 0, 100.),
                    c(Axis::Y, 0, 0, -150.),
                ],
                domain,
            )
            .build()
            .unwrap()
    }

    fn catalogue() -> TraceCatalogue {
        TraceCatalogue::builder()
            .trace(order("order_1", TraceDomain::new(1., 2., -4., 4.).unwrap()))
            .build()
            .unwrap()
    }

    fn decomposer(config: ObservationConfig) -> FovDecomposer {
        FovDecomposer::builder()
            .config(config)
            .catalogue(catalogue())
            .detectors(DetectorGeometry::single((8., 120.), 1.).unwrap())
            .build()
            .unwrap()
    }

    fn config() -> ObservationConfig {
        ObservationConfig {
            wave_min: 1.,
            wave_max: 2.,
            spectral_sampling: 0.01,
            slit_width: 1.,
            ..Default::default()
        }
    }

    #[test]
    fn drift_bounded_wave_tiles() {
        let mut source = SourceField::new();
        let s = source.add_spectrum(crate::Spectrum::Flat { photon_flux: 1. });
        source.point(0., 0., s, 1.).unwrap();
        let plan = decomposer(config()).decompose(&source).unwrap();
        // 100 pixels of dispersion at 1 pixel per tile
        assert_eq!(plan.len(), 100);
        assert!(plan.iter().all(|t| t.drift <= 1. + 1e-6));
        assert!(plan.tiles.last().unwrap().wave.closed);
        assert_eq!(plan.covering(0., 0., 1.5).count(), 1);
        assert_eq!(plan.covering(0., 0., 2.).count(), 1);
        assert_eq!(plan.covering(0., 0., 2.1).count(), 0);
    }

    #[test]
    fn line_source_single_tile() {
        let mut source = SourceField::new();
        let s = source.add_spectrum(crate::Spectrum::Line {
            wave: 1.25,
            flux: 1.,
        });
        source.point(0., 0., s, 1.).unwrap();
        let plan = decomposer(config()).decompose(&source).unwrap();
        assert_eq!(plan.len(), 1);
        assert_eq!(plan.tiles[0].wave, Span::closed(1.25, 1.25));
        assert_eq!(plan.tiles[0].n_wave_samples, 1);
    }

    #[test]
    fn tile_ceiling() {
        let mut cfg = config();
        cfg.tiling.drift_tolerance = 1e-3;
        cfg.tiling.max_tiles = 1000;
        let mut source = SourceField::new();
        let s = source.add_spectrum(crate::Spectrum::Flat { photon_flux: 1. });
        source.point(0., 0., s, 1.).unwrap();
        assert!(matches!(
            decomposer(cfg).decompose(&source),
            Err(FovError::TooManyTiles { limit: 1000 })
        ));
    }

    #[test]
    fn outside_the_slit() {
        let mut source = SourceField::new();
        let s = source.add_spectrum(crate::Spectrum::Flat { photon_flux: 1. });
        source.point(0., 3., s, 1.).unwrap();
        let plan = decomposer(config()).decompose(&source).unwrap();
        assert!(plan.no_overlap());
        assert_eq!(plan.diagnostics, vec![FovDiagnostic::NoSpatialOverlap]);
    }

    #[test]
    fn tile_size_ceiling() {
        let mut cfg = config();
        cfg.tiling.max_tile_pixels = 60;
        cfg.tiling.drift_tolerance = 10.;
        let mut source = SourceField::new();
        let s = source.add_spectrum(crate::Spectrum::Flat { photon_flux: 1. });
        source
            .extended(SkyBox::new(-4., 4., -0.5, 0.5), s, 1.)
            .unwrap();
        let plan = decomposer(cfg).decompose(&source).unwrap();
        assert!(plan.iter().all(|t| t.pixels.n_pixel() <= 60));
        assert!(plan.diagnostics.is_empty());
        // every slit position of every wavelength tile is owned once
        for w in [1.05, 1.5, 1.99] {
            for x in [-4., -2.1, 0., 0.3, 4.] {
                assert_eq!(plan.covering(x, 0., w).count(), 1, "x={x} w={w}");
            }
        }
    }

    #[test]
    fn one_primary_owner_per_cell() {
        // order_2 sees a narrower slit but starts at a bluer wavelength
        let catalogue = TraceCatalogue::builder()
            .trace(order("order_1", TraceDomain::new(1., 2., -4., 4.).unwrap()))
            .trace(order("order_2", TraceDomain::new(0.9, 2., 0., 2.).unwrap()))
            .build()
            .unwrap();
        let decomposer = FovDecomposer::builder()
            .config(config())
            .catalogue(catalogue)
            .detectors(DetectorGeometry::single((8., 120.), 1.).unwrap())
            .build()
            .unwrap();
        let mut source = SourceField::new();
        let s = source.add_spectrum(crate::Spectrum::Flat { photon_flux: 1. });
        source
            .extended(SkyBox::new(-4., 4., -0.5, 0.5), s, 1.)
            .unwrap();
        let plan = decomposer.decompose(&source).unwrap();
        for x in [-4., -1., 0., 0.5, 2., 2.5, 4.] {
            for w in [1., 1.3, 1.999, 2.] {
                let owners: Vec<_> = plan
                    .primary()
                    .filter(|t| t.covers(x, 0., w))
                    .map(|t| t.trace.as_deref())
                    .collect();
                let expected = if (0. ..=2.).contains(&x) {
                    "order_2"
                } else {
                    "order_1"
                };
                assert_eq!(owners, vec![Some(expected)], "x={x} w={w}");
                let n_cover = if expected == "order_2" { 2 } else { 1 };
                assert_eq!(plan.covering(x, 0., w).count(), n_cover, "x={x} w={w}");
            }
        }
    }

    #[test]
    fn units_checked_on_assembly() {
        let nm = ObservationConfig {
            wave_unit: crate::WaveUnit::Nanometer,
            ..config()
        };
        assert!(matches!(
            FovDecomposer::builder()
                .config(nm)
                .catalogue(catalogue())
                .detectors(DetectorGeometry::single((8., 120.), 1.).unwrap())
                .build(),
            Err(crate::TraceSimError::Fov(FovError::UnitMismatch { .. }))
        ));
        let microns = DetectorGeometry::with_unit(
            vec![DetectorRegion::new(1, (0., 0.), (8000., 120000.), 1000.)],
            crate::LengthUnit::Micron,
        )
        .unwrap();
        match FovDecomposer::builder()
            .config(config())
            .catalogue(catalogue())
            .detectors(microns)
            .try_build()
        {
            Err(FovError::UnitMismatch {
                found, expected, ..
            }) => {
                assert_eq!(found, "um");
                assert_eq!(expected, "mm");
            }
            other => panic!("expected a unit mismatch, found {other:?}"),
        }
    }
}
