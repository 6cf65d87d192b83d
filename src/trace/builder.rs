use crate::{
    units::{AngleUnit, LengthUnit, WaveUnit},
    Builder,
};

use super::{
    Coefficient, PolynomialMap, SampleGrid, TraceDomain, TraceError, TraceKind, TraceModel,
    TraceResult,
};

// inverse seed grid of polynomial traces
const N_WAVE_NODE: usize = 33;
const N_SLIT_NODE: usize = 9;

/// Data a trace is built from
#[derive(Debug, Clone, PartialEq)]
pub enum TraceData {
    /// Long table of (wavelength, slit, x, y) samples
    Samples {
        wave: Vec<f64>,
        slit: Vec<f64>,
        x: Vec<f64>,
        y: Vec<f64>,
    },
    /// Polynomial coefficients with their validity domain
    Coefficients {
        coefficients: Vec<Coefficient>,
        domain: TraceDomain,
    },
}

/// [`TraceModel`] builder
///
/// Default properties:
///  * name           : "trace"
///  * units          : um, arcsec, mm
///  * aperture id    : 0
///  * image plane id : 0
///
/// Either [samples](TraceModelBuilder::samples) or
/// [coefficients](TraceModelBuilder::coefficients) must be given.
#[derive(Debug, Clone, PartialEq)]
pub struct TraceModelBuilder {
    name: String,
    data: Option<TraceData>,
    wave_unit: WaveUnit,
    slit_unit: AngleUnit,
    length_unit: LengthUnit,
    aperture_id: usize,
    image_plane_id: usize,
}
impl Default for TraceModelBuilder {
    fn default() -> Self {
        Self {
            name: "trace".into(),
            data: None,
            wave_unit: Default::default(),
            slit_unit: Default::default(),
            length_unit: Default::default(),
            aperture_id: 0,
            image_plane_id: 0,
        }
    }
}
impl TraceModelBuilder {
    pub fn name<S: Into<String>>(self, name: S) -> Self {
        Self {
            name: name.into(),
            ..self
        }
    }
    /// Sets the sample table, one row per (wavelength, slit position) node
    pub fn samples(self, wave: Vec<f64>, slit: Vec<f64>, x: Vec<f64>, y: Vec<f64>) -> Self {
        Self {
            data: Some(TraceData::Samples { wave, slit, x, y }),
            ..self
        }
    }
    /// Sets the polynomial coefficients and the validity domain
    pub fn coefficients(self, coefficients: Vec<Coefficient>, domain: TraceDomain) -> Self {
        Self {
            data: Some(TraceData::Coefficients {
                coefficients,
                domain,
            }),
            ..self
        }
    }
    pub fn data(self, data: TraceData) -> Self {
        Self {
            data: Some(data),
            ..self
        }
    }
    pub fn units(self, wave_unit: WaveUnit, slit_unit: AngleUnit, length_unit: LengthUnit) -> Self {
        Self {
            wave_unit,
            slit_unit,
            length_unit,
            ..self
        }
    }
    pub fn aperture_id(self, aperture_id: usize) -> Self {
        Self {
            aperture_id,
            ..self
        }
    }
    pub fn image_plane_id(self, image_plane_id: usize) -> Self {
        Self {
            image_plane_id,
            ..self
        }
    }
}

fn linspace(lo: f64, hi: f64, n: usize) -> impl Iterator<Item = f64> {
    let step = if n > 1 { (hi - lo) / (n - 1) as f64 } else { 0. };
    (0..n).map(move |i| if i + 1 == n { hi } else { lo + i as f64 * step })
}

impl Builder for TraceModelBuilder {
    type Component = TraceModel;

    fn build(self) -> crate::Result<Self::Component> {
        Ok(self.try_build()?)
    }
}

impl TraceModelBuilder {
    pub(crate) fn try_build(self) -> TraceResult<TraceModel> {
        let data = self.data.ok_or_else(|| TraceError::NoData(self.name.clone()))?;
        let (domain, kind, nodes) = match data {
            TraceData::Samples { wave, slit, x, y } => {
                let grid = SampleGrid::from_samples(&wave, &slit, &x, &y)?;
                let (wave_min, wave_max) = grid.wave_bounds();
                let (slit_min, slit_max) = grid.slit_bounds();
                let domain = TraceDomain::new(wave_min, wave_max, slit_min, slit_max)?;
                let nodes = grid.nodes().map(|(s, w, x, y)| [s, w, x, y]).collect();
                (domain, TraceKind::Table(grid), nodes)
            }
            TraceData::Coefficients {
                coefficients,
                domain,
            } => {
                let domain = TraceDomain::new(
                    domain.wave_min,
                    domain.wave_max,
                    domain.slit_min,
                    domain.slit_max,
                )?;
                let map = PolynomialMap::new(&coefficients)?;
                let n_slit = if domain.slit_width() > 0. {
                    N_SLIT_NODE
                } else {
                    1
                };
                let nodes = linspace(domain.wave_min, domain.wave_max, N_WAVE_NODE)
                    .flat_map(|w| {
                        linspace(domain.slit_min, domain.slit_max, n_slit).map(move |s| (s, w))
                    })
                    .map(|(s, w)| {
                        let (x, y) = map.eval(s, w);
                        [s, w, x, y]
                    })
                    .collect::<Vec<_>>();
                if nodes.iter().flatten().any(|v| !v.is_finite()) {
                    return Err(TraceError::Polynomial(format!(
                        "trace {:?} is not finite over its domain",
                        self.name
                    )));
                }
                (domain, TraceKind::Polynomial(map), nodes)
            }
        };
        log::debug!(
            "trace {:?}: wave [{}, {}]{}, slit [{}, {}]{}",
            self.name,
            domain.wave_min,
            domain.wave_max,
            self.wave_unit,
            domain.slit_min,
            domain.slit_max,
            self.slit_unit
        );
        Ok(TraceModel {
            name: self.name,
            domain,
            kind,
            aperture_id: self.aperture_id,
            image_plane_id: self.image_plane_id,
            wave_unit: self.wave_unit,
            slit_unit: self.slit_unit,
            length_unit: self.length_unit,
            nodes,
        })
    }
}
