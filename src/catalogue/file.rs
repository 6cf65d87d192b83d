use serde::{Deserialize, Serialize};
use std::collections::{HashMap, HashSet};

use crate::{
    trace::{Coefficient, TraceData, TraceDomain, TraceKind, TraceModel, TraceModelBuilder},
    units::{AngleUnit, LengthUnit, WaveUnit},
};

use super::{CatalogueError, ExpectedUnits, Result};

/// Provenance metadata of a catalogue
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PrimaryHeader {
    pub author: String,
    pub source: String,
    pub description: String,
    pub date_created: String,
    pub date_modified: String,
    pub status: String,
}

/// Table-of-contents row
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TocEntry {
    /// Trace name
    pub description: String,
    pub extension_id: usize,
    #[serde(default)]
    pub aperture_id: usize,
    #[serde(default)]
    pub image_plane_id: usize,
}

/// Sample table columns, one row per (wavelength, slit position) node
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SampleColumns {
    pub wavelength: Vec<f64>,
    pub slit: Vec<f64>,
    pub x: Vec<f64>,
    pub y: Vec<f64>,
}

/// Per-trace data block
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DataBlock {
    pub extension_id: usize,
    pub wave_unit: WaveUnit,
    pub slit_unit: AngleUnit,
    pub x_unit: LengthUnit,
    pub y_unit: LengthUnit,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub wave_min: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub wave_max: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub slit_min: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub slit_max: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub samples: Option<SampleColumns>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub coefficients: Option<Vec<Coefficient>>,
}

/// On-disk catalogue: primary header, table of contents and data blocks
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CatalogueFile {
    #[serde(default)]
    pub primary: PrimaryHeader,
    #[serde(default)]
    pub toc: Vec<TocEntry>,
    #[serde(default)]
    pub block: Vec<DataBlock>,
}

impl DataBlock {
    fn malformed<S: Into<String>>(&self, reason: S) -> CatalogueError {
        CatalogueError::Malformed {
            extension_id: self.extension_id,
            reason: reason.into(),
        }
    }
    fn check_units(&self, units: &ExpectedUnits) -> Result<()> {
        let location = format!("block {}", self.extension_id);
        let mismatch = |column: &str, found: String, expected: String| {
            Err(CatalogueError::UnitMismatch {
                location: location.clone(),
                column: column.to_owned(),
                found,
                expected,
            })
        };
        if self.wave_unit != units.wave {
            return mismatch("wavelength", self.wave_unit.into(), units.wave.into());
        }
        if self.slit_unit != units.slit {
            return mismatch("slit", self.slit_unit.into(), units.slit.into());
        }
        if self.x_unit != units.length {
            return mismatch("x", self.x_unit.into(), units.length.into());
        }
        if self.y_unit != units.length {
            return mismatch("y", self.y_unit.into(), units.length.into());
        }
        Ok(())
    }
    fn trace_data(&self) -> Result<TraceData> {
        match (&self.samples, &self.coefficients) {
            (Some(_), Some(_)) => Err(self.malformed("both a sample and a coefficient table")),
            (None, None) => Err(self.malformed("neither a sample nor a coefficient table")),
            (Some(s), None) => {
                let n = s.wavelength.len();
                if s.slit.len() != n || s.x.len() != n || s.y.len() != n {
                    return Err(self.malformed(format!(
                        "ragged sample columns: wavelength {}, slit {}, x {}, y {}",
                        n,
                        s.slit.len(),
                        s.x.len(),
                        s.y.len()
                    )));
                }
                Ok(TraceData::Samples {
                    wave: s.wavelength.clone(),
                    slit: s.slit.clone(),
                    x: s.x.clone(),
                    y: s.y.clone(),
                })
            }
            (None, Some(c)) => {
                let (Some(wave_min), Some(wave_max)) = (self.wave_min, self.wave_max) else {
                    return Err(self.malformed("coefficient table without a wavelength range"));
                };
                Ok(TraceData::Coefficients {
                    coefficients: c.clone(),
                    domain: TraceDomain {
                        wave_min,
                        wave_max,
                        slit_min: self.slit_min.unwrap_or(0.),
                        slit_max: self.slit_max.unwrap_or(0.),
                    },
                })
            }
        }
    }
    fn from_trace(extension_id: usize, trace: &TraceModel) -> Self {
        let (samples, coefficients, domain) = match trace.kind() {
            TraceKind::Table(grid) => {
                let mut cols = SampleColumns {
                    wavelength: vec![],
                    slit: vec![],
                    x: vec![],
                    y: vec![],
                };
                for (s, w, x, y) in grid.nodes() {
                    cols.wavelength.push(w);
                    cols.slit.push(s);
                    cols.x.push(x);
                    cols.y.push(y);
                }
                (Some(cols), None, None)
            }
            TraceKind::Polynomial(map) => (
                None,
                Some(map.coefficients().copied().collect()),
                Some(*trace.domain()),
            ),
        };
        Self {
            extension_id,
            wave_unit: trace.wave_unit(),
            slit_unit: trace.slit_unit(),
            x_unit: trace.length_unit(),
            y_unit: trace.length_unit(),
            wave_min: domain.map(|d| d.wave_min),
            wave_max: domain.map(|d| d.wave_max),
            slit_min: domain.map(|d| d.slit_min),
            slit_max: domain.map(|d| d.slit_max),
            samples,
            coefficients,
        }
    }
}

impl CatalogueFile {
    /// Checks the file structure and builds the traces in table-of-contents order
    pub fn into_traces(self, units: &ExpectedUnits) -> Result<(PrimaryHeader, Vec<TraceModel>)> {
        let mut blocks: HashMap<usize, &DataBlock> = HashMap::new();
        for block in &self.block {
            if blocks.insert(block.extension_id, block).is_some() {
                return Err(CatalogueError::DuplicateBlock(block.extension_id));
            }
        }
        let mut names = HashSet::new();
        let mut traces = Vec::with_capacity(self.toc.len());
        for entry in &self.toc {
            if !names.insert(entry.description.as_str()) {
                return Err(CatalogueError::DuplicateTrace(entry.description.clone()));
            }
            let block =
                blocks
                    .get(&entry.extension_id)
                    .ok_or_else(|| CatalogueError::MissingBlock {
                        trace: entry.description.clone(),
                        extension_id: entry.extension_id,
                    })?;
            block.check_units(units)?;
            let trace = TraceModelBuilder::default()
                .name(entry.description.as_str())
                .data(block.trace_data()?)
                .units(block.wave_unit, block.slit_unit, block.x_unit)
                .aperture_id(entry.aperture_id)
                .image_plane_id(entry.image_plane_id)
                .try_build()
                .map_err(|source| CatalogueError::Trace {
                    trace: entry.description.clone(),
                    source,
                })?;
            traces.push(trace);
        }
        if let Some(orphan) = self
            .block
            .iter()
            .find(|b| self.toc.iter().all(|e| e.extension_id != b.extension_id))
        {
            log::warn!(
                "data block {} is not referenced by the table of contents",
                orphan.extension_id
            );
        }
        Ok((self.primary, traces))
    }
    /// File layout of `traces`, data blocks numbered from 2
    pub fn from_traces(primary: PrimaryHeader, traces: &[TraceModel]) -> Self {
        let (toc, block) = traces
            .iter()
            .enumerate()
            .map(|(i, trace)| {
                let extension_id = i + 2;
                (
                    TocEntry {
                        description: trace.name().to_owned(),
                        extension_id,
                        aperture_id: trace.aperture_id(),
                        image_plane_id: trace.image_plane_id(),
                    },
                    DataBlock::from_trace(extension_id, trace),
                )
            })
            .unzip();
        Self {
            primary,
            toc,
            block,
        }
    }
}
