//!
//! # Trace catalogue
//!
//! An ordered collection of named [`TraceModel`]s read from a TOML catalogue
//! made of a primary header, a table of contents and one data block per trace:
//!
//! ```toml
//! [primary]
//! author = "..."
//!
//! [[toc]]
//! description = "order_1"
//! extension_id = 2
//!
//! [[block]]
//! extension_id = 2
//! wave_unit = "um"
//! slit_unit = "arcsec"
//! x_unit = "mm"
//! y_unit = "mm"
//! samples = { wavelength = [...], slit = [...], x = [...], y = [...] }
//! ```
//!
//! A block holds either a `samples` table or a `coefficients` list with its
//! `wave_min`, `wave_max`, `slit_min` and `slit_max` domain.

use std::{
    fs::File,
    io::{Read, Write},
    path::{Path, PathBuf},
};

use crate::{
    config::ObservationConfig,
    trace::{TraceError, TraceModel},
    units::{AngleUnit, LengthUnit, WaveUnit},
    FromBuilder,
};

mod builder;
mod file;
pub use builder::TraceCatalogueBuilder;
pub use file::{CatalogueFile, DataBlock, PrimaryHeader, SampleColumns, TocEntry};

#[derive(Debug, thiserror::Error)]
pub enum CatalogueError {
    #[error("failed to open catalogue {1:?}")]
    Open(#[source] std::io::Error, PathBuf),
    #[error("failed to create catalogue {1:?}")]
    Create(#[source] std::io::Error, PathBuf),
    #[error("failed to read catalogue {1:?}")]
    Read(#[source] std::io::Error, PathBuf),
    #[error("failed to write catalogue {1:?}")]
    Write(#[source] std::io::Error, PathBuf),
    #[error("failed to parse the catalogue")]
    Load(#[from] toml::de::Error),
    #[error("failed to serialize the catalogue")]
    Save(#[from] toml::ser::Error),
    #[error("in catalogue {0:?}")]
    InFile(PathBuf, #[source] Box<CatalogueError>),
    #[error("malformed catalogue: trace {trace:?} references missing data block {extension_id}")]
    MissingBlock { trace: String, extension_id: usize },
    #[error("malformed catalogue: data block {extension_id}: {reason}")]
    Malformed { extension_id: usize, reason: String },
    #[error("malformed catalogue: data block {0} is defined more than once")]
    DuplicateBlock(usize),
    #[error("malformed catalogue: trace {0:?} is defined more than once")]
    DuplicateTrace(String),
    #[error("malformed catalogue: no trace")]
    Empty,
    #[error("unit mismatch in {location}, {column} column: found {found:?}, expected {expected:?}")]
    UnitMismatch {
        location: String,
        column: String,
        found: String,
        expected: String,
    },
    #[error("malformed catalogue: trace {trace:?}")]
    Trace {
        trace: String,
        #[source]
        source: TraceError,
    },
}
pub type Result<T> = std::result::Result<T, CatalogueError>;

/// Units every trace of a catalogue must be declared in
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ExpectedUnits {
    pub wave: WaveUnit,
    pub slit: AngleUnit,
    pub length: LengthUnit,
}
impl From<&ObservationConfig> for ExpectedUnits {
    fn from(config: &ObservationConfig) -> Self {
        Self {
            wave: config.wave_unit,
            ..Default::default()
        }
    }
}
impl ExpectedUnits {
    pub(crate) fn check(&self, trace: &TraceModel) -> Result<()> {
        let mismatch = |column: &str, found: String, expected: String| CatalogueError::UnitMismatch {
            location: format!("trace {:?}", trace.name()),
            column: column.to_owned(),
            found,
            expected,
        };
        if trace.wave_unit() != self.wave {
            return Err(mismatch("wavelength", trace.wave_unit().into(), self.wave.into()));
        }
        if trace.slit_unit() != self.slit {
            return Err(mismatch("slit", trace.slit_unit().into(), self.slit.into()));
        }
        if trace.length_unit() != self.length {
            return Err(mismatch("x/y", trace.length_unit().into(), self.length.into()));
        }
        Ok(())
    }
}

/// Ordered, read-only collection of traces
#[derive(Debug, Clone, PartialEq)]
pub struct TraceCatalogue {
    name: String,
    header: PrimaryHeader,
    units: ExpectedUnits,
    traces: Vec<TraceModel>,
}
impl FromBuilder for TraceCatalogue {
    type ComponentBuilder = TraceCatalogueBuilder;
}

impl TraceCatalogue {
    /// Loads a catalogue from a TOML file
    pub fn load<P: AsRef<Path>>(path: P, units: ExpectedUnits) -> Result<Self> {
        let in_file = |e| CatalogueError::InFile(path.as_ref().to_path_buf(), Box::new(e));
        let mut file =
            File::open(&path).map_err(|e| CatalogueError::Open(e, path.as_ref().to_path_buf()))?;
        let mut toml = String::new();
        file.read_to_string(&mut toml)
            .map_err(|e| CatalogueError::Read(e, path.as_ref().to_path_buf()))?;
        let name = path
            .as_ref()
            .file_stem()
            .map(|s| s.to_string_lossy().into_owned())
            .unwrap_or_default();
        let catalogue = Self::from_toml_str(&toml, units)
            .map(|c| Self { name, ..c })
            .map_err(in_file)?;
        log::info!(
            "loaded {} trace(s) from {:?}",
            catalogue.len(),
            path.as_ref()
        );
        Ok(catalogue)
    }
    /// Parses a catalogue from a TOML string
    pub fn from_toml_str(toml: &str, units: ExpectedUnits) -> Result<Self> {
        let file: CatalogueFile = toml::from_str(toml)?;
        let (header, traces) = file.into_traces(&units)?;
        TraceCatalogueBuilder::default()
            .header(header)
            .units(units)
            .traces(traces)
            .try_build()
    }
    /// Saves the catalogue into a TOML file
    pub fn save<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        let toml = toml::to_string_pretty(&self.to_file())?;
        let mut file = File::create(&path)
            .map_err(|e| CatalogueError::Create(e, path.as_ref().to_path_buf()))?;
        write!(file, "# ::tracesim::TraceCatalogue\n\n{}", toml)
            .map_err(|e| CatalogueError::Write(e, path.as_ref().to_path_buf()))?;
        Ok(())
    }
    pub fn to_file(&self) -> CatalogueFile {
        CatalogueFile::from_traces(self.header.clone(), &self.traces)
    }
    pub fn name(&self) -> &str {
        &self.name
    }
    pub fn header(&self) -> &PrimaryHeader {
        &self.header
    }
    pub fn units(&self) -> ExpectedUnits {
        self.units
    }
    pub fn len(&self) -> usize {
        self.traces.len()
    }
    pub fn is_empty(&self) -> bool {
        self.traces.is_empty()
    }
    /// Traces in catalogue order
    pub fn iter(&self) -> impl Iterator<Item = &TraceModel> {
        self.traces.iter()
    }
    pub fn get(&self, name: &str) -> Option<&TraceModel> {
        self.traces.iter().find(|t| t.name() == name)
    }
    /// Traces whose wavelength domain contains `wave`, by ascending
    /// `wave_min` then name
    pub fn traces_covering(&self, wave: f64) -> Vec<&TraceModel> {
        let mut covering: Vec<_> = self
            .traces
            .iter()
            .filter(|t| t.domain().contains_wave(wave))
            .collect();
        covering.sort_by(|a, b| {
            a.wave_min()
                .total_cmp(&b.wave_min())
                .then_with(|| a.name().cmp(b.name()))
        });
        covering
    }
    /// Union of the member wavelength ranges
    pub fn overall_domain(&self) -> (f64, f64) {
        self.traces.iter().fold(
            (f64::INFINITY, f64::NEG_INFINITY),
            |(lo, hi), t| (lo.min(t.wave_min()), hi.max(t.wave_max())),
        )
    }
    /// Union of the member slit ranges
    pub fn overall_slit_range(&self) -> (f64, f64) {
        self.traces.iter().fold(
            (f64::INFINITY, f64::NEG_INFINITY),
            |(lo, hi), t| (lo.min(t.slit_min()), hi.max(t.slit_max())),
        )
    }
}

impl<'a> IntoIterator for &'a TraceCatalogue {
    type Item = &'a TraceModel;
    type IntoIter = std::slice::Iter<'a, TraceModel>;
    fn into_iter(self) -> Self::IntoIter {
        self.traces.iter()
    }
}
