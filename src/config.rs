//! # Observation configuration
//!
//! [`ObservationConfig`] gathers the already resolved scalar settings of an
//! observation: wavelength range and sampling, pixel and plate scales,
//! collecting area, exposure time, instrument mode and the tiling and edge
//! handling policies. A configuration is an immutable value: overrides return
//! a new configuration.
//!
//! ```
//! use tracesim::ObservationConfig;
//! let cfg = ObservationConfig::default()
//!     .with_property("!SIM.spectral.wave_min", 1.8)
//!     .and_then(|cfg| cfg.with_property("!SIM.spectral.wave_max", 2.4))
//!     .unwrap();
//! assert_eq!(cfg.wave_max, 2.4);
//! ```

use serde::{Deserialize, Serialize};
use std::{
    fs::File,
    io::{Read, Write},
    path::{Path, PathBuf},
};

use crate::units::WaveUnit;

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("cannot open observation configuration file: {1}")]
    Open(#[source] std::io::Error, PathBuf),
    #[error("cannot create observation configuration file: {1}")]
    Create(#[source] std::io::Error, PathBuf),
    #[error("cannot read observation configuration file: {1}")]
    Read(#[source] std::io::Error, PathBuf),
    #[error("cannot write observation configuration file: {1}")]
    Write(#[source] std::io::Error, PathBuf),
    #[error("cannot deserialize observation configuration from toml")]
    Load(#[from] toml::de::Error),
    #[error("cannot serialize observation configuration into toml")]
    Save(#[from] toml::ser::Error),
    #[error("unknown configuration key {0:?}")]
    UnknownKey(String),
    #[error("invalid value {value} for configuration key {key:?}")]
    InvalidValue { key: String, value: String },
    #[error("inconsistent configuration: {0}")]
    Invalid(String),
}
pub type Result<T> = std::result::Result<T, ConfigError>;

/// Instrument mode selector
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum InstrumentMode {
    /// Achromatic sky to focal plane mapping through the plate scale
    Imaging,
    /// Slit spectroscopy through a trace catalogue
    #[default]
    Spectroscopy,
}

/// Field-of-view tiling limits
///
/// Default properties:
///  * drift tolerance : 1 pixel
///  * max tile pixels : 1048576
///  * max tiles       : 100000
///  * slit probes     : 17
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TilingConfig {
    /// Largest focal plane shift, in detector pixels, allowed across the wavelength width of a tile
    pub drift_tolerance: f64,
    /// Largest detector footprint of a tile, in pixels
    pub max_tile_pixels: usize,
    /// Tile count ceiling of a decomposition
    pub max_tiles: usize,
    /// Number of slit positions probed when measuring drift and footprints
    pub slit_probes: usize,
}
impl Default for TilingConfig {
    fn default() -> Self {
        Self {
            drift_tolerance: 1.,
            max_tile_pixels: 1 << 20,
            max_tiles: 100_000,
            slit_probes: 17,
        }
    }
}

/// Action on samples slightly outside a trace domain
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NearEdge {
    /// Move the sample onto the domain edge
    #[default]
    Clamp,
    /// Drop the sample
    Drop,
}

/// Action on samples beyond the tolerance band
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FarEdge {
    /// Drop the sample
    Drop,
    /// Reject the whole tile
    #[default]
    RejectTile,
}

/// Trace domain violation policy of the flux projector
///
/// `band` is the tolerance band width as a fraction of the domain width on
/// each axis.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EdgePolicy {
    pub band: f64,
    pub near: NearEdge,
    pub far: FarEdge,
}
impl Default for EdgePolicy {
    fn default() -> Self {
        Self {
            band: 0.01,
            near: NearEdge::Clamp,
            far: FarEdge::RejectTile,
        }
    }
}

/// Scalar configuration value
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum PropertyValue {
    Number(f64),
    Text(String),
}
impl From<f64> for PropertyValue {
    fn from(value: f64) -> Self {
        PropertyValue::Number(value)
    }
}
impl From<&str> for PropertyValue {
    fn from(value: &str) -> Self {
        PropertyValue::Text(value.to_owned())
    }
}
impl std::fmt::Display for PropertyValue {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            PropertyValue::Number(x) => write!(f, "{x}"),
            PropertyValue::Text(s) => write!(f, "{s:?}"),
        }
    }
}

/// Observation configuration
///
/// Default properties:
///  * wavelength range    : [0.8, 2.5]um
///  * spectral sampling   : 0.001um
///  * pixel scale         : 0.004arcsec/px
///  * plate scale         : 0.266666667arcsec/mm
///  * spatial sampling    : pixel scale
///  * collecting area     : 1m²
///  * exposure            : 1s
///  * slit width          : 0.05arcsec
///  * mode                : spectroscopy
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ObservationConfig {
    pub wave_min: f64,
    pub wave_max: f64,
    pub wave_unit: WaveUnit,
    /// Wavelength sampling step
    pub spectral_sampling: f64,
    /// Detector pixel scale in arcsec/pixel
    pub pixel_scale: f64,
    /// Focal plane plate scale in arcsec/mm
    pub plate_scale: f64,
    /// Sky sampling step of extended components in arcsec
    pub spatial_sampling: Option<f64>,
    /// Collecting area in m²
    pub area: f64,
    /// Exposure time in seconds
    pub exposure: f64,
    /// Slit width in arcsec, centred on y=0
    pub slit_width: f64,
    pub mode: InstrumentMode,
    pub tiling: TilingConfig,
    pub edge: EdgePolicy,
}
impl Default for ObservationConfig {
    fn default() -> Self {
        Self {
            wave_min: 0.8,
            wave_max: 2.5,
            wave_unit: WaveUnit::Micron,
            spectral_sampling: 1e-3,
            pixel_scale: 0.004,
            plate_scale: 0.266666667,
            spatial_sampling: None,
            area: 1.,
            exposure: 1.,
            slit_width: 0.05,
            mode: InstrumentMode::Spectroscopy,
            tiling: Default::default(),
            edge: Default::default(),
        }
    }
}

impl ObservationConfig {
    /// Loads the configuration from a toml file
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let mut file =
            File::open(&path).map_err(|e| ConfigError::Open(e, path.as_ref().to_path_buf()))?;
        let mut toml = String::new();
        file.read_to_string(&mut toml)
            .map_err(|e| ConfigError::Read(e, path.as_ref().to_path_buf()))?;
        Self::from_toml_str(&toml)
    }
    /// Saves the configuration into a toml file
    pub fn save<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        let toml = toml::to_string_pretty(self)?;
        let mut file = File::create(&path)
            .map_err(|e| ConfigError::Create(e, path.as_ref().to_path_buf()))?;
        write!(file, "# ::tracesim::ObservationConfig\n\n{}", toml)
            .map_err(|e| ConfigError::Write(e, path.as_ref().to_path_buf()))?;
        Ok(())
    }
    pub fn from_toml_str(toml: &str) -> Result<Self> {
        let cfg: ObservationConfig = toml::from_str(toml)?;
        cfg.validate()?;
        Ok(cfg)
    }
    /// Builds a configuration from flat key-value pairs applied over the defaults
    pub fn from_properties<'a, I>(properties: I) -> Result<Self>
    where
        I: IntoIterator<Item = (&'a str, PropertyValue)>,
    {
        properties
            .into_iter()
            .try_fold(Self::default(), |cfg, (key, value)| cfg.with_property(key, value))
    }
    /// Returns a new configuration with `key` set to `value`
    ///
    /// Keys are matched on their last dotted component, so `!SIM.spectral.wave_min`
    /// and `wave_min` are the same key.
    pub fn with_property<V: Into<PropertyValue>>(&self, key: &str, value: V) -> Result<Self> {
        let value = value.into();
        let name = key.trim_start_matches('!').rsplit('.').next().unwrap_or(key);
        let invalid = || ConfigError::InvalidValue {
            key: key.to_owned(),
            value: value.to_string(),
        };
        let number = || match &value {
            PropertyValue::Number(x) if x.is_finite() => Ok(*x),
            PropertyValue::Text(s) => s.trim().parse::<f64>().map_err(|_| invalid()),
            _ => Err(invalid()),
        };
        let count = || {
            number().and_then(|x| {
                if x >= 0. && x.fract() == 0. {
                    Ok(x as usize)
                } else {
                    Err(invalid())
                }
            })
        };
        let mut cfg = self.clone();
        match name {
            "wave_min" => cfg.wave_min = number()?,
            "wave_max" => cfg.wave_max = number()?,
            "wave_unit" => match &value {
                PropertyValue::Text(s) => cfg.wave_unit = s.parse().map_err(|_| invalid())?,
                _ => return Err(invalid()),
            },
            "spectral_sampling" | "spectral_resolution" => cfg.spectral_sampling = number()?,
            "pixel_scale" => cfg.pixel_scale = number()?,
            "plate_scale" => cfg.plate_scale = number()?,
            "spatial_sampling" => cfg.spatial_sampling = Some(number()?),
            "area" => cfg.area = number()?,
            "exposure" | "dit" => cfg.exposure = number()?,
            "slit_width" => cfg.slit_width = number()?,
            "mode" => {
                cfg.mode = match &value {
                    PropertyValue::Text(s) if s.eq_ignore_ascii_case("imaging") => {
                        InstrumentMode::Imaging
                    }
                    PropertyValue::Text(s) if s.eq_ignore_ascii_case("spectroscopy") => {
                        InstrumentMode::Spectroscopy
                    }
                    _ => return Err(invalid()),
                }
            }
            "drift_tolerance" => cfg.tiling.drift_tolerance = number()?,
            "max_tile_pixels" => cfg.tiling.max_tile_pixels = count()?,
            "max_tiles" => cfg.tiling.max_tiles = count()?,
            "slit_probes" => cfg.tiling.slit_probes = count()?,
            "edge_band" => cfg.edge.band = number()?,
            _ => return Err(ConfigError::UnknownKey(key.to_owned())),
        }
        Ok(cfg)
    }
    /// Sky sampling step of extended components
    pub fn spatial_step(&self) -> f64 {
        self.spatial_sampling.unwrap_or(self.pixel_scale)
    }
    /// Checks the configuration is self-consistent
    pub fn validate(&self) -> Result<()> {
        let positive = [
            ("spectral_sampling", self.spectral_sampling),
            ("pixel_scale", self.pixel_scale),
            ("plate_scale", self.plate_scale),
            ("spatial_sampling", self.spatial_step()),
            ("area", self.area),
            ("exposure", self.exposure),
            ("drift_tolerance", self.tiling.drift_tolerance),
        ];
        if let Some((key, _)) = positive.iter().find(|(_, v)| !(v.is_finite() && *v > 0.)) {
            return Err(ConfigError::Invalid(format!("{key} must be strictly positive")));
        }
        if !(self.wave_min.is_finite() && self.wave_max.is_finite())
            || self.wave_min > self.wave_max
        {
            return Err(ConfigError::Invalid(format!(
                "wavelength range [{}, {}] is empty",
                self.wave_min, self.wave_max
            )));
        }
        if !(self.slit_width >= 0.) {
            return Err(ConfigError::Invalid("slit_width must be positive".into()));
        }
        if self.tiling.max_tiles == 0 || self.tiling.max_tile_pixels == 0 {
            return Err(ConfigError::Invalid(
                "tile count and tile size ceilings must be non-zero".into(),
            ));
        }
        if self.tiling.slit_probes < 2 {
            return Err(ConfigError::Invalid("at least 2 slit probes are needed".into()));
        }
        if !(self.edge.band >= 0.) {
            return Err(ConfigError::Invalid("edge band must be positive".into()));
        }
        Ok(())
    }
}
