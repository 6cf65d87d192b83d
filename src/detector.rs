//!
//! # Detector array
//!
//! The focal plane detector array is read from a TOML table of detectors
//! with their declared units:
//!
//! ```toml
//! [units]
//! position = "mm"
//! size = "mm"
//! pixel_size = "mm"
//! angle = "deg"
//!
//! [[detector]]
//! id = 1
//! x_cen = 0.0
//! y_cen = 0.0
//! x_size = 16.0
//! y_size = 16.0
//! pixel_size = 1.0
//! angle = 0.0
//! gain = 1.0
//! ```

use serde::{Deserialize, Serialize};
use std::{
    collections::HashSet,
    fs::File,
    io::{Read, Write},
    path::{Path, PathBuf},
};

use crate::units::{AngleUnit, LengthUnit};

mod geometry;
mod image;
pub use geometry::DetectorRegion;
pub use image::{CountUnit, DetectorImage};

#[derive(Debug, thiserror::Error)]
pub enum DetectorError {
    #[error("failed to open detector list {1:?}")]
    Open(#[source] std::io::Error, PathBuf),
    #[error("failed to create detector list {1:?}")]
    Create(#[source] std::io::Error, PathBuf),
    #[error("failed to read detector list {1:?}")]
    Read(#[source] std::io::Error, PathBuf),
    #[error("failed to write detector list {1:?}")]
    Write(#[source] std::io::Error, PathBuf),
    #[error("failed to parse the detector list")]
    Load(#[from] toml::de::Error),
    #[error("failed to serialize the detector list")]
    Save(#[from] toml::ser::Error),
    #[error("detector list: {column} declared in {found:?}, expected {expected:?}")]
    UnitMismatch {
        column: String,
        found: String,
        expected: String,
    },
    #[error("detector {id}: {reason}")]
    Invalid { id: usize, reason: String },
    #[error("detector {0} is defined more than once")]
    Duplicate(usize),
    #[error("empty detector list")]
    Empty,
    #[error("detector {id}: expected {expected} pixels, found {found}")]
    ShapeMismatch {
        id: usize,
        expected: usize,
        found: usize,
    },
}
pub type Result<T> = std::result::Result<T, DetectorError>;

/// Units of the detector table columns
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct DetectorUnits {
    pub position: LengthUnit,
    pub size: LengthUnit,
    pub pixel_size: LengthUnit,
    pub angle: AngleUnit,
}
impl Default for DetectorUnits {
    fn default() -> Self {
        Self {
            position: LengthUnit::Millimeter,
            size: LengthUnit::Millimeter,
            pixel_size: LengthUnit::Millimeter,
            angle: AngleUnit::Degree,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
struct DetectorFile {
    #[serde(default)]
    units: DetectorUnits,
    #[serde(default)]
    detector: Vec<DetectorRegion>,
}

/// Focal plane detector array
///
/// Detector angles are kept in radians.
#[derive(Debug, Clone, PartialEq)]
pub struct DetectorGeometry {
    length_unit: LengthUnit,
    detectors: Vec<DetectorRegion>,
}

impl DetectorGeometry {
    /// Detector array in millimeters
    pub fn new(detectors: Vec<DetectorRegion>) -> Result<Self> {
        Self::with_unit(detectors, LengthUnit::Millimeter)
    }
    pub fn with_unit(detectors: Vec<DetectorRegion>, length_unit: LengthUnit) -> Result<Self> {
        if detectors.is_empty() {
            return Err(DetectorError::Empty);
        }
        let mut ids = HashSet::new();
        for det in &detectors {
            det.validate()?;
            if !ids.insert(det.id) {
                return Err(DetectorError::Duplicate(det.id));
            }
        }
        Ok(Self {
            length_unit,
            detectors,
        })
    }
    /// Single unrotated detector centred on the focal plane origin
    pub fn single(size: (f64, f64), pixel_size: f64) -> Result<Self> {
        Self::new(vec![DetectorRegion::new(1, (0., 0.), size, pixel_size)])
    }
    /// Loads the detector list from a TOML file, checking its units against
    /// the focal plane length unit
    pub fn load<P: AsRef<Path>>(path: P, length_unit: LengthUnit) -> Result<Self> {
        let mut file =
            File::open(&path).map_err(|e| DetectorError::Open(e, path.as_ref().to_path_buf()))?;
        let mut toml = String::new();
        file.read_to_string(&mut toml)
            .map_err(|e| DetectorError::Read(e, path.as_ref().to_path_buf()))?;
        let geometry = Self::from_toml_str(&toml, length_unit)?;
        log::info!(
            "loaded {} detector(s) from {:?}",
            geometry.len(),
            path.as_ref()
        );
        Ok(geometry)
    }
    pub fn from_toml_str(toml: &str, length_unit: LengthUnit) -> Result<Self> {
        let file: DetectorFile = toml::from_str(toml)?;
        let units = file.units;
        for (column, unit) in [
            ("position", units.position),
            ("size", units.size),
            ("pixel_size", units.pixel_size),
        ] {
            if unit != length_unit {
                return Err(DetectorError::UnitMismatch {
                    column: column.into(),
                    found: unit.into(),
                    expected: length_unit.into(),
                });
            }
        }
        let to_radians = |angle: f64| match units.angle {
            AngleUnit::Degree => angle.to_radians(),
            AngleUnit::Arcsec => (angle / 3600.).to_radians(),
        };
        let detectors = file
            .detector
            .into_iter()
            .map(|d| d.angle(to_radians(d.angle)))
            .collect();
        Self::with_unit(detectors, length_unit)
    }
    /// Saves the detector list into a TOML file, angles in degrees
    pub fn save<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        let file = DetectorFile {
            units: DetectorUnits {
                position: self.length_unit,
                size: self.length_unit,
                pixel_size: self.length_unit,
                angle: AngleUnit::Degree,
            },
            detector: self
                .detectors
                .iter()
                .map(|d| d.angle(d.angle.to_degrees()))
                .collect(),
        };
        let toml = toml::to_string_pretty(&file)?;
        let mut file = File::create(&path)
            .map_err(|e| DetectorError::Create(e, path.as_ref().to_path_buf()))?;
        write!(file, "# ::tracesim::DetectorGeometry\n\n{}", toml)
            .map_err(|e| DetectorError::Write(e, path.as_ref().to_path_buf()))?;
        Ok(())
    }
    pub fn length_unit(&self) -> LengthUnit {
        self.length_unit
    }
    pub fn len(&self) -> usize {
        self.detectors.len()
    }
    pub fn is_empty(&self) -> bool {
        self.detectors.is_empty()
    }
    pub fn iter(&self) -> impl Iterator<Item = &DetectorRegion> {
        self.detectors.iter()
    }
    pub fn get(&self, id: usize) -> Option<&DetectorRegion> {
        self.detectors.iter().find(|d| d.id == id)
    }
    /// Focal plane bounding box of the whole array
    pub fn footprint(&self) -> (f64, f64, f64, f64) {
        self.detectors.iter().map(DetectorRegion::footprint).fold(
            (
                f64::INFINITY,
                f64::NEG_INFINITY,
                f64::INFINITY,
                f64::NEG_INFINITY,
            ),
            |(a, b, c, d), (x0, x1, y0, y1)| (a.min(x0), b.max(x1), c.min(y0), d.max(y1)),
        )
    }
    /// One zeroed image per detector, in detector order
    pub fn blank_images(&self, unit: CountUnit) -> Vec<DetectorImage> {
        self.detectors
            .iter()
            .map(|d| DetectorImage::new(*d, unit))
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const ARRAY: &str = r#"
[units]
position = "mm"
size = "mm"
pixel_size = "mm"
angle = "deg"

[[detector]]
id = 1
x_cen = -10.0
y_cen = 0.0
x_size = 16.0
y_size = 16.0
pixel_size = 1.0
angle = 90.0
gain = 2.0

[[detector]]
id = 2
x_cen = 10.0
y_cen = 0.0
x_size = 16.0
y_size = 8.0
pixel_size = 0.5
"#;

    #[test]
    fn load_array() {
        let geometry = DetectorGeometry::from_toml_str(ARRAY, LengthUnit::Millimeter).unwrap();
        assert_eq!(geometry.len(), 2);
        let det = geometry.get(1).unwrap();
        assert!((det.angle - std::f64::consts::FRAC_PI_2).abs() < 1e-15);
        assert_eq!(det.gain, 2.);
        assert_eq!(geometry.get(2).unwrap().shape(), (32, 16));
        let (x0, x1, y0, y1) = geometry.footprint();
        assert!((x0 + 18.).abs() < 1e-12 && (x1 - 18.).abs() < 1e-12);
        assert!((y0 + 8.).abs() < 1e-12 && (y1 - 8.).abs() < 1e-12);
    }

    #[test]
    fn unit_mismatch() {
        let e = DetectorGeometry::from_toml_str(ARRAY, LengthUnit::Micron).unwrap_err();
        assert!(matches!(e, DetectorError::UnitMismatch { .. }));
    }

    #[test]
    fn duplicated_id() {
        let det = DetectorRegion::new(1, (0., 0.), (1., 1.), 0.1);
        assert!(matches!(
            DetectorGeometry::new(vec![det, det]),
            Err(DetectorError::Duplicate(1))
        ));
    }
}
