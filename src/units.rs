//! Physical unit tags
//!
//! Units are declared by catalogue blocks, detector layouts and the observation
//! configuration. They are compared, never converted: a block declared in `nm`
//! loaded into an observation running in `um` is an error.

use serde::{Deserialize, Serialize};
use std::{fmt, str::FromStr};

#[derive(Debug, thiserror::Error, PartialEq, Eq)]
#[error("unknown {kind} unit: {found:?}")]
pub struct UnitParseError {
    pub kind: &'static str,
    pub found: String,
}

/// Wavelength unit
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub enum WaveUnit {
    #[default]
    Micron,
    Nanometer,
    Angstrom,
}

/// Focal plane length unit
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub enum LengthUnit {
    #[default]
    Millimeter,
    Micron,
    Meter,
}

/// Sky angle unit
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub enum AngleUnit {
    #[default]
    Arcsec,
    Degree,
}

impl WaveUnit {
    pub fn symbol(&self) -> &'static str {
        match self {
            WaveUnit::Micron => "um",
            WaveUnit::Nanometer => "nm",
            WaveUnit::Angstrom => "Angstrom",
        }
    }
}
impl LengthUnit {
    pub fn symbol(&self) -> &'static str {
        match self {
            LengthUnit::Millimeter => "mm",
            LengthUnit::Micron => "um",
            LengthUnit::Meter => "m",
        }
    }
}
impl AngleUnit {
    pub fn symbol(&self) -> &'static str {
        match self {
            AngleUnit::Arcsec => "arcsec",
            AngleUnit::Degree => "deg",
        }
    }
}

impl FromStr for WaveUnit {
    type Err = UnitParseError;
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim() {
            "um" | "micron" | "µm" => Ok(WaveUnit::Micron),
            "nm" => Ok(WaveUnit::Nanometer),
            "Angstrom" | "angstrom" | "AA" => Ok(WaveUnit::Angstrom),
            _ => Err(UnitParseError {
                kind: "wavelength",
                found: s.to_owned(),
            }),
        }
    }
}
impl FromStr for LengthUnit {
    type Err = UnitParseError;
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim() {
            "mm" => Ok(LengthUnit::Millimeter),
            "um" | "micron" | "µm" => Ok(LengthUnit::Micron),
            "m" => Ok(LengthUnit::Meter),
            _ => Err(UnitParseError {
                kind: "length",
                found: s.to_owned(),
            }),
        }
    }
}
impl FromStr for AngleUnit {
    type Err = UnitParseError;
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim() {
            "arcsec" => Ok(AngleUnit::Arcsec),
            "deg" | "degree" => Ok(AngleUnit::Degree),
            _ => Err(UnitParseError {
                kind: "angle",
                found: s.to_owned(),
            }),
        }
    }
}

macro_rules! string_conversions {
    ($($unit:ty),*) => {
        $(
            impl TryFrom<String> for $unit {
                type Error = UnitParseError;
                fn try_from(value: String) -> Result<Self, Self::Error> {
                    value.parse()
                }
            }
            impl From<$unit> for String {
                fn from(value: $unit) -> Self {
                    value.symbol().to_owned()
                }
            }
            impl fmt::Display for $unit {
                fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                    f.write_str(self.symbol())
                }
            }
        )*
    };
}
string_conversions!(WaveUnit, LengthUnit, AngleUnit);
