//! # Sky source field
//!
//! A [`SourceField`] is a list of point-like and extended components, each
//! referencing one of the field spectra by index. Positions are sky offsets
//! in arcsec from the field centre.
//!
//! ```
//! use tracesim::{SourceField, Spectrum};
//! let mut src = SourceField::new();
//! let flat = src.add_spectrum(Spectrum::Flat { photon_flux: 100. });
//! src.point(0.5, 0., flat, 1.).unwrap();
//! assert_eq!(src.len(), 1);
//! ```

use serde::{Deserialize, Serialize};

use crate::spectrum::{Spectrum, SpectrumError};

#[derive(Debug, thiserror::Error, PartialEq)]
pub enum SourceError {
    #[error("component refers to spectrum #{0} but the field holds {1} spectra")]
    UnknownSpectrum(usize, usize),
    #[error("invalid source spectrum")]
    Spectrum(#[from] SpectrumError),
    #[error("component position or weight is not finite")]
    NonFinite,
}
pub type Result<T> = std::result::Result<T, SourceError>;

/// Half-width of the all-sky box in arcsec
pub const ALL_SKY: f64 = 648_000.;

/// Axis aligned sky box in arcsec, bounds inclusive
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct SkyBox {
    pub x_min: f64,
    pub x_max: f64,
    pub y_min: f64,
    pub y_max: f64,
}
impl SkyBox {
    pub fn new(x_min: f64, x_max: f64, y_min: f64, y_max: f64) -> Self {
        Self {
            x_min,
            x_max,
            y_min,
            y_max,
        }
    }
    pub fn point(x: f64, y: f64) -> Self {
        Self::new(x, x, y, y)
    }
    pub fn all_sky() -> Self {
        Self::new(-ALL_SKY, ALL_SKY, -ALL_SKY, ALL_SKY)
    }
    pub fn width(&self) -> f64 {
        self.x_max - self.x_min
    }
    pub fn height(&self) -> f64 {
        self.y_max - self.y_min
    }
    pub fn area(&self) -> f64 {
        self.width() * self.height()
    }
    pub fn contains(&self, x: f64, y: f64) -> bool {
        x >= self.x_min && x <= self.x_max && y >= self.y_min && y <= self.y_max
    }
    /// Overlap of two boxes, `None` when disjoint
    pub fn intersect(&self, other: &SkyBox) -> Option<SkyBox> {
        let b = SkyBox::new(
            self.x_min.max(other.x_min),
            self.x_max.min(other.x_max),
            self.y_min.max(other.y_min),
            self.y_max.min(other.y_max),
        );
        (b.x_min <= b.x_max && b.y_min <= b.y_max).then_some(b)
    }
    pub fn union(&self, other: &SkyBox) -> SkyBox {
        SkyBox::new(
            self.x_min.min(other.x_min),
            self.x_max.max(other.x_max),
            self.y_min.min(other.y_min),
            self.y_max.max(other.y_max),
        )
    }
}

/// Source component
///
/// `weight` scales the referenced spectrum: a flux weight for points and a
/// surface brightness weight (per arcsec²) for extended components.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum FieldComponent {
    Point {
        x: f64,
        y: f64,
        spectrum: usize,
        weight: f64,
    },
    Extended {
        extent: SkyBox,
        spectrum: usize,
        weight: f64,
    },
}
impl FieldComponent {
    pub fn spectrum(&self) -> usize {
        match self {
            FieldComponent::Point { spectrum, .. } | FieldComponent::Extended { spectrum, .. } => {
                *spectrum
            }
        }
    }
    pub fn weight(&self) -> f64 {
        match self {
            FieldComponent::Point { weight, .. } | FieldComponent::Extended { weight, .. } => {
                *weight
            }
        }
    }
    pub fn extent(&self) -> SkyBox {
        match self {
            FieldComponent::Point { x, y, .. } => SkyBox::point(*x, *y),
            FieldComponent::Extended { extent, .. } => *extent,
        }
    }
}

/// Collection of source components and their spectra
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SourceField {
    spectra: Vec<Spectrum>,
    components: Vec<FieldComponent>,
}
impl SourceField {
    pub fn new() -> Self {
        Default::default()
    }
    /// Adds a spectrum and returns its reference
    pub fn add_spectrum(&mut self, spectrum: Spectrum) -> usize {
        self.spectra.push(spectrum);
        self.spectra.len() - 1
    }
    /// Adds a point source at (`x`,`y`) arcsec
    pub fn point(&mut self, x: f64, y: f64, spectrum: usize, weight: f64) -> Result<&mut Self> {
        if !(x.is_finite() && y.is_finite() && weight.is_finite()) {
            return Err(SourceError::NonFinite);
        }
        self.push(FieldComponent::Point {
            x,
            y,
            spectrum,
            weight,
        })
    }
    /// Adds a uniform surface brightness component over `extent`
    pub fn extended(&mut self, extent: SkyBox, spectrum: usize, weight: f64) -> Result<&mut Self> {
        if !weight.is_finite() {
            return Err(SourceError::NonFinite);
        }
        self.push(FieldComponent::Extended {
            extent,
            spectrum,
            weight,
        })
    }
    /// Uniform background over the whole sky
    pub fn uniform_sky(spectrum: Spectrum, weight: f64) -> Result<Self> {
        let mut src = Self::new();
        let s = src.add_spectrum(spectrum);
        src.extended(SkyBox::all_sky(), s, weight)?;
        Ok(src)
    }
    fn push(&mut self, component: FieldComponent) -> Result<&mut Self> {
        let s = component.spectrum();
        let spectrum = self
            .spectra
            .get(s)
            .ok_or(SourceError::UnknownSpectrum(s, self.spectra.len()))?;
        spectrum.validate()?;
        self.components.push(component);
        Ok(self)
    }
    pub fn len(&self) -> usize {
        self.components.len()
    }
    pub fn is_empty(&self) -> bool {
        self.components.is_empty()
    }
    pub fn spectrum(&self, idx: usize) -> Option<&Spectrum> {
        self.spectra.get(idx)
    }
    /// Iterates the components together with their spectrum
    pub fn iter(&self) -> impl Iterator<Item = (&FieldComponent, &Spectrum)> {
        self.components
            .iter()
            .filter_map(|c| self.spectra.get(c.spectrum()).map(|s| (c, s)))
    }
    /// Angular extent of all components
    pub fn bounding_box(&self) -> Option<SkyBox> {
        self.components
            .iter()
            .map(FieldComponent::extent)
            .reduce(|a, b| a.union(&b))
    }
    /// Union of the component spectra support, `None` if any is unbounded
    /// or the field is empty
    pub fn wave_support(&self) -> Option<(f64, f64)> {
        self.iter()
            .map(|(_, s)| s.wave_range())
            .try_fold(None, |acc: Option<(f64, f64)>, r| {
                r.map(|(a, b)| Some(acc.map_or((a, b), |(lo, hi)| (lo.min(a), hi.max(b)))))
            })
            .flatten()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unknown_spectrum_is_rejected() {
        let mut src = SourceField::new();
        assert_eq!(
            src.point(0., 0., 0, 1.).err(),
            Some(SourceError::UnknownSpectrum(0, 0))
        );
    }

    #[test]
    fn bounding_box_and_support() {
        let mut src = SourceField::new();
        let a = src.add_spectrum(Spectrum::Line {
            wave: 1.5,
            flux: 1.,
        });
        let b = src.add_spectrum(Spectrum::tabulated(vec![1., 2.], vec![1., 1.]).unwrap());
        src.point(-1., 2., a, 1.).unwrap();
        src.extended(SkyBox::new(0., 3., -1., 1.), b, 1.).unwrap();
        assert_eq!(src.bounding_box(), Some(SkyBox::new(-1., 3., -1., 2.)));
        assert_eq!(src.wave_support(), Some((1., 2.)));
        let c = src.add_spectrum(Spectrum::Flat { photon_flux: 1. });
        src.point(0., 0., c, 1.).unwrap();
        assert_eq!(src.wave_support(), None);
    }

    #[test]
    fn box_intersection() {
        let a = SkyBox::new(0., 2., 0., 2.);
        assert_eq!(
            a.intersect(&SkyBox::new(1., 3., -1., 1.)),
            Some(SkyBox::new(1., 2., 0., 1.))
        );
        assert_eq!(a.intersect(&SkyBox::new(3., 4., 0., 1.)), None);
        assert!(SkyBox::point(1., 1.).intersect(&a).is_some());
    }
}
