//! Optical effects applied along the train
//!
//! Effects are kept in an ordered list; each entry can be switched off and
//! carries a z-order. Consumers only ever see the enabled entries sorted by
//! ascending z-order.

use serde::{Deserialize, Serialize};

use crate::{source::SkyBox, spectrum::TransmissionCurve};

#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum EffectError {
    #[error("no effect named {0:?}")]
    Unknown(String),
    #[error("an effect named {0:?} is already in the list")]
    Duplicate(String),
}
pub type Result<T> = std::result::Result<T, EffectError>;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Effect {
    /// Wavelength dependent photon transmission
    Throughput { curve: TransmissionCurve },
    /// Photon to electron conversion of the detector
    QuantumEfficiency { curve: TransmissionCurve },
    /// Sky region admitted by the instrument, in arcsec
    FieldStop { extent: SkyBox },
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EffectEntry {
    pub name: String,
    pub z_order: i32,
    pub enabled: bool,
    pub effect: Effect,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct EffectList {
    entries: Vec<EffectEntry>,
}

impl EffectList {
    pub fn new() -> Self {
        Default::default()
    }
    /// Appends an enabled effect
    pub fn push(mut self, name: &str, z_order: i32, effect: Effect) -> Result<Self> {
        if self.entries.iter().any(|e| e.name == name) {
            return Err(EffectError::Duplicate(name.to_owned()));
        }
        self.entries.push(EffectEntry {
            name: name.to_owned(),
            z_order,
            enabled: true,
            effect,
        });
        Ok(self)
    }
    /// Returns a copy of the list with `name` switched on or off
    pub fn with_enabled(&self, name: &str, enabled: bool) -> Result<Self> {
        let mut list = self.clone();
        let entry = list
            .entries
            .iter_mut()
            .find(|e| e.name == name)
            .ok_or_else(|| EffectError::Unknown(name.to_owned()))?;
        entry.enabled = enabled;
        Ok(list)
    }
    pub fn get(&self, name: &str) -> Option<&EffectEntry> {
        self.entries.iter().find(|e| e.name == name)
    }
    /// Enabled effects by ascending z-order, insertion order for ties
    pub fn iter_enabled(&self) -> impl Iterator<Item = &EffectEntry> {
        let mut enabled: Vec<_> = self.entries.iter().filter(|e| e.enabled).collect();
        enabled.sort_by_key(|e| e.z_order);
        enabled.into_iter()
    }
    /// Product of all enabled throughput and quantum efficiency curves at `wave`
    pub fn transmission(&self, wave: f64) -> f64 {
        self.iter_enabled()
            .filter_map(|e| match &e.effect {
                Effect::Throughput { curve } | Effect::QuantumEfficiency { curve } => {
                    Some(curve.value_at(wave))
                }
                Effect::FieldStop { .. } => None,
            })
            .product()
    }
    /// Intersection of all enabled field stops, `None` if there is none
    pub fn field_stop(&self) -> Option<SkyBox> {
        self.iter_enabled()
            .filter_map(|e| match &e.effect {
                Effect::FieldStop { extent } => Some(*extent),
                _ => None,
            })
            .reduce(|a, b| a.intersect(&b).unwrap_or(SkyBox::new(0., -1., 0., -1.)))
    }
    /// Whether counts are converted into electrons
    pub fn converts_to_electrons(&self) -> bool {
        self.iter_enabled()
            .any(|e| matches!(e.effect, Effect::QuantumEfficiency { .. }))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn list() -> EffectList {
        EffectList::new()
            .push(
                "qe",
                20,
                Effect::QuantumEfficiency {
                    curve: TransmissionCurve::constant(0.8),
                },
            )
            .unwrap()
            .push(
                "mirror",
                10,
                Effect::Throughput {
                    curve: TransmissionCurve::constant(0.5),
                },
            )
            .unwrap()
            .push(
                "stop",
                0,
                Effect::FieldStop {
                    extent: SkyBox::new(-1., 1., -1., 1.),
                },
            )
            .unwrap()
    }

    #[test]
    fn sorted_by_z_order() {
        let effects = list();
        let names: Vec<_> = effects.iter_enabled().map(|e| e.name.as_str()).collect();
        assert_eq!(names, vec!["stop", "mirror", "qe"]);
    }

    #[test]
    fn toggling() {
        let effects = list();
        assert!((effects.transmission(2.) - 0.4).abs() < 1e-12);
        let effects = effects.with_enabled("qe", false).unwrap();
        assert!((effects.transmission(2.) - 0.5).abs() < 1e-12);
        assert!(!effects.converts_to_electrons());
        assert!(effects.with_enabled("nope", false).is_err());
        assert_eq!(effects.field_stop(), Some(SkyBox::new(-1., 1., -1., 1.)));
    }

    #[test]
    fn duplicate_names() {
        assert_eq!(
            list()
                .push(
                    "qe",
                    0,
                    Effect::Throughput {
                        curve: TransmissionCurve::constant(1.)
                    }
                )
                .err(),
            Some(EffectError::Duplicate("qe".into()))
        );
    }
}
