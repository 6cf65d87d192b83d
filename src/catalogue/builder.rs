use std::collections::HashSet;

use crate::{trace::TraceModel, Builder};

use super::{CatalogueError, ExpectedUnits, PrimaryHeader, Result, TraceCatalogue};

/// [`TraceCatalogue`] builder
///
/// Default properties:
///  * name   : "catalogue"
///  * units  : um, arcsec, mm
///  * traces : none, at least one is required
///
/// # Examples
///
/// ```
/// use tracesim::{Builder, FromBuilder, TraceCatalogue, TraceModel};
/// let trace = TraceModel::builder()
///     .name("order_1")
///     .samples(
///         vec![1.0, 1.0, 2.0, 2.0],
///         vec![-1.0, 1.0, -1.0, 1.0],
///         vec![-1.0, 1.0, -1.0, 1.0],
///         vec![0.0, 0.0, 10.0, 10.0],
///     )
///     .build()
///     .unwrap();
/// let catalogue = TraceCatalogue::builder().trace(trace).build().unwrap();
/// assert_eq!(catalogue.overall_domain(), (1.0, 2.0));
/// ```
#[derive(Debug, Clone, PartialEq)]
pub struct TraceCatalogueBuilder {
    name: String,
    header: PrimaryHeader,
    units: ExpectedUnits,
    traces: Vec<TraceModel>,
}
impl Default for TraceCatalogueBuilder {
    fn default() -> Self {
        Self {
            name: "catalogue".into(),
            header: Default::default(),
            units: Default::default(),
            traces: vec![],
        }
    }
}
impl TraceCatalogueBuilder {
    pub fn name<S: Into<String>>(self, name: S) -> Self {
        Self {
            name: name.into(),
            ..self
        }
    }
    pub fn header(self, header: PrimaryHeader) -> Self {
        Self { header, ..self }
    }
    /// Sets the units the traces must be declared in
    pub fn units(self, units: ExpectedUnits) -> Self {
        Self { units, ..self }
    }
    /// Appends a trace
    pub fn trace(mut self, trace: TraceModel) -> Self {
        self.traces.push(trace);
        self
    }
    /// Appends traces in iteration order
    pub fn traces<I: IntoIterator<Item = TraceModel>>(mut self, traces: I) -> Self {
        self.traces.extend(traces);
        self
    }
    pub(crate) fn try_build(self) -> Result<TraceCatalogue> {
        if self.traces.is_empty() {
            return Err(CatalogueError::Empty);
        }
        let mut names = HashSet::new();
        for trace in &self.traces {
            if !names.insert(trace.name()) {
                return Err(CatalogueError::DuplicateTrace(trace.name().to_owned()));
            }
            self.units.check(trace)?;
        }
        Ok(TraceCatalogue {
            name: self.name,
            header: self.header,
            units: self.units,
            traces: self.traces,
        })
    }
}

impl Builder for TraceCatalogueBuilder {
    type Component = TraceCatalogue;

    fn build(self) -> crate::Result<Self::Component> {
        Ok(self.try_build()?)
    }
}
