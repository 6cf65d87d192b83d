use std::ops::{Add, AddAssign};

/// Bookkeeping of a projection run
///
/// Summaries of disjoint tile sets add up to the summary of their union.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct ProjectionSummary {
    pub tiles_processed: usize,
    /// Tiles dropped for samples far outside their trace domain
    pub tiles_rejected: usize,
    /// Tiles with no sample landing on their detector
    pub tiles_off_detector: usize,
    pub samples_deposited: usize,
    pub samples_dropped: usize,
    /// Samples moved onto their trace domain edge
    pub samples_clamped: usize,
    /// Photons (or electrons) generated by the processed tiles, counted once
    /// per trace when a tile spreads over several detectors
    pub input_flux: f64,
    /// Counts actually deposited on detector pixels
    pub deposited_flux: f64,
    /// Whether the run was cancelled before processing every tile
    pub cancelled: bool,
}
impl ProjectionSummary {
    /// Flux that did not reach a detector pixel
    pub fn lost_flux(&self) -> f64 {
        self.input_flux - self.deposited_flux
    }
    /// Whether some samples or tiles were dropped
    pub fn is_degraded(&self) -> bool {
        self.tiles_rejected > 0 || self.samples_dropped > 0 || self.cancelled
    }
}

impl AddAssign for ProjectionSummary {
    fn add_assign(&mut self, rhs: Self) {
        self.tiles_processed += rhs.tiles_processed;
        self.tiles_rejected += rhs.tiles_rejected;
        self.tiles_off_detector += rhs.tiles_off_detector;
        self.samples_deposited += rhs.samples_deposited;
        self.samples_dropped += rhs.samples_dropped;
        self.samples_clamped += rhs.samples_clamped;
        self.input_flux += rhs.input_flux;
        self.deposited_flux += rhs.deposited_flux;
        self.cancelled |= rhs.cancelled;
    }
}
impl Add for ProjectionSummary {
    type Output = Self;
    fn add(mut self, rhs: Self) -> Self::Output {
        self += rhs;
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn combine() {
        let a = ProjectionSummary {
            tiles_processed: 2,
            samples_dropped: 1,
            input_flux: 3.,
            deposited_flux: 2.,
            ..Default::default()
        };
        let b = ProjectionSummary {
            tiles_processed: 1,
            cancelled: true,
            input_flux: 1.,
            deposited_flux: 1.,
            ..Default::default()
        };
        let c = a + b;
        assert_eq!(c.tiles_processed, 3);
        assert_eq!(c.lost_flux(), 1.);
        assert!(c.cancelled && c.is_degraded());
        assert_eq!(a + ProjectionSummary::default(), a);
    }
}
