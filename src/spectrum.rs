//! Spectral functions of sources and multiplicative transmission curves

use serde::{Deserialize, Serialize};

#[derive(Debug, thiserror::Error, PartialEq)]
pub enum SpectrumError {
    #[error("tabulated curve needs at least 2 samples, found {0}")]
    TooShort(usize),
    #[error("tabulated curve columns have different lengths: {0} wavelengths, {1} values")]
    Ragged(usize, usize),
    #[error("tabulated curve wavelengths must be strictly increasing (index {0})")]
    NotIncreasing(usize),
    #[error("tabulated curve holds a non-finite value at index {0}")]
    NonFinite(usize),
}
pub type Result<T> = std::result::Result<T, SpectrumError>;

/// Photon spectrum of a source component
///
/// Continuum fluxes are photon rates per unit wavelength: ph/s/m²/µm for
/// point sources and ph/s/m²/µm/arcsec² for extended components. A line
/// carries its integrated flux (ph/s/m² or ph/s/m²/arcsec²).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Spectrum {
    Flat { photon_flux: f64 },
    Line { wave: f64, flux: f64 },
    Tabulated { waves: Vec<f64>, flux: Vec<f64> },
}

/// A wavelength node with the photon rate integrated over its bin
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SpectralSample {
    pub wave: f64,
    pub flux: f64,
}

impl Spectrum {
    /// Flat spectrum normalised so that its integral over `[wave_min, wave_max]` is `total`
    pub fn flat_band(total: f64, wave_min: f64, wave_max: f64) -> Self {
        Spectrum::Flat {
            photon_flux: total / (wave_max - wave_min),
        }
    }
    /// Checked piecewise-linear spectrum
    pub fn tabulated(waves: Vec<f64>, flux: Vec<f64>) -> Result<Self> {
        validate_table(&waves, &flux)?;
        Ok(Spectrum::Tabulated { waves, flux })
    }
    pub fn validate(&self) -> Result<()> {
        match self {
            Spectrum::Tabulated { waves, flux } => validate_table(waves, flux),
            _ => Ok(()),
        }
    }
    /// Wavelength support, `None` when unbounded
    pub fn wave_range(&self) -> Option<(f64, f64)> {
        match self {
            Spectrum::Flat { .. } => None,
            Spectrum::Line { wave, .. } => Some((*wave, *wave)),
            Spectrum::Tabulated { waves, .. } => Some((waves[0], waves[waves.len() - 1])),
        }
    }
    /// Photon rate integrated over `[a, b]`; lines count when `a <= wave < b`
    pub fn integrate(&self, a: f64, b: f64) -> f64 {
        if b < a {
            return 0.;
        }
        match self {
            Spectrum::Flat { photon_flux } => photon_flux * (b - a),
            Spectrum::Line { wave, flux } => {
                if *wave >= a && *wave < b {
                    *flux
                } else {
                    0.
                }
            }
            Spectrum::Tabulated { waves, flux } => integrate_linear(waves, flux, a, b),
        }
    }
    /// Splits `[a, b]` into `n` equal bins and returns the bin mid-points with
    /// their integrated flux
    ///
    /// A line is returned at its own wavelength; `closed` includes the upper
    /// bound. Zero-width intervals only ever hold lines.
    pub fn samples(&self, a: f64, b: f64, n: usize, closed: bool) -> Vec<SpectralSample> {
        match self {
            Spectrum::Line { wave, flux } => {
                if (*wave >= a && *wave < b) || (closed && *wave == b) {
                    vec![SpectralSample {
                        wave: *wave,
                        flux: *flux,
                    }]
                } else {
                    vec![]
                }
            }
            _ => {
                if b <= a {
                    return vec![];
                }
                let n = n.max(1);
                let dw = (b - a) / n as f64;
                (0..n)
                    .map(|i| {
                        let lo = a + i as f64 * dw;
                        let hi = if i + 1 == n { b } else { lo + dw };
                        SpectralSample {
                            wave: 0.5 * (lo + hi),
                            flux: self.integrate(lo, hi),
                        }
                    })
                    .filter(|s| s.flux != 0.)
                    .collect()
            }
        }
    }
}

/// Multiplicative transmission (throughput, quantum efficiency, ...)
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum TransmissionCurve {
    Constant { value: f64 },
    Tabulated { waves: Vec<f64>, values: Vec<f64> },
}
impl TransmissionCurve {
    pub fn constant(value: f64) -> Self {
        TransmissionCurve::Constant { value }
    }
    pub fn tabulated(waves: Vec<f64>, values: Vec<f64>) -> Result<Self> {
        validate_table(&waves, &values)?;
        Ok(TransmissionCurve::Tabulated { waves, values })
    }
    /// Transmission at `wave`, zero outside a tabulated range
    pub fn value_at(&self, wave: f64) -> f64 {
        match self {
            TransmissionCurve::Constant { value } => *value,
            TransmissionCurve::Tabulated { waves, values } => {
                interp_linear(waves, values, wave).unwrap_or(0.)
            }
        }
    }
}

fn validate_table(waves: &[f64], values: &[f64]) -> Result<()> {
    if waves.len() != values.len() {
        return Err(SpectrumError::Ragged(waves.len(), values.len()));
    }
    if waves.len() < 2 {
        return Err(SpectrumError::TooShort(waves.len()));
    }
    if let Some(i) = waves
        .iter()
        .zip(values)
        .position(|(w, v)| !w.is_finite() || !v.is_finite())
    {
        return Err(SpectrumError::NonFinite(i));
    }
    if let Some(i) = waves.windows(2).position(|w| w[1] <= w[0]) {
        return Err(SpectrumError::NotIncreasing(i + 1));
    }
    Ok(())
}

/// Piecewise-linear interpolation, `None` outside `[xs[0], xs[n-1]]`
pub(crate) fn interp_linear(xs: &[f64], ys: &[f64], x: f64) -> Option<f64> {
    let n = xs.len();
    if n == 0 || x < xs[0] || x > xs[n - 1] {
        return None;
    }
    if n == 1 {
        return Some(ys[0]);
    }
    let i = xs.partition_point(|&v| v <= x).clamp(1, n - 1);
    let t = (x - xs[i - 1]) / (xs[i] - xs[i - 1]);
    Some(ys[i - 1] + t * (ys[i] - ys[i - 1]))
}

// exact trapezoidal integral of the piecewise-linear curve, zero outside
fn integrate_linear(xs: &[f64], ys: &[f64], a: f64, b: f64) -> f64 {
    let n = xs.len();
    let lo = a.max(xs[0]);
    let hi = b.min(xs[n - 1]);
    if hi <= lo {
        return 0.;
    }
    let mut nodes = vec![lo];
    nodes.extend(xs.iter().copied().filter(|&x| x > lo && x < hi));
    nodes.push(hi);
    nodes
        .windows(2)
        .map(|w| {
            let y0 = interp_linear(xs, ys, w[0]).unwrap_or(0.);
            let y1 = interp_linear(xs, ys, w[1]).unwrap_or(0.);
            0.5 * (y0 + y1) * (w[1] - w[0])
        })
        .sum()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn flat_band_integral() {
        let spec = Spectrum::flat_band(1014., 1.8, 2.4);
        assert!((spec.integrate(1.8, 2.4) - 1014.).abs() < 1e-9);
        assert!((spec.integrate(2.0, 2.1) - 169.).abs() < 1e-9);
    }

    #[test]
    fn tabulated_integral_is_exact() {
        let spec = Spectrum::tabulated(vec![1., 2., 3.], vec![0., 2., 0.]).unwrap();
        assert!((spec.integrate(0., 4.) - 2.).abs() < 1e-12);
        assert!((spec.integrate(1.5, 2.5) - 1.5).abs() < 1e-12);
        assert_eq!(spec.integrate(3.5, 4.), 0.);
    }

    #[test]
    fn samples_sum_to_integral() {
        let spec = Spectrum::tabulated(vec![1., 2., 3.], vec![1., 3., 2.]).unwrap();
        let total: f64 = spec.samples(1.2, 2.7, 7, false).iter().map(|s| s.flux).sum();
        assert!((total - spec.integrate(1.2, 2.7)).abs() < 1e-12);
    }

    #[test]
    fn line_samples() {
        let line = Spectrum::Line {
            wave: 2.0,
            flux: 5.,
        };
        assert_eq!(line.samples(1.9, 2.0, 4, false).len(), 0);
        assert_eq!(line.samples(1.9, 2.0, 4, true)[0].flux, 5.);
        assert_eq!(line.samples(2.0, 2.0, 1, true)[0].wave, 2.0);
        assert_eq!(line.samples(2.0, 2.1, 4, false).len(), 1);
    }

    #[test]
    fn bad_tables() {
        assert_eq!(
            Spectrum::tabulated(vec![1., 1.], vec![0., 0.]),
            Err(SpectrumError::NotIncreasing(1))
        );
        assert_eq!(
            TransmissionCurve::tabulated(vec![1.], vec![0.]),
            Err(SpectrumError::TooShort(1))
        );
    }

    #[test]
    fn transmission_outside_is_zero() {
        let t = TransmissionCurve::tabulated(vec![1., 2.], vec![0.5, 1.]).unwrap();
        assert_eq!(t.value_at(0.5), 0.);
        assert!((t.value_at(1.5) - 0.75).abs() < 1e-12);
    }
}
