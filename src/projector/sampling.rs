use crate::{
    fov::{FovTile, Span},
    source::FieldComponent,
    spectrum::{SpectralSample, Spectrum},
};

/// Sky position of a source sample and its flux weight: 1 for a point
/// source, the sampled solid angle in arcsec² for an extended component
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SkySample {
    pub x: f64,
    pub y: f64,
    pub weight: f64,
}

/// Cells of the regular grid covering `[lo, hi]` with a step no larger than
/// `step`, as `(centre, width)`, restricted to the cells centred in `span`
pub fn grid_cells(lo: f64, hi: f64, step: f64, span: &Span) -> Vec<(f64, f64)> {
    let len = hi - lo;
    if !(len > 0.) {
        return vec![];
    }
    // steps dividing the length up to rounding give an exact cell count
    let n = (len / step * (1. - 1e-12)).ceil().max(1.) as usize;
    let width = len / n as f64;
    (0..n)
        .map(|i| lo + (i as f64 + 0.5) * width)
        .filter(|c| span.contains(*c))
        .map(|c| (c, width))
        .collect()
}

/// Sky samples of `component` owned by `tile`
///
/// In spectroscopy, extended components are sampled along the slit (`x`) and
/// integrated across it (`y`).
pub fn sky_samples(
    component: &FieldComponent,
    tile: &FovTile,
    step: f64,
    spectroscopy: bool,
) -> Vec<SkySample> {
    match component {
        FieldComponent::Point { x, y, .. } => {
            if tile.x.contains(*x) && tile.y.contains(*y) {
                vec![SkySample {
                    x: *x,
                    y: *y,
                    weight: 1.,
                }]
            } else {
                vec![]
            }
        }
        FieldComponent::Extended { extent, .. } => {
            let Some(ext) = extent.intersect(&tile.region) else {
                return vec![];
            };
            let xs = grid_cells(ext.x_min, ext.x_max, step, &tile.x);
            if spectroscopy {
                let (y, height) = (0.5 * (ext.y_min + ext.y_max), ext.height());
                if !(height > 0.) {
                    return vec![];
                }
                xs.into_iter()
                    .map(|(x, width)| SkySample {
                        x,
                        y,
                        weight: width * height,
                    })
                    .collect()
            } else {
                let ys = grid_cells(ext.y_min, ext.y_max, step, &tile.y);
                ys.iter()
                    .flat_map(|&(y, height)| {
                        xs.iter().map(move |&(x, width)| SkySample {
                            x,
                            y,
                            weight: width * height,
                        })
                    })
                    .collect()
            }
        }
    }
}

/// Wavelength samples of `spectrum` owned by `tile`
pub fn spectral_samples(spectrum: &Spectrum, tile: &FovTile) -> Vec<SpectralSample> {
    spectrum.samples(
        tile.wave.min,
        tile.wave.max,
        tile.n_wave_samples,
        tile.wave.closed,
    )
}
