/// Dynamic-range stretching: percentile + gamma, arcsinh and logarithmic
use tracing::debug;

use crate::params::StretchMethod;
use crate::raster::Raster;

/// Factor used when a non-positive one is supplied
pub const DEFAULT_STRETCH_FACTOR: f64 = 0.15;

const BLACK_PERCENTILE: f64 = 0.5;
const WHITE_PERCENTILE: f64 = 99.9;
const GAMMA_MIN: f64 = 0.2;
const GAMMA_MAX: f64 = 2.0;
/// Medians outside this open interval are too extreme for a gamma solve
const MEDIAN_MIN: f64 = 0.001;
const MEDIAN_MAX: f64 = 0.999;

/// Run the selected stretch. `factor` is the target median for the
/// statistical stretch and the softening scale for arcsinh and log.
pub fn stretch(raster: &Raster, method: StretchMethod, factor: f64) -> Raster {
    match method {
        StretchMethod::Statistical => statistical_stretch(raster, factor),
        StretchMethod::Arcsinh => arcsinh_stretch(raster, factor),
        StretchMethod::Log => log_stretch(raster, factor),
    }
}

/// `factor`, or the default when it is not positive and finite or so small
/// that the log stretch offset (`factor / 100`) has no finite reciprocal
fn effective_factor(factor: f64) -> f64 {
    if factor > 0.0 && factor.is_finite() && (1.0 / (factor * 0.01)).is_finite() {
        factor
    } else {
        DEFAULT_STRETCH_FACTOR
    }
}

/// Percentile clip followed by a gamma curve that moves the median to
/// `target_median`.
///
/// Flat images (white point not above black point) are only clipped, or
/// divided by their maximum when it exceeds 1. A target of 1 or more drives
/// the gamma to its lower bound.
pub fn statistical_stretch(raster: &Raster, target_median: f64) -> Raster {
    let target_median = effective_factor(target_median);

    let points = raster.percentiles(&[BLACK_PERCENTILE, WHITE_PERCENTILE]);
    let (black, white) = (points[0], points[1]);

    if white <= black {
        debug!("Flat image (black={}, white={}), skipping stretch", black, white);
        let max = raster.max();
        return if max > 1.0 {
            raster.map(|x| (x / max).clamp(0.0, 1.0))
        } else {
            raster.clipped()
        };
    }

    let range = white - black;
    let normalized = raster.map(|x| ((x - black) / range).clamp(0.0, 1.0));

    let median = normalized.median();
    match solve_gamma(median, target_median) {
        Some(gamma) => {
            debug!(
                "Statistical stretch: black={:.6}, white={:.6}, median={:.6}, gamma={:.4}",
                black, white, median, gamma
            );
            normalized.map(|x| x.powf(gamma))
        }
        None => {
            debug!("Median {:.6} at an extreme, skipping gamma", median);
            normalized
        }
    }
}

/// Exponent mapping `median` onto `target`, clamped to [0.2, 2.0]
fn solve_gamma(median: f64, target: f64) -> Option<f64> {
    if median <= MEDIAN_MIN || median >= MEDIAN_MAX {
        return None;
    }
    let gamma = target.ln() / median.ln();
    Some(gamma.clamp(GAMMA_MIN, GAMMA_MAX))
}

/// `asinh(x / factor) / asinh(1 / factor)`, clipped to [0,1]
pub fn arcsinh_stretch(raster: &Raster, factor: f64) -> Raster {
    let scale = 1.0 / effective_factor(factor);
    let norm = scale.asinh();
    raster.map(|x| ((x * scale).asinh() / norm).clamp(0.0, 1.0))
}

/// `ln(1 + x / offset) / ln(1 + 1 / offset)` with `offset = factor / 100`,
/// clipped to [0,1]
pub fn log_stretch(raster: &Raster, factor: f64) -> Raster {
    let offset = effective_factor(factor) * 0.01;
    let norm = (1.0 / offset).ln_1p();
    raster.map(|x| ((x / offset).ln_1p() / norm).clamp(0.0, 1.0))
}
