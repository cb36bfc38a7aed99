use crate::raster::Raster;

/// Spread values around the global mean by `strength`.
/// A strength of 1.0 or less leaves the raster untouched.
pub fn enhance_contrast(raster: &Raster, strength: f64) -> Raster {
    if strength <= 1.0 {
        return raster.clone();
    }
    let mean = raster.mean();
    raster.map(|x| (mean + (x - mean) * strength).clamp(0.0, 1.0))
}
