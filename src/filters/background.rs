use crate::filters::kernels::median_filter;
use crate::raster::Raster;

/// Default scale of the background model, in pixels
pub const DEFAULT_BACKGROUND_SIGMA: f64 = 50.0;

/// Subtract a large-scale median background and renormalize to [0,1].
///
/// The background is estimated per channel with a median window of
/// `2 * sigma` pixels. After subtraction the result is shifted so its
/// minimum is 0 and divided by its maximum (when positive).
pub fn remove_background(raster: &Raster, sigma: f64) -> Raster {
    let size = (sigma * 2.0) as usize;
    let background =
        raster.map_planes(|plane| median_filter(plane, raster.width, raster.height, size));

    let residual: Vec<f64> = raster
        .data
        .iter()
        .zip(&background.data)
        .map(|(x, bg)| x - bg)
        .collect();
    let mut result = Raster::new(raster.width, raster.height, raster.channels, residual);

    let min = result.min();
    result = result.map(|x| x - min);

    let max = result.max();
    if max > 0.0 {
        result = result.map(|x| x / max);
    }
    result
}
