use image::{GrayImage, Luma};
use imageproc::distance_transform::Norm;
use imageproc::morphology::dilate;

use crate::filters::kernels::{gaussian_blur, maximum_filter};
use crate::raster::Raster;

/// Luminance above which a local maximum counts as a star
pub const DEFAULT_STAR_THRESHOLD: f64 = 0.8;

/// Brightness kept inside star regions
const STAR_ATTENUATION: f64 = 0.7;
const PEAK_WINDOW: usize = 5;
const DILATION_RADIUS: u8 = 3;
const MASK_SIGMA: f64 = 2.0;

/// Perceptual luminance, or the samples themselves for grayscale
fn luminance(raster: &Raster) -> Vec<f64> {
    if raster.channels == 1 {
        return raster.data.clone();
    }
    raster
        .data
        .chunks(raster.channels)
        .map(|px| 0.299 * px[0] + 0.587 * px[1] + 0.114 * px[2])
        .collect()
}

/// Mask of star regions: bright local maxima grown by three cross dilations
fn star_regions(luma: &[f64], width: usize, height: usize, threshold: f64) -> GrayImage {
    let local_max = maximum_filter(luma, width, height, PEAK_WINDOW);

    let mut seeds = GrayImage::new(width as u32, height as u32);
    for (i, (&value, &peak)) in luma.iter().zip(&local_max).enumerate() {
        if value == peak && value > threshold {
            seeds.put_pixel((i % width) as u32, (i / width) as u32, Luma([255]));
        }
    }

    // Three 4-connected dilations reach every pixel within L1 distance 3
    dilate(&seeds, Norm::L1, DILATION_RADIUS)
}

/// Dim bright stars so faint nebulosity stands out.
///
/// Star pixels are multiplied by 0.7 through a Gaussian-softened mask; the
/// result is clipped to [0,1].
pub fn reduce_stars(raster: &Raster, threshold: f64) -> Raster {
    let (width, height) = (raster.width, raster.height);
    let luma = luminance(raster);
    let regions = star_regions(&luma, width, height, threshold);

    let mask: Vec<f64> = regions
        .pixels()
        .map(|p| if p[0] > 0 { STAR_ATTENUATION } else { 1.0 })
        .collect();
    let mask = gaussian_blur(&mask, width, height, MASK_SIGMA);

    let data = raster
        .data
        .iter()
        .enumerate()
        .map(|(i, &x)| (x * mask[i / raster.channels]).clamp(0.0, 1.0))
        .collect();
    Raster::new(width, height, raster.channels, data)
}
