use anyhow::{bail, Context, Result};
use image::{ImageBuffer, Luma, Rgb};
use std::path::Path;

use crate::raster::Raster;

/// Convert a normalized sample to 8 bits (scale by 255, truncate)
fn to_u8(value: f64) -> u8 {
    (value.clamp(0.0, 1.0) * 255.0) as u8
}

/// Write a [0,1] raster as an 8-bit PNG: grayscale for one channel, RGB for three
pub fn render_preview(raster: &Raster, path: &Path) -> Result<()> {
    let pixels: Vec<u8> = raster.data.iter().map(|&v| to_u8(v)).collect();
    let (width, height) = (raster.width as u32, raster.height as u32);

    match raster.channels {
        1 => {
            let img_buffer = ImageBuffer::<Luma<u8>, Vec<u8>>::from_raw(width, height, pixels)
                .context("Failed to create image buffer")?;
            img_buffer
                .save(path)
                .with_context(|| format!("Failed to save PNG to: {}", path.display()))?;
        }
        3 => {
            let img_buffer = ImageBuffer::<Rgb<u8>, Vec<u8>>::from_raw(width, height, pixels)
                .context("Failed to create RGB image buffer")?;
            img_buffer
                .save(path)
                .with_context(|| format!("Failed to save PNG to: {}", path.display()))?;
        }
        n => bail!("Cannot render a preview with {} channels", n),
    }

    Ok(())
}
