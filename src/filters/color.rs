use crate::raster::{median, Raster};

/// Neutralize the sky background of an RGB raster.
///
/// Samples the four corner patches, takes each channel's median there and
/// scales every channel so the medians meet at their common mean.
/// Single channel rasters are returned unchanged.
pub fn color_calibrate(raster: &Raster) -> Raster {
    if !raster.is_color() {
        return raster.clone();
    }

    let medians = corner_medians(raster);
    let target = medians.iter().sum::<f64>() / 3.0;
    if target <= 0.0 {
        return raster.clone();
    }

    let scales: Vec<Option<f64>> = medians
        .iter()
        .map(|&m| if m > 0.0 { Some(target / m) } else { None })
        .collect();

    let data = raster
        .data
        .iter()
        .enumerate()
        .map(|(i, &x)| match scales[i % 3] {
            Some(scale) => (x * scale).clamp(0.0, 1.0),
            None => x,
        })
        .collect();
    Raster::new(raster.width, raster.height, raster.channels, data)
}

/// Per-channel medians over the four corner patches
fn corner_medians(raster: &Raster) -> [f64; 3] {
    let (width, height) = (raster.width, raster.height);
    let corner = (width.min(height) / 20).max(10);
    let (ch, cw) = (corner.min(height), corner.min(width));

    let row_ranges = [0..ch, height - ch..height];
    let col_ranges = [0..cw, width - cw..width];

    let mut samples: [Vec<f64>; 3] = Default::default();
    for rows in &row_ranges {
        for cols in &col_ranges {
            for y in rows.clone() {
                for x in cols.clone() {
                    let base = (y * width + x) * 3;
                    for (c, channel) in samples.iter_mut().enumerate() {
                        channel.push(raster.data[base + c]);
                    }
                }
            }
        }
    }

    [median(&samples[0]), median(&samples[1]), median(&samples[2])]
}

#[cfg(test)]
mod tests {
    use super::*;

    fn tinted(width: usize, height: usize, rgb: [f64; 3]) -> Raster {
        let data = (0..width * height).flat_map(|_| rgb).collect();
        Raster::new(width, height, 3, data)
    }

    #[test]
    fn test_neutralizes_tinted_background() {
        let raster = tinted(40, 40, [0.2, 0.1, 0.3]);
        let calibrated = color_calibrate(&raster);

        let medians = corner_medians(&calibrated);
        for m in medians {
            assert!((m - 0.2).abs() < 1e-12);
        }
    }

    #[test]
    fn test_grayscale_untouched() {
        let raster = Raster::filled(8, 8, 1, 0.4);
        assert_eq!(color_calibrate(&raster), raster);
    }

    #[test]
    fn test_zero_channel_is_left_alone() {
        let raster = tinted(12, 12, [0.0, 0.2, 0.4]);
        let calibrated = color_calibrate(&raster);
        // target = 0.2, red median is 0 so red is skipped
        assert_eq!(calibrated.plane(0), raster.plane(0));
        assert!(calibrated.plane(2).iter().all(|&v| (v - 0.2).abs() < 1e-12));
    }

    #[test]
    fn test_scaled_values_are_clipped() {
        let mut raster = tinted(30, 30, [0.1, 0.2, 0.3]);
        // Bright red star in the middle
        raster.data[(15 * 30 + 15) * 3] = 0.9;
        let calibrated = color_calibrate(&raster);
        assert_eq!(calibrated.data[(15 * 30 + 15) * 3], 1.0);
        assert!(calibrated.max() <= 1.0);
    }

    #[test]
    fn test_small_image_patch_covers_everything() {
        let raster = tinted(5, 3, [0.3, 0.3, 0.6]);
        let calibrated = color_calibrate(&raster);
        assert!(calibrated.same_shape(&raster));
        assert!(calibrated.plane(2).iter().all(|&v| (v - 0.4).abs() < 1e-12));
    }
}
