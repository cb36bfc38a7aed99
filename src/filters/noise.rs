use crate::filters::kernels::gaussian_blur;
use crate::raster::Raster;

/// Light Gaussian smoothing, `sigma = strength * 1.5` pixels per channel.
/// A strength of 0 or less leaves the raster untouched.
pub fn reduce_noise(raster: &Raster, strength: f64) -> Raster {
    if strength <= 0.0 {
        return raster.clone();
    }
    let sigma = strength * 1.5;
    raster.map_planes(|plane| gaussian_blur(plane, raster.width, raster.height, sigma))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn variance(values: &[f64]) -> f64 {
        let mean = values.iter().sum::<f64>() / values.len() as f64;
        values.iter().map(|v| (v - mean).powi(2)).sum::<f64>() / values.len() as f64
    }

    #[test]
    fn test_zero_strength_is_identity() {
        let raster = Raster::new(2, 2, 1, vec![0.0, 1.0, 1.0, 0.0]);
        assert_eq!(reduce_noise(&raster, 0.0), raster);
    }

    #[test]
    fn test_smooths_checkerboard_per_channel() {
        let (width, height) = (16, 16);
        let data: Vec<f64> = (0..width * height)
            .flat_map(|i| {
                let on = ((i % width) + (i / width)) % 2 == 0;
                [if on { 1.0 } else { 0.0 }, 0.5, 0.25]
            })
            .collect();
        let raster = Raster::new(width, height, 3, data);

        let out = reduce_noise(&raster, 1.0);

        assert!(out.same_shape(&raster));
        assert!(variance(&out.plane(0)) < variance(&raster.plane(0)) / 4.0);
        assert!(out.plane(1).iter().all(|&v| (v - 0.5).abs() < 1e-12));
        assert!(out.plane(2).iter().all(|&v| (v - 0.25).abs() < 1e-12));
    }
}
