// End-to-end runs of the processing pipeline on synthetic exposures written
// to temporary directories.

#[cfg(test)]
mod tests {
    use crate::classify::{CatalogClassifier, TargetClassifier};
    use crate::fits::{self, Header, HeaderValue};
    use crate::params::{ProcessingParams, StretchMethod, TargetSelection, TargetType};
    use crate::pipeline::{process, Pipeline, PipelineOptions, Stage};
    use crate::raster::Raster;
    use anyhow::anyhow;
    use rand::prelude::*;
    use std::path::{Path, PathBuf};
    use tempfile::TempDir;

    /// Right-skewed sky: 10000 * u^3 with u uniform in [0,1)
    fn skewed_sky(size: usize, seed: u64) -> Raster {
        let mut rng = StdRng::seed_from_u64(seed);
        let data = (0..size * size)
            .map(|_| 10000.0 * rng.gen::<f64>().powi(3))
            .collect();
        Raster::new(size, size, 1, data)
    }

    fn uniform_sky(size: usize, channels: usize, seed: u64) -> Raster {
        let mut rng = StdRng::seed_from_u64(seed);
        let data = (0..size * size * channels)
            .map(|_| rng.gen_range(0.0..10000.0))
            .collect();
        Raster::new(size, size, channels, data)
    }

    fn write_input(dir: &Path, name: &str, raster: &Raster) -> PathBuf {
        let mut header = Header::new();
        header.push("OBJECT", HeaderValue::Text("Synthetic".to_string()));
        let path = dir.join(name);
        fits::save(raster, &path, &header).unwrap();
        path
    }

    fn fast_pipeline() -> Pipeline {
        Pipeline::new(PipelineOptions {
            background_sigma: 8.0,
            ..Default::default()
        })
    }

    struct FixedClassifier(TargetType);

    impl TargetClassifier for FixedClassifier {
        fn classify(&self, _object_name: &str) -> anyhow::Result<TargetType> {
            Ok(self.0)
        }
    }

    struct OfflineClassifier;

    impl TargetClassifier for OfflineClassifier {
        fn classify(&self, object_name: &str) -> anyhow::Result<TargetType> {
            Err(anyhow!("catalog service unreachable for {}", object_name))
        }
    }

    #[test]
    fn test_default_run_reaches_target_median() {
        let tmp = TempDir::new().unwrap();
        let input = write_input(tmp.path(), "skewed.fits", &skewed_sky(128, 7));
        let out_dir = tmp.path().join("out");

        let result = process(&input, &out_dir, &ProcessingParams::default(), None, None);

        assert!(result.success, "{:?}", result.error_message);
        assert!(result.error_message.is_none());
        assert_eq!(result.target_type, TargetType::Unknown);
        assert_eq!(result.processing_params.stretch_factor, 0.15);
        assert!(result.processing_time >= 0.0);

        assert!(result.output_fits_path.exists());
        assert!(result.output_preview_path.exists());
        assert_eq!(result.output_fits_path.parent(), Some(out_dir.as_path()));
        let fits_name = result.output_fits_path.file_name().unwrap().to_string_lossy();
        assert!(fits_name.starts_with("skewed_processed_"));
        assert!(fits_name.ends_with(".fits"));
        let preview_name = result.output_preview_path.file_name().unwrap().to_string_lossy();
        assert!(preview_name.starts_with("skewed_preview_"));
        assert!(preview_name.ends_with(".png"));

        let (output, header) = fits::load(&result.output_fits_path).unwrap();
        assert_eq!(output.shape(), vec![128, 128]);
        assert!((output.median() - 0.15).abs() < 0.03, "median {}", output.median());
        assert_eq!(header.get_str("OBJECT"), Some("Synthetic"));
        assert_eq!(header.get_str(fits::PROVENANCE_KEY), Some(fits::PROVENANCE_VALUE));
    }

    #[test]
    fn test_uniform_input_is_limited_by_gamma_clamp() {
        let tmp = TempDir::new().unwrap();
        let input = write_input(tmp.path(), "uniform.fits", &uniform_sky(128, 1, 11));

        let result = process(&input, tmp.path(), &ProcessingParams::default(), None, None);
        assert!(result.success, "{:?}", result.error_message);

        let (output, _) = fits::load(&result.output_fits_path).unwrap();
        assert!((output.median() - 0.25).abs() < 0.03, "median {}", output.median());
    }

    #[test]
    fn test_progress_is_monotonic_and_complete() {
        let tmp = TempDir::new().unwrap();
        let input = write_input(tmp.path(), "frame.fits", &skewed_sky(48, 3));

        let mut events: Vec<(Stage, f64)> = Vec::new();
        let mut sink = |stage: Stage, progress: f64, _message: &str| -> anyhow::Result<()> {
            events.push((stage, progress));
            Ok(())
        };

        let result = fast_pipeline().process(
            &input,
            tmp.path(),
            &ProcessingParams::default(),
            None,
            Some(&mut sink),
        );
        assert!(result.success, "{:?}", result.error_message);

        let stages: Vec<Stage> = events.iter().map(|(s, _)| *s).collect();
        assert_eq!(stages, Stage::ALL.to_vec());
        assert!(events.windows(2).all(|w| w[0].1 <= w[1].1));
        assert_eq!(events.last().unwrap().1, 1.0);
    }

    #[test]
    fn test_failing_progress_callback_does_not_abort() {
        let tmp = TempDir::new().unwrap();
        let input = write_input(tmp.path(), "frame.fits", &skewed_sky(32, 5));

        let mut calls = 0;
        let mut sink = |_stage: Stage, _progress: f64, _message: &str| -> anyhow::Result<()> {
            calls += 1;
            Err(anyhow!("UI went away"))
        };

        let result = fast_pipeline().process(
            &input,
            tmp.path(),
            &ProcessingParams::default(),
            None,
            Some(&mut sink),
        );

        assert!(result.success, "{:?}", result.error_message);
        assert_eq!(calls, Stage::ALL.len());
    }

    #[test]
    fn test_missing_input_reports_failure() {
        let tmp = TempDir::new().unwrap();
        let input = tmp.path().join("does_not_exist.fits");

        let mut events = Vec::new();
        let mut sink = |stage: Stage, _progress: f64, _message: &str| -> anyhow::Result<()> {
            events.push(stage);
            Ok(())
        };
        let result = fast_pipeline().process(
            &input,
            &tmp.path().join("out"),
            &ProcessingParams::default(),
            None,
            Some(&mut sink),
        );

        assert!(!result.success);
        let message = result.error_message.unwrap();
        assert!(message.contains("does_not_exist.fits"), "{}", message);
        assert_eq!(result.output_fits_path, PathBuf::new());
        assert_eq!(result.output_preview_path, PathBuf::new());
        assert_eq!(events, vec![Stage::Init, Stage::Loading]);
    }

    #[test]
    fn test_corrupt_input_reports_failure() {
        let tmp = TempDir::new().unwrap();
        let input = tmp.path().join("garbage.fits");
        std::fs::write(&input, b"definitely not a FITS file").unwrap();

        let result = process(&input, tmp.path(), &ProcessingParams::default(), None, None);

        assert!(!result.success);
        assert!(result.error_message.is_some());
        let leftovers = std::fs::read_dir(tmp.path())
            .unwrap()
            .filter_map(|e| e.ok())
            .filter(|e| e.file_name().to_string_lossy().contains("_processed_"))
            .count();
        assert_eq!(leftovers, 0);
    }

    /// Primary header for a `width`×`height` image, padded to a full block
    fn raw_header(bitpix: i64, width: usize, height: usize) -> Vec<u8> {
        let cards = [
            format!("{:<8}= {:>20}", "SIMPLE", "T"),
            format!("{:<8}= {:>20}", "BITPIX", bitpix),
            format!("{:<8}= {:>20}", "NAXIS", 2),
            format!("{:<8}= {:>20}", "NAXIS1", width),
            format!("{:<8}= {:>20}", "NAXIS2", height),
            "END".to_string(),
        ];
        let mut bytes: Vec<u8> = cards.iter().flat_map(|c| format!("{:<80}", c).into_bytes()).collect();
        bytes.resize(2880, b' ');
        bytes
    }

    #[test]
    fn test_truncated_input_reports_failure() {
        let tmp = TempDir::new().unwrap();
        let input = tmp.path().join("truncated.fits");
        let mut bytes = raw_header(-32, 64, 64);
        bytes.extend(std::iter::repeat_n(0x3fu8, 400));
        std::fs::write(&input, bytes).unwrap();

        let result = process(&input, tmp.path(), &ProcessingParams::default(), None, None);

        assert!(!result.success);
        let message = result.error_message.unwrap();
        assert!(message.contains("Truncated"), "{}", message);
    }

    #[test]
    fn test_unsupported_bitpix_reports_failure() {
        let tmp = TempDir::new().unwrap();
        let input = tmp.path().join("bitpix24.fits");
        let mut bytes = raw_header(24, 8, 8);
        bytes.extend(std::iter::repeat_n(0u8, 2880));
        std::fs::write(&input, bytes).unwrap();

        let result = process(&input, tmp.path(), &ProcessingParams::default(), None, None);

        assert!(!result.success);
        assert!(result.error_message.unwrap().contains("BITPIX"));
    }

    #[test]
    fn test_integer_exposures_are_processed() {
        let tmp = TempDir::new().unwrap();
        let mut rng = StdRng::seed_from_u64(29);

        let mut wide = raw_header(64, 32, 32);
        let mut bytes8 = raw_header(8, 32, 32);
        for _ in 0..32 * 32 {
            let value: u8 = rng.gen();
            wide.extend_from_slice(&(value as i64 * 1000).to_be_bytes());
            bytes8.push(value);
        }
        wide.resize(2880 * 4, 0);
        bytes8.resize(2880 * 2, 0);

        for (name, bytes) in [("int64.fits", wide), ("uint8.fits", bytes8)] {
            let input = tmp.path().join(name);
            std::fs::write(&input, bytes).unwrap();

            let result = fast_pipeline().process(
                &input,
                tmp.path(),
                &ProcessingParams::default(),
                None,
                None,
            );
            assert!(result.success, "{}: {:?}", name, result.error_message);

            let (output, _) = fits::load(&result.output_fits_path).unwrap();
            assert_eq!(output.shape(), vec![32, 32]);
            assert!(output.min() >= 0.0 && output.max() <= 1.0);
        }
    }

    #[test]
    fn test_all_stages_keep_values_in_unit_range() {
        let tmp = TempDir::new().unwrap();
        let mut raster = uniform_sky(40, 3, 21);
        // A handful of saturated stars so the star reducer has work to do
        for &(x, y) in &[(10, 10), (25, 18), (33, 30)] {
            let i = (y * 40 + x) * 3;
            raster.data[i..i + 3].copy_from_slice(&[60000.0, 58000.0, 61000.0]);
        }
        let input = write_input(tmp.path(), "rgb.fits", &raster);

        let params = ProcessingParams {
            target_type: TargetSelection::Fixed(TargetType::EmissionNebula),
            star_reduction: true,
            noise_reduction: 0.6,
            contrast: 1.8,
            ..Default::default()
        };

        for method in [StretchMethod::Statistical, StretchMethod::Arcsinh, StretchMethod::Log] {
            let params = ProcessingParams {
                stretch_method: method,
                ..params.clone()
            };
            let result = fast_pipeline().process(&input, tmp.path(), &params, None, None);
            assert!(result.success, "{:?}", result.error_message);
            assert_eq!(result.target_type, TargetType::EmissionNebula);
            assert!(result.processing_params.star_reduction);

            let (output, _) = fits::load(&result.output_fits_path).unwrap();
            assert_eq!(output.shape(), vec![40, 40, 3]);
            assert!(output.min() >= 0.0 && output.max() <= 1.0);
        }
    }

    #[test]
    fn test_auto_classification_drives_defaults() {
        let tmp = TempDir::new().unwrap();
        let input = write_input(tmp.path(), "m31.fits", &skewed_sky(32, 9));

        let pipeline =
            fast_pipeline().with_classifier(Box::new(FixedClassifier(TargetType::Galaxy)));
        let result = pipeline.process(
            &input,
            tmp.path(),
            &ProcessingParams::default(),
            Some("M31"),
            None,
        );

        assert!(result.success, "{:?}", result.error_message);
        assert_eq!(result.target_type, TargetType::Galaxy);
        assert_eq!(result.processing_params.stretch_factor, 0.12);
        assert_eq!(
            result.processing_params.target_type,
            TargetSelection::Fixed(TargetType::Galaxy)
        );
    }

    #[test]
    fn test_catalog_classifier_in_pipeline() {
        let tmp = TempDir::new().unwrap();
        let input = write_input(tmp.path(), "m42.fits", &skewed_sky(32, 13));

        let pipeline = fast_pipeline().with_classifier(Box::new(CatalogClassifier::new().unwrap()));
        let result = pipeline.process(
            &input,
            tmp.path(),
            &ProcessingParams::default(),
            Some("messier 42"),
            None,
        );

        assert!(result.success, "{:?}", result.error_message);
        assert_eq!(result.target_type, TargetType::EmissionNebula);
        // Emission nebulae turn star reduction on
        assert!(result.processing_params.star_reduction);
    }

    #[test]
    fn test_classifier_error_falls_back_to_unknown() {
        let tmp = TempDir::new().unwrap();
        let input = write_input(tmp.path(), "frame.fits", &skewed_sky(32, 17));

        let pipeline = fast_pipeline().with_classifier(Box::new(OfflineClassifier));
        let result = pipeline.process(
            &input,
            tmp.path(),
            &ProcessingParams::default(),
            Some("NGC 7000"),
            None,
        );

        assert!(result.success, "{:?}", result.error_message);
        assert_eq!(result.target_type, TargetType::Unknown);
        assert_eq!(result.processing_params.stretch_factor, 0.15);
    }
}
