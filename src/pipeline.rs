//! End-to-end processing of a single FITS exposure.
//!
//! A run loads the raster, resolves the target type and parameters, applies
//! the enabled filters in a fixed order and writes a processed FITS file plus
//! a PNG preview. Failures never escape as `Err`; they are folded into the
//! returned [`ProcessingResult`].

use anyhow::Context;
use serde::Serialize;
use std::fmt;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Instant;
use tracing::{debug, info, warn};

use crate::classify::TargetClassifier;
use crate::error::ProcessError;
use crate::filters::{
    color_calibrate, enhance_contrast, reduce_noise, reduce_stars, remove_background,
    DEFAULT_BACKGROUND_SIGMA, DEFAULT_STAR_THRESHOLD,
};
use crate::fits;
use crate::params::{ProcessingParams, ResolvedParams, TargetSelection, TargetType};
use crate::preview::render_preview;
use crate::raster::Raster;
use crate::stretch::stretch;
use crate::utils::{output_paths, output_timestamp};

/// Pipeline stages in execution order
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Stage {
    Init,
    Loading,
    Classifying,
    Background,
    Calibration,
    Stretch,
    Contrast,
    Stars,
    Noise,
    SavingFits,
    SavingPreview,
    Complete,
}

impl Stage {
    pub const ALL: [Stage; 12] = [
        Stage::Init,
        Stage::Loading,
        Stage::Classifying,
        Stage::Background,
        Stage::Calibration,
        Stage::Stretch,
        Stage::Contrast,
        Stage::Stars,
        Stage::Noise,
        Stage::SavingFits,
        Stage::SavingPreview,
        Stage::Complete,
    ];

    pub fn name(&self) -> &'static str {
        match self {
            Stage::Init => "init",
            Stage::Loading => "loading",
            Stage::Classifying => "classifying",
            Stage::Background => "background",
            Stage::Calibration => "calibration",
            Stage::Stretch => "stretch",
            Stage::Contrast => "contrast",
            Stage::Stars => "stars",
            Stage::Noise => "noise",
            Stage::SavingFits | Stage::SavingPreview => "saving",
            Stage::Complete => "complete",
        }
    }

    /// Fraction of the run completed when this stage starts
    pub fn progress(&self) -> f64 {
        match self {
            Stage::Init => 0.0,
            Stage::Loading => 0.05,
            Stage::Classifying => 0.15,
            Stage::Background => 0.20,
            Stage::Calibration => 0.35,
            Stage::Stretch => 0.45,
            Stage::Contrast => 0.60,
            Stage::Stars => 0.70,
            Stage::Noise => 0.80,
            Stage::SavingFits => 0.90,
            Stage::SavingPreview => 0.95,
            Stage::Complete => 1.0,
        }
    }
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Receives progress events. An error from the sink is logged and ignored.
pub trait ProgressSink {
    fn report(&mut self, stage: Stage, progress: f64, message: &str) -> anyhow::Result<()>;
}

impl<F> ProgressSink for F
where
    F: FnMut(Stage, f64, &str) -> anyhow::Result<()>,
{
    fn report(&mut self, stage: Stage, progress: f64, message: &str) -> anyhow::Result<()> {
        self(stage, progress, message)
    }
}

/// Tunables that are not part of the user-facing parameter schema
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PipelineOptions {
    /// Background model scale in pixels (median window is twice this)
    pub background_sigma: f64,
    /// Luminance above which a local maximum is treated as a star
    pub star_threshold: f64,
}

impl Default for PipelineOptions {
    fn default() -> Self {
        Self {
            background_sigma: DEFAULT_BACKGROUND_SIGMA,
            star_threshold: DEFAULT_STAR_THRESHOLD,
        }
    }
}

/// Outcome of one run, serialized with camelCase keys
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ProcessingResult {
    pub success: bool,
    pub output_fits_path: PathBuf,
    pub output_preview_path: PathBuf,
    pub target_type: TargetType,
    /// Effective parameters after target defaults were applied
    pub processing_params: ProcessingParams,
    /// Wall-clock seconds
    pub processing_time: f64,
    pub error_message: Option<String>,
}

struct Outputs {
    fits: PathBuf,
    preview: PathBuf,
}

/// Forwards stage events to the optional sink and the log
struct Reporter<'a> {
    sink: Option<&'a mut dyn ProgressSink>,
}

impl Reporter<'_> {
    fn report(&mut self, stage: Stage, message: &str) {
        debug!("[{:>4.0}%] {}: {}", stage.progress() * 100.0, stage, message);
        if let Some(sink) = self.sink.as_deref_mut() {
            if let Err(e) = sink.report(stage, stage.progress(), message) {
                warn!("Progress callback failed at stage {}: {:#}", stage, e);
            }
        }
    }
}

/// Image processing pipeline with an optional target classifier
#[derive(Default)]
pub struct Pipeline {
    classifier: Option<Box<dyn TargetClassifier>>,
    options: PipelineOptions,
}

impl Pipeline {
    pub fn new(options: PipelineOptions) -> Self {
        Self {
            classifier: None,
            options,
        }
    }

    pub fn with_classifier(mut self, classifier: Box<dyn TargetClassifier>) -> Self {
        self.classifier = Some(classifier);
        self
    }

    /// Process `input` and write the outputs into `output_dir`.
    ///
    /// `object_name` is only consulted when the target selection is `auto`.
    /// Never panics on bad input; check `success` on the result.
    pub fn process(
        &self,
        input: &Path,
        output_dir: &Path,
        params: &ProcessingParams,
        object_name: Option<&str>,
        progress: Option<&mut dyn ProgressSink>,
    ) -> ProcessingResult {
        let start = Instant::now();
        let mut reporter = Reporter { sink: progress };
        let mut resolved = None;

        let outcome = self.run(
            input,
            output_dir,
            params,
            object_name,
            &mut reporter,
            &mut resolved,
        );
        let processing_time = start.elapsed().as_secs_f64();

        let (target_type, processing_params) = match resolved {
            Some(r) => (r.target_type, r.to_params()),
            None => (TargetType::Unknown, params.clone()),
        };

        match outcome {
            Ok(outputs) => {
                info!(
                    "Processing of {} completed in {:.2}s",
                    input.display(),
                    processing_time
                );
                ProcessingResult {
                    success: true,
                    output_fits_path: outputs.fits,
                    output_preview_path: outputs.preview,
                    target_type,
                    processing_params,
                    processing_time,
                    error_message: None,
                }
            }
            Err(e) => {
                warn!("Processing of {} failed: {}", input.display(), e);
                ProcessingResult {
                    success: false,
                    output_fits_path: PathBuf::new(),
                    output_preview_path: PathBuf::new(),
                    target_type,
                    processing_params,
                    processing_time,
                    error_message: Some(e.to_string()),
                }
            }
        }
    }

    fn run(
        &self,
        input: &Path,
        output_dir: &Path,
        params: &ProcessingParams,
        object_name: Option<&str>,
        reporter: &mut Reporter<'_>,
        resolved_out: &mut Option<ResolvedParams>,
    ) -> Result<Outputs, ProcessError> {
        reporter.report(Stage::Init, "Starting processing");
        fs::create_dir_all(output_dir)
            .with_context(|| {
                format!("Failed to create output directory: {}", output_dir.display())
            })
            .map_err(|e| ProcessError::stage(Stage::Init.name(), e))?;
        let (fits_path, preview_path) =
            output_paths(input, output_dir, &output_timestamp(chrono::Local::now()));

        reporter.report(Stage::Loading, &format!("Loading {}", input.display()));
        let (raster, header) = fits::load(input).map_err(|e| ProcessError::input(input, e))?;
        info!(
            "Loaded {} with shape {:?}",
            input.display(),
            raster.shape()
        );

        reporter.report(Stage::Classifying, "Resolving target type");
        let target = self.resolve_target(params.target_type, object_name);
        let resolved = params.resolve(target);
        *resolved_out = Some(resolved);
        info!(
            "Processing as {}: stretch={} ({}), background={}, stars={}, noise={}, contrast={}",
            resolved.target_type,
            resolved.stretch_method,
            resolved.stretch_factor,
            resolved.background_removal,
            resolved.star_reduction,
            resolved.noise_reduction,
            resolved.contrast
        );

        let raster = self.apply_filters(raster, &resolved, reporter);

        reporter.report(
            Stage::SavingFits,
            &format!("Writing {}", fits_path.display()),
        );
        fits::save(&raster, &fits_path, &header)
            .map_err(|e| ProcessError::stage(Stage::SavingFits.name(), e))?;

        reporter.report(
            Stage::SavingPreview,
            &format!("Writing {}", preview_path.display()),
        );
        render_preview(&raster, &preview_path)
            .map_err(|e| ProcessError::stage(Stage::SavingPreview.name(), e))?;

        reporter.report(Stage::Complete, "Processing complete");
        Ok(Outputs {
            fits: fits_path,
            preview: preview_path,
        })
    }

    /// Filters in fixed order; every stage is reported even when disabled
    fn apply_filters(
        &self,
        mut raster: Raster,
        resolved: &ResolvedParams,
        reporter: &mut Reporter<'_>,
    ) -> Raster {
        if resolved.background_removal {
            reporter.report(Stage::Background, "Removing background gradient");
            raster = remove_background(&raster, self.options.background_sigma);
        } else {
            reporter.report(Stage::Background, "Background removal disabled, skipping");
        }

        if resolved.color_calibration && raster.is_color() {
            reporter.report(Stage::Calibration, "Calibrating color balance");
            raster = color_calibrate(&raster);
        } else {
            reporter.report(Stage::Calibration, "Color calibration not applicable, skipping");
        }

        reporter.report(
            Stage::Stretch,
            &format!("Applying {} stretch", resolved.stretch_method),
        );
        raster = stretch(&raster, resolved.stretch_method, resolved.stretch_factor);

        if resolved.contrast > 1.0 {
            reporter.report(Stage::Contrast, "Enhancing contrast");
            raster = enhance_contrast(&raster, resolved.contrast);
        } else {
            reporter.report(Stage::Contrast, "Contrast unchanged, skipping");
        }

        if resolved.star_reduction {
            reporter.report(Stage::Stars, "Reducing stars");
            raster = reduce_stars(&raster, self.options.star_threshold);
        } else {
            reporter.report(Stage::Stars, "Star reduction disabled, skipping");
        }

        if resolved.noise_reduction > 0.0 {
            reporter.report(Stage::Noise, "Reducing noise");
            raster = reduce_noise(&raster, resolved.noise_reduction);
        } else {
            reporter.report(Stage::Noise, "Noise reduction disabled, skipping");
        }

        raster.clipped()
    }

    fn resolve_target(&self, selection: TargetSelection, object_name: Option<&str>) -> TargetType {
        let name = match selection {
            TargetSelection::Fixed(target) => return target,
            TargetSelection::Auto => match object_name.map(str::trim) {
                Some(name) if !name.is_empty() => name,
                _ => {
                    debug!("No object name given, target type is unknown");
                    return TargetType::Unknown;
                }
            },
        };

        let Some(classifier) = &self.classifier else {
            warn!("No target classifier configured, treating {} as unknown", name);
            return TargetType::Unknown;
        };

        match classifier.classify(name) {
            Ok(target) => {
                info!("Auto-classified {} as {}", name, target);
                target
            }
            Err(e) => {
                warn!("Failed to classify {}: {:#}", name, e);
                TargetType::Unknown
            }
        }
    }
}

/// Process with default options and no classifier
pub fn process(
    input: &Path,
    output_dir: &Path,
    params: &ProcessingParams,
    object_name: Option<&str>,
    progress: Option<&mut dyn ProgressSink>,
) -> ProcessingResult {
    Pipeline::default().process(input, output_dir, params, object_name, progress)
}
