use anyhow::{Context, Result};
use clap::{Args, Parser, Subcommand};
use std::fs;
use std::path::{Path, PathBuf};

use crate::filters::{DEFAULT_BACKGROUND_SIGMA, DEFAULT_STAR_THRESHOLD};
use crate::params::{ProcessingParams, StretchMethod, TargetSelection};
use crate::pipeline::PipelineOptions;

#[derive(Parser)]
#[command(name = "fits-polish")]
#[command(about = "Stretch and enhance astronomical FITS exposures", long_about = None)]
#[command(version)]
pub struct Cli {
    /// Enable debug logging
    #[arg(short, long, global = true)]
    pub verbose: bool,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Process a FITS file into a stretched FITS file and a PNG preview
    Process(ProcessArgs),

    /// Classify an object name using the built-in catalog
    Classify {
        /// Object name, e.g. "M42" or "NGC 7000"
        name: String,
    },

    /// Show the default processing parameters for a target type
    Defaults {
        /// Target type, e.g. emission_nebula or galaxy
        target: String,
    },
}

#[derive(Args, Debug, Clone)]
pub struct ProcessArgs {
    /// Input FITS file
    pub input: PathBuf,

    /// Output directory (default: processed/ next to the input)
    #[arg(short, long)]
    pub output_dir: Option<PathBuf>,

    /// JSON file with processing parameters; flags below override it
    #[arg(long)]
    pub params: Option<PathBuf>,

    /// Target type or "auto"
    #[arg(long)]
    pub target_type: Option<String>,

    /// Stretch method (statistical, arcsinh, log)
    #[arg(long)]
    pub stretch_method: Option<String>,

    /// Stretch factor; 0 uses the target type default
    #[arg(long)]
    pub stretch_factor: Option<f64>,

    /// Disable background gradient removal
    #[arg(long)]
    pub no_background_removal: bool,

    /// Enable star reduction
    #[arg(long)]
    pub star_reduction: bool,

    /// Disable color calibration
    #[arg(long)]
    pub no_color_calibration: bool,

    /// Noise reduction strength (0-1)
    #[arg(long)]
    pub noise_reduction: Option<f64>,

    /// Contrast multiplier (1.0 = unchanged)
    #[arg(long)]
    pub contrast: Option<f64>,

    /// Object name used for automatic target classification
    #[arg(long)]
    pub object_name: Option<String>,

    /// Background model scale in pixels
    #[arg(long, default_value_t = DEFAULT_BACKGROUND_SIGMA)]
    pub background_sigma: f64,

    /// Luminance threshold for star detection
    #[arg(long, default_value_t = DEFAULT_STAR_THRESHOLD)]
    pub star_threshold: f64,
}

impl ProcessArgs {
    /// Parameters from the optional JSON file with command-line overrides applied
    pub fn processing_params(&self) -> Result<ProcessingParams> {
        let mut params = match &self.params {
            Some(path) => load_params(path)?,
            None => ProcessingParams::default(),
        };

        if let Some(target) = &self.target_type {
            params.target_type = TargetSelection::from(target.clone());
        }
        if let Some(method) = &self.stretch_method {
            params.stretch_method = StretchMethod::parse_lenient(method);
        }
        if let Some(factor) = self.stretch_factor {
            params.stretch_factor = factor;
        }
        if self.no_background_removal {
            params.background_removal = false;
        }
        if self.star_reduction {
            params.star_reduction = true;
        }
        if self.no_color_calibration {
            params.color_calibration = false;
        }
        if let Some(noise) = self.noise_reduction {
            params.noise_reduction = noise;
        }
        if let Some(contrast) = self.contrast {
            params.contrast = contrast;
        }

        Ok(params)
    }

    pub fn pipeline_options(&self) -> PipelineOptions {
        PipelineOptions {
            background_sigma: self.background_sigma,
            star_threshold: self.star_threshold,
        }
    }
}

pub fn load_params(path: &Path) -> Result<ProcessingParams> {
    let text = fs::read_to_string(path)
        .with_context(|| format!("Failed to read parameter file: {}", path.display()))?;
    serde_json::from_str(&text)
        .with_context(|| format!("Failed to parse parameter file: {}", path.display()))
}
