use anyhow::Result;
use tracing::info;

use crate::classify::CatalogClassifier;
use crate::cli::ProcessArgs;
use crate::pipeline::{Pipeline, ProcessingResult, Stage};
use crate::utils::default_output_dir;

/// Run the pipeline for one file and print the result record as JSON
pub fn process_file(args: &ProcessArgs) -> Result<ProcessingResult> {
    let params = args.processing_params()?;
    let output_dir = args
        .output_dir
        .clone()
        .unwrap_or_else(|| default_output_dir(&args.input));

    let pipeline =
        Pipeline::new(args.pipeline_options()).with_classifier(Box::new(CatalogClassifier::new()?));

    let mut log_progress = |stage: Stage, progress: f64, message: &str| -> Result<()> {
        info!("[{:>3.0}%] {}: {}", progress * 100.0, stage, message);
        Ok(())
    };

    let result = pipeline.process(
        &args.input,
        &output_dir,
        &params,
        args.object_name.as_deref(),
        Some(&mut log_progress),
    );

    println!("{}", serde_json::to_string_pretty(&result)?);
    Ok(result)
}
