pub mod classify;
pub mod cli;
pub mod commands;
pub mod error;
pub mod filters;
pub mod fits;
pub mod params;
pub mod pipeline;
pub mod preview;
pub mod raster;
pub mod stretch;
pub mod utils;

#[cfg(test)]
mod test_pipeline;

// Re-export commonly used items
pub use classify::{CatalogClassifier, TargetClassifier, TargetInfo};
pub use error::ProcessError;
pub use params::{ProcessingParams, ResolvedParams, StretchMethod, TargetSelection, TargetType};
pub use pipeline::{process, Pipeline, PipelineOptions, ProcessingResult, ProgressSink, Stage};
pub use raster::Raster;
