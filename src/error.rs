use std::path::PathBuf;
use thiserror::Error;

/// Failures that stop a processing run
#[derive(Debug, Error)]
pub enum ProcessError {
    /// The input file is missing, unreadable, or not a usable FITS raster
    #[error("Failed to load {}: {source:#}", path.display())]
    Input {
        path: PathBuf,
        source: anyhow::Error,
    },

    /// A filter or output step failed
    #[error("Stage '{stage}' failed: {source:#}")]
    Stage {
        stage: &'static str,
        source: anyhow::Error,
    },
}

impl ProcessError {
    pub fn input(path: impl Into<PathBuf>, source: anyhow::Error) -> Self {
        ProcessError::Input {
            path: path.into(),
            source,
        }
    }

    pub fn stage(stage: &'static str, source: anyhow::Error) -> Self {
        ProcessError::Stage { stage, source }
    }
}
