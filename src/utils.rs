use chrono::{DateTime, Local};
use std::path::{Path, PathBuf};

/// Millisecond-resolution stamp used in output file names
pub fn output_timestamp(now: DateTime<Local>) -> String {
    now.format("%Y%m%d_%H%M%S_%3f").to_string()
}

/// File stem of the input, falling back to "image" for odd paths
pub fn input_stem(input: &Path) -> String {
    input
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .filter(|s| !s.is_empty())
        .unwrap_or_else(|| "image".to_string())
}

/// `(fits, preview)` output paths for one run
pub fn output_paths(input: &Path, output_dir: &Path, timestamp: &str) -> (PathBuf, PathBuf) {
    let stem = input_stem(input);
    (
        output_dir.join(format!("{}_processed_{}.fits", stem, timestamp)),
        output_dir.join(format!("{}_preview_{}.png", stem, timestamp)),
    )
}

/// `processed/` next to the input file
pub fn default_output_dir(input: &Path) -> PathBuf {
    input
        .parent()
        .unwrap_or_else(|| Path::new("."))
        .join("processed")
}
