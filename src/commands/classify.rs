use anyhow::Result;

use crate::classify::{CatalogClassifier, TargetInfo};

pub fn classify_object(name: &str) -> Result<TargetInfo> {
    let info = CatalogClassifier::new()?.classify_detailed(name);
    println!("{}", serde_json::to_string_pretty(&info)?);
    Ok(info)
}
