use anyhow::Result;

use crate::params::{ProcessingParams, TargetType};

/// Print the parameters a run would start from for `target`
pub fn show_defaults(target: &str) -> Result<ProcessingParams> {
    let target = TargetType::parse_lenient(target);
    let params = ProcessingParams::defaults_for(target);

    let output = serde_json::json!({
        "targetType": target,
        "defaults": target.defaults(),
        "processingParams": params,
    });
    println!("{}", serde_json::to_string_pretty(&output)?);
    Ok(params)
}
