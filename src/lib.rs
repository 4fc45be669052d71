pub mod ai;
pub mod episode;
pub mod error;
pub mod evaluate;
pub mod parse;
pub mod prompts;
pub mod qa;
pub mod splitter;
pub mod store;

use std::path::Path;

/// Read a whole JSON document into memory. Object key order is preserved.
pub async fn load_json(path: &Path) -> Result<serde_json::Value, error::PlotlineError> {
    let raw = tokio::fs::read_to_string(path).await?;
    Ok(serde_json::from_str(&raw)?)
}
