use anyhow::{Context, Result, bail};
use std::fs::File;
use std::io::Read;
use std::path::Path;
use tracing::debug;

use super::ConfigValue;

/// Load a document from a string slice.
pub fn load_from_str(s: &str) -> Result<ConfigValue> {
    let doc: ConfigValue =
        serde_json::from_str(s).context("Failed to parse JSON document string")?;
    validate_document(&doc)?;
    Ok(doc)
}

/// Load a document from any reader (e.g., a file).
pub fn load_from_reader<R: Read>(reader: R) -> Result<ConfigValue> {
    let doc: ConfigValue =
        serde_json::from_reader(reader).context("Failed to parse JSON document from reader")?;
    validate_document(&doc)?;
    Ok(doc)
}

/// Load a document from a file path synchronously.
pub fn load_from_path<P: AsRef<Path>>(path: P) -> Result<ConfigValue> {
    let path_ref = path.as_ref();
    let file = File::open(path_ref)
        .with_context(|| format!("Failed to open document {}", path_ref.display()))?;
    let doc = load_from_reader(file)
        .with_context(|| format!("Failed to load document {}", path_ref.display()))?;
    debug!(target: "keyweave::config", "Loaded document from {}", path_ref.display());
    Ok(doc)
}

/// Load a document from a file path asynchronously (Tokio).
pub async fn load_from_path_async<P: AsRef<Path>>(path: P) -> Result<ConfigValue> {
    use tokio::fs;
    let path_ref = path.as_ref();
    let bytes = fs::read(path_ref)
        .await
        .with_context(|| format!("Failed to read document {}", path_ref.display()))?;
    let doc: ConfigValue = serde_json::from_slice(&bytes)
        .with_context(|| format!("Failed to parse JSON document {}", path_ref.display()))?;
    validate_document(&doc)?;
    debug!(target: "keyweave::config", "Loaded document from {}", path_ref.display());
    Ok(doc)
}

/// Reject documents the compiler could never accept, before compiling.
///
/// Only the root is checked here; everything below it is the compiler's job so
/// that errors carry a nesting trail.
pub fn validate_document(doc: &ConfigValue) -> Result<()> {
    if doc.is_null() {
        bail!("Document is empty (null)");
    }
    Ok(())
}
