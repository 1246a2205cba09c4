//! Subcommand implementations.

pub mod consume;
pub mod idf;

use anyhow::{Context, Result};
use serde::Serialize;
use serde_json::Value;
use std::path::Path;

/// Serializes the command's arguments for the `cmd`/`pcmd` output fields.
pub(crate) fn meta<T: Serialize>(args: &T) -> Result<Value> {
    serde_json::to_value(args).context("could not serialize arguments")
}

/// Writes a JSON value to a file, creating parent directories.
///
/// The JSON is rendered before the file is touched, so a serialization
/// failure leaves no partial output behind.
pub(crate) fn save(path: &Path, value: &Value) -> Result<()> {
    let rendered = serde_json::to_string_pretty(value).context("could not render output")?;

    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() {
            std::fs::create_dir_all(parent)
                .with_context(|| format!("could not create {}", parent.display()))?;
        }
    }

    std::fs::write(path, rendered).with_context(|| format!("could not write {}", path.display()))
}
