use crate::error::ConfigError;
use anyhow::{Context, Result};
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::fs;
use std::path::Path;
use tracing::warn;

/// Reads a whole JSON array from `path`.
///
/// A missing file is an empty list. A file that exists but cannot be read or
/// parsed is an error, so callers that rewrite the file never drop entries.
pub fn read_json_list<T: DeserializeOwned>(path: &Path) -> Result<Vec<T>, ConfigError> {
    if !path.exists() {
        return Ok(Vec::new());
    }

    let content = fs::read_to_string(path).map_err(|e| ConfigError::IoError {
        path: path.display().to_string(),
        msg: e.to_string(),
    })?;

    serde_json::from_str(&content).map_err(|e| ConfigError::ParseError {
        path: path.display().to_string(),
        reason: e.to_string(),
    })
}

/// Lenient [`read_json_list`]: any failure is logged and read as an empty
/// list.
pub fn load_json_list<T: DeserializeOwned>(path: &Path) -> Vec<T> {
    match read_json_list(path) {
        Ok(items) => items,
        Err(e) => {
            warn!("Ignoring {}", e);
            Vec::new()
        }
    }
}

/// Overwrites `path` with `items` as a pretty-printed JSON array.
pub fn save_json_list<T: Serialize>(path: &Path, items: &[T]) -> Result<()> {
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        fs::create_dir_all(parent)
            .with_context(|| format!("Failed to create {}", parent.display()))?;
    }
    let json = serde_json::to_string_pretty(items)?;
    fs::write(path, json).with_context(|| format!("Failed to write {}", path.display()))
}
