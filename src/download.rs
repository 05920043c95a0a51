//! Saving edit results to disk.

use crate::error::{ClearViewError, Result};
use crate::session::SessionState;
use std::path::{Path, PathBuf};
use std::time::{SystemTime, UNIX_EPOCH};

/// File name prefix for downloaded results.
pub const FILE_NAME_PREFIX: &str = "clearview-edited";

/// Builds `clearview-edited-<epoch-ms>.png` for the given instant.
pub fn default_file_name(now: SystemTime) -> String {
    let millis = now
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_millis())
        .unwrap_or_default();
    format!("{FILE_NAME_PREFIX}-{millis}.png")
}

/// Resolves where a download should be written.
///
/// `None` means the current directory; a directory target gets the default
/// file name appended.
pub fn resolve_target(target: Option<&Path>, now: SystemTime) -> PathBuf {
    match target {
        None => PathBuf::from(default_file_name(now)),
        Some(path) if path.is_dir() => path.join(default_file_name(now)),
        Some(path) => path.to_path_buf(),
    }
}

/// Writes the current result of `state` to disk and returns the path used.
pub async fn download(state: &SessionState, target: Option<&Path>) -> Result<PathBuf> {
    let result = state
        .result()
        .ok_or_else(|| ClearViewError::InvalidRequest("there is no result to download".into()))?;

    let path = resolve_target(target, SystemTime::now());
    let written = result.save(&path).await?;
    tracing::debug!(path = %path.display(), bytes = written, "saved edit result");
    Ok(path)
}
