//! Archived thread input: a previously written posts JSON file.

use super::records_from_json;
use crate::models::{AdapterKind, RawRecord};
use anyhow::{bail, Context, Result};
use std::path::{Path, PathBuf};
use tracing::{debug, warn};
use walkdir::WalkDir;

/// Load raw records from a JSON archive.
///
/// Accepts the canonical posts array this tool writes, or an object
/// wrapping the array (`{"tweets": [...]}` and similar).
pub fn load_archive(path: &Path) -> Result<Vec<RawRecord>> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read archive: {}", path.display()))?;

    let value: serde_json::Value = serde_json::from_str(&content)
        .with_context(|| format!("Failed to parse archive JSON: {}", path.display()))?;

    let Some(records) = records_from_json(AdapterKind::Archive, value) else {
        bail!(
            "Archive {} is not a list of posts (expected an array or an object with a \"tweets\" array)",
            path.display()
        );
    };

    debug!("Loaded {} records from {}", records.len(), path.display());
    Ok(records)
}

/// Whether `path` names a JSON file by extension.
pub fn is_json_file(path: &Path) -> bool {
    path.extension()
        .and_then(|ext| ext.to_str())
        .is_some_and(|ext| ext.eq_ignore_ascii_case("json"))
}

/// Every `*.json` file under `dir`, sorted by path.
pub fn find_archives(dir: &Path) -> Result<Vec<PathBuf>> {
    if !dir.is_dir() {
        bail!("Not a directory: {}", dir.display());
    }

    let mut files: Vec<PathBuf> = WalkDir::new(dir)
        .follow_links(false)
        .into_iter()
        .filter_map(|entry| match entry {
            Ok(entry) => Some(entry),
            Err(e) => {
                warn!("Skipping unreadable entry: {}", e);
                None
            }
        })
        .filter(|entry| entry.file_type().is_file() && is_json_file(entry.path()))
        .map(|entry| entry.into_path())
        .collect();

    files.sort();
    Ok(files)
}
