//! Input discovery: expand directories into the spreadsheets they hold.

use std::collections::HashSet;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};

use crate::WORKBOOK_EXTENSIONS;

/// Whether `path` has an extension one of our readers handles.
pub fn is_supported(path: &Path) -> bool {
    path.extension()
        .and_then(|e| e.to_str())
        .map(|e| {
            let e = e.to_lowercase();
            e == "csv" || WORKBOOK_EXTENSIONS.contains(&e.as_str())
        })
        .unwrap_or(false)
}

/// Office lock files (`~$name.xlsx`) sit next to open workbooks.
fn is_lock_file(path: &Path) -> bool {
    path.file_name()
        .and_then(|n| n.to_str())
        .is_some_and(|n| n.starts_with("~$"))
}

/// Expand each directory into its supported files (sorted by name);
/// pass files through unchanged. Duplicates keep their first position.
///
/// Paths that do not exist are passed through so the reader reports them.
pub fn collect_inputs(paths: &[PathBuf]) -> Result<Vec<PathBuf>> {
    let mut seen = HashSet::new();
    let mut out = Vec::new();

    for path in paths {
        if path.is_dir() {
            let mut found: Vec<PathBuf> = std::fs::read_dir(path)
                .with_context(|| format!("failed to list {}", path.display()))?
                .filter_map(|entry| entry.ok().map(|e| e.path()))
                .filter(|p| p.is_file() && is_supported(p) && !is_lock_file(p))
                .collect();
            found.sort();
            tracing::debug!(dir = %path.display(), files = found.len(), "expanded input directory");
            for file in found {
                if seen.insert(file.clone()) {
                    out.push(file);
                }
            }
        } else if seen.insert(path.clone()) {
            out.push(path.clone());
        }
    }

    Ok(out)
}
