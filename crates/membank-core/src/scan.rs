//! Corpus walker.
//!
//! Enumerates the tracked documents under a corpus root, skipping the
//! engine's own bookkeeping directories so state files and versions
//! are never tracked as documents.

use crate::CoreError;
use ignore::WalkBuilder;
use std::path::Path;
use tracing::debug;

/// Subdirectories owned by the engine itself, never part of the corpus.
const INTERNAL_DIRS: [&str; 3] = ["sync", "versions", "index"];

/// List all tracked documents under `root` as sorted relative paths.
///
/// Hidden files are skipped, `.gitignore` rules are honored, and the
/// result is sorted so repeated scans of an unchanged tree are
/// byte-identical.
pub fn list_documents(root: &Path) -> Result<Vec<String>, CoreError> {
    if !root.is_dir() {
        return Err(CoreError::InvalidRoot(root.to_path_buf()));
    }

    let mut paths = Vec::new();

    for entry in WalkBuilder::new(root)
        .hidden(true)
        .git_ignore(true)
        .build()
    {
        let entry = match entry {
            Ok(entry) => entry,
            Err(e) => {
                // Don't fail the entire walk for individual errors
                debug!(error = %e, "Walk error");
                continue;
            }
        };

        if !entry.file_type().map(|ft| ft.is_file()).unwrap_or(false) {
            continue;
        }

        let rel = match entry.path().strip_prefix(root) {
            Ok(rel) => rel,
            Err(_) => continue,
        };

        let first = rel
            .components()
            .next()
            .map(|c| c.as_os_str().to_string_lossy().to_string());
        if let Some(first) = first {
            if INTERNAL_DIRS.contains(&first.as_str()) {
                continue;
            }
        }

        paths.push(rel.to_string_lossy().replace('\\', "/"));
    }

    paths.sort();
    Ok(paths)
}
