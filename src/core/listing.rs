// logtail - core/listing.rs
//
// Recursive listing of the files a node can serve.
//
// Reads only metadata (size, mtime), never contents. Per-entry traversal
// errors are non-fatal: they are logged and the entry is skipped so one
// unreadable subdirectory does not hide the rest of the tree.

use crate::core::model::{LogFileInfo, LogListing};
use crate::core::path;
use crate::util::error::TailError;
use crate::util::format::format_bytes;
use chrono::{DateTime, Utc};
use std::path::Path;
use walkdir::WalkDir;

/// List every regular file under `base` (or under `base/directory`),
/// sorted by relative path.
///
/// `directory` goes through the same identifier check as file names.
pub fn list_logs(base: &Path, directory: Option<&str>) -> Result<LogListing, TailError> {
    let base_resolved = base.canonicalize().map_err(|e| TailError::SourceNotFound {
        path: base.to_path_buf(),
        source: Some(e),
    })?;
    let search_dir = match directory {
        Some(dir) if !dir.is_empty() => path::resolve_under(&base_resolved, dir)?,
        _ => base_resolved.clone(),
    };
    if !search_dir.is_dir() {
        return Err(TailError::SourceNotFound {
            path: search_dir,
            source: None,
        });
    }

    let mut files = Vec::new();
    for entry in WalkDir::new(&search_dir).follow_links(false) {
        let entry = match entry {
            Ok(e) => e,
            Err(e) => {
                tracing::warn!(error = %e, "Skipping unreadable entry during listing");
                continue;
            }
        };
        if !entry.file_type().is_file() {
            continue;
        }
        let meta = match entry.metadata() {
            Ok(m) => m,
            Err(e) => {
                tracing::debug!(path = %entry.path().display(), error = %e, "Cannot stat file");
                continue;
            }
        };
        let Ok(relative) = entry.path().strip_prefix(&base_resolved) else {
            continue;
        };
        let filename = relative
            .components()
            .map(|c| c.as_os_str().to_string_lossy())
            .collect::<Vec<_>>()
            .join("/");

        files.push(LogFileInfo {
            filename,
            size_bytes: meta.len(),
            size_readable: format_bytes(meta.len()),
            modified: meta.modified().ok().map(DateTime::<Utc>::from),
        });
    }
    files.sort_by(|a, b| a.filename.cmp(&b.filename));

    tracing::debug!(dir = %search_dir.display(), files = files.len(), "Listed log files");
    Ok(LogListing {
        directory: directory
            .filter(|d| !d.is_empty())
            .map(str::to_owned)
            .unwrap_or_else(|| base.display().to_string()),
        total_files: files.len(),
        files,
    })
}
