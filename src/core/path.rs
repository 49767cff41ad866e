// logtail - core/path.rs
//
// Source identifier safety.
//
// Two layers:
//   1. `validate_identifier` - the simplified token policy: reject any
//      identifier containing `..` or carrying an absolute-path prefix. This
//      misses encoded and symlink-based traversal on its own.
//   2. `resolve_under` - joins the identifier onto the log directory,
//      canonicalises both, and rejects results that escape the directory.
//      This closes the symlink gap for sources that exist.

use crate::util::error::TailError;
use std::path::{Path, PathBuf};

/// Reject identifiers containing parent-directory tokens or an absolute
/// prefix (`/`, `\`, or a Windows drive such as `C:`).
pub fn validate_identifier(identifier: &str) -> Result<(), TailError> {
    if identifier.is_empty() {
        return Err(TailError::invalid_query("filename must not be empty"));
    }
    if identifier.contains("..") {
        return Err(TailError::invalid_query(
            "filename must not contain '..' segments",
        ));
    }
    if identifier.starts_with('/') || identifier.starts_with('\\') || has_drive_prefix(identifier)
    {
        return Err(TailError::invalid_query("filename must be a relative path"));
    }
    if identifier.contains('\0') {
        return Err(TailError::invalid_query("filename must not contain NUL"));
    }
    Ok(())
}

fn has_drive_prefix(identifier: &str) -> bool {
    let bytes = identifier.as_bytes();
    bytes.len() >= 2 && bytes[0].is_ascii_alphabetic() && bytes[1] == b':'
}

/// Resolve a validated identifier to a path inside `base`.
///
/// Returns `SourceNotFound` when the target does not exist and
/// `InvalidQuery` when it exists but canonicalises outside `base`.
pub fn resolve_under(base: &Path, identifier: &str) -> Result<PathBuf, TailError> {
    validate_identifier(identifier)?;

    let candidate = base.join(identifier);
    let resolved = candidate
        .canonicalize()
        .map_err(|e| TailError::SourceNotFound {
            path: candidate.clone(),
            source: Some(e),
        })?;
    let base_resolved = base.canonicalize().map_err(|e| TailError::SourceNotFound {
        path: base.to_path_buf(),
        source: Some(e),
    })?;

    if !resolved.starts_with(&base_resolved) {
        tracing::warn!(
            identifier,
            resolved = %resolved.display(),
            "Rejected identifier resolving outside the log directory"
        );
        return Err(TailError::invalid_query(
            "filename resolves outside the log directory",
        ));
    }
    Ok(resolved)
}
