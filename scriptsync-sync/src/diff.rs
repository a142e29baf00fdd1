//! Unified diff text for a reconciled entry.

use std::io::ErrorKind;
use std::path::Path;

use similar::TextDiff;

use scriptsync_core::codec;

use crate::error::{io_err, SyncError};
use crate::reconcile::DiffEntry;

/// `--- a/<remote>` / `+++ b/<local>` diff of one entry, or `None` when the
/// two sides render identically.
///
/// The remote side is the encoded remote record; the local side is the file
/// as it sits on disk. A missing side diffs as empty text.
pub fn unified_diff(entry: &DiffEntry) -> Result<Option<String>, SyncError> {
    let remote = entry.remote.as_ref().map(codec::encode).unwrap_or_default();
    let local = match &entry.local_path {
        Some(path) => read_existing_or_empty(path)?,
        None => String::new(),
    };
    let remote = normalize_line_endings(&remote);
    if remote == local {
        return Ok(None);
    }

    let name = entry
        .local_path
        .as_deref()
        .and_then(Path::file_name)
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| entry.key_string());
    let old_header = format!("a/{}/{name}", entry.variant.dir_name());
    let new_header = format!("b/{}/{name}", entry.variant.dir_name());
    let unified = TextDiff::from_lines(&remote, &local)
        .unified_diff()
        .header(&old_header, &new_header)
        .context_radius(3)
        .to_string();
    Ok(Some(unified))
}

fn read_existing_or_empty(path: &Path) -> Result<String, SyncError> {
    match std::fs::read_to_string(path) {
        Ok(content) => Ok(normalize_line_endings(&content)),
        Err(err) if err.kind() == ErrorKind::NotFound => Ok(String::new()),
        Err(err) => Err(io_err(path, err)),
    }
}

fn normalize_line_endings(content: &str) -> String {
    content.replace("\r\n", "\n")
}
