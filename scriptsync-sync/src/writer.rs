//! Atomic script-file writer and orphan cleanup used by pull.
//!
//! ## `write_script` protocol
//!
//! 1. Encode content (already done by caller).
//! 2. Compare with the bytes currently on disk → skip if identical.
//! 3. Write to `<path>.scriptsync.tmp`.
//! 4. Rename to final path (atomic on POSIX).
//! 5. Record the SHA-256 in the hash store (caller saves the store).
//!
//! Skipping identical content keeps repeated pulls from touching mtimes, so
//! file watchers stay quiet.

use std::collections::HashSet;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use scriptsync_core::filename::is_script_file;

use crate::error::{io_err, SyncError};
use crate::hash_store::{self, HashStore};

/// Outcome of one file operation during a pull.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum WriteResult {
    /// File was written (content changed or did not previously exist).
    Written { path: PathBuf },
    /// File already held exactly this content.
    Unchanged { path: PathBuf },
    /// File had no remote counterpart and was deleted.
    Removed { path: PathBuf },
}

impl WriteResult {
    pub fn path(&self) -> &Path {
        match self {
            WriteResult::Written { path }
            | WriteResult::Unchanged { path }
            | WriteResult::Removed { path } => path,
        }
    }
}

/// Atomically write one script file and record its hash.
pub(crate) fn write_script(
    path: &Path,
    content: &str,
    hashes: &mut HashStore,
) -> Result<WriteResult, SyncError> {
    let tmp = PathBuf::from(format!("{}.scriptsync.tmp", path.display()));
    write_script_with_tmp(path, content, hashes, &tmp)
}

fn write_script_with_tmp(
    path: &Path,
    content: &str,
    hashes: &mut HashStore,
    tmp: &Path,
) -> Result<WriteResult, SyncError> {
    let key = hash_store::key_for(path);
    let digest = hash_store::digest(content);

    match std::fs::read_to_string(path) {
        Ok(existing) if existing == content => {
            hashes.insert(key, digest);
            tracing::debug!("unchanged: {}", path.display());
            return Ok(WriteResult::Unchanged {
                path: path.to_path_buf(),
            });
        }
        Ok(_) => {}
        Err(err) if err.kind() == ErrorKind::NotFound || err.kind() == ErrorKind::InvalidData => {}
        Err(err) => return Err(io_err(path, err)),
    }

    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent).map_err(|e| io_err(parent, e))?;
    }
    std::fs::write(tmp, content).map_err(|e| io_err(tmp, e))?;

    if let Err(e) = std::fs::rename(tmp, path) {
        let _ = std::fs::remove_file(tmp);
        return Err(io_err(path, e));
    }

    hashes.insert(key, digest);
    tracing::info!("wrote: {}", path.display());
    Ok(WriteResult::Written {
        path: path.to_path_buf(),
    })
}

/// Delete every script file directly in `dir` that is not in `keep`.
///
/// Only called after all of a pull's writes have landed.
pub(crate) fn remove_orphans(
    dir: &Path,
    keep: &HashSet<PathBuf>,
    hashes: &mut HashStore,
) -> Result<Vec<WriteResult>, SyncError> {
    if !dir.exists() {
        return Ok(vec![]);
    }
    let mut orphans: Vec<PathBuf> = std::fs::read_dir(dir)
        .map_err(|e| io_err(dir, e))?
        .filter_map(|e| e.ok())
        .filter(|e| e.file_type().map(|t| t.is_file()).unwrap_or(false))
        .map(|e| e.path())
        .filter(|p| is_script_file(p) && !keep.contains(p))
        .collect();
    orphans.sort();

    let mut removed = Vec::with_capacity(orphans.len());
    for path in orphans {
        std::fs::remove_file(&path).map_err(|e| io_err(&path, e))?;
        hashes.remove(&hash_store::key_for(&path));
        tracing::info!("removed orphan: {}", path.display());
        removed.push(WriteResult::Removed { path });
    }
    Ok(removed)
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
