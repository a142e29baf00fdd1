//! Local script repository: turns a directory of script files into records.
//!
//! Identity is resolved from a prioritized source list, first present wins:
//!
//! 1. [`IdentitySource::Metadata`]: the file's `id` header;
//! 2. [`IdentitySource::FileName`]: a leading `<digits>_`, counted only when
//!    the last-pulled snapshot knows that id;
//! 3. [`IdentitySource::SnapshotTitle`]: for files with neither an id prefix
//!    nor `new_`, the single snapshot record carrying the same title.
//!
//! A resolved id known to the snapshot gets the file's fields layered over
//! the snapshot record, so flags the file leaves out keep their pulled values.

use std::collections::BTreeMap;
use std::path::{Component, Path, PathBuf};

use scriptsync_core::{
    codec,
    filename::{infer_identity, is_script_file},
    ScriptId, ScriptRecord, ScriptVariant,
};

use crate::error::{io_err, SyncError};
use crate::hash_store;

/// Where a resolved id came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IdentitySource {
    Metadata,
    FileName,
    SnapshotTitle,
}

/// One candidate in the identity chain.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct IdentityCandidate {
    pub source: IdentitySource,
    pub id: Option<ScriptId>,
}

/// First candidate carrying an id wins.
pub fn resolve_identity(candidates: &[IdentityCandidate]) -> Option<(ScriptId, IdentitySource)> {
    candidates
        .iter()
        .find_map(|c| c.id.map(|id| (id, c.source)))
}

/// A script file decoded into a record.
#[derive(Debug, Clone, PartialEq)]
pub struct LocalScriptFile {
    pub path: PathBuf,
    pub record: ScriptRecord,
    /// `None` for scripts not yet created remotely.
    pub identity: Option<IdentitySource>,
    /// SHA-256 of the file's bytes.
    pub digest: String,
}

/// Decode one file of `variant`, layering onto `known` when its id matches.
pub fn load_file(
    path: &Path,
    variant: ScriptVariant,
    known: &BTreeMap<ScriptId, ScriptRecord>,
) -> Result<LocalScriptFile, SyncError> {
    let text = std::fs::read_to_string(path).map_err(|e| io_err(path, e))?;
    let file_name = path
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_default();
    let from_name = infer_identity(&file_name);
    let partial = codec::decode_script(&text, variant).map_err(|source| SyncError::Decode {
        path: path.to_path_buf(),
        source,
    })?;

    if let (Some(meta), Some(named)) = (partial.id, from_name.id) {
        if meta != named {
            tracing::warn!(
                "{}: id header {meta} disagrees with file name id {named}; using {meta}",
                path.display()
            );
        }
    }

    let title = partial.title.clone().unwrap_or_else(|| from_name.title.clone());
    let by_title = if from_name.id.is_none() && !from_name.is_new {
        unique_title_match(known, &title)
    } else {
        None
    };
    let resolved = resolve_identity(&[
        IdentityCandidate {
            source: IdentitySource::Metadata,
            id: partial.id,
        },
        IdentityCandidate {
            source: IdentitySource::FileName,
            id: from_name.id.filter(|id| known.contains_key(id)),
        },
        IdentityCandidate {
            source: IdentitySource::SnapshotTitle,
            id: by_title,
        },
    ]);

    let record = match resolved.and_then(|(id, _)| known.get(&id)) {
        Some(base) => partial.layer_onto(base),
        None => {
            let mut record = partial.into_record(&from_name.title);
            record.id = resolved.map(|(id, _)| id);
            record
        }
    };

    Ok(LocalScriptFile {
        path: path.to_path_buf(),
        record,
        identity: resolved.map(|(_, source)| source),
        digest: hash_store::digest(&text),
    })
}

fn unique_title_match(known: &BTreeMap<ScriptId, ScriptRecord>, title: &str) -> Option<ScriptId> {
    let mut matches = known.values().filter(|r| r.title == title);
    let first = matches.next()?;
    match matches.next() {
        Some(_) => None,
        None => first.id,
    }
}

/// Decode every script file directly inside `dir`, in file-name order.
///
/// A missing directory yields an empty list. A file that fails to decode
/// aborts the scan. Files resolving to the same id are all returned; callers
/// let the later one shadow the earlier.
pub fn scan(
    dir: &Path,
    variant: ScriptVariant,
    known: &BTreeMap<ScriptId, ScriptRecord>,
) -> Result<Vec<LocalScriptFile>, SyncError> {
    if !dir.exists() {
        return Ok(vec![]);
    }
    let mut paths: Vec<PathBuf> = std::fs::read_dir(dir)
        .map_err(|e| io_err(dir, e))?
        .filter_map(|e| e.ok())
        .filter(|e| e.file_type().map(|t| t.is_file()).unwrap_or(false))
        .map(|e| e.path())
        .filter(|p| is_script_file(p))
        .collect();
    paths.sort();

    let files = paths
        .iter()
        .map(|path| load_file(path, variant, known))
        .collect::<Result<Vec<_>, _>>()?;

    let mut seen = BTreeMap::new();
    for file in &files {
        if let Some(id) = file.record.id {
            if let Some(previous) = seen.insert(id, &file.path) {
                tracing::warn!(
                    "{variant} script {id} appears in both {} and {}; the latter wins",
                    previous.display(),
                    file.path.display()
                );
            }
        }
    }
    Ok(files)
}

/// Collapse files sharing an id, keeping the last in scan order.
/// Files without an id are all kept.
pub fn shadow_duplicates(files: Vec<LocalScriptFile>) -> Vec<LocalScriptFile> {
    let mut last_index = BTreeMap::new();
    for (index, file) in files.iter().enumerate() {
        if let Some(id) = file.record.id {
            last_index.insert(id, index);
        }
    }
    files
        .into_iter()
        .enumerate()
        .filter(|(index, file)| match file.record.id {
            Some(id) => last_index.get(&id) == Some(index),
            None => true,
        })
        .map(|(_, file)| file)
        .collect()
}

/// Guess a variant from the nearest path segment naming one.
pub fn infer_variant(path: &Path) -> Option<ScriptVariant> {
    let parent = path.parent()?;
    parent.components().rev().find_map(|component| {
        let Component::Normal(segment) = component else {
            return None;
        };
        let segment = segment.to_string_lossy().to_ascii_lowercase();
        if segment.contains("server") {
            Some(ScriptVariant::Server)
        } else if segment.contains("client") {
            Some(ScriptVariant::Client)
        } else {
            None
        }
    })
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
