//! Script file naming: `{id|new}_{sanitized-title}.js`.

use std::path::Path;

use crate::types::ScriptId;

/// Extension of every managed script file.
pub const SCRIPT_EXTENSION: &str = "js";

/// Longest sanitized title kept in a file name, in characters.
pub const MAX_TITLE_CHARS: usize = 50;

/// Prefix used in place of an id for scripts not yet created remotely.
pub const NEW_PREFIX: &str = "new";

const FALLBACK_TITLE: &str = "untitled";

/// Strip path-hostile characters, collapse whitespace runs to `_`, bound the length.
pub fn sanitize_title(title: &str) -> String {
    let kept: String = title.chars().filter(|c| !is_path_hostile(*c)).collect();
    let collapsed = kept.split_whitespace().collect::<Vec<_>>().join("_");
    let bounded: String = collapsed.chars().take(MAX_TITLE_CHARS).collect();
    let trimmed = bounded.trim_matches('.');
    if trimmed.is_empty() {
        FALLBACK_TITLE.to_string()
    } else {
        trimmed.to_string()
    }
}

fn is_path_hostile(c: char) -> bool {
    matches!(c, '/' | '\\' | ':' | '*' | '?' | '"' | '<' | '>' | '|') || c.is_control()
}

/// File name for a script with the given id and title.
pub fn script_file_name(id: Option<ScriptId>, title: &str) -> String {
    let prefix = match id {
        Some(id) => id.to_string(),
        None => NEW_PREFIX.to_string(),
    };
    format!("{prefix}_{}.{SCRIPT_EXTENSION}", sanitize_title(title))
}

/// Whether `path` has the script extension.
pub fn is_script_file(path: &Path) -> bool {
    path.extension().and_then(|e| e.to_str()) == Some(SCRIPT_EXTENSION)
}

/// What a file name says about the script it holds.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FileNameIdentity {
    /// Parsed from a leading `<digits>_`. Advisory only.
    pub id: Option<ScriptId>,
    pub title: String,
    /// Name carries the explicit `new_` prefix.
    pub is_new: bool,
}

/// Infer `(id, title)` from a file name via `^(\d+)_(.*)`.
///
/// Without a match the id is absent and the title is the name minus its
/// extension; a `new_` prefix is stripped from the title.
pub fn infer_identity(file_name: &str) -> FileNameIdentity {
    let stem = Path::new(file_name)
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_else(|| file_name.to_string());

    if let Some((head, tail)) = stem.split_once('_') {
        if !head.is_empty() && head.chars().all(|c| c.is_ascii_digit()) {
            if let Ok(id) = head.parse::<u64>() {
                return FileNameIdentity {
                    id: Some(ScriptId(id)),
                    title: tail.to_string(),
                    is_new: false,
                };
            }
        }
        if head == NEW_PREFIX {
            return FileNameIdentity {
                id: None,
                title: tail.to_string(),
                is_new: true,
            };
        }
    }

    FileNameIdentity {
        id: None,
        title: stem,
        is_new: false,
    }
}
