//! Error types for scriptsync-core.

use std::path::PathBuf;

use thiserror::Error;

use crate::types::SiteId;

/// Errors from config and state persistence.
#[derive(Debug, Error)]
pub enum CoreError {
    /// Underlying I/O failure, annotated with the path involved.
    #[error("I/O error at {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// YAML serialization error (save path).
    #[error("YAML serialization error: {0}")]
    Yaml(#[from] serde_yaml::Error),

    /// Malformed `config.yaml`; includes the file path and serde_yaml's line context.
    #[error("failed to parse config at {path}: {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: serde_yaml::Error,
    },

    /// Malformed JSON in a per-site state document.
    #[error("failed to parse {path}: {source}")]
    Json {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },

    /// `dirs::home_dir()` returned `None`.
    #[error("cannot determine home directory; set $HOME or equivalent")]
    HomeNotFound,

    /// The site id is not registered in `config.yaml`.
    #[error("site {site} is not registered; run `scriptsync site add` first")]
    SiteNotFound { site: SiteId },
}

/// Rejections from the metadata header scanner.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum DecodeError {
    /// A line carrying the header prefix that does not follow the header grammar.
    #[error("line {line}: malformed header: {reason}")]
    MalformedHeader { line: usize, reason: String },

    /// A known header whose value has the wrong type.
    #[error("header `{key}` expects {expected}, got `{raw}`")]
    InvalidValue {
        key: String,
        expected: &'static str,
        raw: String,
    },
}

pub(crate) fn io_err(path: impl Into<PathBuf>, source: std::io::Error) -> CoreError {
    CoreError::Io {
        path: path.into(),
        source,
    }
}
