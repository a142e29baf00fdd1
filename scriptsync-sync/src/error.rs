//! Error types for scriptsync-sync.

use std::path::PathBuf;

use thiserror::Error;

use scriptsync_core::{CoreError, DecodeError, SiteId};

use crate::remote::RemoteError;

/// All errors that can arise from sync operations.
#[derive(Debug, Error)]
pub enum SyncError {
    /// Config or per-site state persistence failed.
    #[error("{0}")]
    Core(#[from] CoreError),

    /// The remote script store rejected or failed a call.
    #[error("remote store: {0}")]
    Remote(#[from] RemoteError),

    /// An I/O error, with annotated path for context.
    #[error("I/O error at {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// JSON serialization error (hash store, snapshot save).
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// A script file whose header breaks the metadata grammar.
    #[error("cannot decode {path}: {source}")]
    Decode {
        path: PathBuf,
        #[source]
        source: DecodeError,
    },

    /// The persisted site snapshot is not valid JSON.
    #[error("malformed snapshot at {path}: {source}")]
    Snapshot {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },

    /// Input the engine refuses to act on.
    #[error("{0}")]
    Validation(String),

    /// A specific script or site that was required does not exist.
    #[error("not found: {0}")]
    NotFound(String),

    /// The site needs confirmation before a push and none was given.
    #[error("site {site} requires confirmation before pushing; pass --force")]
    ConfirmationRequired { site: SiteId },

    /// A public operation failed; carries operation name and site.
    #[error("{operation} failed for site {site}: {source}")]
    Operation {
        operation: &'static str,
        site: SiteId,
        #[source]
        source: Box<SyncError>,
    },
}

impl SyncError {
    /// Wrap with operation context unless already wrapped.
    pub(crate) fn in_operation(self, operation: &'static str, site: SiteId) -> SyncError {
        match self {
            SyncError::Operation { .. } => self,
            other => SyncError::Operation {
                operation,
                site,
                source: Box::new(other),
            },
        }
    }

    /// The innermost error, past any operation wrapper.
    pub fn root(&self) -> &SyncError {
        match self {
            SyncError::Operation { source, .. } => source.root(),
            other => other,
        }
    }
}

/// Convenience constructor for [`SyncError::Io`].
pub(crate) fn io_err(path: impl Into<PathBuf>, source: std::io::Error) -> SyncError {
    SyncError::Io {
        path: path.into(),
        source,
    }
}
