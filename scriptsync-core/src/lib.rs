//! Scriptsync core library: script model, metadata codec, workspace config,
//! per-site sync state.
//!
//! - [`types`]: ids, variants, flags, [`ScriptRecord`]
//! - [`codec`]: header-comment metadata encode / decode
//! - [`filename`]: `{id|new}_{title}.js` naming convention
//! - [`config`]: `~/.scriptsync/config.yaml`
//! - [`state`]: per-site [`SiteSyncState`] and [`ActiveScriptSet`]
//! - [`error`]: [`CoreError`], [`DecodeError`]

pub mod codec;
pub mod config;
pub mod error;
pub mod filename;
pub mod persist;
pub mod state;
pub mod types;

pub use error::{CoreError, DecodeError};
pub use state::{ActiveScriptSet, ScriptCounts, SiteSyncState};
pub use types::{FlagEmission, ScriptFlag, ScriptId, ScriptRecord, ScriptVariant, SiteId};
