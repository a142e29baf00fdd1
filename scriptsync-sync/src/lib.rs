//! # scriptsync-sync
//!
//! Sync engine between a remote script store and a local script workspace.
//!
//! [`Orchestrator`] is the entry point: [`Orchestrator::pull`],
//! [`Orchestrator::push`], [`Orchestrator::diff`], [`Orchestrator::upload`],
//! and [`Orchestrator::incremental_push`] for single files reported by a
//! watcher. The remote side is anything implementing [`ScriptStore`];
//! [`MemoryScriptStore`] is an in-process one for tests.

pub mod diff;
pub mod error;
pub mod hash_store;
pub mod memory;
pub mod orchestrator;
pub mod reconcile;
pub mod remote;
pub mod repository;
pub mod snapshot;
pub mod writer;

pub use error::SyncError;
pub use memory::MemoryScriptStore;
pub use orchestrator::{
    DeleteReport, IncrementalOutcome, Orchestrator, PullReport, PushOptions, PushOutcome,
    PushReport, SiteStatus,
};
pub use reconcile::{DiffEntry, EntryKey, EntryStatus};
pub use remote::{RemoteError, ScriptBatch, ScriptStore, SitePayload};
pub use writer::WriteResult;
