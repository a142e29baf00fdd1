//! Sync orchestration: pull, push, diff, upload, incremental push, delete.
//!
//! Every public operation resolves the site from `<home>/.scriptsync/config.yaml`,
//! runs to completion, and wraps any failure as [`SyncError::Operation`] so the
//! caller can report operation name and site without digging.
//!
//! ## Pull ordering
//!
//! 1. Fetch the site. A fetch error aborts before anything on disk changes.
//! 2. Persist the raw payload as the site snapshot.
//! 3. Write every remote record (unchanged files are left untouched).
//! 4. Remove script files absent from the set just written.
//! 5. Save hashes, then update the site state.

use std::collections::HashSet;
use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use serde::Serialize;

use scriptsync_core::{
    codec,
    config::{self, SiteConfig},
    filename::{is_script_file, script_file_name},
    state, ScriptCounts, ScriptId, ScriptVariant, SiteId, SiteSyncState,
};

use crate::error::{io_err, SyncError};
use crate::hash_store;
use crate::reconcile::{self, DiffEntry};
use crate::remote::{record_from_wire, wire_id, ScriptBatch, ScriptStore, SitePayload};
use crate::repository::{self, LocalScriptFile};
use crate::snapshot::{self, KnownRemote};
use crate::writer::{self, WriteResult};

/// Push switches.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PushOptions {
    /// Reconcile and return the entries instead of sending anything.
    pub dry_run: bool,
    /// Skip the site's push confirmation.
    pub force: bool,
}

/// Files touched by a pull.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PullReport {
    pub site: SiteId,
    pub title: String,
    pub counts: ScriptCounts,
    pub files: Vec<WriteResult>,
}

impl PullReport {
    pub fn written(&self) -> usize {
        self.count(|r| matches!(r, WriteResult::Written { .. }))
    }

    pub fn unchanged(&self) -> usize {
        self.count(|r| matches!(r, WriteResult::Unchanged { .. }))
    }

    pub fn removed(&self) -> usize {
        self.count(|r| matches!(r, WriteResult::Removed { .. }))
    }

    fn count(&self, pred: impl Fn(&WriteResult) -> bool) -> usize {
        self.files.iter().filter(|r| pred(r)).count()
    }
}

/// What a push or upload sent.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PushReport {
    pub site: SiteId,
    pub counts: ScriptCounts,
    /// Sent files without an id; they get one remotely and need a pull to
    /// pick it up.
    pub created: Vec<PathBuf>,
    pub paths: Vec<PathBuf>,
}

#[derive(Debug, Clone, PartialEq)]
pub enum PushOutcome {
    DryRun(Vec<DiffEntry>),
    /// Nothing local matched the selection. Not an error.
    NothingSelected,
    Pushed(PushReport),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum IncrementalOutcome {
    /// Path is not a script file under the site's managed directories.
    Ignored,
    /// Contents match what was last pulled or pushed.
    Unchanged,
    Pushed {
        variant: ScriptVariant,
        id: Option<ScriptId>,
        path: PathBuf,
    },
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeleteReport {
    pub variant: ScriptVariant,
    pub ids: Vec<ScriptId>,
    pub removed_files: Vec<PathBuf>,
}

/// Site state plus what is on disk right now.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SiteStatus {
    pub site: SiteId,
    pub title: String,
    pub workspace: PathBuf,
    pub confirm_push: bool,
    pub local: ScriptCounts,
    pub state: SiteSyncState,
}

impl SiteStatus {
    pub fn last_pulled(&self) -> Option<DateTime<Utc>> {
        self.state.last_pulled
    }
}

/// Runs sync operations for sites configured under `home` against `store`.
#[derive(Debug)]
pub struct Orchestrator<S> {
    home: PathBuf,
    store: S,
}

impl<S: ScriptStore> Orchestrator<S> {
    pub fn new(home: impl Into<PathBuf>, store: S) -> Self {
        Self {
            home: home.into(),
            store,
        }
    }

    pub fn home(&self) -> &Path {
        &self.home
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    // -----------------------------------------------------------------------
    // 1. Pull
    // -----------------------------------------------------------------------

    /// Overwrite the site's script directories with the remote contents.
    pub fn pull(&self, site: SiteId) -> Result<PullReport, SyncError> {
        self.pull_inner(site).map_err(|e| e.in_operation("pull", site))
    }

    fn pull_inner(&self, site: SiteId) -> Result<PullReport, SyncError> {
        let cfg = self.site_config(site)?;
        let payload = self.store.fetch_site(site)?;
        let server = payload.records(ScriptVariant::Server)?;
        let client = payload.records(ScriptVariant::Client)?;

        snapshot::save_at(&self.home, site, &payload)?;
        let mut hashes = hash_store::load_at(&self.home, site)?;

        let mut files = Vec::new();
        let mut keep = HashSet::new();
        for record in server.iter().chain(&client) {
            let path = cfg
                .script_dir(record.variant)
                .join(script_file_name(record.id, &record.title));
            let result = writer::write_script(&path, &codec::encode(record), &mut hashes.files)?;
            keep.insert(path);
            files.push(result);
        }
        for variant in ScriptVariant::all() {
            let removed =
                writer::remove_orphans(&cfg.script_dir(*variant), &keep, &mut hashes.files)?;
            files.extend(removed);
        }

        hashes.synced_at = Utc::now();
        hash_store::save_at(&self.home, site, &hashes)?;

        let counts = ScriptCounts {
            server: server.len(),
            client: client.len(),
        };
        state::update_at(&self.home, site, |state| SiteSyncState {
            title: Some(payload.title.clone()),
            reference_type: Some(payload.reference_type.clone()),
            last_pulled: Some(Utc::now()),
            counts,
            ..state
        })?;

        let report = PullReport {
            site,
            title: payload.title,
            counts,
            files,
        };
        tracing::info!(
            "pulled site {site}: {} written, {} unchanged, {} removed",
            report.written(),
            report.unchanged(),
            report.removed()
        );
        Ok(report)
    }

    // -----------------------------------------------------------------------
    // 2. Push
    // -----------------------------------------------------------------------

    /// Send local scripts, restricted to the active set when it is non-empty.
    pub fn push(&self, site: SiteId, options: PushOptions) -> Result<PushOutcome, SyncError> {
        self.push_inner(site, options)
            .map_err(|e| e.in_operation("push", site))
    }

    fn push_inner(&self, site: SiteId, options: PushOptions) -> Result<PushOutcome, SyncError> {
        let cfg = self.site_config(site)?;
        if options.dry_run {
            return self.diff_inner(site).map(PushOutcome::DryRun);
        }
        if cfg.confirm_push && !options.force {
            return Err(SyncError::ConfirmationRequired { site });
        }

        let known = snapshot::known_remote_at(&self.home, site);
        let active = state::get_active_at(&self.home, site)?;
        let mut selected = Vec::new();
        for variant in ScriptVariant::all() {
            let files = self.scan_local(&cfg, *variant, &known)?;
            selected.extend(files.into_iter().filter(|file| {
                active.is_empty()
                    || file
                        .record
                        .id
                        .is_some_and(|id| active.contains(*variant, id))
            }));
        }

        if selected.is_empty() {
            tracing::info!("push for site {site}: nothing selected");
            return Ok(PushOutcome::NothingSelected);
        }
        self.send(site, &selected).map(PushOutcome::Pushed)
    }

    fn send(&self, site: SiteId, files: &[LocalScriptFile]) -> Result<PushReport, SyncError> {
        let mut batch = ScriptBatch::default();
        for file in files {
            batch.push_record(&file.record);
        }
        self.store.batch_update(site, &batch)?;

        let mut hashes = hash_store::load_at(&self.home, site)?;
        for file in files {
            hashes
                .files
                .insert(hash_store::key_for(&file.path), file.digest.clone());
        }
        hashes.synced_at = Utc::now();
        hash_store::save_at(&self.home, site, &hashes)?;
        state::update_at(&self.home, site, |state| SiteSyncState {
            last_pushed: Some(Utc::now()),
            ..state
        })?;

        let count = |variant| files.iter().filter(|f| f.record.variant == variant).count();
        let report = PushReport {
            site,
            counts: ScriptCounts {
                server: count(ScriptVariant::Server),
                client: count(ScriptVariant::Client),
            },
            created: files
                .iter()
                .filter(|f| f.record.id.is_none())
                .map(|f| f.path.clone())
                .collect(),
            paths: files.iter().map(|f| f.path.clone()).collect(),
        };
        tracing::info!(
            "pushed {} server and {} client scripts to site {site}",
            report.counts.server,
            report.counts.client
        );
        if !report.created.is_empty() {
            tracing::info!(
                "{} new scripts created on site {site}; pull to pick up their ids",
                report.created.len()
            );
        }
        Ok(report)
    }

    // -----------------------------------------------------------------------
    // 3. Diff
    // -----------------------------------------------------------------------

    /// Reconcile the live remote site against local files. Changes nothing.
    pub fn diff(&self, site: SiteId) -> Result<Vec<DiffEntry>, SyncError> {
        self.diff_inner(site).map_err(|e| e.in_operation("diff", site))
    }

    fn diff_inner(&self, site: SiteId) -> Result<Vec<DiffEntry>, SyncError> {
        let cfg = self.site_config(site)?;
        let payload = self.store.fetch_site(site)?;
        let known = snapshot::known_remote_at(&self.home, site);
        let local_server = self.scan_local(&cfg, ScriptVariant::Server, &known)?;
        let local_client = self.scan_local(&cfg, ScriptVariant::Client, &known)?;
        Ok(reconcile::reconcile(
            &payload.records(ScriptVariant::Server)?,
            &payload.records(ScriptVariant::Client)?,
            &local_server,
            &local_client,
        ))
    }

    // -----------------------------------------------------------------------
    // 4. Upload
    // -----------------------------------------------------------------------

    /// Send arbitrary files. Without `hint`, each file's variant comes from
    /// its path (a segment containing `server` or `client`).
    pub fn upload(
        &self,
        site: SiteId,
        paths: &[PathBuf],
        hint: Option<ScriptVariant>,
    ) -> Result<PushReport, SyncError> {
        self.upload_inner(site, paths, hint)
            .map_err(|e| e.in_operation("upload", site))
    }

    fn upload_inner(
        &self,
        site: SiteId,
        paths: &[PathBuf],
        hint: Option<ScriptVariant>,
    ) -> Result<PushReport, SyncError> {
        self.site_config(site)?;
        if paths.is_empty() {
            return Err(SyncError::Validation("no files to upload".into()));
        }
        let known = snapshot::known_remote_at(&self.home, site);
        let files = paths
            .iter()
            .map(|path| {
                let variant = hint
                    .or_else(|| repository::infer_variant(path))
                    .ok_or_else(|| {
                        SyncError::Validation(format!(
                            "cannot tell whether {} is a server or client script",
                            path.display()
                        ))
                    })?;
                repository::load_file(path, variant, known.for_variant(variant))
            })
            .collect::<Result<Vec<_>, _>>()?;
        self.send(site, &files)
    }

    // -----------------------------------------------------------------------
    // 5. Incremental push
    // -----------------------------------------------------------------------

    /// Push one changed file, ignoring the active set. Paths outside the
    /// site's script directories are a no-op.
    pub fn incremental_push(
        &self,
        site: SiteId,
        path: &Path,
    ) -> Result<IncrementalOutcome, SyncError> {
        self.incremental_push_inner(site, path)
            .map_err(|e| e.in_operation("incremental push", site))
    }

    fn incremental_push_inner(
        &self,
        site: SiteId,
        path: &Path,
    ) -> Result<IncrementalOutcome, SyncError> {
        let cfg = self.site_config(site)?;
        let Some(variant) = cfg.variant_for_path(path).filter(|_| is_script_file(path)) else {
            tracing::debug!("ignoring {}: not a managed script of site {site}", path.display());
            return Ok(IncrementalOutcome::Ignored);
        };
        if !path.is_file() {
            tracing::debug!("ignoring {}: no longer exists", path.display());
            return Ok(IncrementalOutcome::Ignored);
        }

        let known = snapshot::known_remote_at(&self.home, site);
        let file = repository::load_file(path, variant, known.for_variant(variant))?;
        let hashes = hash_store::load_at(&self.home, site)?;
        if hashes.files.get(&hash_store::key_for(path)) == Some(&file.digest) {
            tracing::debug!("unchanged: {}", path.display());
            return Ok(IncrementalOutcome::Unchanged);
        }

        let mut id = file.record.id;
        let existing = match id {
            Some(_) => HashSet::new(),
            None => remote_ids(&self.store.fetch_site(site)?, variant),
        };
        self.send(site, std::slice::from_ref(&file))?;
        if id.is_none() {
            id = self.adopt_created_id(site, &file, &existing)?;
        }
        Ok(IncrementalOutcome::Pushed {
            variant,
            id,
            path: file.path,
        })
    }

    /// Find the id the store gave a script just created from `file` and write
    /// it into the file's header, so the next save updates that record.
    /// `existing` holds the variant's remote ids from before the create.
    fn adopt_created_id(
        &self,
        site: SiteId,
        file: &LocalScriptFile,
        existing: &HashSet<ScriptId>,
    ) -> Result<Option<ScriptId>, SyncError> {
        let variant = file.record.variant;
        let payload = match self.store.fetch_site(site) {
            Ok(payload) => payload,
            Err(err) => {
                tracing::warn!(
                    "created {} on site {site} but could not read back its id ({err}); \
                     pull to pick it up",
                    file.path.display()
                );
                return Ok(None);
            }
        };

        let mut created = Vec::new();
        for script in payload.scripts(variant) {
            let Some(id) = wire_id(script).filter(|id| !existing.contains(id)) else {
                continue;
            };
            if record_from_wire(variant, script)?.title == file.record.title {
                created.push((id, script.clone()));
            }
        }
        let (id, script) = match created.len() {
            1 => created.remove(0),
            n => {
                tracing::warn!(
                    "created {} on site {site} but found {n} candidate ids; pull to pick up its id",
                    file.path.display()
                );
                return Ok(None);
            }
        };

        let mut record = file.record.clone();
        record.id = Some(id);
        let mut hashes = hash_store::load_at(&self.home, site)?;
        writer::write_script(&file.path, &codec::encode(&record), &mut hashes.files)?;
        hash_store::save_at(&self.home, site, &hashes)?;

        let mut known = snapshot::load_at(&self.home, site)?.unwrap_or_default();
        known.scripts_mut(variant).push(script);
        snapshot::save_at(&self.home, site, &known)?;

        tracing::info!("site {site} assigned id {id} to {}", file.path.display());
        Ok(Some(id))
    }

    // -----------------------------------------------------------------------
    // 6. Delete
    // -----------------------------------------------------------------------

    /// Delete scripts remotely, then their local files and active entries.
    pub fn delete(
        &self,
        site: SiteId,
        variant: ScriptVariant,
        ids: &[ScriptId],
    ) -> Result<DeleteReport, SyncError> {
        self.delete_inner(site, variant, ids)
            .map_err(|e| e.in_operation("delete", site))
    }

    fn delete_inner(
        &self,
        site: SiteId,
        variant: ScriptVariant,
        ids: &[ScriptId],
    ) -> Result<DeleteReport, SyncError> {
        let cfg = self.site_config(site)?;
        if ids.is_empty() {
            return Err(SyncError::Validation("no script ids given".into()));
        }
        let payload = self.store.fetch_site(site)?;
        let remote_ids: HashSet<ScriptId> = payload
            .scripts(variant)
            .iter()
            .filter_map(crate::remote::wire_id)
            .collect();
        if let Some(missing) = ids.iter().find(|id| !remote_ids.contains(*id)) {
            return Err(SyncError::NotFound(format!("{variant} script {missing}")));
        }

        let known = snapshot::known_remote_at(&self.home, site);
        let scanned =
            repository::scan(&cfg.script_dir(variant), variant, known.for_variant(variant))?;
        let doomed: Vec<PathBuf> = scanned
            .into_iter()
            .filter(|file| file.record.id.is_some_and(|id| ids.contains(&id)))
            .map(|file| file.path)
            .collect();

        let mut batch = ScriptBatch::default();
        for id in ids {
            batch.push_delete(variant, *id);
        }
        self.store.batch_update(site, &batch)?;

        let mut hashes = hash_store::load_at(&self.home, site)?;
        for path in &doomed {
            std::fs::remove_file(path).map_err(|e| io_err(path, e))?;
            hashes.files.remove(&hash_store::key_for(path));
        }
        hash_store::save_at(&self.home, site, &hashes)?;

        if let Some(mut snapshot) = snapshot::load_at(&self.home, site).unwrap_or_else(|err| {
            tracing::warn!("not updating snapshot for site {site}: {err}");
            None
        }) {
            snapshot.remove(variant, ids);
            snapshot::save_at(&self.home, site, &snapshot)?;
        }
        state::update_at(&self.home, site, |mut state| {
            state.active.ids_mut(variant).retain(|id| !ids.contains(id));
            state.last_pushed = Some(Utc::now());
            state
        })?;

        tracing::info!("deleted {} {variant} scripts from site {site}", ids.len());
        Ok(DeleteReport {
            variant,
            ids: ids.to_vec(),
            removed_files: doomed,
        })
    }

    // -----------------------------------------------------------------------
    // 7. Active set and status
    // -----------------------------------------------------------------------

    /// Add `id` to the active set if absent, remove it if present.
    /// Returns whether it is active afterwards.
    pub fn toggle_active(
        &self,
        site: SiteId,
        variant: ScriptVariant,
        id: ScriptId,
    ) -> Result<bool, SyncError> {
        let run = || -> Result<bool, SyncError> {
            self.site_config(site)?;
            let state = state::update_at(&self.home, site, |mut state| {
                let ids = state.active.ids_mut(variant);
                if !ids.remove(&id) {
                    ids.insert(id);
                }
                state
            })?;
            Ok(state.active.contains(variant, id))
        };
        run().map_err(|e| e.in_operation("toggle active", site))
    }

    pub fn status(&self, site: SiteId) -> Result<SiteStatus, SyncError> {
        let run = || -> Result<SiteStatus, SyncError> {
            let cfg = self.site_config(site)?;
            let local = ScriptCounts {
                server: count_script_files(&cfg.script_dir(ScriptVariant::Server))?,
                client: count_script_files(&cfg.script_dir(ScriptVariant::Client))?,
            };
            Ok(SiteStatus {
                site,
                title: cfg.title,
                workspace: cfg.workspace,
                confirm_push: cfg.confirm_push,
                local,
                state: state::load_at(&self.home, site)?,
            })
        };
        run().map_err(|e| e.in_operation("status", site))
    }

    // -----------------------------------------------------------------------
    // Helpers
    // -----------------------------------------------------------------------

    fn site_config(&self, site: SiteId) -> Result<SiteConfig, SyncError> {
        Ok(config::load_at(&self.home)?.require_site(site)?.clone())
    }

    fn scan_local(
        &self,
        cfg: &SiteConfig,
        variant: ScriptVariant,
        known: &KnownRemote,
    ) -> Result<Vec<LocalScriptFile>, SyncError> {
        let files =
            repository::scan(&cfg.script_dir(variant), variant, known.for_variant(variant))?;
        Ok(repository::shadow_duplicates(files))
    }
}

fn count_script_files(dir: &Path) -> Result<usize, SyncError> {
    if !dir.exists() {
        return Ok(0);
    }
    Ok(std::fs::read_dir(dir)
        .map_err(|e| io_err(dir, e))?
        .filter_map(|e| e.ok())
        .filter(|e| is_script_file(&e.path()))
        .count())
}

fn remote_ids(payload: &SitePayload, variant: ScriptVariant) -> HashSet<ScriptId> {
    payload.scripts(variant).iter().filter_map(wire_id).collect()
}
