use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use notify::{recommended_watcher, Event, EventKind, RecommendedWatcher, RecursiveMode, Watcher};
use tokio::sync::{broadcast, mpsc};
use tokio::time::Instant;

use scriptsync_core::{config, filename::is_script_file, SiteId};
use scriptsync_sync::{IncrementalOutcome, Orchestrator, ScriptStore};

use crate::error::{io_err, DaemonError};
use crate::paths::{watch_targets, WatchTarget, DEBOUNCE_WINDOW, JOB_QUEUE_DEPTH};

#[derive(Debug, Clone, PartialEq, Eq)]
struct PushJob {
    site: SiteId,
    path: PathBuf,
}

/// Start the watch runtime and block the current thread until it exits.
pub fn start_blocking<S>(home: &Path, store: S, only: &[SiteId]) -> Result<(), DaemonError>
where
    S: ScriptStore + Send + Sync + 'static,
{
    init_tracing();
    let runtime = tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()
        .map_err(|e| io_err("tokio-runtime", e))?;
    runtime.block_on(run(home.to_path_buf(), store, only.to_vec()))
}

/// Watch the configured sites' script directories until ctrl-c.
///
/// A changed file is pushed once it has been quiet for [`DEBOUNCE_WINDOW`],
/// one at a time through [`Orchestrator::incremental_push`]. A failed push
/// is logged and the watcher keeps going.
pub async fn run<S>(home: PathBuf, store: S, only: Vec<SiteId>) -> Result<(), DaemonError>
where
    S: ScriptStore + Send + Sync + 'static,
{
    let cfg = config::load_at(&home)?;
    let targets = watch_targets(&cfg, &only);
    if targets.is_empty() {
        return Err(DaemonError::NoSites);
    }
    let orchestrator = Arc::new(Orchestrator::new(home, store));

    let (job_tx, job_rx) = mpsc::channel::<PushJob>(JOB_QUEUE_DEPTH);
    let (shutdown_tx, _) = broadcast::channel::<()>(16);

    let watcher_handle = {
        let shutdown = shutdown_tx.clone();
        tokio::spawn(async move {
            let result = watcher_task(targets, job_tx, shutdown.subscribe()).await;
            let _ = shutdown.send(());
            result
        })
    };

    let processor_handle = {
        let shutdown = shutdown_tx.clone();
        tokio::spawn(async move {
            let result = processor_task(orchestrator, job_rx, shutdown.subscribe()).await;
            let _ = shutdown.send(());
            result
        })
    };

    let signal_handle = {
        let shutdown = shutdown_tx.clone();
        tokio::spawn(async move {
            let mut shutdown_rx = shutdown.subscribe();
            tokio::select! {
                _ = shutdown_rx.recv() => Ok(()),
                signal = tokio::signal::ctrl_c() => {
                    match signal {
                        Ok(()) => {
                            tracing::info!("received ctrl-c, stopping watcher");
                            let _ = shutdown.send(());
                            Ok(())
                        }
                        Err(err) => Err(DaemonError::Runtime(format!(
                            "ctrl-c handler failed: {err}"
                        ))),
                    }
                }
            }
        })
    };

    let (watcher_result, processor_result, signal_result) =
        tokio::join!(watcher_handle, processor_handle, signal_handle);

    handle_join("watcher", watcher_result)?;
    handle_join("processor", processor_result)?;
    handle_join("signal_handler", signal_result)?;
    Ok(())
}

async fn watcher_task(
    targets: Vec<WatchTarget>,
    job_tx: mpsc::Sender<PushJob>,
    mut shutdown_rx: broadcast::Receiver<()>,
) -> Result<(), DaemonError> {
    let (event_tx, mut event_rx) = mpsc::unbounded_channel::<notify::Result<Event>>();
    let mut watcher: RecommendedWatcher = recommended_watcher(move |event| {
        let _ = event_tx.send(event);
    })?;

    // Events arrive with real paths (e.g. /private/var/... on macOS), so
    // match against the canonical directory as well.
    let mut dirs = Vec::with_capacity(targets.len());
    for target in targets {
        fs::create_dir_all(&target.dir).map_err(|e| io_err(&target.dir, e))?;
        watcher.watch(&target.dir, RecursiveMode::NonRecursive)?;
        let canonical = fs::canonicalize(&target.dir).unwrap_or_else(|_| target.dir.clone());
        tracing::info!(site = %target.site, dir = %target.dir.display(), "watching");
        dirs.push((target, canonical));
    }

    let mut debounce = Debouncer::new(DEBOUNCE_WINDOW);

    loop {
        let deadline = debounce.next_deadline();
        let wake = deadline.unwrap_or_else(Instant::now);
        tokio::select! {
            _ = shutdown_rx.recv() => break,
            _ = tokio::time::sleep_until(wake), if deadline.is_some() => {
                for job in debounce.take_due(Instant::now()) {
                    if job_tx.send(job).await.is_err() {
                        tracing::warn!("push queue closed; stopping watcher");
                        return Ok(());
                    }
                }
            }
            event = event_rx.recv() => {
                let Some(event) = event else { break };
                let event = match event {
                    Ok(event) => event,
                    Err(err) => {
                        tracing::warn!(error = %err, "watcher event error");
                        continue;
                    }
                };
                if !is_relevant_event_kind(&event.kind) {
                    continue;
                }

                for path in event.paths {
                    if let Some(site) = site_for_path(&dirs, &path) {
                        debounce.touch(site, path, Instant::now());
                    }
                }
            }
        }
    }

    if debounce.pending() > 0 {
        tracing::debug!(pending = debounce.pending(), "dropping unpushed changes on shutdown");
    }
    Ok(())
}

async fn processor_task<S>(
    orchestrator: Arc<Orchestrator<S>>,
    mut job_rx: mpsc::Receiver<PushJob>,
    mut shutdown_rx: broadcast::Receiver<()>,
) -> Result<(), DaemonError>
where
    S: ScriptStore + Send + Sync + 'static,
{
    loop {
        tokio::select! {
            _ = shutdown_rx.recv() => break,
            maybe_job = job_rx.recv() => {
                let Some(job) = maybe_job else { break };
                let started = Instant::now();
                let orchestrator = orchestrator.clone();
                let PushJob { site, path } = job;
                let path_for_push = path.clone();
                let result = tokio::task::spawn_blocking(move || {
                    orchestrator.incremental_push(site, &path_for_push)
                })
                .await
                .map_err(|err| DaemonError::Runtime(format!("push task join error: {err}")))?;

                match result {
                    Ok(IncrementalOutcome::Pushed { variant, id, .. }) => {
                        tracing::info!(
                            site = %site,
                            variant = %variant,
                            id = ?id.map(|id| id.0),
                            path = %path.display(),
                            duration_ms = started.elapsed().as_millis() as u64,
                            "pushed changed script",
                        );
                    }
                    Ok(IncrementalOutcome::Unchanged) => {
                        tracing::debug!(site = %site, path = %path.display(), "content unchanged");
                    }
                    Ok(IncrementalOutcome::Ignored) => {
                        tracing::debug!(
                            site = %site,
                            path = %path.display(),
                            "not a managed script"
                        );
                    }
                    Err(err) => {
                        tracing::error!(
                            site = %site,
                            path = %path.display(),
                            error = %err,
                            "push failed"
                        );
                    }
                }
            }
        }
    }

    Ok(())
}

fn is_relevant_event_kind(kind: &EventKind) -> bool {
    matches!(kind, EventKind::Create(_) | EventKind::Modify(_))
}

fn site_for_path(dirs: &[(WatchTarget, PathBuf)], path: &Path) -> Option<SiteId> {
    if !is_script_file(path) {
        return None;
    }
    let parent = path.parent()?;
    dirs.iter()
        .find(|(target, canonical)| parent == target.dir || parent == canonical)
        .map(|(target, _)| target.site)
}

/// Trailing-edge debounce: every event for a path moves its deadline to
/// `now + window`, and the path is due once that deadline passes.
#[derive(Debug)]
struct Debouncer {
    window: Duration,
    pending: HashMap<PathBuf, (SiteId, Instant)>,
}

impl Debouncer {
    fn new(window: Duration) -> Self {
        Self {
            window,
            pending: HashMap::new(),
        }
    }

    fn touch(&mut self, site: SiteId, path: PathBuf, now: Instant) {
        self.pending.insert(path, (site, now + self.window));
    }

    fn next_deadline(&self) -> Option<Instant> {
        self.pending.values().map(|(_, deadline)| *deadline).min()
    }

    fn take_due(&mut self, now: Instant) -> Vec<PushJob> {
        let due: Vec<PathBuf> = self
            .pending
            .iter()
            .filter(|(_, (_, deadline))| *deadline <= now)
            .map(|(path, _)| path.clone())
            .collect();
        let mut jobs: Vec<PushJob> = due
            .into_iter()
            .filter_map(|path| {
                let (site, _) = self.pending.remove(&path)?;
                Some(PushJob { site, path })
            })
            .collect();
        jobs.sort_by(|a, b| a.path.cmp(&b.path));
        jobs
    }

    fn pending(&self) -> usize {
        self.pending.len()
    }
}

fn handle_join(
    task: &str,
    result: Result<Result<(), DaemonError>, tokio::task::JoinError>,
) -> Result<(), DaemonError> {
    match result {
        Ok(inner) => inner,
        Err(err) => Err(DaemonError::Runtime(format!("{task} task join failure: {err}"))),
    }
}

/// Install the global `tracing` subscriber (`RUST_LOG`, default `info`),
/// writing to stderr. `SCRIPTSYNC_LOG_FORMAT=json` switches to JSON lines.
/// Later calls are no-ops.
pub fn init_tracing() {
    use tracing_subscriber::{fmt, EnvFilter};

    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let builder = fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr);
    let _ = if json_logs(std::env::var("SCRIPTSYNC_LOG_FORMAT").ok().as_deref()) {
        builder.json().try_init()
    } else {
        builder.try_init()
    };
}

fn json_logs(format: Option<&str>) -> bool {
    format.is_some_and(|f| f.eq_ignore_ascii_case("json"))
}
