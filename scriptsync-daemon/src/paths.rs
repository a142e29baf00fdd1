use std::path::PathBuf;
use std::time::Duration;

use scriptsync_core::{config::WorkspaceConfig, ScriptVariant, SiteId};

/// Quiet period after a path's last event before it is pushed.
pub const DEBOUNCE_WINDOW: Duration = Duration::from_millis(500);
pub const JOB_QUEUE_DEPTH: usize = 64;

/// One directory the watcher observes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WatchTarget {
    pub site: SiteId,
    pub variant: ScriptVariant,
    pub dir: PathBuf,
}

/// Script directories of the configured sites, restricted to `only` when it
/// is non-empty.
pub fn watch_targets(config: &WorkspaceConfig, only: &[SiteId]) -> Vec<WatchTarget> {
    config
        .sites
        .iter()
        .filter(|site| only.is_empty() || only.contains(&site.id))
        .flat_map(|site| {
            ScriptVariant::all().iter().map(move |variant| WatchTarget {
                site: site.id,
                variant: *variant,
                dir: site.script_dir(*variant),
            })
        })
        .collect()
}
