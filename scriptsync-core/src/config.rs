//! Workspace configuration.
//!
//! # Storage layout
//!
//! ```text
//! ~/.scriptsync/
//!   config.yaml            (sites, base URL, current site; mode 0600)
//!   sites/
//!     <site_id>/           (per-site state, see [`crate::state`])
//! ```
//!
//! # API pattern
//!
//! Every function touching disk has an `_at(home: &Path, …)` form used by
//! tests with `TempDir`, plus a convenience wrapper deriving home from
//! `dirs::home_dir()`.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::error::{io_err, CoreError};
use crate::persist;
use crate::types::{ScriptVariant, SiteId};

/// Default name of the environment variable holding the API key.
pub const DEFAULT_API_KEY_ENV: &str = "SCRIPTSYNC_API_KEY";

/// Root of `config.yaml`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WorkspaceConfig {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub base_url: Option<String>,
    #[serde(default = "default_api_key_env")]
    pub api_key_env: String,
    /// `0` means no site is selected.
    #[serde(default)]
    pub current_site: u64,
    #[serde(default)]
    pub sites: Vec<SiteConfig>,
}

fn default_api_key_env() -> String {
    DEFAULT_API_KEY_ENV.to_string()
}

impl Default for WorkspaceConfig {
    fn default() -> Self {
        Self {
            base_url: None,
            api_key_env: default_api_key_env(),
            current_site: 0,
            sites: vec![],
        }
    }
}

impl WorkspaceConfig {
    /// The selected site, if any.
    pub fn current_site(&self) -> Option<SiteId> {
        match self.current_site {
            0 => None,
            id => Some(SiteId(id)),
        }
    }

    pub fn select_site(&mut self, site: Option<SiteId>) {
        self.current_site = site.map(|s| s.0).unwrap_or(0);
    }

    pub fn site(&self, id: SiteId) -> Option<&SiteConfig> {
        self.sites.iter().find(|s| s.id == id)
    }

    /// Like [`Self::site`] but `SiteNotFound` when absent.
    pub fn require_site(&self, id: SiteId) -> Result<&SiteConfig, CoreError> {
        self.site(id).ok_or(CoreError::SiteNotFound { site: id })
    }

    /// Insert or replace by id; keeps `sites` sorted by id.
    pub fn upsert_site(&mut self, site: SiteConfig) {
        self.sites.retain(|s| s.id != site.id);
        self.sites.push(site);
        self.sites.sort_by_key(|s| s.id);
    }

    /// The site whose script directories contain `path`.
    pub fn site_for_path(&self, path: &Path) -> Option<&SiteConfig> {
        self.sites.iter().find(|s| s.variant_for_path(path).is_some())
    }
}

/// One registered site and where its scripts live locally.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SiteConfig {
    pub id: SiteId,
    pub title: String,
    /// Directory holding `server-scripts/` and `client-scripts/`.
    pub workspace: PathBuf,
    /// Pushes to this site need explicit confirmation from the caller.
    #[serde(default)]
    pub confirm_push: bool,
}

impl SiteConfig {
    pub fn script_dir(&self, variant: ScriptVariant) -> PathBuf {
        self.workspace.join(variant.dir_name())
    }

    /// Which managed directory `path` sits directly inside, if any.
    pub fn variant_for_path(&self, path: &Path) -> Option<ScriptVariant> {
        let parent = path.parent()?;
        ScriptVariant::all()
            .iter()
            .copied()
            .find(|variant| same_dir(parent, &self.script_dir(*variant)))
    }
}

fn same_dir(a: &Path, b: &Path) -> bool {
    if a == b {
        return true;
    }
    match (std::fs::canonicalize(a), std::fs::canonicalize(b)) {
        (Ok(a), Ok(b)) => a == b,
        _ => false,
    }
}

// ---------------------------------------------------------------------------
// Paths
// ---------------------------------------------------------------------------

/// `<home>/.scriptsync/`
pub fn root_at(home: &Path) -> PathBuf {
    home.join(".scriptsync")
}

/// `<home>/.scriptsync/config.yaml`
pub fn config_path_at(home: &Path) -> PathBuf {
    root_at(home).join("config.yaml")
}

/// `<home>/.scriptsync/sites/<site>/`
pub fn site_dir_at(home: &Path, site: SiteId) -> PathBuf {
    root_at(home).join("sites").join(site.to_string())
}

// ---------------------------------------------------------------------------
// Load / save
// ---------------------------------------------------------------------------

/// Load `config.yaml`; a missing file yields the default config.
pub fn load_at(home: &Path) -> Result<WorkspaceConfig, CoreError> {
    let path = config_path_at(home);
    if !path.exists() {
        return Ok(WorkspaceConfig::default());
    }
    let contents = std::fs::read_to_string(&path).map_err(|e| io_err(&path, e))?;
    serde_yaml::from_str(&contents).map_err(|source| CoreError::Parse { path, source })
}

/// `load_at` convenience wrapper.
pub fn load() -> Result<WorkspaceConfig, CoreError> {
    load_at(&home()?)
}

/// Atomically save `config.yaml`.
pub fn save_at(home: &Path, config: &WorkspaceConfig) -> Result<(), CoreError> {
    let path = config_path_at(home);
    let yaml = serde_yaml::to_string(config)?;
    persist::write_atomic(&path, yaml.as_bytes()).map_err(|e| io_err(&path, e))
}

/// `save_at` convenience wrapper.
pub fn save(config: &WorkspaceConfig) -> Result<(), CoreError> {
    save_at(&home()?, config)
}

/// Home directory from `dirs::home_dir()`.
pub fn home() -> Result<PathBuf, CoreError> {
    dirs::home_dir().ok_or(CoreError::HomeNotFound)
}

// ---------------------------------------------------------------------------
// Unit tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn site(id: u64, workspace: &Path) -> SiteConfig {
        SiteConfig {
            id: SiteId(id),
            title: format!("site {id}"),
            workspace: workspace.to_path_buf(),
            confirm_push: false,
        }
    }

    #[test]
    fn missing_config_is_default() {
        let home = TempDir::new().unwrap();
        let config = load_at(home.path()).expect("load");
        assert_eq!(config, WorkspaceConfig::default());
        assert_eq!(config.api_key_env, DEFAULT_API_KEY_ENV);
    }

    #[test]
    fn zero_current_site_means_none() {
        let mut config = WorkspaceConfig::default();
        assert_eq!(config.current_site(), None);
        config.select_site(Some(SiteId(9)));
        assert_eq!(config.current_site(), Some(SiteId(9)));
        config.select_site(None);
        assert_eq!(config.current_site, 0);
    }

    #[test]
    fn save_and_load_roundtrip() {
        let home = TempDir::new().unwrap();
        let mut config = WorkspaceConfig {
            base_url: Some("https://example.test".into()),
            ..WorkspaceConfig::default()
        };
        config.upsert_site(site(3, Path::new("/work/three")));
        config.upsert_site(site(1, Path::new("/work/one")));
        save_at(home.path(), &config).expect("save");
        let loaded = load_at(home.path()).expect("load");
        assert_eq!(loaded, config);
        assert_eq!(loaded.sites[0].id, SiteId(1));
    }

    #[test]
    fn upsert_replaces_existing_site() {
        let mut config = WorkspaceConfig::default();
        config.upsert_site(site(3, Path::new("/a")));
        config.upsert_site(site(3, Path::new("/b")));
        assert_eq!(config.sites.len(), 1);
        assert_eq!(config.sites[0].workspace, PathBuf::from("/b"));
    }

    #[test]
    fn variant_for_path_requires_direct_child() {
        let site = site(1, Path::new("/work/s1"));
        assert_eq!(
            site.variant_for_path(Path::new("/work/s1/server-scripts/1_A.js")),
            Some(ScriptVariant::Server)
        );
        assert_eq!(
            site.variant_for_path(Path::new("/work/s1/client-scripts/2_B.js")),
            Some(ScriptVariant::Client)
        );
        assert_eq!(site.variant_for_path(Path::new("/work/s1/other/1_A.js")), None);
        assert_eq!(site.variant_for_path(Path::new("/tmp/outside.js")), None);
    }

    #[test]
    fn require_site_reports_missing_site() {
        let config = WorkspaceConfig::default();
        let err = config.require_site(SiteId(4)).unwrap_err();
        assert!(matches!(err, CoreError::SiteNotFound { site } if site == SiteId(4)));
    }
}
