//! Config error-message and atomic-write integration tests.
//! Storage: ~/.scriptsync/config.yaml and ~/.scriptsync/sites/<id>/state.json

use assert_fs::prelude::*;
use predicates::prelude::predicate;
use scriptsync_core::{
    config::{self, SiteConfig, WorkspaceConfig},
    state, CoreError, ScriptId, SiteId,
};
use std::fs;

fn site() -> SiteConfig {
    SiteConfig {
        id: SiteId(1024),
        title: "Orders".to_string(),
        workspace: "/work/orders".into(),
        confirm_push: true,
    }
}

// ---------------------------------------------------------------------------
// 1. Load errors
// ---------------------------------------------------------------------------

#[test]
fn corrupt_yaml_returns_parse_error_with_path() {
    let home = assert_fs::TempDir::new().expect("tempdir");
    let dir = home.path().join(".scriptsync");
    fs::create_dir_all(&dir).expect("mkdir");
    fs::write(dir.join("config.yaml"), b": : corrupt : yaml : !!!\n  - broken: [unclosed")
        .expect("write");

    let err = config::load_at(home.path()).unwrap_err();
    assert!(matches!(err, CoreError::Parse { .. }), "got: {err}");
    assert!(err.to_string().contains("config.yaml"));
}

#[test]
fn wrong_shape_yaml_returns_parse_error() {
    let home = assert_fs::TempDir::new().expect("tempdir");
    home.child(".scriptsync/config.yaml")
        .write_str("- this is a list, not a mapping\n")
        .expect("write");
    let err = config::load_at(home.path()).unwrap_err();
    assert!(matches!(err, CoreError::Parse { .. }), "got: {err}");
}

// ---------------------------------------------------------------------------
// 2. Save
// ---------------------------------------------------------------------------

#[test]
fn save_writes_yaml_and_no_tmp() {
    let home = assert_fs::TempDir::new().expect("tempdir");
    let mut cfg = WorkspaceConfig::default();
    cfg.upsert_site(site());
    cfg.select_site(Some(SiteId(1024)));
    config::save_at(home.path(), &cfg).expect("save");

    home.child(".scriptsync/config.yaml")
        .assert(predicate::str::contains("current_site: 1024"))
        .assert(predicate::str::contains("confirm_push: true"));
    home.child(".scriptsync/config.yaml.tmp")
        .assert(predicate::path::missing());
}

#[test]
fn hand_written_config_uses_defaults() {
    let home = assert_fs::TempDir::new().expect("tempdir");
    home.child(".scriptsync/config.yaml")
        .write_str("sites:\n  - id: 7\n    title: Seven\n    workspace: /w/seven\n")
        .expect("write");
    let cfg = config::load_at(home.path()).expect("load");
    assert_eq!(cfg.current_site(), None);
    assert_eq!(cfg.api_key_env, config::DEFAULT_API_KEY_ENV);
    assert!(!cfg.require_site(SiteId(7)).expect("site").confirm_push);
}

// ---------------------------------------------------------------------------
// 3. State transactions
// ---------------------------------------------------------------------------

#[test]
fn state_update_returns_what_was_stored() {
    let home = assert_fs::TempDir::new().expect("tempdir");
    let returned = state::update_at(home.path(), SiteId(1024), |mut s| {
        s.counts.server = 4;
        s.active.server.insert(ScriptId(9));
        s
    })
    .expect("update");

    let loaded = state::load_at(home.path(), SiteId(1024)).expect("load");
    assert_eq!(returned, loaded);
    home.child(".scriptsync/sites/1024/state.json")
        .assert(predicate::path::exists());
}
