use std::fs;
use std::path::{Path, PathBuf};

use serde_json::json;
use tempfile::TempDir;

use scriptsync_core::{
    codec,
    config::{self, SiteConfig, WorkspaceConfig},
    state, CoreError, ScriptFlag, ScriptId, ScriptVariant, SiteId,
};
use scriptsync_sync::{
    remote::wire_id, EntryStatus, IncrementalOutcome, MemoryScriptStore, Orchestrator, PushOptions,
    PushOutcome, RemoteError, SitePayload, SyncError, WriteResult,
};

const SITE: SiteId = SiteId(5);

struct Fixture {
    home: TempDir,
    workspace: TempDir,
    orch: Orchestrator<MemoryScriptStore>,
}

impl Fixture {
    fn new(confirm_push: bool) -> Self {
        let _ = env_logger::builder().is_test(true).try_init();
        let home = TempDir::new().expect("home");
        let workspace = TempDir::new().expect("workspace");

        let mut cfg = WorkspaceConfig::default();
        cfg.upsert_site(SiteConfig {
            id: SITE,
            title: "Orders".into(),
            workspace: workspace.path().to_path_buf(),
            confirm_push,
        });
        config::save_at(home.path(), &cfg).expect("save config");

        let store = MemoryScriptStore::new();
        store.put_site(SITE, payload());
        let orch = Orchestrator::new(home.path(), store);
        Self {
            home,
            workspace,
            orch,
        }
    }

    fn dir(&self, variant: ScriptVariant) -> PathBuf {
        self.workspace.path().join(variant.dir_name())
    }

    fn file(&self, variant: ScriptVariant, name: &str) -> PathBuf {
        self.dir(variant).join(name)
    }
}

fn payload() -> SitePayload {
    serde_json::from_value(json!({
        "Title": "Orders",
        "ReferenceType": "Issues",
        "ServerScripts": [
            {"Id": 1, "Title": "A", "Body": "a();", "BeforeCreate": true},
            {"Id": 2, "Title": "B", "Body": "b();"}
        ],
        "ClientScripts": [
            {"Id": 7, "Title": "C", "Body": "c();", "All": true}
        ]
    }))
    .expect("payload")
}

fn file_names(dir: &Path) -> Vec<String> {
    let mut names: Vec<String> = fs::read_dir(dir)
        .expect("read dir")
        .map(|e| e.expect("entry").file_name().to_string_lossy().into_owned())
        .collect();
    names.sort();
    names
}

// ---------------------------------------------------------------------------
// Pull
// ---------------------------------------------------------------------------

#[test]
fn pull_writes_one_file_per_remote_record() {
    let fx = Fixture::new(false);
    let report = fx.orch.pull(SITE).expect("pull");

    assert_eq!(report.written(), 3);
    assert_eq!(report.counts.server, 2);
    assert_eq!(report.counts.client, 1);
    assert_eq!(file_names(&fx.dir(ScriptVariant::Server)), vec!["1_A.js", "2_B.js"]);
    assert_eq!(file_names(&fx.dir(ScriptVariant::Client)), vec!["7_C.js"]);

    let text = fs::read_to_string(fx.file(ScriptVariant::Server, "1_A.js")).expect("read");
    assert!(text.starts_with(
        "// @script-id: 1\n// @script-title: A\n// @script-beforeCreate: true\n// @script-end\n\n"
    ));
    assert!(text.ends_with("a();"));

    let state = state::load_at(fx.home.path(), SITE).expect("state");
    assert!(state.last_pulled.is_some());
    assert_eq!(state.title.as_deref(), Some("Orders"));
    assert_eq!(state.reference_type.as_deref(), Some("Issues"));
}

#[test]
fn pull_is_idempotent() {
    let fx = Fixture::new(false);
    fx.orch.pull(SITE).expect("first pull");
    let before = fs::read(fx.file(ScriptVariant::Client, "7_C.js")).expect("read");

    let report = fx.orch.pull(SITE).expect("second pull");
    assert_eq!(report.written(), 0);
    assert_eq!(report.unchanged(), 3);
    assert_eq!(report.removed(), 0);
    assert_eq!(fs::read(fx.file(ScriptVariant::Client, "7_C.js")).expect("read"), before);
}

#[test]
fn pulled_bodies_round_trip_through_diff_and_push() {
    let fx = Fixture::new(false);
    let body = "// @script-note: kept\n\nb();\n";
    let mut remote = payload();
    remote.server_scripts[1].insert("Body".into(), json!(body));
    fx.orch.store().put_site(SITE, remote);
    fx.orch.pull(SITE).expect("pull");

    let entries = fx.orch.diff(SITE).expect("diff");
    assert!(entries.iter().all(|e| !e.differs()), "a fresh pull shows no changes");

    fx.orch.push(SITE, PushOptions::default()).expect("push");
    let sent = fx.orch.store().sent();
    let pushed = sent[0]
        .1
        .server_scripts
        .as_ref()
        .expect("server batch")
        .iter()
        .find(|s| wire_id(s) == Some(ScriptId(2)))
        .expect("script 2");
    assert_eq!(pushed.get("Body"), Some(&json!(body)));
}

#[test]
fn pull_removes_orphans() {
    let fx = Fixture::new(false);
    let dir = fx.dir(ScriptVariant::Server);
    fs::create_dir_all(&dir).expect("mkdir");
    fs::write(dir.join("1_A.js"), "stale").expect("write");
    fs::write(dir.join("2_B.js"), "stale").expect("write");
    fs::write(dir.join("notes.txt"), "keep me").expect("write");

    let mut remote = payload();
    remote.server_scripts.retain(|s| wire_id(s) == Some(ScriptId(1)));
    fx.orch.store().put_site(SITE, remote);

    let report = fx.orch.pull(SITE).expect("pull");
    assert_eq!(file_names(&dir), vec!["1_A.js", "notes.txt"]);
    let removed = WriteResult::Removed {
        path: dir.join("2_B.js"),
    };
    assert!(report.files.contains(&removed));
}

#[test]
fn failed_fetch_changes_nothing() {
    let fx = Fixture::new(false);
    let dir = fx.dir(ScriptVariant::Server);
    fs::create_dir_all(&dir).expect("mkdir");
    fs::write(dir.join("9_Old.js"), "old();").expect("write");
    fx.orch
        .store()
        .fail_with(RemoteError::Transport("connection refused".into()));

    let err = fx.orch.pull(SITE).unwrap_err();
    assert!(matches!(err.root(), SyncError::Remote(RemoteError::Transport(_))));
    assert!(err.to_string().contains("pull failed for site 5"), "got: {err}");
    assert_eq!(file_names(&dir), vec!["9_Old.js"]);
    assert!(!scriptsync_sync::snapshot::snapshot_path_at(fx.home.path(), SITE).exists());
}

#[test]
fn unknown_site_is_reported_with_operation() {
    let fx = Fixture::new(false);
    let err = fx.orch.diff(SiteId(99)).unwrap_err();
    assert!(matches!(
        err.root(),
        SyncError::Core(CoreError::SiteNotFound { .. })
    ));
    assert!(err.to_string().starts_with("diff failed for site 99"));
}

// ---------------------------------------------------------------------------
// Push
// ---------------------------------------------------------------------------

#[test]
fn push_then_pull_round_trips_edits() {
    let fx = Fixture::new(false);
    fx.orch.pull(SITE).expect("pull");

    let path = fx.file(ScriptVariant::Server, "1_A.js");
    fs::write(
        &path,
        "// @script-id: 1\n// @script-title: A\n// @script-afterUpdate: true\n\nedited();\n",
    )
    .expect("edit");

    let outcome = fx.orch.push(SITE, PushOptions::default()).expect("push");
    let PushOutcome::Pushed(report) = outcome else {
        panic!("expected a push, got {outcome:?}");
    };
    assert_eq!(report.counts.server, 2);
    assert_eq!(report.counts.client, 1);
    assert!(report.created.is_empty());

    fx.orch.pull(SITE).expect("pull again");
    let text = fs::read_to_string(&path).expect("read");
    let decoded = codec::decode_script(&text, ScriptVariant::Server).expect("decode");
    assert_eq!(decoded.body, "edited();");
    assert_eq!(decoded.flags.get(&ScriptFlag::AfterUpdate), Some(&true));
    assert_eq!(
        decoded.flags.get(&ScriptFlag::BeforeCreate),
        Some(&true),
        "flag left out of the edited file keeps its pulled value"
    );

    let state = state::load_at(fx.home.path(), SITE).expect("state");
    assert!(state.last_pushed.is_some());
}

#[test]
fn push_honours_active_set() {
    let fx = Fixture::new(false);
    fx.orch.pull(SITE).expect("pull");
    state::set_active_at(fx.home.path(), SITE, &[ScriptId(2)], &[]).expect("set active");

    let outcome = fx.orch.push(SITE, PushOptions::default()).expect("push");
    assert!(matches!(outcome, PushOutcome::Pushed(_)));

    let sent = fx.orch.store().sent();
    assert_eq!(sent.len(), 1);
    let batch = &sent[0].1;
    let ids: Vec<_> = batch.scripts(ScriptVariant::Server).iter().filter_map(wire_id).collect();
    assert_eq!(ids, vec![ScriptId(2)]);
    assert!(batch.client_scripts.is_none());
}

#[test]
fn push_with_stale_active_ids_selects_nothing() {
    let fx = Fixture::new(false);
    fx.orch.pull(SITE).expect("pull");
    state::set_active_at(fx.home.path(), SITE, &[ScriptId(404)], &[]).expect("set active");

    let outcome = fx.orch.push(SITE, PushOptions::default()).expect("push");
    assert_eq!(outcome, PushOutcome::NothingSelected);
    assert!(fx.orch.store().sent().is_empty());
}

#[test]
fn dry_run_push_sends_nothing() {
    let fx = Fixture::new(true);
    fx.orch.pull(SITE).expect("pull");

    let dry_run = PushOptions {
        dry_run: true,
        force: false,
    };
    let outcome = fx.orch.push(SITE, dry_run).expect("dry run");
    let PushOutcome::DryRun(entries) = outcome else {
        panic!("expected dry run entries");
    };
    assert_eq!(entries.len(), 3);
    assert!(fx.orch.store().sent().is_empty());
}

#[test]
fn confirm_push_site_needs_force() {
    let fx = Fixture::new(true);
    fx.orch.pull(SITE).expect("pull");

    let err = fx.orch.push(SITE, PushOptions::default()).unwrap_err();
    assert!(matches!(err.root(), SyncError::ConfirmationRequired { site } if *site == SITE));
    assert!(fx.orch.store().sent().is_empty());

    let forced = PushOptions {
        dry_run: false,
        force: true,
    };
    let outcome = fx.orch.push(SITE, forced).expect("forced push");
    assert!(matches!(outcome, PushOutcome::Pushed(_)));
}

#[test]
fn new_file_is_created_remotely() {
    let fx = Fixture::new(false);
    fx.orch.pull(SITE).expect("pull");
    let draft = fx.file(ScriptVariant::Client, "new_Draft.js");
    fs::write(&draft, "draft();").expect("write");

    let outcome = fx.orch.push(SITE, PushOptions::default()).expect("push");
    let PushOutcome::Pushed(report) = outcome else {
        panic!("expected a push");
    };
    assert_eq!(report.created, vec![draft]);

    let site = fx.orch.store().site(SITE).expect("site");
    assert_eq!(site.client_scripts.len(), 2);
    let report = fx.orch.pull(SITE).expect("pull");
    assert_eq!(report.removed(), 1, "the new_ file is replaced by its id-named copy");
    assert_eq!(file_names(&fx.dir(ScriptVariant::Client)), vec!["7_C.js", "8_Draft.js"]);
}

// ---------------------------------------------------------------------------
// Diff
// ---------------------------------------------------------------------------

#[test]
fn diff_is_ordered_and_classified() {
    let fx = Fixture::new(false);
    fx.orch.pull(SITE).expect("pull");

    fs::write(
        fx.file(ScriptVariant::Server, "1_A.js"),
        "// @script-id: 1\n// @script-title: A\n// @script-beforeCreate: true\n\nchanged();",
    )
    .expect("edit");
    fs::write(fx.file(ScriptVariant::Client, "new_Draft.js"), "draft();").expect("write");

    let mut remote = payload();
    let fresh = json!({"Id": 3, "Title": "Fresh", "Body": ""});
    remote
        .server_scripts
        .push(serde_json::from_value(fresh).expect("script"));
    fx.orch.store().put_site(SITE, remote);

    let entries = fx.orch.diff(SITE).expect("diff");
    let keys: Vec<_> = entries.iter().map(|e| e.key_string()).collect();
    assert_eq!(keys, vec!["server:1", "server:2", "server:3", "client:7", "client:Draft"]);

    assert!(entries[0].differs());
    assert!(!entries[1].differs());
    assert_eq!(entries[2].status(), EntryStatus::RemoteOnly);
    assert!(!entries[3].differs());
    assert_eq!(entries[4].status(), EntryStatus::LocalOnly);

    let unified = scriptsync_sync::diff::unified_diff(&entries[0])
        .expect("diff text")
        .expect("changed");
    assert!(unified.contains("+changed();"));
    assert!(fx.orch.store().sent().is_empty(), "diff must not write remotely");
}

// ---------------------------------------------------------------------------
// Incremental push and upload
// ---------------------------------------------------------------------------

#[test]
fn incremental_push_ignores_outside_paths() {
    let fx = Fixture::new(false);
    let outcome = fx
        .orch
        .incremental_push(SITE, Path::new("/tmp/outside.js"))
        .expect("no error");
    assert_eq!(outcome, IncrementalOutcome::Ignored);
    assert!(fx.orch.store().sent().is_empty());
}

#[test]
fn incremental_push_sends_only_changed_file() {
    let fx = Fixture::new(false);
    fx.orch.pull(SITE).expect("pull");
    state::set_active_at(fx.home.path(), SITE, &[ScriptId(2)], &[]).expect("active");

    let path = fx.file(ScriptVariant::Server, "1_A.js");
    assert_eq!(
        fx.orch.incremental_push(SITE, &path).expect("unchanged"),
        IncrementalOutcome::Unchanged
    );

    fs::write(&path, "// @script-id: 1\n// @script-title: A\n\nnew();").expect("edit");
    let outcome = fx.orch.incremental_push(SITE, &path).expect("push");
    assert_eq!(
        outcome,
        IncrementalOutcome::Pushed {
            variant: ScriptVariant::Server,
            id: Some(ScriptId(1)),
            path: path.clone(),
        }
    );

    let sent = fx.orch.store().sent();
    assert_eq!(sent.len(), 1);
    assert_eq!(sent[0].1.len(), 1);
    assert!(sent[0].1.client_scripts.is_none());

    assert_eq!(
        fx.orch.incremental_push(SITE, &path).expect("again"),
        IncrementalOutcome::Unchanged,
        "a pushed file is not sent twice"
    );
}

#[test]
fn incremental_push_of_new_file_creates_one_remote_script() {
    let fx = Fixture::new(false);
    fx.orch.pull(SITE).expect("pull");
    let path = fx.file(ScriptVariant::Server, "new_Hook.js");
    fs::write(&path, "// @script-title: Hook\n\nhook();").expect("write");

    let first = fx.orch.incremental_push(SITE, &path).expect("create");
    assert_eq!(
        first,
        IncrementalOutcome::Pushed {
            variant: ScriptVariant::Server,
            id: Some(ScriptId(3)),
            path: path.clone(),
        }
    );
    let text = fs::read_to_string(&path).expect("read");
    assert!(text.starts_with("// @script-id: 3\n"), "assigned id is written back: {text}");
    assert_eq!(
        fx.orch.incremental_push(SITE, &path).expect("rewritten header"),
        IncrementalOutcome::Unchanged
    );

    fs::write(&path, text.replace("hook();", "hook(2);")).expect("second save");
    let second = fx.orch.incremental_push(SITE, &path).expect("update");
    assert!(matches!(second, IncrementalOutcome::Pushed { id: Some(ScriptId(3)), .. }));

    let sent = fx.orch.store().sent();
    assert_eq!(sent.len(), 2);
    let update = &sent[1].1.server_scripts.as_ref().expect("server batch")[0];
    assert_eq!(update.get("Id"), Some(&json!(3)));

    let site = fx.orch.store().site(SITE).expect("site");
    let hooks: Vec<_> = site
        .server_scripts
        .iter()
        .filter(|s| s.get("Title") == Some(&json!("Hook")))
        .collect();
    assert_eq!(hooks.len(), 1, "saving twice must not create a second record");
    assert_eq!(hooks[0].get("Body"), Some(&json!("hook(2);")));
}

#[test]
fn upload_infers_variant_from_path() {
    let fx = Fixture::new(false);
    let loose = TempDir::new().expect("loose");
    let server_dir = loose.path().join("my-server-stuff");
    fs::create_dir_all(&server_dir).expect("mkdir");
    let hook = server_dir.join("hook.js");
    fs::write(
        &hook,
        "// @script-title: Hook\n// @script-afterCreate: true\n\nhook();",
    )
    .expect("write");

    let report = fx.orch.upload(SITE, &[hook.clone()], None).expect("upload");
    assert_eq!(report.counts.server, 1);
    assert_eq!(report.created, vec![hook]);

    let site = fx.orch.store().site(SITE).expect("site");
    let created = site
        .server_scripts
        .iter()
        .find(|s| s.get("Title") == Some(&json!("Hook")))
        .expect("created script");
    assert_eq!(created.get("AfterCreate"), Some(&json!(true)));
}

#[test]
fn upload_without_recognisable_variant_fails() {
    let fx = Fixture::new(false);
    let loose = TempDir::new().expect("loose");
    let path = loose.path().join("thing.js");
    fs::write(&path, "x();").expect("write");

    let err = fx.orch.upload(SITE, &[path.clone()], None).unwrap_err();
    assert!(matches!(err.root(), SyncError::Validation(_)));

    fx.orch
        .upload(SITE, &[path], Some(ScriptVariant::Client))
        .expect("hinted upload");
}

// ---------------------------------------------------------------------------
// Delete, active set, status
// ---------------------------------------------------------------------------

#[test]
fn delete_removes_remote_local_and_active() {
    let fx = Fixture::new(false);
    fx.orch.pull(SITE).expect("pull");
    state::set_active_at(fx.home.path(), SITE, &[ScriptId(1), ScriptId(2)], &[]).expect("active");

    let report = fx
        .orch
        .delete(SITE, ScriptVariant::Server, &[ScriptId(2)])
        .expect("delete");
    assert_eq!(report.removed_files, vec![fx.file(ScriptVariant::Server, "2_B.js")]);
    assert_eq!(file_names(&fx.dir(ScriptVariant::Server)), vec!["1_A.js"]);

    let remote = fx.orch.store().site(SITE).expect("site");
    assert!(remote.server_scripts.iter().all(|s| wire_id(s) != Some(ScriptId(2))));

    let active = state::get_active_at(fx.home.path(), SITE).expect("active");
    assert_eq!(active.server.into_iter().collect::<Vec<_>>(), vec![ScriptId(1)]);
}

#[test]
fn delete_of_unknown_id_is_not_found() {
    let fx = Fixture::new(false);
    let err = fx
        .orch
        .delete(SITE, ScriptVariant::Client, &[ScriptId(1)])
        .unwrap_err();
    assert!(matches!(err.root(), SyncError::NotFound(_)), "got: {err}");
    assert!(fx.orch.store().sent().is_empty());
}

#[test]
fn toggle_active_flips_membership() {
    let fx = Fixture::new(false);
    assert!(fx.orch.toggle_active(SITE, ScriptVariant::Client, ScriptId(7)).expect("on"));
    assert!(!fx.orch.toggle_active(SITE, ScriptVariant::Client, ScriptId(7)).expect("off"));
    assert!(state::get_active_at(fx.home.path(), SITE).expect("active").is_empty());
}

#[test]
fn status_counts_local_files() {
    let fx = Fixture::new(true);
    let before = fx.orch.status(SITE).expect("status");
    assert_eq!(before.local.server, 0);
    assert!(before.last_pulled().is_none());

    fx.orch.pull(SITE).expect("pull");
    let after = fx.orch.status(SITE).expect("status");
    assert_eq!(after.local.server, 2);
    assert_eq!(after.local.client, 1);
    assert_eq!(after.state.counts.server, 2);
    assert!(after.confirm_push);
    assert!(after.last_pulled().is_some());
}
