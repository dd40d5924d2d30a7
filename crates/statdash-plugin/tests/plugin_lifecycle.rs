// SPDX-FileCopyrightText: 2026 Statdash Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! End-to-end tests for the plugin subsystem: manifest discovery,
//! dependency resolution, enabled-set normalization, callback
//! registration, persisted configuration, and reload.

use std::sync::{Arc, Mutex};

use semver::Version;
use serde_json::json;
use statdash_core::{CallbackFn, HostApp, StatdashError};
use statdash_plugin::{
    HotReloadWatcher, PLUGIN_MANIFEST_FILENAME, Plugin, PluginConfigStore, PluginManager,
    ReloadState,
};

struct RecordingHost {
    callbacks: Mutex<Vec<String>>,
}

impl RecordingHost {
    fn new() -> Arc<Self> {
        Arc::new(RecordingHost {
            callbacks: Mutex::new(Vec::new()),
        })
    }
}

impl HostApp for RecordingHost {
    fn add_callback(&self, id: &str, _handler: CallbackFn) {
        self.callbacks.lock().unwrap().push(id.to_string());
    }
}

/// Build a plugin tree on disk:
///   data      - no dependencies, one page, a config schema
///   analysis  - depends on data
///   viz       - depends on a plugin that does not exist
///   legacy    - requires a far-future host version
fn fixture_tree(root: &std::path::Path) {
    let write = |dir: &str, body: &str| {
        let path = root.join(dir);
        std::fs::create_dir(&path).unwrap();
        std::fs::write(path.join(PLUGIN_MANIFEST_FILENAME), body).unwrap();
    };

    write(
        "data",
        r#"
[plugin]
id = "data"
name = "Data Manager"
description = "Dataset loading and preview"
version = "1.2"

[[page]]
id = "browse"
path = "/data"
label = "Data"
icon = "carbon:table"
section = "workspace"

[config_schema.max_rows]
type = "integer"
required = false
default = 1000

[config_schema.source]
type = "string"
required = true
"#,
    );
    write(
        "analysis",
        r#"
[plugin]
id = "analysis"
name = "Analysis"
description = "Statistical tests"
dependencies = ["data"]

[[page]]
id = "run"
path = "/analysis"
label = "Analysis"
section = "workspace"
"#,
    );
    write(
        "viz",
        r#"
[plugin]
id = "viz"
name = "Visualization"
description = "Charts"
dependencies = ["plots"]
"#,
    );
    write(
        "legacy",
        r#"
[plugin]
id = "legacy"
name = "Legacy"
description = "Needs a newer host"
min_host_version = "99.0"
"#,
    );
}

#[test]
fn discovery_resolution_and_rejection_reporting() {
    let tmp = tempfile::tempdir().unwrap();
    fixture_tree(tmp.path());

    let manager = PluginManager::with_host_version(Version::new(1, 0, 0));
    let registered = manager.discover(tmp.path()).unwrap();
    // Name-ordered scan registers everything; resolution decides validity.
    assert_eq!(registered, vec!["analysis", "data", "legacy", "viz"]);

    assert_eq!(manager.load_order(), vec!["data", "analysis"]);
    let rejections = manager.rejections();
    assert_eq!(rejections["viz"].to_string(), "missing dependency: plots");
    assert_eq!(
        rejections["legacy"].to_string(),
        "host version 1.0.0 not in [99.0,*]"
    );

    // Validated listing follows discovery (name) order.
    let ids: Vec<String> = manager.plugins().iter().map(|p| p.id.clone()).collect();
    assert_eq!(ids, vec!["analysis", "data"]);
}

#[test]
fn enabled_set_and_page_routing() {
    let tmp = tempfile::tempdir().unwrap();
    fixture_tree(tmp.path());

    let manager = PluginManager::with_host_version(Version::new(1, 0, 0));
    manager.discover(tmp.path()).unwrap();

    let requested = vec!["analysis".to_string(), "viz".to_string(), "data".to_string()];
    let enabled = manager.normalize_enabled(Some(&requested));
    assert_eq!(enabled, vec!["analysis", "data"]);

    let snapshot = manager.registry();
    let registry = snapshot.page_registry(&enabled);
    assert_eq!(registry.len(), 2);
    assert_eq!(registry["/data"].0, "data");
    assert_eq!(registry["/analysis"].0, "analysis");
}

#[test]
fn callbacks_follow_load_order_and_survive_reload() {
    let tmp = tempfile::tempdir().unwrap();
    fixture_tree(tmp.path());

    let manager = PluginManager::with_host_version(Version::new(1, 0, 0));
    manager.register_factory(
        "analysis",
        factory_with_registrar(tmp.path().join("analysis")),
    );
    manager.register_factory("data", factory_with_registrar(tmp.path().join("data")));
    manager.discover(tmp.path()).unwrap();

    let host = RecordingHost::new();
    let invoked = manager.register_callbacks(host.clone(), None);
    assert_eq!(invoked, vec!["data", "analysis"]);
    assert_eq!(*host.callbacks.lock().unwrap(), vec!["data", "analysis"]);

    // A committed reload re-registers only the changed plugin.
    let manifest = tmp.path().join("data").join(PLUGIN_MANIFEST_FILENAME);
    let body = std::fs::read_to_string(&manifest).unwrap();
    std::fs::write(&manifest, body.replace("1.2", "1.3")).unwrap();
    manager.reload_dir("data").unwrap();
    assert_eq!(
        *host.callbacks.lock().unwrap(),
        vec!["data", "analysis", "data"]
    );
}

fn factory_with_registrar(dir: std::path::PathBuf) -> Arc<dyn statdash_plugin::PluginFactory> {
    Arc::new(move || -> Result<Plugin, StatdashError> {
        let mut plugin = statdash_plugin::load_manifest(&dir)?;
        let id = plugin.id.clone();
        plugin.callback_registrar = Some(Arc::new(move |host: &dyn HostApp| {
            host.add_callback(&id, Arc::new(|v: &serde_json::Value| v.clone()));
        }));
        Ok(plugin)
    })
}

#[test]
fn config_store_round_trip_with_discovered_schema() {
    let tmp = tempfile::tempdir().unwrap();
    fixture_tree(tmp.path());

    let manager = PluginManager::with_host_version(Version::new(1, 0, 0));
    manager.discover(tmp.path()).unwrap();
    let data = manager.get("data").unwrap();

    let config_dir = tempfile::tempdir().unwrap();
    let store = PluginConfigStore::new(config_dir.path());

    // Schema default before any write, persisted value afterwards.
    assert_eq!(store.get_setting(&data, "max_rows", None), Some(json!(1000)));
    store.set_setting(&data, "max_rows", json!(250)).unwrap();
    assert_eq!(store.get_setting(&data, "max_rows", None), Some(json!(250)));

    // Wrong type never reaches disk.
    let err = store.set_setting(&data, "max_rows", json!("lots")).unwrap_err();
    assert!(matches!(err, StatdashError::ConfigValidation { .. }));
    assert_eq!(store.get_setting(&data, "max_rows", None), Some(json!(250)));

    // The record is keyed by id and survives a reload of the descriptor.
    let manifest = tmp.path().join("data").join(PLUGIN_MANIFEST_FILENAME);
    let body = std::fs::read_to_string(&manifest).unwrap();
    std::fs::write(&manifest, body.replace("1.2", "2.0")).unwrap();
    manager.reload_dir("data").unwrap();
    let reloaded = manager.get("data").unwrap();
    assert_eq!(reloaded.version, "2.0");
    assert_eq!(store.get_setting(&reloaded, "max_rows", None), Some(json!(250)));
}

#[test]
fn reload_cure_removes_a_rejection() {
    let tmp = tempfile::tempdir().unwrap();
    fixture_tree(tmp.path());

    let manager = PluginManager::with_host_version(Version::new(1, 0, 0));
    manager.discover(tmp.path()).unwrap();
    assert!(manager.rejections().contains_key("viz"));

    // Dropping the bad dependency cures viz on the next reload.
    let manifest = tmp.path().join("viz").join(PLUGIN_MANIFEST_FILENAME);
    let body = std::fs::read_to_string(&manifest).unwrap();
    std::fs::write(&manifest, body.replace("dependencies = [\"plots\"]\n", "")).unwrap();
    manager.reload_dir("viz").unwrap();

    assert!(!manager.rejections().contains_key("viz"));
    assert_eq!(manager.load_order(), vec!["data", "viz", "analysis"]);
}

#[test]
fn watcher_commits_disk_edits_end_to_end() {
    let tmp = tempfile::tempdir().unwrap();
    fixture_tree(tmp.path());

    let manager = Arc::new(PluginManager::with_host_version(Version::new(1, 0, 0)));
    manager.discover(tmp.path()).unwrap();

    let mut watcher = HotReloadWatcher::new(Arc::clone(&manager))
        .with_debounce(std::time::Duration::from_millis(50));
    let committed: Arc<Mutex<Vec<String>>> = Arc::new(Mutex::new(Vec::new()));
    let sink = Arc::clone(&committed);
    watcher.subscribe(move |event| {
        if event.state == ReloadState::Committed {
            sink.lock().unwrap().push(event.plugin_dir.clone());
        }
    });
    watcher.start().unwrap();

    let manifest = tmp.path().join("analysis").join(PLUGIN_MANIFEST_FILENAME);
    let body = std::fs::read_to_string(&manifest).unwrap();
    std::fs::write(&manifest, body.replace("Statistical tests", "More tests")).unwrap();

    let deadline = std::time::Instant::now() + std::time::Duration::from_secs(5);
    while std::time::Instant::now() < deadline {
        if manager
            .get("analysis")
            .is_some_and(|p| p.description == "More tests")
        {
            break;
        }
        std::thread::sleep(std::time::Duration::from_millis(25));
    }
    watcher.stop();

    assert_eq!(manager.get("analysis").unwrap().description, "More tests");
    assert!(committed.lock().unwrap().iter().any(|d| d == "analysis"));
}

#[test]
fn same_tree_resolves_identically_every_time() {
    let tmp = tempfile::tempdir().unwrap();
    fixture_tree(tmp.path());

    let mut orders = Vec::new();
    for _ in 0..3 {
        let manager = PluginManager::with_host_version(Version::new(1, 0, 0));
        manager.discover(tmp.path()).unwrap();
        orders.push(manager.load_order());
    }
    assert!(orders.windows(2).all(|w| w[0] == w[1]));
}
