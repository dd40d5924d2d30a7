// SPDX-FileCopyrightText: 2026 Statdash Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Plugin manager: registration, directory discovery, enabled-set
//! normalization, callback registration, and scoped reload.
//!
//! One [`PluginManager`] is owned by the host; there is no global state.
//! Mutations serialize on an internal mutex and publish a freshly built
//! [`RegistrySnapshot`] through an `ArcSwap`, so readers always observe a
//! complete, consistent view without taking a lock.

use std::collections::{BTreeMap, HashMap, HashSet};
use std::panic::{AssertUnwindSafe, catch_unwind};
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};

use arc_swap::ArcSwap;
use semver::Version;
use statdash_core::{HostApp, StatdashError, host_version};
use tracing::{debug, info, warn};

use crate::descriptor::{Plugin, PluginPage};
use crate::manifest::{ManifestFactory, PLUGIN_MANIFEST_FILENAME, PluginFactory};
use crate::resolver::{RejectReason, Resolution, resolve};

/// Immutable view of the registry at one point in time.
///
/// Snapshots are cheap to clone (`Arc` all the way down) and are replaced
/// wholesale on every mutation; a reader holding one keeps seeing the
/// state it loaded.
#[derive(Clone)]
pub struct RegistrySnapshot {
    /// Every registered descriptor, in discovery/registration order.
    /// Includes rejected entries; see [`RegistrySnapshot::rejections`].
    entries: Vec<Arc<Plugin>>,
    by_id: HashMap<String, Arc<Plugin>>,
    resolution: Resolution,
}

impl RegistrySnapshot {
    fn empty() -> Self {
        RegistrySnapshot {
            entries: Vec::new(),
            by_id: HashMap::new(),
            resolution: Resolution::default(),
        }
    }

    fn build(entries: Vec<Arc<Plugin>>, host: &Version) -> Self {
        let resolution = resolve(&entries, host);
        let by_id = entries
            .iter()
            .map(|p| (p.id.clone(), Arc::clone(p)))
            .collect();
        RegistrySnapshot {
            entries,
            by_id,
            resolution,
        }
    }

    /// Validated plugins in discovery order.
    pub fn plugins(&self) -> Vec<Arc<Plugin>> {
        self.entries
            .iter()
            .filter(|p| !self.resolution.rejected.contains_key(&p.id))
            .cloned()
            .collect()
    }

    /// Look up any registered descriptor, validated or not.
    pub fn get(&self, id: &str) -> Option<&Arc<Plugin>> {
        self.by_id.get(id)
    }

    /// Validated ids in dependency load order.
    pub fn load_order(&self) -> &[String] {
        &self.resolution.ordered
    }

    /// Per-id rejection reasons for everything excluded from the
    /// validated set.
    pub fn rejections(&self) -> &BTreeMap<String, RejectReason> {
        &self.resolution.rejected
    }

    /// Ids enabled by default: every locked plugin plus every plugin
    /// declaring `default_enabled`, validated only, in discovery order.
    pub fn default_enabled(&self) -> Vec<String> {
        self.plugins()
            .iter()
            .filter(|p| p.locked || p.default_enabled)
            .map(|p| p.id.clone())
            .collect()
    }

    /// Normalize a requested enabled set against this snapshot.
    ///
    /// Locked plugins are always included, unknown or rejected ids are
    /// dropped, duplicates collapse, and the result follows discovery
    /// order. `None` means "use the defaults". Never fails.
    pub fn normalize_enabled(&self, requested: Option<&[String]>) -> Vec<String> {
        let Some(requested) = requested else {
            return self.default_enabled();
        };
        let wanted: HashSet<&str> = requested.iter().map(String::as_str).collect();
        self.plugins()
            .iter()
            .filter(|p| p.locked || wanted.contains(p.id.as_str()))
            .map(|p| p.id.clone())
            .collect()
    }

    /// Descriptor summaries for the host settings UI.
    pub fn plugin_metadata(&self) -> Vec<serde_json::Value> {
        self.plugins()
            .iter()
            .map(|p| {
                serde_json::json!({
                    "id": p.id,
                    "name": p.name,
                    "description": p.description,
                    "version": p.version,
                    "locked": p.locked,
                    "default_enabled": p.default_enabled,
                })
            })
            .collect()
    }

    /// Pages contributed by the given enabled plugins, as
    /// `(plugin_id, page)` pairs in enabled order.
    pub fn pages_for(&self, enabled: &[String]) -> Vec<(String, PluginPage)> {
        let enabled: HashSet<&str> = enabled.iter().map(String::as_str).collect();
        self.plugins()
            .iter()
            .filter(|p| enabled.contains(p.id.as_str()))
            .flat_map(|p| p.pages.iter().map(|page| (p.id.clone(), page.clone())))
            .collect()
    }

    /// Route path to `(plugin_id, page)` for the given enabled plugins.
    /// On a path collision the earlier plugin keeps the route.
    pub fn page_registry(&self, enabled: &[String]) -> HashMap<String, (String, PluginPage)> {
        let mut registry = HashMap::new();
        for (plugin_id, page) in self.pages_for(enabled) {
            registry
                .entry(page.path.clone())
                .or_insert((plugin_id, page));
        }
        registry
    }
}

struct ManagerInner {
    entries: Vec<Arc<Plugin>>,
    factories: HashMap<String, Arc<dyn PluginFactory>>,
    /// Discovery root from the last `discover` call; required by
    /// `reload_dir`.
    root: Option<PathBuf>,
    /// Directory name -> plugin id for directory-sourced entries.
    dir_to_id: HashMap<String, String>,
    /// Ids that came from discovery (replaced wholesale on re-discovery).
    discovered: HashSet<String>,
    /// Ids whose callback registrar has already been invoked.
    callbacks_done: HashSet<String>,
    /// Host handle retained from `register_callbacks` so a reload commit
    /// can re-register only the affected plugin.
    host: Option<Arc<dyn HostApp>>,
    /// Enabled set from the last `register_callbacks` call.
    last_enabled: Vec<String>,
}

impl ManagerInner {
    fn contains(&self, id: &str) -> bool {
        self.entries.iter().any(|p| p.id == id)
    }
}

/// Owner of the plugin registry. See the module docs for the concurrency
/// model.
pub struct PluginManager {
    host_version: Version,
    inner: Mutex<ManagerInner>,
    snapshot: ArcSwap<RegistrySnapshot>,
}

impl Default for PluginManager {
    fn default() -> Self {
        Self::new()
    }
}

impl PluginManager {
    pub fn new() -> Self {
        Self::with_host_version(host_version())
    }

    /// Use an explicit host version instead of the crate's own.
    pub fn with_host_version(host_version: Version) -> Self {
        PluginManager {
            host_version,
            inner: Mutex::new(ManagerInner {
                entries: Vec::new(),
                factories: HashMap::new(),
                root: None,
                dir_to_id: HashMap::new(),
                discovered: HashSet::new(),
                callbacks_done: HashSet::new(),
                host: None,
                last_enabled: Vec::new(),
            }),
            snapshot: ArcSwap::from_pointee(RegistrySnapshot::empty()),
        }
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, ManagerInner> {
        // Mutex poisoning only happens if a panic escaped a mutation,
        // which the catch_unwind isolation prevents; recover regardless.
        match self.inner.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        }
    }

    fn publish(&self, inner: &ManagerInner) {
        let snapshot = RegistrySnapshot::build(inner.entries.clone(), &self.host_version);
        self.snapshot.store(Arc::new(snapshot));
    }

    /// Current registry snapshot. The returned value stays consistent for
    /// as long as the caller holds it.
    pub fn registry(&self) -> Arc<RegistrySnapshot> {
        self.snapshot.load_full()
    }

    /// Validated plugins in discovery order.
    pub fn plugins(&self) -> Vec<Arc<Plugin>> {
        self.registry().plugins()
    }

    /// Look up a descriptor by id.
    pub fn get(&self, id: &str) -> Option<Arc<Plugin>> {
        self.registry().get(id).cloned()
    }

    /// Validated ids in dependency load order.
    pub fn load_order(&self) -> Vec<String> {
        self.registry().load_order().to_vec()
    }

    /// Current rejection map.
    pub fn rejections(&self) -> BTreeMap<String, RejectReason> {
        self.registry().rejections().clone()
    }

    pub fn default_enabled(&self) -> Vec<String> {
        self.registry().default_enabled()
    }

    pub fn normalize_enabled(&self, requested: Option<&[String]>) -> Vec<String> {
        self.registry().normalize_enabled(requested)
    }

    pub fn plugin_metadata(&self) -> Vec<serde_json::Value> {
        self.registry().plugin_metadata()
    }

    /// Register a factory for a plugin directory name. Discovery prefers a
    /// registered factory over the directory's manifest.
    pub fn register_factory(&self, dir_name: impl Into<String>, factory: Arc<dyn PluginFactory>) {
        let dir_name = dir_name.into();
        let mut inner = self.lock();
        inner.factories.insert(dir_name, factory);
    }

    /// Register a descriptor directly.
    ///
    /// The first registration of an id wins; a later attempt is rejected
    /// with [`StatdashError::DuplicateId`] and leaves the registry
    /// untouched.
    pub fn register(&self, plugin: Plugin) -> Result<(), StatdashError> {
        plugin.validate()?;
        let mut inner = self.lock();
        if inner.contains(&plugin.id) {
            warn!(plugin = %plugin.id, "duplicate registration ignored");
            return Err(StatdashError::DuplicateId { id: plugin.id });
        }
        info!(plugin = %plugin.id, version = %plugin.version, "plugin registered");
        inner.entries.push(Arc::new(plugin));
        self.publish(&inner);
        Ok(())
    }

    /// Remove a plugin by id. Returns whether anything was removed.
    pub fn unregister(&self, id: &str) -> bool {
        let mut inner = self.lock();
        let before = inner.entries.len();
        inner.entries.retain(|p| p.id != id);
        if inner.entries.len() == before {
            return false;
        }
        inner.discovered.remove(id);
        inner.callbacks_done.remove(id);
        inner.dir_to_id.retain(|_, mapped| mapped != id);
        info!(plugin = %id, "plugin unregistered");
        self.publish(&inner);
        true
    }

    /// Scan `root` for plugin directories and register every loadable
    /// candidate.
    ///
    /// Immediate subdirectories are visited in name order; hidden
    /// directories are skipped. A candidate loads through its registered
    /// factory, or through the built-in manifest factory when only a
    /// `plugin.toml` is present; a directory with neither is invisible.
    /// Any per-candidate failure (factory error or panic, malformed
    /// descriptor, duplicate id) is logged and excludes only that
    /// candidate. A full pass replaces the previous directory-sourced
    /// entries; manually registered plugins persist.
    ///
    /// Returns the ids registered by this pass.
    pub fn discover(&self, root: &Path) -> Result<Vec<String>, StatdashError> {
        let mut dirs: Vec<(String, PathBuf)> = Vec::new();
        let read = std::fs::read_dir(root).map_err(|err| StatdashError::Discovery {
            candidate: root.display().to_string(),
            reason: err.to_string(),
        })?;
        for entry in read {
            let entry = entry.map_err(|err| StatdashError::Discovery {
                candidate: root.display().to_string(),
                reason: err.to_string(),
            })?;
            let path = entry.path();
            if !path.is_dir() {
                continue;
            }
            let Some(name) = path.file_name().and_then(|n| n.to_str()) else {
                continue;
            };
            if name.starts_with('.') {
                debug!(candidate = %name, "hidden directory skipped");
                continue;
            }
            dirs.push((name.to_string(), path));
        }
        dirs.sort_by(|a, b| a.0.cmp(&b.0));

        let mut inner = self.lock();
        inner.root = Some(root.to_path_buf());

        // Re-discovery replaces everything directory-sourced. Each pass
        // produces a fresh descriptor generation, so the callback ledger
        // for the replaced ids is reset too; an id that vanishes and
        // later returns gets its registrar invoked again.
        let stale: HashSet<String> = inner.discovered.drain().collect();
        inner.entries.retain(|p| !stale.contains(&p.id));
        inner.callbacks_done.retain(|id| !stale.contains(id));
        inner.last_enabled.retain(|id| !stale.contains(id));
        inner.dir_to_id.clear();

        let mut registered = Vec::new();
        for (name, path) in dirs {
            match build_candidate(&inner.factories, &name, &path) {
                Ok(Some(plugin)) => {
                    if inner.contains(&plugin.id) {
                        warn!(
                            candidate = %name,
                            plugin = %plugin.id,
                            "duplicate plugin id during discovery, first registration wins"
                        );
                        continue;
                    }
                    info!(plugin = %plugin.id, dir = %name, "plugin discovered");
                    inner.dir_to_id.insert(name, plugin.id.clone());
                    inner.discovered.insert(plugin.id.clone());
                    registered.push(plugin.id.clone());
                    inner.entries.push(Arc::new(plugin));
                }
                Ok(None) => {
                    debug!(candidate = %name, "no factory or manifest, candidate invisible");
                }
                Err(err) => {
                    warn!(candidate = %name, reason = %err, "candidate excluded");
                }
            }
        }

        self.publish(&inner);
        Ok(registered)
    }

    /// Invoke callback registrars for the requested enabled set.
    ///
    /// Plugins are visited in dependency load order restricted to the
    /// normalized enabled set. Each registrar runs at most once per
    /// descriptor generation; errors and panics are logged and never stop
    /// the remaining plugins. The host handle is retained so a later
    /// reload commit can re-register the affected plugin.
    ///
    /// Returns the ids whose registrar ran during this call.
    pub fn register_callbacks(
        &self,
        host: Arc<dyn HostApp>,
        requested: Option<&[String]>,
    ) -> Vec<String> {
        let snapshot = self.registry();
        let enabled = snapshot.normalize_enabled(requested);
        let enabled_set: HashSet<&str> = enabled.iter().map(String::as_str).collect();

        let mut inner = self.lock();
        let mut invoked = Vec::new();
        for id in snapshot.load_order() {
            if !enabled_set.contains(id.as_str()) || inner.callbacks_done.contains(id) {
                continue;
            }
            let Some(plugin) = snapshot.get(id) else {
                continue;
            };
            // Exactly once even when the registrar fails: a panicking
            // registrar is not retried on the same descriptor.
            inner.callbacks_done.insert(id.clone());
            if let Some(registrar) = &plugin.callback_registrar {
                invoke_registrar(id, registrar, host.as_ref());
                invoked.push(id.clone());
            }
        }
        inner.host = Some(host);
        inner.last_enabled = enabled;
        invoked
    }

    /// Reload one plugin directory: rebuild its descriptor, validate it in
    /// isolation against the current set, and commit atomically.
    ///
    /// On any failure the previous descriptor and every other entry stay
    /// untouched. A committed reload re-invokes the plugin's callback
    /// registrar if callbacks were already registered and the plugin is
    /// enabled.
    pub fn reload_dir(&self, dir_name: &str) -> Result<String, StatdashError> {
        let mut inner = self.lock();
        let root = inner
            .root
            .clone()
            .ok_or_else(|| StatdashError::ReloadValidation {
                id: dir_name.to_string(),
                reason: "no discovery root; call discover() first".to_string(),
            })?;
        let path = root.join(dir_name);
        if !path.is_dir() {
            return Err(StatdashError::ReloadValidation {
                id: dir_name.to_string(),
                reason: "plugin directory no longer exists".to_string(),
            });
        }

        let candidate = build_candidate(&inner.factories, dir_name, &path)
            .and_then(|built| {
                built.ok_or_else(|| StatdashError::Discovery {
                    candidate: dir_name.to_string(),
                    reason: "no factory or manifest".to_string(),
                })
            })
            .map_err(|err| StatdashError::ReloadValidation {
                id: dir_name.to_string(),
                reason: err.to_string(),
            })?;

        // The directory's identity must be stable across reloads.
        if let Some(previous_id) = inner.dir_to_id.get(dir_name)
            && *previous_id != candidate.id
        {
            return Err(StatdashError::ReloadValidation {
                id: candidate.id,
                reason: format!("plugin id changed from `{previous_id}`"),
            });
        }

        let candidate_id = candidate.id.clone();
        let candidate = Arc::new(candidate);

        // Trial resolution with the candidate substituted.
        let mut trial: Vec<Arc<Plugin>> = inner.entries.clone();
        match trial.iter_mut().find(|p| p.id == candidate_id) {
            Some(slot) => *slot = Arc::clone(&candidate),
            None => trial.push(Arc::clone(&candidate)),
        }
        let resolution = resolve(&trial, &self.host_version);
        if let Some(reason) = resolution.rejected.get(&candidate_id) {
            warn!(plugin = %candidate_id, reason = %reason, "reload rolled back");
            return Err(StatdashError::ReloadValidation {
                id: candidate_id,
                reason: reason.to_string(),
            });
        }

        // Commit.
        inner.entries = trial;
        inner.dir_to_id
            .insert(dir_name.to_string(), candidate_id.clone());
        inner.discovered.insert(candidate_id.clone());
        inner.callbacks_done.remove(&candidate_id);
        self.publish(&inner);
        info!(plugin = %candidate_id, dir = %dir_name, "reload committed");

        // Re-register callbacks for the reloaded plugin only.
        if let Some(host) = inner.host.clone()
            && inner.last_enabled.iter().any(|id| *id == candidate_id)
        {
            inner.callbacks_done.insert(candidate_id.clone());
            if let Some(registrar) = &candidate.callback_registrar {
                invoke_registrar(&candidate_id, registrar, host.as_ref());
            }
        }

        Ok(candidate_id)
    }

    /// Root of the last discovery pass, if any.
    pub fn discovery_root(&self) -> Option<PathBuf> {
        self.lock().root.clone()
    }
}

/// Build a candidate descriptor for one directory.
///
/// `Ok(None)` means the directory is not a plugin (no registered factory,
/// no manifest). Factory panics are caught and reported as errors.
fn build_candidate(
    factories: &HashMap<String, Arc<dyn PluginFactory>>,
    name: &str,
    path: &Path,
) -> Result<Option<Plugin>, StatdashError> {
    let factory: Arc<dyn PluginFactory> = if let Some(factory) = factories.get(name) {
        Arc::clone(factory)
    } else if path.join(PLUGIN_MANIFEST_FILENAME).is_file() {
        Arc::new(ManifestFactory::new(path))
    } else {
        return Ok(None);
    };

    let built = catch_unwind(AssertUnwindSafe(|| factory.build())).map_err(|payload| {
        StatdashError::Discovery {
            candidate: name.to_string(),
            reason: format!("factory panicked: {}", panic_message(&payload)),
        }
    })??;
    built.validate()?;
    Ok(Some(built))
}

fn invoke_registrar(id: &str, registrar: &statdash_core::CallbackRegistrar, host: &dyn HostApp) {
    let outcome = catch_unwind(AssertUnwindSafe(|| registrar(host)));
    match outcome {
        Ok(()) => debug!(plugin = %id, "callbacks registered"),
        Err(payload) => {
            warn!(plugin = %id, reason = %panic_message(&payload), "callback registrar panicked");
        }
    }
}

fn panic_message(payload: &(dyn std::any::Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "unknown panic".to_string()
    }
}
