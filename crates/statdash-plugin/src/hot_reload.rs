// SPDX-FileCopyrightText: 2026 Statdash Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Filesystem watcher driving hot reload of plugin directories.
//!
//! Change notifications are debounced (default 300 ms; a later change
//! within the window resets it), mapped to plugin directory names, and
//! funneled through [`PluginManager::reload_dir`] on a dedicated worker
//! thread. Observers can subscribe to per-directory state transitions:
//! `PendingChange`, then `Validating` while the candidate is rebuilt and
//! checked, then `Committed` or `RolledBack`. Debouncing happens below
//! the subscriber surface, so `PendingChange` is emitted once per
//! coalesced change when its window has already elapsed and is
//! immediately followed by `Validating`; subscribers never see the time
//! spent inside the window.
//!
//! The watcher is an explicitly scoped resource: [`HotReloadWatcher::stop`]
//! (also run on drop) tears down the debouncer and joins the worker, so no
//! watch handle or thread outlives the value.

use std::path::PathBuf;
use std::sync::mpsc;
use std::sync::{Arc, Mutex};
use std::thread::JoinHandle;
use std::time::Duration;

use notify::{RecursiveMode, Watcher};
use notify_debouncer_mini::{DebounceEventResult, new_debouncer};
use statdash_core::StatdashError;
use tracing::{debug, info, warn};

use crate::manager::PluginManager;

/// Default debounce window for filesystem events.
pub const DEFAULT_DEBOUNCE: Duration = Duration::from_millis(300);

/// Lifecycle states a watched plugin directory moves through.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReloadState {
    PendingChange,
    Validating,
    Committed,
    RolledBack,
}

/// One observed state transition.
#[derive(Debug, Clone)]
pub struct ReloadEvent {
    pub plugin_dir: String,
    pub state: ReloadState,
}

type Subscriber = Box<dyn Fn(&ReloadEvent) + Send>;

struct Running {
    debouncer: notify_debouncer_mini::Debouncer<notify::RecommendedWatcher>,
    worker: JoinHandle<()>,
}

/// Watches the discovery root and reloads changed plugin directories.
pub struct HotReloadWatcher {
    manager: Arc<PluginManager>,
    debounce: Duration,
    subscribers: Arc<Mutex<Vec<Subscriber>>>,
    running: Option<Running>,
}

impl HotReloadWatcher {
    pub fn new(manager: Arc<PluginManager>) -> Self {
        HotReloadWatcher {
            manager,
            debounce: DEFAULT_DEBOUNCE,
            subscribers: Arc::new(Mutex::new(Vec::new())),
            running: None,
        }
    }

    /// Override the debounce window.
    pub fn with_debounce(mut self, debounce: Duration) -> Self {
        self.debounce = debounce;
        self
    }

    /// Observe reload state transitions. Subscribers run on the watcher's
    /// worker thread.
    pub fn subscribe(&self, subscriber: impl Fn(&ReloadEvent) + Send + 'static) {
        if let Ok(mut subscribers) = self.subscribers.lock() {
            subscribers.push(Box::new(subscriber));
        }
    }

    /// Start watching the manager's discovery root.
    ///
    /// Fails if no discovery pass has run yet or the watch cannot be
    /// installed. Starting an already-running watcher is a no-op.
    pub fn start(&mut self) -> Result<(), StatdashError> {
        if self.running.is_some() {
            return Ok(());
        }
        let root = self
            .manager
            .discovery_root()
            .ok_or_else(|| StatdashError::Watcher("no discovery root to watch".to_string()))?;

        let (tx, rx) = mpsc::channel::<Vec<PathBuf>>();
        let mut debouncer = new_debouncer(self.debounce, move |result: DebounceEventResult| {
            match result {
                Ok(events) => {
                    let paths: Vec<PathBuf> = events.into_iter().map(|e| e.path).collect();
                    // Send fails only after the worker is gone; nothing to do.
                    let _ = tx.send(paths);
                }
                Err(err) => warn!(reason = %err, "filesystem watch error"),
            }
        })
        .map_err(|err| StatdashError::Watcher(err.to_string()))?;
        debouncer
            .watcher()
            .watch(&root, RecursiveMode::Recursive)
            .map_err(|err| StatdashError::Watcher(err.to_string()))?;

        let manager = Arc::clone(&self.manager);
        let subscribers = Arc::clone(&self.subscribers);
        let worker_root = root.clone();
        let worker = std::thread::spawn(move || {
            while let Ok(paths) = rx.recv() {
                for dir in plugin_dirs(&worker_root, &paths) {
                    handle_change(&manager, &subscribers, &dir);
                }
            }
        });

        info!(root = %root.display(), debounce_ms = self.debounce.as_millis() as u64, "hot reload watching");
        self.running = Some(Running { debouncer, worker });
        Ok(())
    }

    /// Stop watching and join the worker. Idempotent.
    pub fn stop(&mut self) {
        let Some(running) = self.running.take() else {
            return;
        };
        // Dropping the debouncer stops its thread and drops the channel
        // sender, which ends the worker loop.
        drop(running.debouncer);
        if running.worker.join().is_err() {
            warn!("hot reload worker panicked during shutdown");
        }
        info!("hot reload stopped");
    }

    pub fn is_running(&self) -> bool {
        self.running.is_some()
    }
}

impl Drop for HotReloadWatcher {
    fn drop(&mut self) {
        self.stop();
    }
}

/// Map changed paths to plugin directory names: the first path component
/// under the watch root, hidden names excluded, deduplicated in event
/// order.
fn plugin_dirs(root: &std::path::Path, paths: &[PathBuf]) -> Vec<String> {
    let mut dirs: Vec<String> = Vec::new();
    for path in paths {
        let Ok(relative) = path.strip_prefix(root) else {
            continue;
        };
        let Some(std::path::Component::Normal(first)) = relative.components().next() else {
            continue;
        };
        let Some(name) = first.to_str() else {
            continue;
        };
        if name.starts_with('.') || dirs.iter().any(|d| d == name) {
            continue;
        }
        dirs.push(name.to_string());
    }
    dirs
}

fn handle_change(
    manager: &PluginManager,
    subscribers: &Mutex<Vec<Subscriber>>,
    dir: &str,
) {
    emit(subscribers, dir, ReloadState::PendingChange);
    emit(subscribers, dir, ReloadState::Validating);
    match manager.reload_dir(dir) {
        Ok(id) => {
            debug!(plugin = %id, dir = %dir, "hot reload committed");
            emit(subscribers, dir, ReloadState::Committed);
        }
        Err(err) => {
            warn!(dir = %dir, reason = %err, "hot reload rolled back");
            emit(subscribers, dir, ReloadState::RolledBack);
        }
    }
}

fn emit(subscribers: &Mutex<Vec<Subscriber>>, dir: &str, state: ReloadState) {
    let event = ReloadEvent {
        plugin_dir: dir.to_string(),
        state,
    };
    if let Ok(subscribers) = subscribers.lock() {
        for subscriber in subscribers.iter() {
            subscriber(&event);
        }
    }
}
