// SPDX-FileCopyrightText: 2026 Statdash Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Plugin subsystem for the Statdash host: descriptor model, manifest
//! parsing, dependency resolution, the plugin manager, persisted per-plugin
//! configuration, and hot reload.
//!
//! The host owns one [`PluginManager`]. Plugins enter the registry either
//! through compiled-in factories registered by directory name, through
//! `plugin.toml` manifests found during discovery, or through direct
//! [`PluginManager::register`] calls. Every mutation republishes an
//! immutable [`RegistrySnapshot`]; readers never block and never observe a
//! half-applied change.

pub mod config_store;
pub mod descriptor;
pub mod hot_reload;
pub mod manager;
pub mod manifest;
pub mod resolver;

pub use config_store::PluginConfigStore;
pub use descriptor::{ConfigSchema, Plugin, PluginPage, SettingSpec, SettingType};
pub use hot_reload::{DEFAULT_DEBOUNCE, HotReloadWatcher, ReloadEvent, ReloadState};
pub use manager::{PluginManager, RegistrySnapshot};
pub use manifest::{ManifestFactory, PLUGIN_MANIFEST_FILENAME, PluginFactory, load_manifest, parse_manifest};
pub use resolver::{RejectReason, Resolution, resolve};
