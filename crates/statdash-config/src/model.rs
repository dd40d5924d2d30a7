// SPDX-FileCopyrightText: 2026 Statdash Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Configuration model structs for the Statdash host.
//!
//! All structs use `#[serde(deny_unknown_fields)]` to reject unrecognized
//! config keys at startup, providing actionable error messages.

use serde::{Deserialize, Serialize};

/// Top-level Statdash configuration.
///
/// Loaded from TOML files following XDG hierarchy, with environment variable
/// overrides. All sections are optional and default to sensible values.
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct StatdashConfig {
    /// Host application identity and logging settings.
    #[serde(default)]
    pub app: AppConfig,

    /// Plugin subsystem settings.
    #[serde(default)]
    pub plugins: PluginsConfig,
}

/// Host application configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct AppConfig {
    /// Title shown in the dashboard chrome.
    #[serde(default = "default_title")]
    pub title: String,

    /// Enable verbose developer tooling.
    #[serde(default)]
    pub debug: bool,

    /// Logging level (trace, debug, info, warn, error).
    #[serde(default = "default_log_level")]
    pub log_level: String,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            title: default_title(),
            debug: false,
            log_level: default_log_level(),
        }
    }
}

fn default_title() -> String {
    "Statdash".to_string()
}

fn default_log_level() -> String {
    "info".to_string()
}

/// Plugin subsystem configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct PluginsConfig {
    /// Directory scanned for plugin subdirectories.
    #[serde(default = "default_plugins_dir")]
    pub dir: String,

    /// Explicit enabled plugin ids. `None` means use each plugin's
    /// `default_enabled` flag; locked plugins are always active.
    #[serde(default)]
    pub enabled: Option<Vec<String>>,

    /// Watch the plugin directory and reload changed plugins.
    #[serde(default = "default_hot_reload")]
    pub hot_reload: bool,

    /// Debounce window for filesystem events, in milliseconds.
    #[serde(default = "default_debounce_ms")]
    pub debounce_ms: u64,

    /// Directory for persisted per-plugin config records. `None` uses the
    /// per-user data directory.
    #[serde(default)]
    pub config_dir: Option<String>,
}

impl Default for PluginsConfig {
    fn default() -> Self {
        Self {
            dir: default_plugins_dir(),
            enabled: None,
            hot_reload: default_hot_reload(),
            debounce_ms: default_debounce_ms(),
            config_dir: None,
        }
    }
}

fn default_plugins_dir() -> String {
    "plugins".to_string()
}

fn default_hot_reload() -> bool {
    true
}

fn default_debounce_ms() -> u64 {
    300
}
