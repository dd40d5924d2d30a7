// SPDX-FileCopyrightText: 2026 Statdash Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Configuration loader using Figment for layered config merging.
//!
//! Supports XDG hierarchy: `./statdash.toml` > `~/.config/statdash/statdash.toml`
//! > `/etc/statdash/statdash.toml` with environment variable overrides via
//! `STATDASH_` prefix.

#![allow(clippy::result_large_err)] // figment::Error is external and cannot be boxed without wrapper

use std::path::Path;

use figment::{
    Figment,
    providers::{Env, Format, Serialized, Toml},
};

use crate::model::StatdashConfig;

/// Load configuration from the standard XDG hierarchy with env var overrides.
///
/// Merge order (later overrides earlier):
/// 1. Compiled defaults
/// 2. `/etc/statdash/statdash.toml` (system-wide)
/// 3. `~/.config/statdash/statdash.toml` (user XDG config)
/// 4. `./statdash.toml` (local directory)
/// 5. `STATDASH_*` environment variables
pub fn load_config() -> Result<StatdashConfig, figment::Error> {
    build_figment().extract()
}

/// Load configuration from a specific TOML string only (no XDG lookup).
///
/// Used for testing and explicit configuration.
pub fn load_config_from_str(toml_content: &str) -> Result<StatdashConfig, figment::Error> {
    Figment::new()
        .merge(Serialized::defaults(StatdashConfig::default()))
        .merge(Toml::string(toml_content))
        .extract()
}

/// Load configuration from a specific file path with env var overrides.
pub fn load_config_from_path(path: &Path) -> Result<StatdashConfig, figment::Error> {
    Figment::new()
        .merge(Serialized::defaults(StatdashConfig::default()))
        .merge(Toml::file(path))
        .merge(env_provider())
        .extract()
}

/// Build the Figment used internally for config loading (exposed for diagnostic use).
pub fn build_figment() -> Figment {
    Figment::new()
        .merge(Serialized::defaults(StatdashConfig::default()))
        .merge(Toml::file("/etc/statdash/statdash.toml"))
        .merge(Toml::file(
            dirs::config_dir()
                .map(|d| d.join("statdash/statdash.toml"))
                .unwrap_or_default(),
        ))
        .merge(Toml::file("statdash.toml"))
        .merge(env_provider())
}

/// Create the environment variable provider using explicit `map()` for
/// section-to-dot mapping.
///
/// Uses `Env::map()` rather than `Env::split("_")` to avoid ambiguity with
/// underscore-containing key names: `STATDASH_PLUGINS_DEBOUNCE_MS` must map
/// to `plugins.debounce_ms`, not `plugins.debounce.ms`.
fn env_provider() -> Env {
    Env::prefixed("STATDASH_").map(|key| {
        // `key` is the lowercased env var name with prefix stripped.
        // Example: STATDASH_PLUGINS_DEBOUNCE_MS -> "plugins_debounce_ms"
        let key_str = key.as_str();
        let mapped = key_str
            .replacen("app_", "app.", 1)
            .replacen("plugins_", "plugins.", 1);
        mapped.into()
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn toml_string_overrides_defaults() {
        let config = load_config_from_str(
            r#"
[app]
title = "Lab Dashboard"

[plugins]
debounce_ms = 100
"#,
        )
        .unwrap();
        assert_eq!(config.app.title, "Lab Dashboard");
        assert_eq!(config.plugins.debounce_ms, 100);
        // Untouched fields keep their defaults.
        assert_eq!(config.app.log_level, "info");
        assert!(config.plugins.hot_reload);
    }

    #[test]
    fn env_override_maps_to_nested_key() {
        figment::Jail::expect_with(|jail| {
            jail.set_env("STATDASH_PLUGINS_DEBOUNCE_MS", "75");
            jail.set_env("STATDASH_APP_LOG_LEVEL", "debug");
            let config: StatdashConfig = Figment::new()
                .merge(Serialized::defaults(StatdashConfig::default()))
                .merge(env_provider())
                .extract()?;
            assert_eq!(config.plugins.debounce_ms, 75);
            assert_eq!(config.app.log_level, "debug");
            Ok(())
        });
    }
}
