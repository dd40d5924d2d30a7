// SPDX-FileCopyrightText: 2026 Statdash Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Configuration system for the Statdash dashboard host.
//!
//! Provides TOML configuration parsing with strict validation
//! (`deny_unknown_fields`), XDG file hierarchy lookup, environment variable
//! overrides, and diagnostic error rendering with typo suggestions.
//!
//! # Usage
//!
//! ```no_run
//! use statdash_config::load_and_validate;
//!
//! let config = load_and_validate().expect("config errors");
//! println!("Plugin directory: {}", config.plugins.dir);
//! ```

pub mod diagnostic;
pub mod loader;
pub mod model;
pub mod validation;

pub use diagnostic::{ConfigError, render_errors};
pub use loader::{load_config, load_config_from_path, load_config_from_str};
pub use model::StatdashConfig;

/// Load configuration from the XDG hierarchy and validate it.
///
/// 1. Loads config from TOML files + env vars via Figment
/// 2. On success: runs post-deserialization validation
/// 3. On Figment error: converts to miette diagnostics with typo suggestions
///
/// Returns either a valid `StatdashConfig` or a list of diagnostic errors.
pub fn load_and_validate() -> Result<StatdashConfig, Vec<ConfigError>> {
    match loader::load_config() {
        Ok(config) => {
            validation::validate_config(&config)?;
            Ok(config)
        }
        Err(err) => {
            // TOML source contents are needed for error span rendering.
            let toml_sources = collect_toml_sources();
            Err(diagnostic::figment_to_config_errors(err, &toml_sources))
        }
    }
}

/// Load configuration from a TOML string and validate it.
///
/// Useful for testing and explicit configuration.
pub fn load_and_validate_str(toml_content: &str) -> Result<StatdashConfig, Vec<ConfigError>> {
    match loader::load_config_from_str(toml_content) {
        Ok(config) => {
            validation::validate_config(&config)?;
            Ok(config)
        }
        Err(err) => {
            let sources = vec![("<inline>".to_string(), toml_content.to_string())];
            Err(diagnostic::figment_to_config_errors(err, &sources))
        }
    }
}

/// Collect TOML source file contents for error span resolution.
fn collect_toml_sources() -> Vec<(String, String)> {
    let mut sources = Vec::new();

    // Local config
    if let Some(content) = read_source("statdash.toml") {
        let path = std::env::current_dir()
            .map(|d| d.join("statdash.toml").display().to_string())
            .unwrap_or_else(|_| "statdash.toml".to_string());
        sources.push((path, content));
    }

    // XDG user config
    if let Some(config_dir) = dirs::config_dir() {
        let path = config_dir.join("statdash/statdash.toml");
        if let Some(content) = read_source(&path.display().to_string()) {
            sources.push((path.display().to_string(), content));
        }
    }

    // System config
    if let Some(content) = read_source("/etc/statdash/statdash.toml") {
        sources.push(("/etc/statdash/statdash.toml".to_string(), content));
    }

    sources
}

/// Read one TOML source for span rendering. A missing file is normal;
/// anything else (permissions, encoding) is logged, since it means the
/// diagnostics will lack spans for that layer.
fn read_source(path: &str) -> Option<String> {
    match std::fs::read_to_string(path) {
        Ok(content) => Some(content),
        Err(err) if err.kind() == std::io::ErrorKind::NotFound => None,
        Err(err) => {
            tracing::warn!(path = %path, reason = %err, "config file unreadable, spans unavailable");
            None
        }
    }
}
