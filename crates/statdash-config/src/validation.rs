// SPDX-FileCopyrightText: 2026 Statdash Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Post-deserialization validation for configuration values.
//!
//! Validates semantic constraints that cannot be expressed via serde
//! attributes, such as known log levels and non-empty paths.

use std::collections::HashSet;

use crate::diagnostic::ConfigError;
use crate::model::StatdashConfig;

const LOG_LEVELS: [&str; 5] = ["trace", "debug", "info", "warn", "error"];

/// Validate a deserialized configuration for semantic correctness.
///
/// Returns `Ok(())` if all validations pass, or `Err(Vec<ConfigError>)` with
/// all collected validation errors (does not fail fast).
pub fn validate_config(config: &StatdashConfig) -> Result<(), Vec<ConfigError>> {
    let mut errors = Vec::new();

    if !LOG_LEVELS.contains(&config.app.log_level.as_str()) {
        errors.push(ConfigError::Validation {
            message: format!(
                "app.log_level must be one of {}, got `{}`",
                LOG_LEVELS.join(", "),
                config.app.log_level
            ),
        });
    }

    if config.app.title.trim().is_empty() {
        errors.push(ConfigError::Validation {
            message: "app.title must not be empty".to_string(),
        });
    }

    if config.plugins.dir.trim().is_empty() {
        errors.push(ConfigError::Validation {
            message: "plugins.dir must not be empty".to_string(),
        });
    }

    if config.plugins.debounce_ms == 0 {
        errors.push(ConfigError::Validation {
            message: "plugins.debounce_ms must be at least 1".to_string(),
        });
    }

    if let Some(enabled) = &config.plugins.enabled {
        let mut seen = HashSet::new();
        for (i, id) in enabled.iter().enumerate() {
            if id.trim().is_empty() {
                errors.push(ConfigError::Validation {
                    message: format!("plugins.enabled[{i}] must not be empty"),
                });
            } else if !seen.insert(id) {
                errors.push(ConfigError::Validation {
                    message: format!("duplicate plugin id `{id}` in plugins.enabled"),
                });
            }
        }
    }

    if let Some(config_dir) = &config.plugins.config_dir
        && config_dir.trim().is_empty()
    {
        errors.push(ConfigError::Validation {
            message: "plugins.config_dir must not be empty when set".to_string(),
        });
    }

    if errors.is_empty() { Ok(()) } else { Err(errors) }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::PluginsConfig;

    #[test]
    fn default_config_validates() {
        assert!(validate_config(&StatdashConfig::default()).is_ok());
    }

    #[test]
    fn bad_log_level_is_rejected() {
        let mut config = StatdashConfig::default();
        config.app.log_level = "loud".to_string();
        let errors = validate_config(&config).unwrap_err();
        assert_eq!(errors.len(), 1);
        assert!(errors[0].to_string().contains("app.log_level"));
    }

    #[test]
    fn errors_are_collected_not_fail_fast() {
        let mut config = StatdashConfig::default();
        config.app.log_level = "loud".to_string();
        config.app.title = " ".to_string();
        config.plugins = PluginsConfig {
            dir: String::new(),
            debounce_ms: 0,
            ..PluginsConfig::default()
        };
        let errors = validate_config(&config).unwrap_err();
        assert_eq!(errors.len(), 4);
    }

    #[test]
    fn enabled_list_rejects_duplicates_and_blanks() {
        let mut config = StatdashConfig::default();
        config.plugins.enabled = Some(vec![
            "data".to_string(),
            "".to_string(),
            "data".to_string(),
        ]);
        let errors = validate_config(&config).unwrap_err();
        assert_eq!(errors.len(), 2);
    }
}
