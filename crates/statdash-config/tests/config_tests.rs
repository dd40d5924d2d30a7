// SPDX-FileCopyrightText: 2026 Statdash Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Integration tests for the Statdash configuration system.

use statdash_config::diagnostic::{ConfigError, suggest_key};
use statdash_config::model::StatdashConfig;
use statdash_config::{load_and_validate_str, load_config_from_str};

/// Valid TOML with all known fields deserializes successfully.
#[test]
fn valid_toml_deserializes_into_statdash_config() {
    let toml = r#"
[app]
title = "Lab Dashboard"
debug = true
log_level = "debug"

[plugins]
dir = "/srv/statdash/plugins"
enabled = ["data", "analysis"]
hot_reload = false
debounce_ms = 150
config_dir = "/var/lib/statdash/plugins"
"#;

    let config = load_config_from_str(toml).expect("valid TOML should deserialize");
    assert_eq!(config.app.title, "Lab Dashboard");
    assert!(config.app.debug);
    assert_eq!(config.app.log_level, "debug");
    assert_eq!(config.plugins.dir, "/srv/statdash/plugins");
    assert_eq!(
        config.plugins.enabled,
        Some(vec!["data".to_string(), "analysis".to_string()])
    );
    assert!(!config.plugins.hot_reload);
    assert_eq!(config.plugins.debounce_ms, 150);
    assert_eq!(
        config.plugins.config_dir.as_deref(),
        Some("/var/lib/statdash/plugins")
    );
}

/// An empty config is fully usable via defaults.
#[test]
fn empty_toml_uses_defaults() {
    let config = load_and_validate_str("").expect("empty config should validate");
    assert_eq!(config.app.title, "Statdash");
    assert_eq!(config.plugins.dir, "plugins");
    assert!(config.plugins.enabled.is_none());
    assert_eq!(config.plugins.debounce_ms, 300);
}

/// A misspelled key is rejected with a "did you mean?" suggestion.
#[test]
fn unknown_key_produces_suggestion_diagnostic() {
    let toml = r#"
[plugins]
enbaled = ["data"]
"#;

    let errors = load_and_validate_str(toml).expect_err("unknown key must fail");
    assert!(!errors.is_empty());
    let unknown = errors
        .iter()
        .find_map(|e| match e {
            ConfigError::UnknownKey {
                key, suggestion, ..
            } => Some((key.clone(), suggestion.clone())),
            _ => None,
        })
        .expect("expected an UnknownKey diagnostic");
    assert_eq!(unknown.0, "enbaled");
    assert_eq!(unknown.1.as_deref(), Some("enabled"));
}

/// An unknown top-level section is rejected.
#[test]
fn unknown_section_is_rejected() {
    let toml = r#"
[server]
port = 8080
"#;
    assert!(load_and_validate_str(toml).is_err());
}

/// A wrong value type is reported with the key path.
#[test]
fn wrong_type_is_reported() {
    let toml = r#"
[plugins]
debounce_ms = "soon"
"#;
    let errors = load_and_validate_str(toml).expect_err("type mismatch must fail");
    assert!(errors.iter().any(|e| matches!(
        e,
        ConfigError::InvalidType { .. } | ConfigError::Other(_)
    )));
}

/// Semantic validation collects every failure instead of stopping at the
/// first.
#[test]
fn semantic_validation_collects_all_errors() {
    let toml = r#"
[app]
title = ""
log_level = "shout"

[plugins]
debounce_ms = 0
"#;
    let errors = load_and_validate_str(toml).expect_err("invalid values must fail");
    assert_eq!(errors.len(), 3);
    assert!(errors.iter().all(|e| matches!(e, ConfigError::Validation { .. })));
}

#[test]
fn suggest_key_matches_close_typos_only() {
    let valid = &["title", "debug", "log_level"];
    assert_eq!(suggest_key("titel", valid), Some("title".to_string()));
    assert_eq!(suggest_key("qqqq", valid), None);
}

#[test]
fn serialized_defaults_round_trip() {
    let config = StatdashConfig::default();
    let toml = toml::to_string(&config).expect("defaults serialize");
    let back = load_config_from_str(&toml).expect("serialized defaults parse");
    assert_eq!(back.app.title, config.app.title);
    assert_eq!(back.plugins.debounce_ms, config.plugins.debounce_ms);
}
