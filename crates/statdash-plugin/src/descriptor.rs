// SPDX-FileCopyrightText: 2026 Statdash Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Plugin descriptor model.
//!
//! A [`Plugin`] is an immutable value describing one extension module:
//! identity, pages, dependencies, host version bounds, config schema, and
//! optional behavior closures. Descriptors are handed around as
//! `Arc<Plugin>`; a hot reload produces a new descriptor that fully
//! replaces the old one or is discarded — there is no partial mutation.

use std::collections::{BTreeMap, HashSet};
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use serde_json::Value;
use statdash_core::{CallbackRegistrar, LayoutFn, StatdashError};

/// Value type a plugin setting may declare in its config schema.
#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    Hash,
    Serialize,
    Deserialize,
    strum::Display,
    strum::EnumString,
)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase", ascii_case_insensitive)]
pub enum SettingType {
    String,
    Integer,
    Number,
    Boolean,
    Array,
    Object,
}

impl SettingType {
    /// Whether a JSON value conforms to this type.
    ///
    /// `Integer` accepts only whole numbers; `Number` accepts any numeric
    /// value including integers.
    pub fn matches(&self, value: &Value) -> bool {
        match self {
            SettingType::String => value.is_string(),
            SettingType::Integer => value.is_i64() || value.is_u64(),
            SettingType::Number => value.is_number(),
            SettingType::Boolean => value.is_boolean(),
            SettingType::Array => value.is_array(),
            SettingType::Object => value.is_object(),
        }
    }
}

/// Declaration of a single plugin setting.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SettingSpec {
    /// Expected value type.
    #[serde(rename = "type")]
    pub kind: SettingType,
    /// Whether a full config record must contain this setting.
    #[serde(default)]
    pub required: bool,
    /// Default returned when no value has been persisted.
    #[serde(default)]
    pub default: Option<Value>,
}

/// A plugin's config schema: setting name to declaration, ordered for
/// stable iteration.
pub type ConfigSchema = BTreeMap<String, SettingSpec>;

/// Definition for a plugin-provided page: one route/view in the host with
/// its layout producer and navigation metadata.
#[derive(Clone)]
pub struct PluginPage {
    /// Unique page identifier, used for routing.
    pub id: String,
    /// Route path (e.g. `/example`).
    pub path: String,
    /// Display name shown in navigation.
    pub label: String,
    /// Icon identifier (e.g. `carbon:home`).
    pub icon: String,
    /// Top-level navigation section this page belongs to.
    pub section: String,
    /// Optional sub-grouping within the section.
    pub group: Option<String>,
    /// Sort order within the group/section (lower first).
    pub order: i64,
    /// Sort order of the group itself within the section.
    pub group_order: i64,
    /// Optional description of the page's purpose.
    pub description: Option<String>,
    /// Produces the page's component tree.
    pub layout: LayoutFn,
}

impl std::fmt::Debug for PluginPage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PluginPage")
            .field("id", &self.id)
            .field("path", &self.path)
            .field("label", &self.label)
            .field("section", &self.section)
            .field("group", &self.group)
            .field("order", &self.order)
            .finish_non_exhaustive()
    }
}

impl PluginPage {
    /// Create a page with defaults for the optional metadata and an empty
    /// layout. Builder methods fill in the rest.
    pub fn new(
        id: impl Into<String>,
        path: impl Into<String>,
        label: impl Into<String>,
        section: impl Into<String>,
    ) -> Self {
        Self {
            id: id.into(),
            path: path.into(),
            label: label.into(),
            icon: "carbon:document".to_string(),
            section: section.into(),
            group: None,
            order: 0,
            group_order: 0,
            description: None,
            layout: statdash_core::types::empty_layout(),
        }
    }

    pub fn with_layout(mut self, layout: LayoutFn) -> Self {
        self.layout = layout;
        self
    }

    pub fn with_icon(mut self, icon: impl Into<String>) -> Self {
        self.icon = icon.into();
        self
    }

    pub fn with_group(mut self, group: impl Into<String>, group_order: i64) -> Self {
        self.group = Some(group.into());
        self.group_order = group_order;
        self
    }

    pub fn with_order(mut self, order: i64) -> Self {
        self.order = order;
        self
    }
}

/// Metadata and behavior describing a complete plugin.
///
/// Equality is by id only: two descriptors for the same plugin id compare
/// equal regardless of contents. Use `Arc::ptr_eq` to check whether a
/// specific descriptor instance survived a reload.
#[derive(Clone)]
pub struct Plugin {
    /// Unique identifier, stable across reloads.
    pub id: String,
    /// Human-readable name.
    pub name: String,
    /// Brief description of what the plugin provides.
    pub description: String,
    /// Plugin version string (relaxed semver, e.g. `"1.0"`).
    pub version: String,
    /// Pages this plugin contributes.
    pub pages: Vec<PluginPage>,
    /// Plugin ids that must be enabled and loaded before this one.
    pub dependencies: Vec<String>,
    /// Minimum host version required; `None` means unbounded below.
    pub min_host_version: Option<String>,
    /// Maximum host version supported; `None` means unbounded above.
    pub max_host_version: Option<String>,
    /// Declared settings, if the plugin is configurable.
    pub config_schema: Option<ConfigSchema>,
    /// Locked plugins cannot be disabled and are always enabled.
    pub locked: bool,
    /// Enabled by default absent an explicit user choice.
    pub default_enabled: bool,
    /// Invoked exactly once when the plugin becomes active.
    pub callback_registrar: Option<CallbackRegistrar>,
}

impl Plugin {
    /// Create a descriptor with the original defaults: version `"1.0"`,
    /// enabled by default, not locked, no pages or dependencies.
    pub fn new(
        id: impl Into<String>,
        name: impl Into<String>,
        description: impl Into<String>,
    ) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            description: description.into(),
            version: "1.0".to_string(),
            pages: Vec::new(),
            dependencies: Vec::new(),
            min_host_version: None,
            max_host_version: None,
            config_schema: None,
            locked: false,
            default_enabled: true,
            callback_registrar: None,
        }
    }

    /// Check descriptor validity: non-empty id, unique page ids, and every
    /// schema default conforming to its declared type.
    pub fn validate(&self) -> Result<(), StatdashError> {
        if self.id.trim().is_empty() {
            return Err(StatdashError::InvalidDescriptor {
                id: self.id.clone(),
                reason: "id must not be empty".to_string(),
            });
        }

        let mut seen = HashSet::new();
        for page in &self.pages {
            if page.id.trim().is_empty() {
                return Err(StatdashError::InvalidDescriptor {
                    id: self.id.clone(),
                    reason: "page id must not be empty".to_string(),
                });
            }
            if !seen.insert(page.id.as_str()) {
                return Err(StatdashError::InvalidDescriptor {
                    id: self.id.clone(),
                    reason: format!("duplicate page id `{}`", page.id),
                });
            }
        }

        if let Some(schema) = &self.config_schema {
            for (field, spec) in schema {
                if let Some(default) = &spec.default
                    && !spec.kind.matches(default)
                {
                    return Err(StatdashError::InvalidDescriptor {
                        id: self.id.clone(),
                        reason: format!(
                            "schema default for `{field}` does not match declared type {}",
                            spec.kind
                        ),
                    });
                }
            }
        }

        Ok(())
    }

    /// Look up a page by id.
    pub fn page(&self, page_id: &str) -> Option<&PluginPage> {
        self.pages.iter().find(|p| p.id == page_id)
    }
}

impl PartialEq for Plugin {
    fn eq(&self, other: &Self) -> bool {
        self.id == other.id
    }
}

impl Eq for Plugin {}

impl std::fmt::Debug for Plugin {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Plugin")
            .field("id", &self.id)
            .field("name", &self.name)
            .field("version", &self.version)
            .field("pages", &self.pages.len())
            .field("dependencies", &self.dependencies)
            .field("locked", &self.locked)
            .field("default_enabled", &self.default_enabled)
            .field("registrar", &self.callback_registrar.is_some())
            .finish()
    }
}

/// Parse a setting type name, accepting the JSON-schema style lowercase
/// spellings used in manifests.
pub fn parse_setting_type(name: &str) -> Option<SettingType> {
    SettingType::from_str(name).ok()
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn schema_with_default(kind: SettingType, default: Value) -> ConfigSchema {
        let mut schema = ConfigSchema::new();
        schema.insert(
            "setting".to_string(),
            SettingSpec {
                kind,
                required: false,
                default: Some(default),
            },
        );
        schema
    }

    #[test]
    fn setting_type_matches_json_values() {
        assert!(SettingType::String.matches(&json!("hi")));
        assert!(SettingType::Integer.matches(&json!(3)));
        assert!(!SettingType::Integer.matches(&json!(3.5)));
        assert!(SettingType::Number.matches(&json!(3.5)));
        assert!(SettingType::Number.matches(&json!(3)));
        assert!(SettingType::Boolean.matches(&json!(true)));
        assert!(SettingType::Array.matches(&json!([1, 2])));
        assert!(SettingType::Object.matches(&json!({"k": 1})));
        assert!(!SettingType::String.matches(&json!(3)));
    }

    #[test]
    fn setting_type_parses_lowercase_names() {
        assert_eq!(parse_setting_type("integer"), Some(SettingType::Integer));
        assert_eq!(parse_setting_type("STRING"), Some(SettingType::String));
        assert_eq!(parse_setting_type("float"), None);
    }

    #[test]
    fn validate_rejects_empty_id() {
        let plugin = Plugin::new("  ", "Bad", "empty id");
        assert!(plugin.validate().is_err());
    }

    #[test]
    fn validate_rejects_duplicate_page_ids() {
        let mut plugin = Plugin::new("dup", "Dup", "duplicate pages");
        plugin.pages = vec![
            PluginPage::new("page", "/a", "A", "Core"),
            PluginPage::new("page", "/b", "B", "Core"),
        ];
        let err = plugin.validate().unwrap_err();
        assert!(err.to_string().contains("duplicate page id"));
    }

    #[test]
    fn validate_rejects_mismatched_schema_default() {
        let mut plugin = Plugin::new("cfg", "Cfg", "bad default");
        plugin.config_schema = Some(schema_with_default(SettingType::Integer, json!("ten")));
        let err = plugin.validate().unwrap_err();
        assert!(err.to_string().contains("does not match declared type"));
    }

    #[test]
    fn validate_accepts_well_formed_descriptor() {
        let mut plugin = Plugin::new("ok", "Ok", "fine");
        plugin.pages = vec![PluginPage::new("home", "/", "Home", "Core")];
        plugin.config_schema = Some(schema_with_default(SettingType::Integer, json!(30)));
        assert!(plugin.validate().is_ok());
    }

    #[test]
    fn equality_is_by_id() {
        let a = Plugin::new("same", "A", "first");
        let mut b = Plugin::new("same", "B", "second");
        b.version = "9.9.9".to_string();
        assert_eq!(a, b);
        assert_ne!(a, Plugin::new("other", "A", "first"));
    }
}
