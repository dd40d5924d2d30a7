// SPDX-FileCopyrightText: 2026 Statdash Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Plugin manifest parsing and the factory contract.
//!
//! Each plugin directory carries a `plugin.toml` describing the plugin's
//! identity, pages, dependencies, host version bounds, and config schema.
//! Compiled-in behavior (page layouts, callback registrars) cannot live in
//! a data file, so it is attached through [`PluginFactory`] — the
//! zero-argument factory contract every discoverable plugin satisfies.
//! [`ManifestFactory`] is the standard implementation: it re-reads the
//! manifest from disk on every invocation, which is what makes hot reload
//! observe on-disk edits.

use std::collections::{BTreeMap, HashMap};
use std::fs;
use std::path::{Path, PathBuf};

use serde::Deserialize;
use statdash_core::{CallbackRegistrar, LayoutFn, StatdashError};

use crate::descriptor::{ConfigSchema, Plugin, PluginPage, SettingSpec, parse_setting_type};

/// Filename plugins must use for their manifest.
pub const PLUGIN_MANIFEST_FILENAME: &str = "plugin.toml";

/// A factory producing one plugin descriptor.
///
/// Absence or failure of this contract makes a candidate invisible to
/// discovery; it is never an application-fatal error. The factory is
/// invoked again on every hot reload of the plugin's directory, so
/// implementations that read disk pick up edits.
pub trait PluginFactory: Send + Sync {
    /// Build the plugin descriptor.
    fn build(&self) -> Result<Plugin, StatdashError>;
}

impl<F> PluginFactory for F
where
    F: Fn() -> Result<Plugin, StatdashError> + Send + Sync,
{
    fn build(&self) -> Result<Plugin, StatdashError> {
        self()
    }
}

/// Intermediate TOML deserialization struct for `plugin.toml`.
#[derive(Debug, Deserialize)]
struct ManifestFile {
    plugin: PluginSection,
    #[serde(default, rename = "page")]
    pages: Vec<PageSection>,
    #[serde(default)]
    config_schema: Option<BTreeMap<String, SettingSection>>,
}

/// The `[plugin]` section of a `plugin.toml` file.
#[derive(Debug, Deserialize)]
struct PluginSection {
    id: String,
    name: String,
    #[serde(default)]
    description: String,
    #[serde(default = "default_version")]
    version: String,
    #[serde(default)]
    dependencies: Vec<String>,
    min_host_version: Option<String>,
    max_host_version: Option<String>,
    #[serde(default)]
    locked: bool,
    #[serde(default = "default_enabled")]
    default_enabled: bool,
}

fn default_version() -> String {
    "1.0".to_string()
}

fn default_enabled() -> bool {
    true
}

/// A `[[page]]` entry.
#[derive(Debug, Deserialize)]
struct PageSection {
    id: String,
    path: String,
    label: String,
    #[serde(default)]
    icon: Option<String>,
    section: String,
    group: Option<String>,
    #[serde(default)]
    order: i64,
    #[serde(default)]
    group_order: i64,
    description: Option<String>,
}

/// A `[config_schema.<name>]` entry.
#[derive(Debug, Deserialize)]
struct SettingSection {
    #[serde(rename = "type")]
    kind: String,
    #[serde(default)]
    required: bool,
    default: Option<toml::Value>,
}

/// Parse a plugin manifest from TOML content.
///
/// Pages come back with empty layouts; [`ManifestFactory`] attaches
/// compiled-in layouts afterwards. Validates that the id is non-empty and
/// every schema entry names a known setting type.
pub fn parse_manifest(toml_content: &str) -> Result<Plugin, StatdashError> {
    let file: ManifestFile = toml::from_str(toml_content)
        .map_err(|e| StatdashError::Manifest(format!("failed to parse manifest: {e}")))?;

    let section = file.plugin;
    if section.id.trim().is_empty() {
        return Err(StatdashError::Manifest(
            "plugin id must not be empty".to_string(),
        ));
    }

    let config_schema = match file.config_schema {
        None => None,
        Some(entries) => {
            let mut schema = ConfigSchema::new();
            for (field, entry) in entries {
                let kind = parse_setting_type(&entry.kind).ok_or_else(|| {
                    StatdashError::Manifest(format!(
                        "unknown setting type `{}` for `{field}`; expected one of: \
                         string, integer, number, boolean, array, object",
                        entry.kind
                    ))
                })?;
                let default = entry
                    .default
                    .map(|v| {
                        serde_json::to_value(v).map_err(|e| {
                            StatdashError::Manifest(format!(
                                "default for `{field}` is not representable: {e}"
                            ))
                        })
                    })
                    .transpose()?;
                schema.insert(
                    field,
                    SettingSpec {
                        kind,
                        required: entry.required,
                        default,
                    },
                );
            }
            Some(schema)
        }
    };

    let pages = file
        .pages
        .into_iter()
        .map(|p| {
            let mut page = PluginPage::new(p.id, p.path, p.label, p.section);
            if let Some(icon) = p.icon {
                page.icon = icon;
            }
            page.group = p.group;
            page.order = p.order;
            page.group_order = p.group_order;
            page.description = p.description;
            page
        })
        .collect();

    let plugin = Plugin {
        id: section.id,
        name: section.name,
        description: section.description,
        version: section.version,
        pages,
        dependencies: section.dependencies,
        min_host_version: section.min_host_version,
        max_host_version: section.max_host_version,
        config_schema,
        locked: section.locked,
        default_enabled: section.default_enabled,
        callback_registrar: None,
    };
    plugin.validate()?;
    Ok(plugin)
}

/// Load and parse `plugin.toml` from a plugin directory.
pub fn load_manifest(plugin_dir: &Path) -> Result<Plugin, StatdashError> {
    let manifest_path = plugin_dir.join(PLUGIN_MANIFEST_FILENAME);
    let raw = fs::read_to_string(&manifest_path).map_err(|e| {
        StatdashError::Manifest(format!(
            "failed to read {}: {e}",
            manifest_path.display()
        ))
    })?;
    parse_manifest(&raw)
}

/// The standard factory: descriptor data from the directory's manifest,
/// behavior from compiled-in closures attached by page id.
pub struct ManifestFactory {
    dir: PathBuf,
    layouts: HashMap<String, LayoutFn>,
    registrar: Option<CallbackRegistrar>,
}

impl ManifestFactory {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self {
            dir: dir.into(),
            layouts: HashMap::new(),
            registrar: None,
        }
    }

    /// Attach a layout producer for one of the manifest's pages.
    pub fn with_layout(mut self, page_id: impl Into<String>, layout: LayoutFn) -> Self {
        self.layouts.insert(page_id.into(), layout);
        self
    }

    /// Attach the plugin's callback registrar.
    pub fn with_registrar(mut self, registrar: CallbackRegistrar) -> Self {
        self.registrar = Some(registrar);
        self
    }
}

impl PluginFactory for ManifestFactory {
    fn build(&self) -> Result<Plugin, StatdashError> {
        let mut plugin = load_manifest(&self.dir)?;
        for page in &mut plugin.pages {
            if let Some(layout) = self.layouts.get(&page.id) {
                page.layout = layout.clone();
            }
        }
        plugin.callback_registrar = self.registrar.clone();
        Ok(plugin)
    }
}
