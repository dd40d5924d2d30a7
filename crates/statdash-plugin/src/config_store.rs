// SPDX-FileCopyrightText: 2026 Statdash Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Persisted per-plugin configuration, validated against each plugin's
//! declared config schema.
//!
//! One JSON record per plugin id lives under the store's directory as
//! `<id>.json`. Records are keyed by id, not by descriptor, so they
//! survive hot reloads. Writes are atomic (temp file + rename): a rejected
//! or failed write leaves the previous record byte-identical on disk.

use std::io::Write;
use std::path::{Path, PathBuf};

use serde_json::{Map, Value};
use statdash_core::StatdashError;
use tracing::{debug, warn};

use crate::descriptor::{Plugin, SettingSpec};

/// JSON-backed store for per-plugin settings.
pub struct PluginConfigStore {
    dir: PathBuf,
}

impl PluginConfigStore {
    /// Open a store rooted at `dir`. The directory is created on first
    /// write.
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        PluginConfigStore { dir: dir.into() }
    }

    /// Conventional per-user location (`~/.local/share/statdash/plugins`
    /// on Linux).
    pub fn default_dir() -> Option<PathBuf> {
        dirs::data_local_dir().map(|d| d.join("statdash").join("plugins"))
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    fn record_path(&self, plugin_id: &str) -> PathBuf {
        self.dir.join(format!("{plugin_id}.json"))
    }

    /// Load the persisted record for a plugin.
    ///
    /// A missing file is an empty record. An unreadable or malformed file
    /// also degrades to empty, with the error logged, so one corrupt
    /// record never takes the host down.
    pub fn load_record(&self, plugin_id: &str) -> Map<String, Value> {
        let path = self.record_path(plugin_id);
        let raw = match std::fs::read(&path) {
            Ok(raw) => raw,
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => return Map::new(),
            Err(err) => {
                warn!(plugin = %plugin_id, reason = %err, "unreadable config record, using empty");
                return Map::new();
            }
        };
        match serde_json::from_slice::<Value>(&raw) {
            Ok(Value::Object(record)) => record,
            Ok(_) => {
                warn!(plugin = %plugin_id, "config record is not a JSON object, using empty");
                Map::new()
            }
            Err(err) => {
                warn!(plugin = %plugin_id, reason = %err, "corrupt config record, using empty");
                Map::new()
            }
        }
    }

    /// Read one setting.
    ///
    /// Resolution order: persisted value, then the schema default, then
    /// the caller-supplied default.
    pub fn get_setting(&self, plugin: &Plugin, key: &str, default: Option<Value>) -> Option<Value> {
        if let Some(value) = self.load_record(&plugin.id).remove(key) {
            return Some(value);
        }
        if let Some(spec) = schema_entry(plugin, key)
            && let Some(schema_default) = &spec.default
        {
            return Some(schema_default.clone());
        }
        default
    }

    /// Write one setting, validating it against the plugin's schema first.
    ///
    /// An undeclared key or a type mismatch fails with
    /// [`StatdashError::ConfigValidation`] and mutates nothing, on disk or
    /// otherwise. Storage failures are fatal to the caller.
    pub fn set_setting(
        &self,
        plugin: &Plugin,
        key: &str,
        value: Value,
    ) -> Result<(), StatdashError> {
        let spec = schema_entry(plugin, key).ok_or_else(|| StatdashError::ConfigValidation {
            plugin_id: plugin.id.clone(),
            field: key.to_string(),
            reason: "not declared in the plugin's config schema".to_string(),
        })?;
        if !spec.kind.matches(&value) {
            return Err(StatdashError::ConfigValidation {
                plugin_id: plugin.id.clone(),
                field: key.to_string(),
                reason: format!("expected {}, got {}", spec.kind, json_type_name(&value)),
            });
        }

        let mut record = self.load_record(&plugin.id);
        record.insert(key.to_string(), value);
        self.write_record(&plugin.id, &record)?;
        debug!(plugin = %plugin.id, field = %key, "setting persisted");
        Ok(())
    }

    /// Validate a full record against the plugin's schema: every required
    /// setting present, every present setting declared and of the right
    /// type.
    pub fn validate_record(
        &self,
        plugin: &Plugin,
        record: &Map<String, Value>,
    ) -> Result<(), StatdashError> {
        let schema = plugin.config_schema.as_ref();
        for (key, value) in record {
            let spec =
                schema
                    .and_then(|s| s.get(key))
                    .ok_or_else(|| StatdashError::ConfigValidation {
                        plugin_id: plugin.id.clone(),
                        field: key.clone(),
                        reason: "not declared in the plugin's config schema".to_string(),
                    })?;
            if !spec.kind.matches(value) {
                return Err(StatdashError::ConfigValidation {
                    plugin_id: plugin.id.clone(),
                    field: key.clone(),
                    reason: format!("expected {}, got {}", spec.kind, json_type_name(value)),
                });
            }
        }
        if let Some(schema) = schema {
            for (key, spec) in schema {
                if spec.required && !record.contains_key(key) {
                    return Err(StatdashError::ConfigValidation {
                        plugin_id: plugin.id.clone(),
                        field: key.clone(),
                        reason: "required setting is missing".to_string(),
                    });
                }
            }
        }
        Ok(())
    }

    /// Remove a plugin's record. Returns whether a record existed.
    pub fn delete_record(&self, plugin_id: &str) -> Result<bool, StatdashError> {
        match std::fs::remove_file(self.record_path(plugin_id)) {
            Ok(()) => Ok(true),
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => Ok(false),
            Err(err) => Err(StatdashError::ConfigStorage {
                plugin_id: plugin_id.to_string(),
                source: err,
            }),
        }
    }

    fn write_record(
        &self,
        plugin_id: &str,
        record: &Map<String, Value>,
    ) -> Result<(), StatdashError> {
        let storage = |err: std::io::Error| StatdashError::ConfigStorage {
            plugin_id: plugin_id.to_string(),
            source: err,
        };
        std::fs::create_dir_all(&self.dir).map_err(storage)?;
        let mut tmp = tempfile::NamedTempFile::new_in(&self.dir).map_err(storage)?;
        let body = serde_json::to_vec_pretty(record).map_err(std::io::Error::other).map_err(storage)?;
        tmp.write_all(&body).map_err(storage)?;
        tmp.persist(self.record_path(plugin_id))
            .map_err(|err| storage(err.error))?;
        Ok(())
    }
}

fn schema_entry<'a>(plugin: &'a Plugin, key: &str) -> Option<&'a SettingSpec> {
    plugin.config_schema.as_ref().and_then(|s| s.get(key))
}

fn json_type_name(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(n) if n.is_i64() || n.is_u64() => "integer",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}
