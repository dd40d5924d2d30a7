// SPDX-FileCopyrightText: 2026 Statdash Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Error types for the Statdash dashboard framework.

use thiserror::Error;

/// The primary error type used across the plugin subsystem and core operations.
///
/// Every variant except `ConfigStorage` is recovered locally at the
/// manager/resolver boundary and surfaced as a structured per-plugin reason;
/// `ConfigStorage` propagates to the caller of the config store.
#[derive(Debug, Error)]
pub enum StatdashError {
    /// A candidate plugin failed to load or validate during discovery.
    /// Non-fatal; the candidate is excluded and logged.
    #[error("discovery failed for `{candidate}`: {reason}")]
    Discovery { candidate: String, reason: String },

    /// A second registration attempt for an already-present plugin id.
    /// Non-fatal; the first registration wins.
    #[error("plugin id `{id}` is already registered")]
    DuplicateId { id: String },

    /// A descriptor failed its own validity checks (empty id, duplicate
    /// page ids, schema default not matching its declared type).
    #[error("invalid plugin descriptor `{id}`: {reason}")]
    InvalidDescriptor { id: String, reason: String },

    /// A plugin manifest could not be read or parsed.
    #[error("invalid plugin manifest: {0}")]
    Manifest(String),

    /// A setting write was rejected against the plugin's config schema.
    /// No state mutation occurs.
    #[error("config validation failed for `{plugin_id}.{field}`: {reason}")]
    ConfigValidation {
        plugin_id: String,
        field: String,
        reason: String,
    },

    /// Configuration storage is unavailable or a write failed. Fatal to the
    /// caller of the config store.
    #[error("config storage error for `{plugin_id}`: {source}")]
    ConfigStorage {
        plugin_id: String,
        source: std::io::Error,
    },

    /// A hot-reload candidate failed validation; the previous descriptor
    /// remains authoritative.
    #[error("reload validation failed for `{id}`: {reason}")]
    ReloadValidation { id: String, reason: String },

    /// The hot-reload watcher could not be started or stopped cleanly.
    #[error("watcher error: {0}")]
    Watcher(String),

    /// Internal or unexpected errors.
    #[error("internal error: {0}")]
    Internal(String),
}
