// SPDX-FileCopyrightText: 2026 Statdash Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Host-facing function and trait types shared across the workspace.
//!
//! Plugin behavior is represented as tagged closures stored on descriptors
//! and invoked polymorphically by id — there is no inheritance hierarchy.

use std::sync::Arc;

/// A page layout producer. Returns the page's component tree as a JSON
/// value, which the host renderer turns into markup.
pub type LayoutFn = Arc<dyn Fn() -> serde_json::Value + Send + Sync>;

/// An interactive callback handler: takes the triggering input state and
/// returns the output state to apply.
pub type CallbackFn = Arc<dyn Fn(&serde_json::Value) -> serde_json::Value + Send + Sync>;

/// A plugin's callback registrar, invoked exactly once when the plugin
/// becomes active.
pub type CallbackRegistrar = Arc<dyn Fn(&dyn HostApp) + Send + Sync>;

/// The surface a plugin sees of the host application when wiring
/// interactive behavior. Implemented by the host; handed to each plugin's
/// [`CallbackRegistrar`].
pub trait HostApp: Send + Sync {
    /// Attach a named callback handler to the host.
    fn add_callback(&self, id: &str, handler: CallbackFn);
}

/// Produce a [`LayoutFn`] that renders nothing. Used for manifest-declared
/// pages that have no compiled-in layout attached.
pub fn empty_layout() -> LayoutFn {
    Arc::new(|| serde_json::Value::Null)
}
