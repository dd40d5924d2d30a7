// SPDX-FileCopyrightText: 2026 Statdash Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Core library for the Statdash dashboard framework.
//!
//! This crate provides the foundational error type, host-facing trait and
//! closure types, and version handling used throughout the Statdash
//! workspace. The plugin subsystem builds on these.

pub mod error;
pub mod types;
pub mod version;

// Re-export key items at crate root for ergonomic imports.
pub use error::StatdashError;
pub use types::{CallbackFn, CallbackRegistrar, HostApp, LayoutFn};
pub use version::{HOST_VERSION, host_version, parse_relaxed};
