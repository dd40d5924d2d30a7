// SPDX-FileCopyrightText: 2026 Statdash Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Relaxed semantic-version parsing.
//!
//! Plugin manifests in the wild declare versions like `"1.0"` or even `"2"`.
//! [`parse_relaxed`] accepts one to three numeric components and pads the
//! missing ones with zero before handing off to [`semver::Version`], so all
//! comparisons are component-wise numeric (major, minor, patch).

use semver::Version;

/// The running host application version, from the workspace manifest.
pub const HOST_VERSION: &str = env!("CARGO_PKG_VERSION");

/// Parse a version string leniently.
///
/// Accepts full semver (including pre-release/build metadata) as well as
/// truncated forms (`"1"`, `"1.2"`); missing components default to 0.
/// Returns `None` for anything else.
pub fn parse_relaxed(input: &str) -> Option<Version> {
    let trimmed = input.trim();
    if trimmed.is_empty() {
        return None;
    }
    if let Ok(v) = Version::parse(trimmed) {
        return Some(v);
    }

    let parts: Vec<&str> = trimmed.split('.').collect();
    if parts.is_empty() || parts.len() > 3 {
        return None;
    }
    let mut components = [0u64; 3];
    for (i, part) in parts.iter().enumerate() {
        components[i] = part.parse().ok()?;
    }
    Some(Version::new(components[0], components[1], components[2]))
}

/// Parse the host version, falling back to `0.0.0` if the compiled-in
/// version string is somehow malformed.
pub fn host_version() -> Version {
    parse_relaxed(HOST_VERSION).unwrap_or_else(|| Version::new(0, 0, 0))
}
