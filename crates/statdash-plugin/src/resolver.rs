// SPDX-FileCopyrightText: 2026 Statdash Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Dependency resolution: topological ordering, cycle detection, and host
//! version gating over a set of plugin descriptors.
//!
//! [`resolve`] is a pure function; the dependency graph is derived from the
//! supplied descriptors and never stored. Output ordering is deterministic:
//! dependencies strictly precede dependents, and ties among independent
//! plugins are broken by the original discovery order, so callback
//! registration order is stable across runs.

use std::collections::{BTreeMap, HashMap, HashSet};
use std::sync::Arc;

use semver::Version;
use statdash_core::parse_relaxed;
use tracing::warn;

use crate::descriptor::Plugin;

/// Why a plugin was excluded from the validated set.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RejectReason {
    /// A declared dependency is absent from the surviving set. `via` is the
    /// chain of intermediate plugins for transitive rejections.
    MissingDependency { missing: String, via: Vec<String> },
    /// The plugin is trapped in (or behind) a dependency cycle. `members`
    /// is the full cycle membership, sorted.
    CyclicDependency { members: Vec<String> },
    /// The host version falls outside the plugin's declared bounds.
    VersionIncompatible {
        host: Version,
        min: Option<String>,
        max: Option<String>,
    },
}

impl std::fmt::Display for RejectReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            RejectReason::MissingDependency { missing, via } => {
                if via.is_empty() {
                    write!(f, "missing dependency: {missing}")
                } else {
                    write!(f, "missing dependency: {missing} (via {})", via.join(" -> "))
                }
            }
            RejectReason::CyclicDependency { members } => {
                write!(f, "cyclic dependency involving {{{}}}", members.join(", "))
            }
            RejectReason::VersionIncompatible { host, min, max } => {
                write!(
                    f,
                    "host version {host} not in [{},{}]",
                    min.as_deref().unwrap_or("0.0.0"),
                    max.as_deref().unwrap_or("*")
                )
            }
        }
    }
}

/// Result of a resolution pass: surviving ids in load order, and a
/// per-id rejection map for everything excluded.
#[derive(Debug, Clone, Default)]
pub struct Resolution {
    pub ordered: Vec<String>,
    pub rejected: BTreeMap<String, RejectReason>,
}

impl Resolution {
    pub fn is_accepted(&self, id: &str) -> bool {
        self.ordered.iter().any(|o| o == id)
    }
}

/// Check a descriptor's host version bounds.
///
/// A bound that fails to parse is logged and ignored rather than failing
/// the plugin: the descriptor already passed its own validity checks, and
/// an unintelligible bound gives us nothing to compare against.
fn version_rejection(plugin: &Plugin, host: &Version) -> Option<RejectReason> {
    let mut out_of_range = false;

    if let Some(min) = &plugin.min_host_version {
        match parse_relaxed(min) {
            Some(min_v) if *host < min_v => out_of_range = true,
            Some(_) => {}
            None => warn!(plugin = %plugin.id, bound = %min, "unparsable min_host_version ignored"),
        }
    }
    if let Some(max) = &plugin.max_host_version {
        match parse_relaxed(max) {
            Some(max_v) if *host > max_v => out_of_range = true,
            Some(_) => {}
            None => warn!(plugin = %plugin.id, bound = %max, "unparsable max_host_version ignored"),
        }
    }

    out_of_range.then(|| RejectReason::VersionIncompatible {
        host: host.clone(),
        min: plugin.min_host_version.clone(),
        max: plugin.max_host_version.clone(),
    })
}

/// Resolve a descriptor set against a host version.
///
/// 1. Version-gate each descriptor.
/// 2. Reject descriptors whose dependencies are absent or already
///    rejected, propagating transitively with the chain recorded.
/// 3. Topologically sort the survivors (Kahn's algorithm, discovery-order
///    tie-break); anything unremovable is trapped in or behind a cycle
///    and rejected with the full cycle membership.
pub fn resolve(descriptors: &[Arc<Plugin>], host_version: &Version) -> Resolution {
    // First occurrence wins if the caller somehow passed duplicate ids.
    let mut index: HashMap<&str, usize> = HashMap::new();
    let mut order: Vec<&Arc<Plugin>> = Vec::new();
    for plugin in descriptors {
        if !index.contains_key(plugin.id.as_str()) {
            index.insert(plugin.id.as_str(), order.len());
            order.push(plugin);
        }
    }

    let mut rejected: BTreeMap<String, RejectReason> = BTreeMap::new();

    for plugin in &order {
        if let Some(reason) = version_rejection(plugin, host_version) {
            rejected.insert(plugin.id.clone(), reason);
        }
    }

    // Missing-dependency propagation to fixpoint.
    loop {
        let mut changed = false;
        for plugin in &order {
            if rejected.contains_key(&plugin.id) {
                continue;
            }
            for dep in &plugin.dependencies {
                let reason = if !index.contains_key(dep.as_str()) {
                    Some(RejectReason::MissingDependency {
                        missing: dep.clone(),
                        via: Vec::new(),
                    })
                } else {
                    match rejected.get(dep) {
                        Some(RejectReason::MissingDependency { missing, via }) => {
                            let mut chain = vec![dep.clone()];
                            chain.extend(via.iter().cloned());
                            Some(RejectReason::MissingDependency {
                                missing: missing.clone(),
                                via: chain,
                            })
                        }
                        Some(_) => Some(RejectReason::MissingDependency {
                            missing: dep.clone(),
                            via: Vec::new(),
                        }),
                        None => None,
                    }
                };
                if let Some(reason) = reason {
                    rejected.insert(plugin.id.clone(), reason);
                    changed = true;
                    break;
                }
            }
        }
        if !changed {
            break;
        }
    }

    // Layered topological sort over the survivors, scanning in discovery
    // order each round for a stable tie-break.
    let survivors: Vec<&Arc<Plugin>> = order
        .iter()
        .filter(|p| !rejected.contains_key(&p.id))
        .copied()
        .collect();
    let mut placed: HashSet<&str> = HashSet::new();
    let mut ordered: Vec<String> = Vec::new();
    loop {
        let mut progressed = false;
        for plugin in &survivors {
            if placed.contains(plugin.id.as_str()) {
                continue;
            }
            if plugin
                .dependencies
                .iter()
                .all(|d| placed.contains(d.as_str()))
            {
                placed.insert(plugin.id.as_str());
                ordered.push(plugin.id.clone());
                progressed = true;
            }
        }
        if !progressed {
            break;
        }
    }

    // Anything unplaced is trapped: either a cycle member or a transitive
    // dependent of one.
    let remaining: Vec<&Arc<Plugin>> = survivors
        .into_iter()
        .filter(|p| !placed.contains(p.id.as_str()))
        .collect();
    let trapped: HashSet<&str> = remaining.iter().map(|p| p.id.as_str()).collect();
    for plugin in &remaining {
        let members = cycle_members(plugin, &remaining, &trapped);
        rejected.insert(
            plugin.id.clone(),
            RejectReason::CyclicDependency { members },
        );
    }

    Resolution { ordered, rejected }
}

/// Compute the cycle membership to report for a trapped plugin.
///
/// If the plugin sits on a cycle, that cycle is its strongly connected
/// component within the trapped subgraph. If it is merely a dependent of a
/// cycle, report the first cycle reachable from it.
fn cycle_members(
    plugin: &Arc<Plugin>,
    trapped: &[&Arc<Plugin>],
    trapped_ids: &HashSet<&str>,
) -> Vec<String> {
    let by_id: HashMap<&str, &Arc<Plugin>> = trapped.iter().map(|p| (p.id.as_str(), *p)).collect();

    // Forward reachability (path length >= 1) restricted to trapped nodes.
    let reach = |from: &str| -> HashSet<String> {
        let mut seen: HashSet<String> = HashSet::new();
        let mut stack: Vec<&str> = by_id
            .get(from)
            .map(|p| {
                p.dependencies
                    .iter()
                    .map(String::as_str)
                    .filter(|d| trapped_ids.contains(d))
                    .collect()
            })
            .unwrap_or_default();
        while let Some(node) = stack.pop() {
            if !seen.insert(node.to_string()) {
                continue;
            }
            if let Some(p) = by_id.get(node) {
                for dep in &p.dependencies {
                    if trapped_ids.contains(dep.as_str()) && !seen.contains(dep.as_str()) {
                        stack.push(dep);
                    }
                }
            }
        }
        seen
    };

    let forward = reach(&plugin.id);
    if forward.contains(&plugin.id) {
        // On a cycle: members are nodes reachable both ways.
        let mut members: Vec<String> = forward
            .iter()
            .filter(|m| reach(m).contains(&plugin.id))
            .cloned()
            .collect();
        members.sort();
        return members;
    }

    // Dependent of a cycle: report the first self-reaching node's
    // component. Candidates are visited in sorted order so a dependent of
    // several cycles reports the same one on every run.
    let mut candidates: Vec<&String> = forward.iter().collect();
    candidates.sort();
    for candidate in candidates {
        let candidate_reach = reach(candidate);
        if candidate_reach.contains(candidate) {
            let mut members: Vec<String> = candidate_reach
                .iter()
                .filter(|m| reach(m).contains(candidate))
                .cloned()
                .collect();
            members.sort();
            return members;
        }
    }

    // Unreachable in practice; report the node itself rather than panic.
    vec![plugin.id.clone()]
}
