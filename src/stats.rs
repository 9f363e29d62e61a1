// Copyright (c) 2026 Bountyy Oy. All rights reserved.
// This software is proprietary and confidential.

//! Call statistics
//!
//! Every completed call is accounted under three scopes:
//!
//! - `all`: method, then response code
//! - `path`: `host:port`, then request path, then method, then code
//! - `name`: caller-supplied label, then method, then code
//!
//! A fourth scope, `specific`, holds spans recorded with
//! [`StatsAggregator::add_custom`]. All scopes share one lock, so workers on
//! different connections can record into the same aggregator.

use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use serde::Serialize;

use crate::error::Result;

/// Elapsed time figures of a leaf, in seconds
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct ElapsedStats {
    pub total: f64,
    pub maximum: f64,
    pub minimum: f64,
    pub average: f64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub item_maximum: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub item_minimum: Option<String>,
}

/// Counters shared by every node of the tree
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct StatsLeaf {
    pub count: u64,
    pub started: Option<DateTime<Utc>>,
    pub finished: Option<DateTime<Utc>>,
    /// Span covered by the calls, overlapping calls counted once
    pub real_time_elapsed: f64,
    pub time_elapsed: ElapsedStats,
}

impl StatsLeaf {
    /// Account one call.
    ///
    /// `real_time_elapsed` grows by `finished - previous finished` when the
    /// call started before the previous one finished, otherwise by the
    /// call's own span.
    pub fn update(
        &mut self,
        started: DateTime<Utc>,
        finished: DateTime<Utc>,
        elapsed: f64,
        item: Option<&str>,
    ) {
        self.count += 1;
        let previous_finished = *self.finished.get_or_insert(started);
        if self.started.is_none() {
            self.started = Some(started);
        }

        if started < previous_finished {
            self.real_time_elapsed += seconds_between(previous_finished, finished);
        } else {
            self.real_time_elapsed += seconds_between(started, finished);
        }
        self.finished = Some(finished);

        let t = &mut self.time_elapsed;
        t.total += elapsed;
        if self.count == 1 || elapsed > t.maximum {
            t.maximum = elapsed;
            if let Some(item) = item {
                t.item_maximum = Some(item.to_string());
            }
        }
        if self.count == 1 || elapsed < t.minimum {
            t.minimum = elapsed;
            if let Some(item) = item {
                t.item_minimum = Some(item.to_string());
            }
        }
        t.average = t.total / self.count as f64;
    }
}

/// Per-method node, split further by response code
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct MethodNode {
    #[serde(flatten)]
    pub leaf: StatsLeaf,
    pub response: BTreeMap<u16, StatsLeaf>,
}

/// Node with a per-method breakdown
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct ScopeNode {
    #[serde(flatten)]
    pub leaf: StatsLeaf,
    pub method: BTreeMap<String, MethodNode>,
}

impl ScopeNode {
    fn record(&mut self, call: &CallRecord) {
        self.leaf.update(call.started, call.finished, call.elapsed, None);
        let method = self.method.entry(call.method.clone()).or_default();
        method.leaf.update(call.started, call.finished, call.elapsed, None);
        method
            .response
            .entry(call.code)
            .or_default()
            .update(call.started, call.finished, call.elapsed, None);
    }
}

/// Per-server node, keyed further by request path
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct ServerNode {
    #[serde(flatten)]
    pub leaf: StatsLeaf,
    #[serde(flatten)]
    pub paths: BTreeMap<String, ScopeNode>,
}

/// State node of a custom span; remembers which items contributed
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct StateNode {
    #[serde(flatten)]
    pub leaf: StatsLeaf,
    pub items: Vec<String>,
}

/// Custom span node, keyed further by state
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct SpecificNode {
    #[serde(flatten)]
    pub leaf: StatsLeaf,
    pub states: BTreeMap<String, StateNode>,
}

/// Whole statistics tree
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct StatsTree {
    pub all: ScopeNode,
    pub path: BTreeMap<String, ServerNode>,
    pub name: BTreeMap<String, ScopeNode>,
    pub specific: BTreeMap<String, SpecificNode>,
}

/// One completed call as seen by the aggregator
#[derive(Debug, Clone)]
pub struct CallRecord {
    /// `host:port`
    pub server: String,
    pub path: String,
    pub method: String,
    pub code: u16,
    pub name: Option<String>,
    pub started: DateTime<Utc>,
    pub finished: DateTime<Utc>,
    /// Network time in seconds
    pub elapsed: f64,
}

/// Shared statistics collector
#[derive(Debug, Default)]
pub struct StatsAggregator {
    tree: Mutex<StatsTree>,
}

impl StatsAggregator {
    /// Create an empty aggregator
    pub fn new() -> Self {
        Self::default()
    }

    /// Account a completed call under `all`, `path` and, if named, `name`
    pub fn record(&self, call: &CallRecord) {
        let mut tree = self.tree.lock();
        tree.all.record(call);

        let server = tree.path.entry(call.server.clone()).or_default();
        server
            .leaf
            .update(call.started, call.finished, call.elapsed, None);
        server.paths.entry(call.path.clone()).or_default().record(call);

        if let Some(name) = &call.name {
            tree.name.entry(name.clone()).or_default().record(call);
        }
    }

    /// Record a custom span under `specific`.
    ///
    /// Without an `item`, the current thread name (if any) tags the
    /// maximum and minimum.
    pub fn add_custom(
        &self,
        name: &str,
        state: &str,
        started: DateTime<Utc>,
        finished: DateTime<Utc>,
        item: Option<&str>,
    ) {
        let thread = std::thread::current();
        let tag = item.or_else(|| thread.name());
        let elapsed = seconds_between(started, finished);

        let mut tree = self.tree.lock();
        let node = tree.specific.entry(name.to_string()).or_default();
        node.leaf.update(started, finished, elapsed, tag);

        let state_node = node.states.entry(state.to_string()).or_default();
        state_node.leaf.update(started, finished, elapsed, tag);
        if let Some(item) = item {
            if !state_node.items.iter().any(|i| i == item) {
                state_node.items.push(item.to_string());
            }
        }
    }

    /// Copy of the current tree
    pub fn snapshot(&self) -> StatsTree {
        self.tree.lock().clone()
    }

    /// Drop everything recorded so far
    pub fn reset(&self) {
        *self.tree.lock() = StatsTree::default();
    }

    /// Write each top-level scope to its own file.
    ///
    /// `base` decides the format: `.json` writes JSON, anything else YAML.
    /// File names get `_stats_<scope>` inserted before the extension.
    pub fn dump(&self, base: impl AsRef<Path>) -> Result<Vec<PathBuf>> {
        let base = base.as_ref();
        let tree = self.snapshot();
        let json = base
            .extension()
            .map(|e| e.eq_ignore_ascii_case("json"))
            .unwrap_or(false);

        if let Some(parent) = base.parent() {
            if !parent.as_os_str().is_empty() {
                fs::create_dir_all(parent)?;
            }
        }

        let scopes: [(&str, serde_json::Value); 4] = [
            ("all", serde_json::to_value(&tree.all)?),
            ("path", serde_json::to_value(&tree.path)?),
            ("name", serde_json::to_value(&tree.name)?),
            ("specific", serde_json::to_value(&tree.specific)?),
        ];

        let mut written = Vec::with_capacity(scopes.len());
        for (scope, value) in scopes {
            let target = stats_file_name(base, scope, json);
            let content = if json {
                serde_json::to_string(&value)?
            } else {
                serde_yaml::to_string(&value)?
            };
            fs::write(&target, content)?;
            tracing::info!(scope, file = %target.display(), "Stats saved");
            written.push(target);
        }
        Ok(written)
    }
}

fn stats_file_name(base: &Path, scope: &str, json: bool) -> PathBuf {
    let stem = base
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_default();
    let ext = if json { "json" } else { "yaml" };
    base.with_file_name(format!("{}_stats_{}.{}", stem, scope, ext))
}

/// Signed span in seconds
pub fn seconds_between(from: DateTime<Utc>, to: DateTime<Utc>) -> f64 {
    let span = to - from;
    match span.num_microseconds() {
        Some(us) => us as f64 / 1_000_000.0,
        None => span.num_milliseconds() as f64 / 1_000.0,
    }
}
