// Copyright (c) 2026 Bountyy Oy. All rights reserved.
// This software is proprietary and confidential.

//! Shared client context
//!
//! Everything that is shared between connections lives here: the registry
//! used by cross-host redirects, the statistics tree, request defaults that
//! apply to every connection, and the last logged request/response. Tests
//! build their own isolated context, applications usually share
//! [`ClientContext::shared`].

use std::path::{Path, PathBuf};
use std::sync::Arc;

use lazy_static::lazy_static;
use parking_lot::{Mutex, RwLock};

use crate::error::Result;
use crate::http::Headers;
use crate::registry::ConnectionRegistry;
use crate::stats::StatsAggregator;
use crate::value::Value;

lazy_static! {
    static ref SHARED: Arc<ClientContext> = Arc::new(ClientContext::new());
}

/// Defaults applied to every request of every connection using a context
#[derive(Debug, Clone)]
pub struct RequestDefaults {
    /// Headers layered over the connection headers
    pub headers: Headers,
    /// Substitutions layered over the connection `values_for`
    pub values_for: Value,
    /// Entries merged into map bodies before substitution
    pub data: Value,
    /// Query parameters appended to every path lacking them
    pub query: Vec<(String, String)>,
}

impl Default for RequestDefaults {
    fn default() -> Self {
        Self {
            headers: Headers::new(),
            values_for: Value::map(),
            data: Value::map(),
            query: Vec::new(),
        }
    }
}

/// State shared by a group of connections
#[derive(Default)]
pub struct ClientContext {
    registry: ConnectionRegistry,
    stats: StatsAggregator,
    defaults: RwLock<RequestDefaults>,
    last_request: Mutex<String>,
    last_response: Mutex<String>,
    last_request_id: Mutex<Option<String>>,
    captured: Mutex<Vec<String>>,
}

impl ClientContext {
    /// Create an isolated context
    pub fn new() -> Self {
        Self::default()
    }

    /// Process-wide context used by [`Connection::new`](crate::Connection::new)
    pub fn shared() -> Arc<ClientContext> {
        Arc::clone(&SHARED)
    }

    pub fn registry(&self) -> &ConnectionRegistry {
        &self.registry
    }

    pub fn stats(&self) -> &StatsAggregator {
        &self.stats
    }

    /// Number of open connections bound to this context
    pub fn active_connections(&self) -> usize {
        self.registry.active_count()
    }

    /// Snapshot of the request defaults
    pub fn defaults(&self) -> RequestDefaults {
        self.defaults.read().clone()
    }

    /// Replace the request defaults
    pub fn set_defaults(&self, defaults: RequestDefaults) {
        *self.defaults.write() = defaults;
    }

    /// Edit the request defaults in place
    pub fn update_defaults<F: FnOnce(&mut RequestDefaults)>(&self, f: F) {
        f(&mut self.defaults.write());
    }

    pub fn last_request(&self) -> String {
        self.last_request.lock().clone()
    }

    pub fn last_response(&self) -> String {
        self.last_response.lock().clone()
    }

    pub fn last_request_id(&self) -> Option<String> {
        self.last_request_id.lock().clone()
    }

    pub(crate) fn set_last_request(&self, text: String) {
        *self.last_request.lock() = text;
    }

    pub(crate) fn set_last_response(&self, text: String) {
        *self.last_response.lock() = text;
    }

    pub(crate) fn set_last_request_id(&self, id: String) {
        *self.last_request_id.lock() = Some(id);
    }

    pub(crate) fn capture(&self, text: String) {
        self.captured.lock().push(text);
    }

    /// Request/response narratives captured so far
    pub fn captured(&self) -> Vec<String> {
        self.captured.lock().clone()
    }

    pub fn clear_captured(&self) {
        self.captured.lock().clear();
    }

    /// Drop all recorded statistics
    pub fn reset_stats(&self) {
        self.stats.reset();
    }

    /// Write the statistics, see [`StatsAggregator::dump`]
    pub fn dump_stats(&self, base: impl AsRef<Path>) -> Result<Vec<PathBuf>> {
        self.stats.dump(base)
    }
}

impl std::fmt::Debug for ClientContext {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ClientContext")
            .field("active_connections", &self.active_connections())
            .field("last_request_id", &self.last_request_id())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_shared_is_singleton() {
        assert!(Arc::ptr_eq(&ClientContext::shared(), &ClientContext::shared()));
    }

    #[test]
    fn test_update_defaults() {
        let ctx = ClientContext::new();
        ctx.update_defaults(|d| {
            d.headers.insert("X-Env", "qa");
            d.query.push(("lang".to_string(), "en".to_string()));
        });
        let defaults = ctx.defaults();
        assert_eq!(defaults.headers.get_str("x-env").as_deref(), Some("qa"));
        assert_eq!(defaults.query.len(), 1);
    }

    #[test]
    fn test_capture_buffer() {
        let ctx = ClientContext::new();
        ctx.capture("GET /a".to_string());
        ctx.capture("GET /b".to_string());
        assert_eq!(ctx.captured(), vec!["GET /a", "GET /b"]);
        ctx.clear_captured();
        assert!(ctx.captured().is_empty());
    }
}
