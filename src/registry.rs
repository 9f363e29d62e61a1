// Copyright (c) 2026 Bountyy Oy. All rights reserved.
// This software is proprietary and confidential.

//! Live connection registry
//!
//! Used to locate a sibling connection when a redirect points at another
//! `host:port`. Entries hold weak references, a dropped connection simply
//! stops being found. Removal is by identity: two connections to the same
//! endpoint are distinct entries.

use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};
use std::sync::{Arc, Weak};

use parking_lot::Mutex;

use crate::http::ConnectionInner;

static NEXT_ID: AtomicU64 = AtomicU64::new(1);

/// Unique identity for a registry entry
pub fn next_id() -> u64 {
    NEXT_ID.fetch_add(1, Ordering::Relaxed)
}

struct Entry<T> {
    id: u64,
    host: String,
    port: u16,
    target: Weak<T>,
}

/// Ordered registry of live endpoints
pub struct Registry<T> {
    entries: Mutex<Vec<Entry<T>>>,
    active: AtomicUsize,
}

/// Registry of connections, shared through [`ClientContext`](crate::ClientContext)
pub type ConnectionRegistry = Registry<ConnectionInner>;

impl<T> Default for Registry<T> {
    fn default() -> Self {
        Self {
            entries: Mutex::new(Vec::new()),
            active: AtomicUsize::new(0),
        }
    }
}

impl<T> Registry<T> {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add an endpoint under `id`
    pub fn register(&self, id: u64, host: &str, port: u16, target: &Arc<T>) {
        self.entries.lock().push(Entry {
            id,
            host: host.to_ascii_lowercase(),
            port,
            target: Arc::downgrade(target),
        });
        self.active.fetch_add(1, Ordering::SeqCst);
        tracing::debug!(id, host, port, "Connection registered");
    }

    /// Remove the entry registered under `id`. Returns false if unknown.
    pub fn unregister(&self, id: u64) -> bool {
        let mut entries = self.entries.lock();
        match entries.iter().position(|e| e.id == id) {
            Some(i) => {
                entries.remove(i);
                self.active.fetch_sub(1, Ordering::SeqCst);
                true
            }
            None => false,
        }
    }

    /// First live endpoint registered for `host:port`
    pub fn find(&self, host: &str, port: u16) -> Option<Arc<T>> {
        let entries = self.entries.lock();
        entries
            .iter()
            .filter(|e| e.port == port && e.host.eq_ignore_ascii_case(host))
            .find_map(|e| e.target.upgrade())
    }

    /// Number of registered, not yet closed, connections
    pub fn active_count(&self) -> usize {
        self.active.load(Ordering::SeqCst)
    }

    /// Number of entries, dead weak references included
    pub fn len(&self) -> usize {
        self.entries.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_register_find() {
        let registry: Registry<String> = Registry::new();
        let a = Arc::new("a".to_string());
        let b = Arc::new("b".to_string());
        registry.register(next_id(), "a.example.com", 443, &a);
        registry.register(next_id(), "b.example.com", 443, &b);

        assert_eq!(registry.active_count(), 2);
        assert_eq!(registry.find("B.example.com", 443).as_deref(), Some(&b.to_string()));
        assert!(registry.find("b.example.com", 80).is_none());
    }

    #[test]
    fn test_unregister_by_identity() {
        let registry: Registry<String> = Registry::new();
        let first = Arc::new("same".to_string());
        let second = Arc::new("same".to_string());
        let id1 = next_id();
        let id2 = next_id();
        registry.register(id1, "h", 80, &first);
        registry.register(id2, "h", 80, &second);

        assert!(registry.unregister(id1));
        assert!(!registry.unregister(id1));
        assert_eq!(registry.active_count(), 1);

        let found = registry.find("h", 80).unwrap();
        assert!(Arc::ptr_eq(&found, &second));
    }

    #[test]
    fn test_dropped_target_not_found() {
        let registry: Registry<String> = Registry::new();
        {
            let gone = Arc::new("gone".to_string());
            registry.register(next_id(), "h", 80, &gone);
        }
        assert!(registry.find("h", 80).is_none());
        assert_eq!(registry.len(), 1);
    }
}
