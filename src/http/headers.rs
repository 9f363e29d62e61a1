// Copyright (c) 2026 Bountyy Oy. All rights reserved.
// This software is proprietary and confidential.

//! Case-insensitive ordered header map
//!
//! Lookups ignore case. The casing of the first insertion is kept for
//! display and for the wire, later inserts under another casing replace
//! the value in place.

use std::fmt;
use std::sync::Arc;

/// Closure computing a header value per request
pub type ComputedFn = Arc<dyn Fn() -> String + Send + Sync>;

/// Header value: fixed, or computed right before each request
#[derive(Clone)]
pub enum HeaderValue {
    Static(String),
    Computed(ComputedFn),
}

impl HeaderValue {
    /// Create a computed value
    pub fn computed<F>(f: F) -> Self
    where
        F: Fn() -> String + Send + Sync + 'static,
    {
        HeaderValue::Computed(Arc::new(f))
    }

    /// Current value. Computed values are evaluated.
    pub fn resolve(&self) -> String {
        match self {
            HeaderValue::Static(s) => s.clone(),
            HeaderValue::Computed(f) => f(),
        }
    }

    pub fn is_computed(&self) -> bool {
        matches!(self, HeaderValue::Computed(_))
    }
}

impl fmt::Debug for HeaderValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            HeaderValue::Static(s) => write!(f, "{:?}", s),
            HeaderValue::Computed(_) => write!(f, "<computed>"),
        }
    }
}

impl PartialEq for HeaderValue {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (HeaderValue::Static(a), HeaderValue::Static(b)) => a == b,
            (HeaderValue::Computed(a), HeaderValue::Computed(b)) => Arc::ptr_eq(a, b),
            _ => false,
        }
    }
}

impl From<&str> for HeaderValue {
    fn from(s: &str) -> Self {
        HeaderValue::Static(s.to_string())
    }
}

impl From<String> for HeaderValue {
    fn from(s: String) -> Self {
        HeaderValue::Static(s)
    }
}

/// Single header entry
#[derive(Debug, Clone, PartialEq)]
pub struct HeaderEntry {
    pub name: String,
    pub value: HeaderValue,
}

/// Ordered header collection with case-insensitive names
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Headers {
    entries: Vec<HeaderEntry>,
}

impl Headers {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert or replace, builder style
    pub fn with(mut self, name: impl Into<String>, value: impl Into<HeaderValue>) -> Self {
        self.insert(name, value);
        self
    }

    /// Insert or replace a header keeping the first seen casing
    pub fn insert(&mut self, name: impl Into<String>, value: impl Into<HeaderValue>) {
        let name = name.into();
        let value = value.into();
        match self.position(&name) {
            Some(i) => self.entries[i].value = value,
            None => self.entries.push(HeaderEntry { name, value }),
        }
    }

    pub fn get(&self, name: &str) -> Option<&HeaderValue> {
        self.position(name).map(|i| &self.entries[i].value)
    }

    /// Resolved value of a header
    pub fn get_str(&self, name: &str) -> Option<String> {
        self.get(name).map(HeaderValue::resolve)
    }

    /// Name of a header as it was inserted
    pub fn original_name(&self, name: &str) -> Option<&str> {
        self.position(name).map(|i| self.entries[i].name.as_str())
    }

    pub fn contains(&self, name: &str) -> bool {
        self.position(name).is_some()
    }

    pub fn remove(&mut self, name: &str) -> Option<HeaderValue> {
        self.position(name).map(|i| self.entries.remove(i).value)
    }

    /// Overlay `other` on top of this map
    pub fn merge(&mut self, other: &Headers) {
        for entry in &other.entries {
            self.insert(entry.name.clone(), entry.value.clone());
        }
    }

    pub fn iter(&self) -> impl Iterator<Item = &HeaderEntry> {
        self.entries.iter()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn has_computed(&self) -> bool {
        self.entries.iter().any(|e| e.value.is_computed())
    }

    /// Evaluate every value, producing what goes on the wire
    pub fn resolve(&self) -> Vec<(String, String)> {
        self.entries
            .iter()
            .map(|e| (e.name.clone(), e.value.resolve()))
            .collect()
    }

    fn position(&self, name: &str) -> Option<usize> {
        self.entries
            .iter()
            .position(|e| e.name.eq_ignore_ascii_case(name))
    }
}

impl<K: Into<String>, V: Into<HeaderValue>> FromIterator<(K, V)> for Headers {
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        let mut headers = Headers::new();
        for (k, v) in iter {
            headers.insert(k, v);
        }
        headers
    }
}

/// Header list after computed values were evaluated
pub type ResolvedHeaders = Vec<(String, String)>;

/// Case-insensitive lookup in a resolved header list
pub fn find_header<'a>(headers: &'a [(String, String)], name: &str) -> Option<&'a str> {
    headers
        .iter()
        .find(|(k, _)| k.eq_ignore_ascii_case(name))
        .map(|(_, v)| v.as_str())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicU32, Ordering};

    #[test]
    fn test_case_insensitive_lookup_keeps_casing() {
        let mut headers = Headers::new();
        headers.insert("content-type", "text/plain");
        headers.insert("Content-Type", "application/json");

        assert_eq!(headers.len(), 1);
        assert_eq!(headers.get_str("CONTENT-TYPE").as_deref(), Some("application/json"));
        assert_eq!(headers.original_name("Content-Type"), Some("content-type"));
    }

    #[test]
    fn test_merge_precedence() {
        let mut base = Headers::new().with("A", "1").with("B", "1");
        base.merge(&Headers::new().with("b", "2").with("C", "3"));

        let resolved = base.resolve();
        assert_eq!(
            resolved,
            vec![
                ("A".to_string(), "1".to_string()),
                ("B".to_string(), "2".to_string()),
                ("C".to_string(), "3".to_string()),
            ]
        );
    }

    #[test]
    fn test_computed_value_resolved_per_call() {
        let n = Arc::new(AtomicU32::new(0));
        let c = Arc::clone(&n);
        let headers = Headers::new().with(
            "Authorization",
            HeaderValue::computed(move || format!("Bearer {}", c.fetch_add(1, Ordering::SeqCst))),
        );

        assert!(headers.has_computed());
        assert_eq!(headers.resolve()[0].1, "Bearer 0");
        assert_eq!(headers.resolve()[0].1, "Bearer 1");
        assert!(headers.get("authorization").unwrap().is_computed());
    }

    #[test]
    fn test_find_header() {
        let resolved = vec![("Location".to_string(), "/new".to_string())];
        assert_eq!(find_header(&resolved, "location"), Some("/new"));
        assert_eq!(find_header(&resolved, "cookie"), None);
    }
}
