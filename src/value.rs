// Copyright (c) 2026 Bountyy Oy. All rights reserved.
// This software is proprietary and confidential.

//! Tagged values for request bodies and substitutions
//!
//! A [`Value`] is plain JSON that may also hold [`Value::Lazy`] leaves:
//! closures evaluated right before a request is built. Lazy leaves are
//! resolved into a fresh `serde_json::Value` every time, the stored
//! closure is never overwritten with its result.

use std::fmt;
use std::sync::Arc;

use serde_json::{Map, Value as JsonValue};

/// Closure producing a value on demand. `None` drops the key.
pub type LazyFn = Arc<dyn Fn() -> Option<JsonValue> + Send + Sync>;

/// JSON-shaped value with optional lazily computed leaves
#[derive(Clone)]
pub enum Value {
    /// Null, bool, number or string
    Scalar(JsonValue),
    /// Ordered record
    Map(Vec<(String, Value)>),
    /// Ordered list
    List(Vec<Value>),
    /// Computed on every resolve
    Lazy(LazyFn),
}

impl Value {
    /// Create a lazy leaf
    pub fn lazy<F>(f: F) -> Self
    where
        F: Fn() -> Option<JsonValue> + Send + Sync + 'static,
    {
        Value::Lazy(Arc::new(f))
    }

    /// Empty record
    pub fn map() -> Self {
        Value::Map(Vec::new())
    }

    /// Add or replace a key on a record, builder style
    pub fn with(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.insert(key, value);
        self
    }

    /// Add or replace a key on a record. No-op for non-records.
    pub fn insert(&mut self, key: impl Into<String>, value: impl Into<Value>) {
        if let Value::Map(entries) = self {
            let key = key.into();
            let value = value.into();
            match entries.iter_mut().find(|(k, _)| *k == key) {
                Some(slot) => slot.1 = value,
                None => entries.push((key, value)),
            }
        }
    }

    /// Look up a key on a record
    pub fn get(&self, key: &str) -> Option<&Value> {
        match self {
            Value::Map(entries) => entries.iter().find(|(k, _)| k == key).map(|(_, v)| v),
            _ => None,
        }
    }

    pub fn is_map(&self) -> bool {
        matches!(self, Value::Map(_))
    }

    pub fn is_list(&self) -> bool {
        matches!(self, Value::List(_))
    }

    /// Structured values default the content type to JSON
    pub fn is_structured(&self) -> bool {
        self.is_map() || self.is_list()
    }

    /// True when nothing would be sent: null or empty string
    pub fn is_empty(&self) -> bool {
        match self {
            Value::Scalar(JsonValue::Null) => true,
            Value::Scalar(JsonValue::String(s)) => s.is_empty(),
            Value::Map(entries) => entries.is_empty(),
            Value::List(items) => items.is_empty(),
            _ => false,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Value::Scalar(JsonValue::String(s)) => Some(s),
            _ => None,
        }
    }

    /// Number of entries of a record or list
    pub fn len(&self) -> usize {
        match self {
            Value::Map(entries) => entries.len(),
            Value::List(items) => items.len(),
            _ => 0,
        }
    }

    /// Resolve every lazy leaf, yielding plain JSON
    pub fn to_json(&self) -> JsonValue {
        resolve_lazy(self, None).unwrap_or(JsonValue::Null)
    }

    /// Render a leaf the way it is substituted into string bodies
    pub fn to_plain_string(&self) -> String {
        match self.to_json() {
            JsonValue::String(s) => s,
            JsonValue::Null => String::new(),
            other => other.to_string(),
        }
    }
}

impl fmt::Debug for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Scalar(v) => write!(f, "{}", v),
            Value::Map(entries) => f
                .debug_map()
                .entries(entries.iter().map(|(k, v)| (k, v)))
                .finish(),
            Value::List(items) => f.debug_list().entries(items).finish(),
            Value::Lazy(_) => write!(f, "<lazy>"),
        }
    }
}

impl Default for Value {
    fn default() -> Self {
        Value::Scalar(JsonValue::Null)
    }
}

impl From<JsonValue> for Value {
    fn from(value: JsonValue) -> Self {
        match value {
            JsonValue::Object(map) => {
                Value::Map(map.into_iter().map(|(k, v)| (k, Value::from(v))).collect())
            }
            JsonValue::Array(items) => Value::List(items.into_iter().map(Value::from).collect()),
            scalar => Value::Scalar(scalar),
        }
    }
}

impl From<&str> for Value {
    fn from(s: &str) -> Self {
        Value::Scalar(JsonValue::String(s.to_string()))
    }
}

impl From<String> for Value {
    fn from(s: String) -> Self {
        Value::Scalar(JsonValue::String(s))
    }
}

impl From<i64> for Value {
    fn from(n: i64) -> Self {
        Value::Scalar(JsonValue::from(n))
    }
}

impl From<bool> for Value {
    fn from(b: bool) -> Self {
        Value::Scalar(JsonValue::Bool(b))
    }
}

impl From<Vec<Value>> for Value {
    fn from(items: Vec<Value>) -> Self {
        Value::List(items)
    }
}

/// Independent copy of a value. Lazy closures are shared, not evaluated.
pub fn deep_clone(value: &Value) -> Value {
    match value {
        Value::Map(entries) => Value::Map(
            entries
                .iter()
                .map(|(k, v)| (k.clone(), deep_clone(v)))
                .collect(),
        ),
        Value::List(items) => Value::List(items.iter().map(deep_clone).collect()),
        Value::Scalar(v) => Value::Scalar(v.clone()),
        Value::Lazy(f) => Value::Lazy(Arc::clone(f)),
    }
}

/// Recursive merge: records merge key by key, anything else in `over` wins.
pub fn deep_merge(base: &Value, over: &Value) -> Value {
    match (base, over) {
        (Value::Map(base_entries), Value::Map(over_entries)) => {
            let mut merged = Value::Map(base_entries.clone());
            for (key, over_value) in over_entries {
                let value = match base.get(key) {
                    Some(base_value) => deep_merge(base_value, over_value),
                    None => deep_clone(over_value),
                };
                merged.insert(key.clone(), value);
            }
            merged
        }
        _ => deep_clone(over),
    }
}

/// Evaluate lazy leaves into plain JSON.
///
/// A lazy leaf returning `None` removes its key from the enclosing record
/// unless `original` carries that key, in which case the original entry is
/// kept.
pub fn resolve_lazy(value: &Value, original: Option<&Value>) -> Option<JsonValue> {
    match value {
        Value::Scalar(v) => Some(v.clone()),
        Value::Lazy(f) => f(),
        Value::Map(entries) => {
            let mut out = Map::new();
            for (key, entry) in entries {
                let orig_entry = original.and_then(|o| o.get(key));
                match resolve_lazy(entry, orig_entry) {
                    Some(resolved) => {
                        out.insert(key.clone(), resolved);
                    }
                    None => {
                        if let Some(kept) = orig_entry.and_then(|o| resolve_lazy(o, None)) {
                            out.insert(key.clone(), kept);
                        }
                    }
                }
            }
            Some(JsonValue::Object(out))
        }
        Value::List(items) => {
            let orig_items = match original {
                Some(Value::List(o)) => Some(o),
                _ => None,
            };
            let resolved = items
                .iter()
                .enumerate()
                .map(|(i, item)| {
                    let orig_item = orig_items.and_then(|o| o.get(i));
                    resolve_lazy(item, orig_item).unwrap_or(JsonValue::Null)
                })
                .collect();
            Some(JsonValue::Array(resolved))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use std::sync::atomic::{AtomicU64, Ordering};

    #[test]
    fn test_deep_merge_records() {
        let base = Value::from(json!({"a": 1, "nested": {"x": 1, "y": 2}}));
        let over = Value::from(json!({"b": 2, "nested": {"y": 3}}));

        let merged = deep_merge(&base, &over).to_json();
        assert_eq!(merged, json!({"a": 1, "nested": {"x": 1, "y": 3}, "b": 2}));
    }

    #[test]
    fn test_deep_merge_override_scalar() {
        let base = Value::from(json!({"a": {"x": 1}}));
        let over = Value::from(json!({"a": "flat"}));
        assert_eq!(deep_merge(&base, &over).to_json(), json!({"a": "flat"}));
    }

    #[test]
    fn test_lazy_evaluated_each_time() {
        let counter = Arc::new(AtomicU64::new(0));
        let c = Arc::clone(&counter);
        let value = Value::map().with(
            "n",
            Value::lazy(move || Some(json!(c.fetch_add(1, Ordering::SeqCst)))),
        );

        assert_eq!(value.to_json(), json!({"n": 0}));
        assert_eq!(value.to_json(), json!({"n": 1}));
        assert!(matches!(value.get("n"), Some(Value::Lazy(_))));
    }

    #[test]
    fn test_lazy_none_removes_key_unless_original() {
        let value = Value::map()
            .with("keep", Value::lazy(|| None))
            .with("drop", Value::lazy(|| None));
        let original = Value::map().with("keep", "orig");

        let resolved = resolve_lazy(&value, Some(&original)).unwrap();
        assert_eq!(resolved, json!({"keep": "orig"}));
    }

    #[test]
    fn test_insert_replaces_existing() {
        let mut value = Value::from(json!({"name": "a", "job": "b"}));
        value.insert("name", "c");
        assert_eq!(value.to_json(), json!({"name": "c", "job": "b"}));
    }
}
