// Copyright (c) 2026 Bountyy Oy. All rights reserved.
// This software is proprietary and confidential.

//! HTTP response types

use std::collections::BTreeMap;

use bytes::Bytes;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::Value as JsonValue;

use crate::error::{Error, Result};

/// Response exactly as the transport produced it
#[derive(Debug, Clone, Default)]
pub struct RawResponse {
    /// Status code
    pub code: u16,
    /// Reason phrase
    pub message: String,
    /// Headers in wire order, names as received; repeated names allowed
    pub headers: Vec<(String, String)>,
    /// Undecoded body
    pub body: Bytes,
}

impl RawResponse {
    pub fn new(code: u16, message: impl Into<String>) -> Self {
        Self {
            code,
            message: message.into(),
            headers: Vec::new(),
            body: Bytes::new(),
        }
    }

    /// Add a header, builder style
    pub fn header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.push((name.into(), value.into()));
        self
    }

    /// Set the body, builder style
    pub fn body(mut self, body: impl Into<Bytes>) -> Self {
        self.body = body.into();
        self
    }
}

/// Caller-supplied response that short-circuits the transport
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct MockResponse {
    pub code: u16,
    #[serde(default)]
    pub message: String,
    /// Records and lists are sent as JSON text
    #[serde(default)]
    pub data: JsonValue,
    /// Header fields
    #[serde(default)]
    pub header: BTreeMap<String, String>,
    /// Extra top-level fields; folded into `header`
    #[serde(flatten)]
    pub fields: BTreeMap<String, JsonValue>,
}

impl MockResponse {
    pub fn new(code: u16, message: impl Into<String>) -> Self {
        Self {
            code,
            message: message.into(),
            ..Default::default()
        }
    }

    pub fn data(mut self, data: JsonValue) -> Self {
        self.data = data;
        self
    }

    pub fn header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.header.insert(name.into(), value.into());
        self
    }

    /// Extra top-level field, e.g. `content-type` given outside `header`
    pub fn field(mut self, name: impl Into<String>, value: impl Into<JsonValue>) -> Self {
        self.fields.insert(name.into(), value.into());
        self
    }

    /// Body as sent on the wire
    pub fn body_text(&self) -> String {
        match &self.data {
            JsonValue::Null => String::new(),
            JsonValue::String(s) => s.clone(),
            other => other.to_string(),
        }
    }

    /// Convert into the transport shape so it flows through the same pipeline
    pub fn into_raw(self) -> RawResponse {
        let body = self.body_text();
        let mut raw = RawResponse::new(self.code, self.message);
        for (name, value) in self.header {
            raw.headers.push((name, value));
        }
        for (name, value) in self.fields {
            let key = name.to_ascii_lowercase();
            if matches!(key.as_str(), "code" | "message" | "data" | "header") {
                continue;
            }
            let value = match value {
                JsonValue::String(s) => s,
                other => other.to_string(),
            };
            raw.headers.push((name, value));
        }
        raw.body = Bytes::from(body);
        raw
    }
}

/// Resource fetched after an async operation completed
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct AsyncResource {
    pub data: String,
}

/// Outcome of polling a 202 Accepted operation
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct AsyncResult {
    /// Poll iterations waited, never more than the configured budget
    pub seconds_waited: u64,
    /// Value of the status field, empty when absent
    pub status: String,
    /// Body of the last poll
    pub data: String,
    /// Fetched resource, when a resource field was configured and set
    pub resource: Option<AsyncResource>,
}

/// Canonical response handed to callers.
///
/// `code`, `message` and `data` are always present; on a fatal pipeline
/// failure `code` and `message` are `None`, `data` is empty and
/// `fatal_error` says what went wrong.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Response {
    pub code: Option<u16>,
    pub message: Option<String>,
    /// Body decoded to UTF-8
    pub data: String,
    /// Header fields keyed by lower-case name; repeated names joined by `, `
    pub header: BTreeMap<String, String>,
    /// Seconds spent on the network call
    pub time_elapsed: Option<f64>,
    /// Seconds spent on the whole call, request building included
    pub time_elapsed_total: Option<f64>,
    #[serde(rename = "async", skip_serializing_if = "Option::is_none")]
    pub async_result: Option<AsyncResult>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub fatal_error: Option<String>,
    #[serde(skip)]
    pub raw_body: Bytes,
}

impl Response {
    /// Response for a call that did not complete
    pub fn fatal(error: impl Into<String>) -> Self {
        Self {
            fatal_error: Some(error.into()),
            ..Default::default()
        }
    }

    pub fn is_fatal(&self) -> bool {
        self.fatal_error.is_some()
    }

    /// Status code, 0 for fatal responses
    pub fn status_code(&self) -> u16 {
        self.code.unwrap_or(0)
    }

    /// Check if status is success (2xx)
    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status_code())
    }

    /// Check if status is redirect (3xx)
    pub fn is_redirect(&self) -> bool {
        (300..400).contains(&self.status_code())
    }

    /// Get a header value, any casing
    pub fn header(&self, name: &str) -> Option<&str> {
        self.header
            .get(&name.to_ascii_lowercase())
            .map(String::as_str)
    }

    /// Get content type
    pub fn content_type(&self) -> Option<&str> {
        self.header("content-type")
    }

    /// Parse body as JSON
    pub fn json<T: DeserializeOwned>(&self) -> Result<T> {
        serde_json::from_str(&self.data).map_err(Error::from)
    }

    /// Body as JSON value, `None` if it does not parse
    pub fn json_value(&self) -> Option<JsonValue> {
        serde_json::from_str(&self.data).ok()
    }

    /// Get raw body bytes
    pub fn bytes(&self) -> &Bytes {
        &self.raw_body
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_fatal_response_shape() {
        let resp = Response::fatal("Net::ReadTimeout");
        assert!(resp.is_fatal());
        assert_eq!(resp.code, None);
        assert_eq!(resp.message, None);
        assert_eq!(resp.data, "");
    }

    #[test]
    fn test_mock_into_raw_folds_fields() {
        let raw = MockResponse::new(100, "mock")
            .data(json!({"example": "mock"}))
            .field("content-type", "application/json")
            .header("x-id", "1")
            .into_raw();

        assert_eq!(raw.code, 100);
        assert_eq!(raw.message, "mock");
        assert_eq!(&raw.body[..], br#"{"example":"mock"}"#);
        assert!(raw
            .headers
            .contains(&("content-type".to_string(), "application/json".to_string())));
        assert!(raw.headers.contains(&("x-id".to_string(), "1".to_string())));
    }

    #[test]
    fn test_mock_deserializes_extra_fields() {
        let mock: MockResponse = serde_json::from_value(json!({
            "code": 200,
            "message": "OK",
            "data": "plain",
            "set-cookie": "a=1; path=/"
        }))
        .unwrap();

        assert_eq!(mock.fields.get("set-cookie"), Some(&json!("a=1; path=/")));
        assert_eq!(mock.body_text(), "plain");
    }

    #[test]
    fn test_header_lookup_case_insensitive() {
        let mut resp = Response::default();
        resp.header.insert("location".to_string(), "/new".to_string());
        assert_eq!(resp.header("Location"), Some("/new"));
    }
}
