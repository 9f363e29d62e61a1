// Copyright (c) 2026 Bountyy Oy. All rights reserved.
// This software is proprietary and confidential.

//! HTTP request types and builder

use std::fmt;
use std::str::FromStr;

use bytes::Bytes;
use encoding_rs::Encoding;
use lazy_static::lazy_static;
use regex::Regex;
use serde_json::Value as JsonValue;

use super::cookie::CookieJar;
use super::headers::{find_header, HeaderValue, Headers, ResolvedHeaders};
use super::redirect::is_absolute;
use super::response::MockResponse;
use super::substitute::{
    apply_structured, is_json_content_type, is_xml_content_type, set_value_xml_tag, set_values,
    substitute_json_string,
};
use super::{ACCEPT_ENCODING, CONTENT_TYPE, FORM_URLENCODED, JSON_CONTENT_TYPE};
use crate::config::{ConnectionConfig, LogHeaders};
use crate::context::RequestDefaults;
use crate::error::{Error, Result};
use crate::value::{deep_merge, resolve_lazy, Value};

lazy_static! {
    static ref BODY_ENCODING: Regex = Regex::new(r"(?i)encoding='([^']*)'").unwrap();
    static ref BODY_CHARSET: Regex = Regex::new(r"(?i)charset='([^']*)'").unwrap();
    static ref HEADER_CHARSET: Regex = Regex::new(r"(?i)charset='?([^';\s]*)").unwrap();
    static ref HEADER_ENCODING: Regex = Regex::new(r"(?i)encoding='?([^';\s]*)").unwrap();
}

/// Supported HTTP verbs
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Method {
    Get,
    Head,
    Post,
    Put,
    Patch,
    Delete,
}

impl Method {
    pub fn as_str(&self) -> &'static str {
        match self {
            Method::Get => "GET",
            Method::Head => "HEAD",
            Method::Post => "POST",
            Method::Put => "PUT",
            Method::Patch => "PATCH",
            Method::Delete => "DELETE",
        }
    }

    /// Verbs whose request carries a body
    pub fn has_body(&self) -> bool {
        matches!(self, Method::Post | Method::Put | Method::Patch | Method::Delete)
    }
}

impl fmt::Display for Method {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Method {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_uppercase().as_str() {
            "GET" => Ok(Method::Get),
            "HEAD" => Ok(Method::Head),
            "POST" => Ok(Method::Post),
            "PUT" => Ok(Method::Put),
            "PATCH" => Ok(Method::Patch),
            "DELETE" => Ok(Method::Delete),
            other => Err(Error::invalid_request(format!(
                "{} is not a supported method, use one of GET, HEAD, POST, PUT, PATCH, DELETE",
                other
            ))),
        }
    }
}

impl From<Method> for reqwest::Method {
    fn from(method: Method) -> Self {
        match method {
            Method::Get => reqwest::Method::GET,
            Method::Head => reqwest::Method::HEAD,
            Method::Post => reqwest::Method::POST,
            Method::Put => reqwest::Method::PUT,
            Method::Patch => reqwest::Method::PATCH,
            Method::Delete => reqwest::Method::DELETE,
        }
    }
}

/// Request as supplied by the caller
#[derive(Debug, Clone, Default)]
pub struct Request {
    /// Path, relative to the connection prepath, or an absolute URL
    pub path: Option<String>,
    /// Body
    pub data: Option<Value>,
    /// Candidate bodies; the first one is used when `data` is absent
    pub data_examples: Vec<Value>,
    /// Headers layered over the connection headers
    pub headers: Headers,
    /// Substitutions applied to the body
    pub values_for: Option<Value>,
    /// Older name of `values_for`
    pub values: Option<Value>,
    /// Label for stats grouping
    pub name: Option<String>,
    /// Canned response used instead of the transport when mocks are on
    pub mock_response: Option<MockResponse>,
}

impl Request {
    pub fn new(path: impl Into<String>) -> Self {
        Self {
            path: Some(path.into()),
            ..Default::default()
        }
    }

    pub fn data(mut self, data: impl Into<Value>) -> Self {
        self.data = Some(data.into());
        self
    }

    pub fn data_examples(mut self, examples: Vec<Value>) -> Self {
        self.data_examples = examples;
        self
    }

    pub fn header(mut self, name: impl Into<String>, value: impl Into<HeaderValue>) -> Self {
        self.headers.insert(name, value);
        self
    }

    pub fn values_for(mut self, values: impl Into<Value>) -> Self {
        self.values_for = Some(values.into());
        self
    }

    pub fn values(mut self, values: impl Into<Value>) -> Self {
        self.values = Some(values.into());
        self
    }

    pub fn name(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }

    pub fn mock_response(mut self, mock: MockResponse) -> Self {
        self.mock_response = Some(mock);
        self
    }

    /// Body chosen for the call
    fn body(&self) -> Option<&Value> {
        self.data.as_ref().or_else(|| self.data_examples.first())
    }

    /// `values_for`, falling back to `values`
    fn own_values(&self) -> Option<&Value> {
        self.values_for.as_ref().or(self.values.as_ref())
    }
}

impl From<&str> for Request {
    fn from(path: &str) -> Self {
        Request::new(path)
    }
}

impl From<String> for Request {
    fn from(path: String) -> Self {
        Request::new(path)
    }
}

/// Request ready for the transport
#[derive(Debug, Clone)]
pub struct PreparedRequest {
    pub method: Method,
    pub path: String,
    /// Merged headers, computed values unresolved
    pub headers: Headers,
    /// Headers as sent
    pub wire_headers: ResolvedHeaders,
    /// Body as sent, transcoded to the declared charset
    pub body: Bytes,
    /// Body in UTF-8
    pub body_text: String,
    pub name: Option<String>,
}

impl PreparedRequest {
    /// Evaluate computed headers again, e.g. to refresh an expired token
    pub fn regenerate_headers(&mut self) {
        self.wire_headers = wire_headers(&self.headers);
    }

    pub fn has_computed_headers(&self) -> bool {
        self.headers.has_computed()
    }

    pub fn content_type(&self) -> Option<&str> {
        find_header(&self.wire_headers, CONTENT_TYPE)
    }

    /// True when path, headers and body equal `other`
    pub fn same_as(&self, other: &PreparedRequest) -> bool {
        self.path == other.path
            && self.wire_headers == other.wire_headers
            && self.body_text == other.body_text
    }

    /// Log text for this request.
    ///
    /// Headers and body are left out when they equal `previous`, unless
    /// `debug` is set.
    pub fn narrative(
        &self,
        previous: Option<&PreparedRequest>,
        debug: bool,
        log_headers: LogHeaders,
    ) -> String {
        let mut message = format!("\n\n{}\n", "- ".repeat(25));
        match &self.name {
            Some(name) => message.push_str(&format!("{} Request: {}", self.method, name)),
            None => message.push_str(&format!("{} Request", self.method)),
        }
        message.push_str(&format!("\n path: {}\n", self.path));

        let show = debug || previous.map(|p| !self.same_as(p)).unwrap_or(true);
        if show {
            message.push_str(&format!(
                " headers: {{{}}}\n",
                format_headers(&self.wire_headers, log_headers)
            ));
            message.push_str(&format!(" data: {}\n", log_body(&self.body_text)));
        } else {
            let has_headers = !self.wire_headers.is_empty();
            let has_data = !self.body_text.is_empty();
            message.push_str(" Same");
            if has_headers {
                message.push_str(" headers");
            }
            if has_headers && has_data {
                message.push_str(" and");
            }
            if has_data {
                message.push_str(" data");
            }
            message.push_str(" as in the previous request.");
        }
        message
    }
}

/// Assembles a [`PreparedRequest`] from connection state and a caller request
pub struct RequestBuilder<'a> {
    config: &'a ConnectionConfig,
    defaults: &'a RequestDefaults,
    headers: &'a Headers,
    cookies: &'a CookieJar,
}

impl<'a> RequestBuilder<'a> {
    /// `headers` are the connection's current headers, which may have
    /// picked up values from earlier responses
    pub fn new(
        config: &'a ConnectionConfig,
        defaults: &'a RequestDefaults,
        headers: &'a Headers,
        cookies: &'a CookieJar,
    ) -> Self {
        Self {
            config,
            defaults,
            headers,
            cookies,
        }
    }

    pub fn build(&self, method: Method, request: &Request) -> Result<PreparedRequest> {
        let path = self.resolve_path(request)?;

        let mut headers = self.headers.clone();
        headers.merge(&self.defaults.headers);
        let cookie = self.cookies.cookie_header(&path);
        if !cookie.is_empty() {
            headers.insert(COOKIE_HEADER, cookie);
        }
        headers.merge(&request.headers);

        // GET and HEAD never carry a body
        let body = request.body().filter(|_| method.has_body());
        if !headers.contains(CONTENT_TYPE) && body.map(Value::is_structured).unwrap_or(false) {
            headers.insert(CONTENT_TYPE_HEADER, JSON_CONTENT_TYPE);
        }
        let content_type = headers.get_str(CONTENT_TYPE).unwrap_or_default();

        let values = self.merged_values(request);
        let body_text = match body {
            Some(body) => self.render_body(body, &content_type, values.as_ref())?,
            None => String::new(),
        };

        let body = encode_body(&body_text, &content_type);
        let wire_headers = wire_headers(&headers);

        Ok(PreparedRequest {
            method,
            path,
            headers,
            wire_headers,
            body,
            body_text,
            name: request.name.clone(),
        })
    }

    fn resolve_path(&self, request: &Request) -> Result<String> {
        let raw = request
            .path
            .as_deref()
            .filter(|p| !p.is_empty())
            .ok_or_else(|| Error::invalid_request("path is required"))?;

        let mut path = if is_absolute(raw) {
            raw.to_string()
        } else {
            format!("{}{}", self.config.prepath, raw).replace("//", "/")
        };
        append_default_query(&mut path, &self.defaults.query);
        Ok(path)
    }

    /// Connection values < context defaults < per-call values, lazies resolved
    fn merged_values(&self, request: &Request) -> Option<JsonValue> {
        let own = request.own_values();
        let mut merged = own.cloned();

        if !self.defaults.values_for.is_empty() {
            merged = Some(match &merged {
                Some(own) => deep_merge(&self.defaults.values_for, own),
                None => self.defaults.values_for.clone(),
            });
        }
        if !self.config.values_for.is_empty() {
            merged = Some(match &merged {
                Some(m) => deep_merge(&self.config.values_for, m),
                None => self.config.values_for.clone(),
            });
        }

        let merged = merged?;
        let resolved = resolve_lazy(&merged, own)?;
        match &resolved {
            JsonValue::Object(m) if m.is_empty() => None,
            JsonValue::Array(a) if a.is_empty() => None,
            JsonValue::Null => None,
            _ => Some(resolved),
        }
    }

    fn render_body(
        &self,
        body: &Value,
        content_type: &str,
        values: Option<&JsonValue>,
    ) -> Result<String> {
        if is_xml_content_type(content_type) {
            let mut xml = body.to_plain_string();
            if let Some(JsonValue::Object(values)) = values {
                for (key, value) in values {
                    let value = match value {
                        JsonValue::String(s) => s.clone(),
                        other => other.to_string(),
                    };
                    xml = set_value_xml_tag(key, &xml, &value, true);
                }
            }
            return Ok(xml);
        }

        if is_json_content_type(content_type) && !body.is_empty() {
            return match body {
                Value::Scalar(JsonValue::String(text)) => Ok(match values {
                    Some(JsonValue::Object(values)) => substitute_json_string(text, values),
                    _ => text.clone(),
                }),
                Value::Map(_) => {
                    let merged = deep_merge(body, &self.defaults.data);
                    let mut json = resolve_lazy(&merged, Some(body)).unwrap_or(JsonValue::Null);
                    apply_structured(&mut json, values.unwrap_or(&JsonValue::Null))?;
                    Ok(serde_json::to_string(&json)?)
                }
                Value::List(_) => {
                    let mut json = body.to_json();
                    apply_structured(&mut json, values.unwrap_or(&JsonValue::Null))?;
                    Ok(serde_json::to_string(&json)?)
                }
                _ => {
                    tracing::error!(
                        "Wrong format on request application/json, be sure is a Hash, Array of Hashes or JSON string"
                    );
                    Err(Error::data_shape(
                        "be sure is a Hash, Array of Hashes or JSON string",
                    ))
                }
            };
        }

        let is_form = content_type
            .to_ascii_lowercase()
            .contains(FORM_URLENCODED);
        if is_form && body.is_map() {
            let mut json = body.to_json();
            if let Some(JsonValue::Object(values)) = values {
                set_values(&mut json, values);
            }
            return Ok(form_encode(&json));
        }

        if values.is_some() && !content_type.is_empty() && !is_form {
            tracing::warn!(
                "values_for key given without a valid content-type or data for request. No values modified on the request"
            );
        }

        Ok(match body {
            Value::Map(_) | Value::List(_) => serde_json::to_string(&body.to_json())?,
            other => other.to_plain_string(),
        })
    }
}

/// Casing used when a header is synthesized
const COOKIE_HEADER: &str = "Cookie";
const CONTENT_TYPE_HEADER: &str = "Content-Type";

/// Resolve computed values and drop `gzip` from Accept-Encoding
fn wire_headers(headers: &Headers) -> ResolvedHeaders {
    headers
        .resolve()
        .into_iter()
        .map(|(name, value)| {
            if name.eq_ignore_ascii_case(ACCEPT_ENCODING) {
                let stripped = value
                    .split(',')
                    .map(str::trim)
                    .filter(|v| !v.is_empty() && !v.eq_ignore_ascii_case("gzip"))
                    .collect::<Vec<_>>()
                    .join(", ");
                (name, stripped)
            } else {
                (name, value)
            }
        })
        .collect()
}

/// Append default query parameters the path does not carry yet
fn append_default_query(path: &mut String, defaults: &[(String, String)]) {
    if defaults.is_empty() {
        return;
    }
    let existing: Vec<String> = match path.split_once('?') {
        Some((_, query)) => url::form_urlencoded::parse(query.as_bytes())
            .map(|(k, _)| k.into_owned())
            .collect(),
        None => Vec::new(),
    };

    let mut extra = url::form_urlencoded::Serializer::new(String::new());
    let mut added = false;
    for (key, value) in defaults {
        if !existing.iter().any(|k| k == key) {
            extra.append_pair(key, value);
            added = true;
        }
    }
    if !added {
        return;
    }

    if !path.contains('?') {
        path.push('?');
    } else if !path.ends_with('?') && !path.ends_with('&') {
        path.push('&');
    }
    path.push_str(&extra.finish());
}

fn form_encode(json: &JsonValue) -> String {
    let mut form = url::form_urlencoded::Serializer::new(String::new());
    if let JsonValue::Object(map) = json {
        for (key, value) in map {
            match value {
                JsonValue::String(s) => form.append_pair(key, s),
                JsonValue::Null => form.append_pair(key, ""),
                other => form.append_pair(key, &other.to_string()),
            };
        }
    }
    form.finish()
}

/// Charset named by the body or, failing that, the content type
fn declared_charset(body: &str, content_type: &str) -> Option<String> {
    let from = |re: &Regex, text: &str| {
        re.captures(text)
            .map(|c| c[1].trim().to_string())
            .filter(|s| !s.is_empty())
    };
    from(&BODY_ENCODING, body)
        .or_else(|| from(&BODY_CHARSET, body))
        .or_else(|| from(&HEADER_CHARSET, content_type))
        .or_else(|| from(&HEADER_ENCODING, content_type))
}

/// Body bytes in the declared charset, UTF-8 when none or unknown
fn encode_body(body: &str, content_type: &str) -> Bytes {
    if body.is_empty() {
        return Bytes::new();
    }
    let charset = match declared_charset(body, content_type) {
        Some(c) if !c.eq_ignore_ascii_case("utf-8") => c,
        _ => return Bytes::copy_from_slice(body.as_bytes()),
    };
    match Encoding::for_label(charset.as_bytes()) {
        Some(encoding) => {
            let (encoded, _, unmappable) = encoding.encode(body);
            if unmappable {
                tracing::warn!(charset = %charset, "Body has characters not representable in the charset");
            }
            Bytes::copy_from_slice(&encoded)
        }
        None => {
            tracing::warn!(charset = %charset, "Unknown charset, body sent as UTF-8");
            Bytes::copy_from_slice(body.as_bytes())
        }
    }
}

/// Header list for the log, following the `log_headers` mode
pub fn format_headers(headers: &[(String, String)], mode: LogHeaders) -> String {
    headers
        .iter()
        .map(|(key, value)| match mode {
            LogHeaders::All => format!("{}:{}, ", key, value),
            LogHeaders::None => format!("{}:'', ", key),
            LogHeaders::Partial => {
                let chars: Vec<char> = value.chars().collect();
                if chars.len() > 10 {
                    let tail: String = chars[chars.len() - 10..].iter().collect();
                    format!("{}: ...{}, ", key, tail)
                } else {
                    format!("{}:{}, ", key, value)
                }
            }
        })
        .collect()
}

/// Pretty printed when JSON, `<` escaped
pub fn log_body(body: &str) -> String {
    let text = serde_json::from_str::<JsonValue>(body)
        .ok()
        .filter(|v| v.is_object() || v.is_array())
        .and_then(|v| serde_json::to_string_pretty(&v).ok())
        .unwrap_or_else(|| body.to_string());
    text.replace('<', "&lt;")
}
