// Copyright (c) 2026 Bountyy Oy. All rights reserved.
// This software is proprietary and confidential.

//! Response normalization
//!
//! Turns a [`RawResponse`] into the canonical [`Response`] and feeds what
//! it learned back into the connection: cookies, the CSRF token, the
//! request id and the statistics. Nothing in here fails the call; a step
//! that goes wrong is logged and the response built so far is kept.

use std::collections::BTreeMap;
use std::io::Read;
use std::time::Instant;

use chrono::{DateTime, Utc};
use encoding_rs::Encoding;
use flate2::read::{GzDecoder, ZlibDecoder};
use lazy_static::lazy_static;
use regex::Regex;
use serde_json::Value as JsonValue;

use super::cookie::CookieJar;
use super::headers::Headers;
use super::request::{log_body, PreparedRequest};
use super::response::{RawResponse, Response};
use super::SET_COOKIE;
use crate::config::ConnectionConfig;
use crate::context::ClientContext;
use crate::error::{Error, Result};
use crate::stats::{seconds_between, CallRecord};

lazy_static! {
    static ref CSRF_TOKEN: Regex = Regex::new(r"csrftoken=([\da-z]+);").unwrap();
    static ref RESPONSE_CHARSET: Regex = Regex::new(r"(?i);\s*charset=([^;\s]+)").unwrap();
}

/// Header kept in sync with the `csrftoken` cookie
pub const CSRF_HEADER: &str = "X-CSRFToken";

/// Header the request id is forwarded in
pub const REQUEST_ID_HEADER: &str = "requestId";

/// Clock readings of one call
#[derive(Debug, Clone, Copy)]
pub struct CallTiming {
    /// Start of the call, request building included
    pub call_start: Instant,
    /// Start of the network exchange
    pub net_start: Instant,
    /// Wall clock at the start of the call
    pub started_at: DateTime<Utc>,
}

impl CallTiming {
    pub fn start() -> Self {
        Self {
            call_start: Instant::now(),
            net_start: Instant::now(),
            started_at: Utc::now(),
        }
    }

    /// Mark the start of the network exchange
    pub fn network(mut self) -> Self {
        self.net_start = Instant::now();
        self
    }
}

/// Connection state the processor writes into
pub struct SessionParts<'a> {
    pub cookies: &'a mut CookieJar,
    pub headers: &'a mut Headers,
}

/// Normalizes responses for one connection
pub struct ResponseProcessor<'a> {
    config: &'a ConnectionConfig,
    context: &'a ClientContext,
}

impl<'a> ResponseProcessor<'a> {
    pub fn new(config: &'a ConnectionConfig, context: &'a ClientContext) -> Self {
        Self { config, context }
    }

    /// Build the canonical response and update `session`.
    ///
    /// `mocked` responses carry their Set-Cookie values joined in one field.
    pub fn process(
        &self,
        raw: RawResponse,
        mocked: bool,
        timing: &CallTiming,
        request: &PreparedRequest,
        session: SessionParts<'_>,
    ) -> Response {
        let finished_at = Utc::now();
        let (mut response, set_cookies) = normalize_headers(&raw, mocked);
        response.code = Some(raw.code);
        response.message = Some(raw.message.clone());
        response.time_elapsed = Some(timing.net_start.elapsed().as_secs_f64());
        response.time_elapsed_total = Some(timing.call_start.elapsed().as_secs_f64());

        let body = match decompress(&response, &raw.body) {
            Ok(body) => body,
            Err(e) => {
                tracing::error!(error = %e, "Could not decompress the response body");
                raw.body.to_vec()
            }
        };
        response.data = decode_text(&body, response.content_type());
        response.raw_body = body.into();

        if self.config.create_stats {
            self.record_stats(request, &response, timing.started_at, finished_at);
        }

        if !set_cookies.is_empty() {
            apply_cookies(session.cookies, session.headers, &set_cookies);
        }

        if let Some(id) = request_id(&response) {
            session.headers.insert(REQUEST_ID_HEADER, id.clone());
            self.context.set_last_request_id(id);
            tracing::info!(
                "requestId was found on the response and it has been added to the headers for the next request"
            );
        }

        response
    }

    fn record_stats(
        &self,
        request: &PreparedRequest,
        response: &Response,
        started: DateTime<Utc>,
        finished: DateTime<Utc>,
    ) {
        self.context.stats().record(&CallRecord {
            server: self.config.server(),
            path: request.path.clone(),
            method: request.method.to_string(),
            code: response.status_code(),
            name: request.name.clone(),
            started,
            finished,
            elapsed: response
                .time_elapsed
                .unwrap_or_else(|| seconds_between(started, finished)),
        });
    }

    /// Log text for a response.
    ///
    /// Only the status line is repeated when the response equals
    /// `previous`, unless `debug` is set.
    pub fn narrative(&self, response: &Response, previous: Option<&Response>) -> String {
        let mut message = format!(
            "\nRESPONSE: \n {}:{}",
            response.status_code(),
            response.message.as_deref().unwrap_or_default()
        );
        let changed = previous
            .map(|p| {
                p.code != response.code
                    || p.message != response.message
                    || p.data != response.data
                    || p.header("content-type") != response.header("content-type")
                    || p.header("content-length") != response.header("content-length")
            })
            .unwrap_or(true);

        if !(self.config.debug || changed) {
            message.push_str("\n Same as the last response.");
            return message;
        }

        if !response.data.is_empty() {
            let content_type = response.content_type().unwrap_or_default();
            if is_loggable(content_type) {
                message.push_str(&format!("\n data: '{}'\n", log_body(&response.data)));
            } else {
                message.push_str("\n data: It's not text data so won't be in the logs.");
            }
        }
        for (key, value) in &response.header {
            if !value.is_empty() {
                message.push_str(&format!("\n {}: '{}'", key, value.replace('<', "&lt;")));
            }
        }
        message
    }
}

/// Decompressed and charset-decoded body of a raw response
pub fn decode_body(raw: &RawResponse) -> String {
    let (response, _) = normalize_headers(raw, false);
    let body = decompress(&response, &raw.body).unwrap_or_else(|e| {
        tracing::warn!(error = %e, "Could not decompress the response body");
        raw.body.to_vec()
    });
    decode_text(&body, response.content_type())
}

/// Text content types are written to the log, everything else summarized
fn is_loggable(content_type: &str) -> bool {
    let ct = content_type.to_ascii_lowercase();
    ct.is_empty()
        || ct.contains("text")
        || ct.contains("json")
        || ct.contains("xml")
        || ct.contains("charset=utf-8")
}

/// Lower-case header names, join repeats with `, `, collect Set-Cookie values
fn normalize_headers(raw: &RawResponse, mocked: bool) -> (Response, Vec<String>) {
    let mut header: BTreeMap<String, String> = BTreeMap::new();
    let mut set_cookies = Vec::new();

    for (name, value) in &raw.headers {
        let key = name.to_ascii_lowercase();
        if key == SET_COOKIE {
            if mocked {
                set_cookies.extend(split_mock_cookies(value));
            } else {
                set_cookies.push(value.clone());
            }
        }
        header
            .entry(key)
            .and_modify(|existing| {
                existing.push_str(", ");
                existing.push_str(value);
            })
            .or_insert_with(|| value.clone());
    }

    let response = Response {
        header,
        ..Default::default()
    };
    (response, set_cookies)
}

/// Split a joined Set-Cookie value, keeping `Expires=Wed, 21 Oct ...` intact
fn split_mock_cookies(value: &str) -> Vec<String> {
    let mut cookies: Vec<String> = Vec::new();
    for part in value.split(", ") {
        let first = part.split(';').next().unwrap_or_default();
        match cookies.last_mut() {
            Some(last) if !first.contains('=') => {
                last.push_str(", ");
                last.push_str(part);
            }
            _ => cookies.push(part.to_string()),
        }
    }
    cookies
}

fn decompress(response: &Response, body: &[u8]) -> Result<Vec<u8>> {
    if body.is_empty() {
        return Ok(Vec::new());
    }
    let content_type = response.content_type().unwrap_or_default();
    let encoding = response
        .header("content-encoding")
        .unwrap_or_default()
        .to_ascii_lowercase();

    let mut out = Vec::new();
    if content_type.eq_ignore_ascii_case("application/x-deflate") || encoding == "deflate" {
        ZlibDecoder::new(body)
            .read_to_end(&mut out)
            .map_err(|e| Error::pipeline(format!("inflate failed: {}", e)))?;
    } else if encoding == "gzip" || encoding == "x-gzip" {
        GzDecoder::new(body)
            .read_to_end(&mut out)
            .map_err(|e| Error::pipeline(format!("gunzip failed: {}", e)))?;
    } else {
        out.extend_from_slice(body);
    }
    Ok(out)
}

/// Decode to UTF-8 using the charset named by the content type
fn decode_text(body: &[u8], content_type: Option<&str>) -> String {
    let charset = content_type
        .and_then(|ct| RESPONSE_CHARSET.captures(ct))
        .map(|c| c[1].trim_matches(|ch| ch == '"' || ch == '\'').to_string());

    match charset {
        Some(label) if !label.eq_ignore_ascii_case("utf-8") => {
            match Encoding::for_label(label.as_bytes()) {
                Some(encoding) => encoding.decode(body).0.into_owned(),
                None => {
                    tracing::warn!(charset = %label, "Unknown response charset, decoded as UTF-8");
                    String::from_utf8_lossy(body).into_owned()
                }
            }
        }
        _ => String::from_utf8_lossy(body).into_owned(),
    }
}

/// Store Set-Cookie values and refresh an existing CSRF header
fn apply_cookies(jar: &mut CookieJar, headers: &mut Headers, set_cookies: &[String]) {
    for value in set_cookies {
        if jar.add_from_header(value).is_none() {
            tracing::warn!(cookie = %value, "Ignored malformed set-cookie");
        }
    }
    tracing::info!("set-cookie added to Cookie header as required");

    if headers.contains(CSRF_HEADER) {
        let joined = set_cookies.join(", ");
        let token: String = CSRF_TOKEN
            .captures_iter(&joined)
            .map(|c| c[1].to_string())
            .collect();
        if !token.is_empty() {
            headers.insert(CSRF_HEADER, token);
            tracing::info!("X-CSRFToken exists on headers and has been overwritten");
        }
    }
}

/// `requestid` header, else a top-level `requestId` field of a JSON body
fn request_id(response: &Response) -> Option<String> {
    if let Some(id) = response.header("requestid").filter(|v| !v.is_empty()) {
        return Some(id.to_string());
    }
    let content_type = response.content_type().unwrap_or_default();
    if !content_type.is_empty() && !content_type.to_ascii_lowercase().contains("json") {
        return None;
    }
    match response.json_value()? {
        JsonValue::Object(map) => map
            .iter()
            .find(|(k, _)| k.eq_ignore_ascii_case("requestid"))
            .and_then(|(_, v)| match v {
                JsonValue::String(s) if !s.is_empty() => Some(s.clone()),
                JsonValue::Number(n) => Some(n.to_string()),
                _ => None,
            }),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::http::request::{Method, Request, RequestBuilder};
    use crate::http::response::MockResponse;
    use flate2::write::{GzEncoder, ZlibEncoder};
    use flate2::Compression;
    use serde_json::json;
    use std::io::Write;

    struct Fixture {
        config: ConnectionConfig,
        context: ClientContext,
        cookies: CookieJar,
        headers: Headers,
    }

    impl Fixture {
        fn new(config: ConnectionConfig) -> Self {
            let headers = config.headers.clone();
            Self {
                config,
                context: ClientContext::new(),
                cookies: CookieJar::new(),
                headers,
            }
        }

        fn process(&mut self, raw: RawResponse, mocked: bool, request: Request) -> Response {
            let defaults = self.context.defaults();
            let prepared = RequestBuilder::new(&self.config, &defaults, &self.headers, &self.cookies)
                .build(Method::Get, &request)
                .unwrap();
            let processor = ResponseProcessor::new(&self.config, &self.context);
            processor.process(
                raw,
                mocked,
                &CallTiming::start().network(),
                &prepared,
                SessionParts {
                    cookies: &mut self.cookies,
                    headers: &mut self.headers,
                },
            )
        }
    }

    #[test]
    fn test_mock_shape() {
        let mut fx = Fixture::new(ConnectionConfig::new("example.com"));
        let raw = MockResponse::new(100, "mock")
            .data(json!({"example": "mock"}))
            .into_raw();
        let resp = fx.process(raw, true, Request::new("/"));

        assert_eq!(resp.code, Some(100));
        assert_eq!(resp.message.as_deref(), Some("mock"));
        assert_eq!(resp.json_value(), Some(json!({"example": "mock"})));
        assert!(resp.time_elapsed.is_some());
    }

    #[test]
    fn test_headers_lowercased_and_joined() {
        let mut fx = Fixture::new(ConnectionConfig::new("example.com"));
        let raw = RawResponse::new(200, "OK")
            .header("X-Thing", "a")
            .header("x-thing", "b")
            .header("Content-Type", "text/plain");
        let resp = fx.process(raw, false, Request::new("/"));
        assert_eq!(resp.header.get("x-thing").map(String::as_str), Some("a, b"));
        assert_eq!(resp.content_type(), Some("text/plain"));
    }

    #[test]
    fn test_set_cookie_paths() {
        let mut fx = Fixture::new(ConnectionConfig::new("example.com"));
        let raw = RawResponse::new(200, "OK")
            .header("Set-Cookie", "sid=abc; Path=/api; HttpOnly")
            .header("Set-Cookie", "lang=en");
        fx.process(raw, false, Request::new("/"));

        assert_eq!(fx.cookies.get("/api", "sid"), Some("abc"));
        assert_eq!(fx.cookies.get("/", "lang"), Some("en"));
        assert_eq!(fx.cookies.cookie_header("/api/x"), "lang=en; sid=abc");
    }

    #[test]
    fn test_mock_set_cookie_with_expires() {
        let mut fx = Fixture::new(ConnectionConfig::new("example.com"));
        let raw = MockResponse::new(200, "OK")
            .field(
                "set-cookie",
                "a=1; Expires=Wed, 21 Oct 2026 07:28:00 GMT; path=/x, b=2",
            )
            .into_raw();
        fx.process(raw, true, Request::new("/"));

        assert_eq!(fx.cookies.get("/x", "a"), Some("1"));
        assert_eq!(fx.cookies.get("/", "b"), Some("2"));
    }

    #[test]
    fn test_csrf_overwritten_only_when_present() {
        let mut fx = Fixture::new(ConnectionConfig::new("example.com"));
        let raw = RawResponse::new(200, "OK").header("Set-Cookie", "csrftoken=abc123; path=/");
        fx.process(raw.clone(), false, Request::new("/"));
        assert!(!fx.headers.contains(CSRF_HEADER));

        let mut fx = Fixture::new(ConnectionConfig::new("example.com").header(CSRF_HEADER, "old"));
        fx.process(raw, false, Request::new("/"));
        assert_eq!(fx.headers.get_str(CSRF_HEADER).as_deref(), Some("abc123"));
    }

    #[test]
    fn test_request_id_from_body() {
        let mut fx = Fixture::new(ConnectionConfig::new("example.com"));
        let raw = RawResponse::new(200, "OK")
            .header("Content-Type", "application/json")
            .body(r#"{"RequestID": "r-1", "x": 1}"#);
        fx.process(raw, false, Request::new("/"));

        assert_eq!(fx.headers.get_str("requestid").as_deref(), Some("r-1"));
        assert_eq!(fx.context.last_request_id().as_deref(), Some("r-1"));
    }

    #[test]
    fn test_request_id_from_header() {
        let mut fx = Fixture::new(ConnectionConfig::new("example.com"));
        let raw = RawResponse::new(200, "OK").header("requestid", "h-9");
        fx.process(raw, false, Request::new("/"));
        assert_eq!(fx.context.last_request_id().as_deref(), Some("h-9"));
    }

    #[test]
    fn test_deflate_and_gzip_bodies() {
        let mut zlib = ZlibEncoder::new(Vec::new(), Compression::default());
        zlib.write_all(b"inflated").unwrap();
        let mut fx = Fixture::new(ConnectionConfig::new("example.com"));
        let raw = RawResponse::new(200, "OK")
            .header("Content-Type", "application/x-deflate")
            .body(zlib.finish().unwrap());
        assert_eq!(fx.process(raw, false, Request::new("/")).data, "inflated");

        let mut gz = GzEncoder::new(Vec::new(), Compression::default());
        gz.write_all(b"gunzipped").unwrap();
        let raw = RawResponse::new(200, "OK")
            .header("Content-Encoding", "gzip")
            .body(gz.finish().unwrap());
        assert_eq!(fx.process(raw, false, Request::new("/")).data, "gunzipped");
    }

    #[test]
    fn test_charset_decoding() {
        let mut fx = Fixture::new(ConnectionConfig::new("example.com"));
        let raw = RawResponse::new(200, "OK")
            .header("Content-Type", "text/plain;charset=ISO-8859-1")
            .body(&b"caf\xe9"[..]);
        assert_eq!(fx.process(raw, false, Request::new("/")).data, "café");
    }

    #[test]
    fn test_stats_recorded_when_enabled() {
        let mut fx = Fixture::new(ConnectionConfig::new("example.com").create_stats(true));
        fx.process(
            RawResponse::new(200, "OK"),
            false,
            Request::new("/users?page=2").name("list users"),
        );
        let tree = fx.context.stats().snapshot();
        assert_eq!(tree.all.method["GET"].response[&200].count, 1);
        assert_eq!(tree.path["example.com:80"].paths["/users?page=2"].leaf.count, 1);
        assert_eq!(tree.name["list users"].leaf.count, 1);
    }

    #[test]
    fn test_stats_path_keeps_query() {
        let mut fx = Fixture::new(ConnectionConfig::new("example.com").create_stats(true));
        fx.process(RawResponse::new(200, "OK"), false, Request::new("/users?page=1"));
        fx.process(RawResponse::new(200, "OK"), false, Request::new("/users?page=2"));
        fx.process(RawResponse::new(200, "OK"), false, Request::new("/users?page=2"));

        let tree = fx.context.stats().snapshot();
        let server = &tree.path["example.com:80"];
        assert_eq!(server.paths.len(), 2);
        assert_eq!(server.paths["/users?page=1"].leaf.count, 1);
        assert_eq!(server.paths["/users?page=2"].leaf.count, 2);
        assert_eq!(server.leaf.count, 3);
    }

    #[test]
    fn test_stats_span_starts_with_call() {
        let mut fx = Fixture::new(ConnectionConfig::new("example.com").create_stats(true));
        let timing = CallTiming::start();
        std::thread::sleep(std::time::Duration::from_millis(20));
        let timing = timing.network();
        let defaults = fx.context.defaults();
        let prepared = RequestBuilder::new(&fx.config, &defaults, &fx.headers, &fx.cookies)
            .build(Method::Get, &Request::new("/slow"))
            .unwrap();
        ResponseProcessor::new(&fx.config, &fx.context).process(
            RawResponse::new(200, "OK"),
            false,
            &timing,
            &prepared,
            SessionParts {
                cookies: &mut fx.cookies,
                headers: &mut fx.headers,
            },
        );

        let leaf = fx.context.stats().snapshot().all.leaf;
        assert_eq!(leaf.started, Some(timing.started_at));
        assert!(leaf.real_time_elapsed >= 0.02);
        assert!(leaf.time_elapsed.total < leaf.real_time_elapsed);
    }

    #[test]
    fn test_narrative_same_as_last() {
        let config = ConnectionConfig::new("example.com");
        let context = ClientContext::new();
        let processor = ResponseProcessor::new(&config, &context);
        let mut resp = Response {
            code: Some(200),
            message: Some("OK".to_string()),
            data: "<b>".to_string(),
            ..Default::default()
        };
        resp.header.insert("content-type".to_string(), "text/html".to_string());

        let first = processor.narrative(&resp, None);
        assert!(first.contains("200:OK"));
        assert!(first.contains("&lt;b>"));
        let second = processor.narrative(&resp, Some(&resp));
        assert!(second.contains("Same as the last response."));
    }

    #[test]
    fn test_binary_body_not_logged() {
        let config = ConnectionConfig::new("example.com");
        let context = ClientContext::new();
        let mut resp = Response {
            code: Some(200),
            message: Some("OK".to_string()),
            data: "PNG".to_string(),
            ..Default::default()
        };
        resp.header.insert("content-type".to_string(), "image/png".to_string());
        let text = ResponseProcessor::new(&config, &context).narrative(&resp, None);
        assert!(text.contains("It's not text data"));
    }
}
