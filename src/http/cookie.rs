// Copyright (c) 2026 Bountyy Oy. All rights reserved.
// This software is proprietary and confidential.

//! Path-scoped cookie jar
//!
//! Cookies are keyed by the `path` attribute they were set with. A cookie
//! under `/api` is sent to `/api` and anything below it, never to
//! `/apix`. The root path `/` matches every request. No expiry is modeled.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

/// Path used when a cookie carries no `path` attribute
pub const ROOT_PATH: &str = "/";

/// A single stored cookie
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Cookie {
    /// Cookie name
    pub name: String,
    /// Cookie value
    pub value: String,
    /// Path the cookie is scoped to
    pub path: String,
}

impl Cookie {
    /// Create a new root-scoped cookie
    pub fn new(name: impl Into<String>, value: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            value: value.into(),
            path: ROOT_PATH.to_string(),
        }
    }

    /// Set the path
    pub fn path(mut self, path: impl Into<String>) -> Self {
        self.path = normalize_path(&path.into());
        self
    }

    /// Parse one Set-Cookie header value.
    ///
    /// Only the leading `name=value` pair and the `path` attribute are
    /// kept; everything else is ignored.
    pub fn parse(header: &str) -> Option<Self> {
        let mut parts = header.split(';');
        let first = parts.next()?.trim();
        let (name, value) = first.split_once('=')?;
        let name = name.trim();
        if name.is_empty() {
            return None;
        }

        let mut cookie = Cookie::new(name, value.trim());
        for part in parts {
            if let Some((attr, val)) = part.trim().split_once('=') {
                if attr.trim().eq_ignore_ascii_case("path") {
                    cookie.path = normalize_path(val.trim());
                }
            }
        }
        Some(cookie)
    }

    /// Convert to cookie header format
    pub fn to_header_value(&self) -> String {
        format!("{}={}", self.name, self.value)
    }
}

/// Per-connection cookie storage
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CookieJar {
    /// Cookies stored by path prefix
    cookies: BTreeMap<String, Vec<Cookie>>,
}

impl CookieJar {
    /// Create a new empty cookie jar
    pub fn new() -> Self {
        Self::default()
    }

    /// Store a cookie, replacing any with the same path and name
    pub fn set(&mut self, path: &str, name: impl Into<String>, value: impl Into<String>) {
        let path = normalize_path(path);
        let name = name.into();
        let value = value.into();
        let bucket = self.cookies.entry(path.clone()).or_default();
        match bucket.iter_mut().find(|c| c.name == name) {
            Some(existing) => existing.value = value,
            None => bucket.push(Cookie { name, value, path }),
        }
    }

    /// Store a parsed cookie
    pub fn add(&mut self, cookie: Cookie) {
        self.set(&cookie.path.clone(), cookie.name, cookie.value);
    }

    /// Parse and store a Set-Cookie header value. Returns the stored cookie.
    pub fn add_from_header(&mut self, header: &str) -> Option<Cookie> {
        let cookie = Cookie::parse(header)?;
        self.add(cookie.clone());
        Some(cookie)
    }

    /// Cookies stored under exactly `path`. Unknown paths read as empty.
    pub fn cookies_at(&self, path: &str) -> &[Cookie] {
        self.cookies
            .get(&normalize_path(path))
            .map(Vec::as_slice)
            .unwrap_or(&[])
    }

    /// Value of a cookie stored under exactly `path`
    pub fn get(&self, path: &str, name: &str) -> Option<&str> {
        self.cookies_at(path)
            .iter()
            .find(|c| c.name == name)
            .map(|c| c.value.as_str())
    }

    /// All cookies applying to a request path
    pub fn get_cookies(&self, request_path: &str) -> Vec<&Cookie> {
        let request_path = strip_to_path(request_path);
        self.cookies
            .iter()
            .filter(|(prefix, _)| path_matches(prefix, request_path))
            .flat_map(|(_, bucket)| bucket.iter())
            .collect()
    }

    /// Cookie header value for a request path; empty when nothing applies
    pub fn cookie_header(&self, request_path: &str) -> String {
        self.get_cookies(request_path)
            .iter()
            .map(|c| c.to_header_value())
            .collect::<Vec<_>>()
            .join("; ")
    }

    /// Copy every cookie of `other` into this jar, `other` winning ties
    pub fn merge(&mut self, other: &CookieJar) {
        for cookie in other.cookies.values().flatten() {
            self.add(cookie.clone());
        }
    }

    /// Clear all cookies
    pub fn clear(&mut self) {
        self.cookies.clear();
    }

    /// Get total cookie count
    pub fn len(&self) -> usize {
        self.cookies.values().map(Vec::len).sum()
    }

    /// Check if jar is empty
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Trim a trailing slash, map empty to root
fn normalize_path(path: &str) -> String {
    let trimmed = path.trim().trim_end_matches('/');
    if trimmed.is_empty() {
        ROOT_PATH.to_string()
    } else {
        trimmed.to_string()
    }
}

/// Drop scheme/host and query from a request path
fn strip_to_path(request_path: &str) -> &str {
    let without_origin = match request_path.find("://") {
        Some(i) => {
            let rest = &request_path[i + 3..];
            rest.find('/').map(|j| &rest[j..]).unwrap_or("/")
        }
        None => request_path,
    };
    without_origin
        .split(|c| c == '?' || c == '#')
        .next()
        .unwrap_or("/")
}

/// `prefix` applies to `path` if it is `/`, equal to it, or a parent segment
fn path_matches(prefix: &str, path: &str) -> bool {
    if prefix == ROOT_PATH {
        return true;
    }
    let path = path.trim_end_matches('/');
    path == prefix
        || (path.starts_with(prefix) && path.as_bytes().get(prefix.len()) == Some(&b'/'))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cookie_parsing() {
        let cookie = Cookie::parse("session=abc=123; Path=/api/; HttpOnly").unwrap();

        assert_eq!(cookie.name, "session");
        assert_eq!(cookie.value, "abc=123");
        assert_eq!(cookie.path, "/api");
    }

    #[test]
    fn test_cookie_without_path_is_root() {
        let cookie = Cookie::parse("auth0=xyz; Secure").unwrap();
        assert_eq!(cookie.path, "/");
        assert!(Cookie::parse("novalue").is_none());
    }

    #[test]
    fn test_path_scoping() {
        let mut jar = CookieJar::new();
        jar.set("/api", "token", "t1");
        jar.set("/", "lang", "en");

        assert_eq!(jar.cookie_header("/api"), "lang=en; token=t1");
        assert_eq!(jar.cookie_header("/api/users/1?x=1"), "lang=en; token=t1");
        assert_eq!(jar.cookie_header("/apix"), "lang=en");
        assert_eq!(jar.cookie_header("/other"), "lang=en");
        assert_eq!(
            jar.cookie_header("https://example.com/api/v1"),
            "lang=en; token=t1"
        );
    }

    #[test]
    fn test_last_write_wins() {
        let mut jar = CookieJar::new();
        jar.set("/", "a", "1");
        jar.set("", "a", "2");

        assert_eq!(jar.len(), 1);
        assert_eq!(jar.get("/", "a"), Some("2"));
    }

    #[test]
    fn test_unknown_path_reads_empty() {
        let jar = CookieJar::new();
        assert!(jar.cookies_at("/nothing").is_empty());
        assert_eq!(jar.cookie_header("/nothing"), "");
    }

    #[test]
    fn test_merge() {
        let mut target = CookieJar::new();
        target.set("/", "a", "old");
        target.set("/", "b", "kept");

        let mut source = CookieJar::new();
        source.set("/", "a", "new");
        source.set("/x", "c", "3");

        target.merge(&source);
        assert_eq!(target.get("/", "a"), Some("new"));
        assert_eq!(target.get("/", "b"), Some("kept"));
        assert_eq!(target.get("/x", "c"), Some("3"));
    }
}
