// Copyright (c) 2026 Bountyy Oy. All rights reserved.
// This software is proprietary and confidential.

//! Connection configuration

use std::time::Duration;

use url::Url;

use crate::error::{Error, Result};
use crate::http::{HeaderValue, Headers};
use crate::value::Value;

/// Default port when none is given
pub const DEFAULT_PORT: u16 = 80;

/// How header values are written to the log
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum LogHeaders {
    /// Full values
    #[default]
    All,
    /// Names only
    None,
    /// Last 10 characters of each value
    Partial,
}

/// Polling behaviour for 202 Accepted responses
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AsyncPollConfig {
    /// Poll budget in seconds; 0 disables polling
    pub wait_seconds: u64,
    /// Response header carrying the poll location
    pub header: String,
    /// JSON field holding the completion percentage
    pub completed: String,
    /// JSON field holding the link of the created resource
    pub resource: String,
    /// JSON field holding the operation status
    pub status: String,
}

impl Default for AsyncPollConfig {
    fn default() -> Self {
        Self {
            wait_seconds: 0,
            header: "location".to_string(),
            completed: String::new(),
            resource: String::new(),
            status: String::new(),
        }
    }
}

impl AsyncPollConfig {
    /// Polling only runs with a budget, a location header and a completion field
    pub fn is_enabled(&self) -> bool {
        self.wait_seconds > 0 && !self.header.is_empty() && !self.completed.is_empty()
    }
}

/// Connection configuration
#[derive(Debug, Clone)]
pub struct ConnectionConfig {
    /// Host name, or a full URL re-parsed on validation
    pub host: String,
    /// Port
    pub port: u16,
    /// Use https
    pub ssl: bool,
    /// Path prefix for every call
    pub prepath: String,
    /// Open and read timeout
    pub timeout: Option<Duration>,
    /// Default headers
    pub headers: Headers,
    /// Default substitutions
    pub values_for: Value,
    /// Log full request and response every time
    pub debug: bool,
    /// Header logging mode
    pub log_headers: LogHeaders,
    /// Proxy host and port
    pub proxy: Option<(String, u16)>,
    /// Honour `mock_response` on requests
    pub use_mocks: bool,
    /// Follow 3xx responses
    pub auto_redirect: bool,
    /// Record statistics for every call
    pub create_stats: bool,
    /// Keep request/response narratives in the context capture buffer
    pub capture: bool,
    /// 202 polling
    pub async_poll: AsyncPollConfig,
}

impl Default for ConnectionConfig {
    fn default() -> Self {
        Self {
            host: String::new(),
            port: DEFAULT_PORT,
            ssl: false,
            prepath: String::new(),
            timeout: None,
            headers: Headers::new(),
            values_for: Value::map(),
            debug: false,
            log_headers: LogHeaders::All,
            proxy: None,
            use_mocks: false,
            auto_redirect: true,
            create_stats: false,
            capture: false,
            async_poll: AsyncPollConfig::default(),
        }
    }
}

impl ConnectionConfig {
    /// Create a new config for a host
    pub fn new(host: impl Into<String>) -> Self {
        Self {
            host: host.into(),
            ..Default::default()
        }
    }

    /// Parse `http(s)://host[:port][/prepath]` or `host[:port]`
    pub fn from_url(url: &str) -> Result<Self> {
        let mut config = Self::default();
        config.apply_url(url)?;
        Ok(config)
    }

    fn apply_url(&mut self, url: &str) -> Result<()> {
        let full = if url.contains("://") {
            url.to_string()
        } else {
            format!("http://{}", url)
        };
        let parsed = Url::parse(&full)?;
        let host = parsed
            .host_str()
            .ok_or_else(|| Error::config("host", format!("no host in {}", url)))?;
        self.host = host.to_string();
        self.ssl = parsed.scheme() == "https";
        if let Some(port) = parsed.port_or_known_default() {
            self.port = port;
        }
        if parsed.path() != "/" {
            self.prepath = parsed.path().to_string();
        }
        Ok(())
    }

    /// Set port
    pub fn port(mut self, port: u16) -> Self {
        self.port = port;
        self
    }

    /// Use https
    pub fn ssl(mut self, ssl: bool) -> Self {
        self.ssl = ssl;
        self
    }

    /// Set timeout
    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    /// Add default header
    pub fn header(mut self, name: impl Into<String>, value: impl Into<HeaderValue>) -> Self {
        self.headers.insert(name, value);
        self
    }

    /// Replace default substitutions
    pub fn values_for(mut self, values: Value) -> Self {
        self.values_for = values;
        self
    }

    pub fn debug(mut self, debug: bool) -> Self {
        self.debug = debug;
        self
    }

    pub fn log_headers(mut self, mode: LogHeaders) -> Self {
        self.log_headers = mode;
        self
    }

    /// Set proxy
    pub fn proxy(mut self, host: impl Into<String>, port: u16) -> Self {
        self.proxy = Some((host.into(), port));
        self
    }

    pub fn use_mocks(mut self, enabled: bool) -> Self {
        self.use_mocks = enabled;
        self
    }

    pub fn auto_redirect(mut self, enabled: bool) -> Self {
        self.auto_redirect = enabled;
        self
    }

    pub fn create_stats(mut self, enabled: bool) -> Self {
        self.create_stats = enabled;
        self
    }

    pub fn capture(mut self, enabled: bool) -> Self {
        self.capture = enabled;
        self
    }

    pub fn async_poll(mut self, poll: AsyncPollConfig) -> Self {
        self.async_poll = poll;
        self
    }

    /// Check required attributes. A URL given as host is expanded first.
    pub fn validate(mut self) -> Result<Self> {
        if self.host.starts_with("http:") || self.host.starts_with("https:") {
            let host = self.host.clone();
            self.apply_url(&host)?;
        }
        if self.host.trim().is_empty() {
            return Err(Error::config("host", "host is empty"));
        }
        if self.port == 0 {
            return Err(Error::config("port", "port must be greater than 0"));
        }
        if let Some((proxy_host, proxy_port)) = &self.proxy {
            if proxy_host.is_empty() || *proxy_port == 0 {
                return Err(Error::config("proxy", "proxy host and port are required"));
            }
        }
        if !self.values_for.is_map() {
            return Err(Error::config("values_for", "values_for must be a hash"));
        }
        if self.async_poll.wait_seconds > 0 && self.async_poll.header.is_empty() {
            return Err(Error::config(
                "async_header",
                "a poll header is required when async_wait_seconds is set",
            ));
        }
        Ok(self)
    }

    /// `http(s)://host` without port, as found in absolute locations
    pub fn origin(&self) -> String {
        format!("{}://{}", self.scheme(), self.host)
    }

    /// `http(s)://host:port`
    pub fn base_url(&self) -> String {
        format!("{}://{}:{}", self.scheme(), self.host, self.port)
    }

    /// `host:port`, the key used for stats and registry lookups
    pub fn server(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }

    fn scheme(&self) -> &'static str {
        if self.ssl {
            "https"
        } else {
            "http"
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_from_url() {
        let config = ConnectionConfig::from_url("https://example.com/api/v1").unwrap();
        assert_eq!(config.host, "example.com");
        assert_eq!(config.port, 443);
        assert!(config.ssl);
        assert_eq!(config.prepath, "/api/v1");
    }

    #[test]
    fn test_from_host_port_shorthand() {
        let config = ConnectionConfig::from_url("localhost:8322").unwrap();
        assert_eq!(config.host, "localhost");
        assert_eq!(config.port, 8322);
        assert!(!config.ssl);
        assert_eq!(config.prepath, "");
    }

    #[test]
    fn test_validate_expands_url_host() {
        let config = ConnectionConfig::new("https://reqres.in").validate().unwrap();
        assert_eq!(config.host, "reqres.in");
        assert_eq!(config.port, 443);
        assert!(config.ssl);
    }

    #[test]
    fn test_validate_rejects_missing_host() {
        let err = ConnectionConfig::default().validate().unwrap_err();
        assert!(matches!(err, Error::Config { ref attribute, .. } if attribute == "host"));
    }

    #[test]
    fn test_validate_rejects_zero_port() {
        let err = ConnectionConfig::new("example.com").port(0).validate().unwrap_err();
        assert!(matches!(err, Error::Config { ref attribute, .. } if attribute == "port"));
    }

    #[test]
    fn test_async_poll_enabled() {
        let mut poll = AsyncPollConfig::default();
        assert!(!poll.is_enabled());
        poll.wait_seconds = 5;
        poll.completed = "percentComplete".to_string();
        assert!(poll.is_enabled());
    }
}
