// Copyright (c) 2026 Bountyy Oy. All rights reserved.
// This software is proprietary and confidential.

//! Error types for courier
//!
//! Errors never cross the public verb surface: `get`, `post` and friends
//! convert them into a [`Response`](crate::http::Response) carrying
//! `fatal_error`. They are still typed so the pipeline stages can decide
//! between retrying, aborting and degrading.

use thiserror::Error;

/// Result type alias for courier operations
pub type Result<T> = std::result::Result<T, Error>;

/// Main error type for courier
#[derive(Error, Debug)]
pub enum Error {
    /// Connection attribute missing or malformed at construction time
    #[error("It was not possible to create the http connection. Wrong {attribute}: {reason}")]
    Config { attribute: String, reason: String },

    /// Transport did not answer in time
    #[error("Operation timed out after {duration_ms}ms: {operation}")]
    Timeout {
        operation: String,
        duration_ms: u64,
        url: Option<String>,
    },

    /// Remote side closed the connection, a reconnect may help
    #[error("Connection closed: {0}")]
    ConnectionClosed(String),

    /// Any other transport failure
    #[error("Transport error: {0}")]
    Transport(String),

    /// Raw reqwest error that could not be classified
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// Request body does not match the declared content type
    #[error("Wrong data format: {0}")]
    DataShape(String),

    /// Request could not be dispatched (missing path, unknown verb)
    #[error("Invalid request: {0}")]
    InvalidRequest(String),

    /// Unexpected failure inside the request/response pipeline
    #[error("Pipeline error: {0}")]
    Pipeline(String),

    /// URL parsing failed
    #[error("Invalid URL: {0}")]
    Url(#[from] url::ParseError),

    /// I/O error
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON serialization error
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// YAML serialization error
    #[error("YAML error: {0}")]
    Yaml(#[from] serde_yaml::Error),
}

impl Error {
    /// Create a configuration error for an attribute
    pub fn config(attribute: impl Into<String>, reason: impl Into<String>) -> Self {
        Error::Config {
            attribute: attribute.into(),
            reason: reason.into(),
        }
    }

    /// Create a timeout error with URL
    pub fn timeout_with_url(
        operation: impl Into<String>,
        duration_ms: u64,
        url: impl Into<String>,
    ) -> Self {
        Error::Timeout {
            operation: operation.into(),
            duration_ms,
            url: Some(url.into()),
        }
    }

    /// Create a connection-closed error
    pub fn connection_closed<S: Into<String>>(msg: S) -> Self {
        Error::ConnectionClosed(msg.into())
    }

    /// Create a data shape error
    pub fn data_shape<S: Into<String>>(msg: S) -> Self {
        Error::DataShape(msg.into())
    }

    /// Create a pipeline error
    pub fn pipeline<S: Into<String>>(msg: S) -> Self {
        Error::Pipeline(msg.into())
    }

    /// Create an invalid request error
    pub fn invalid_request<S: Into<String>>(msg: S) -> Self {
        Error::InvalidRequest(msg.into())
    }

    /// Check if this is a timeout error
    pub fn is_timeout(&self) -> bool {
        match self {
            Error::Timeout { .. } => true,
            Error::Http(e) => e.is_timeout(),
            _ => false,
        }
    }

    /// Check if the connection was closed by the remote side
    pub fn is_connection_closed(&self) -> bool {
        match self {
            Error::ConnectionClosed(_) => true,
            Error::Http(e) => e.is_connect() || e.is_request(),
            _ => false,
        }
    }

    /// Check if this is recoverable with one reconnect and retry
    ///
    /// Timeouts are terminal.
    pub fn is_recoverable(&self) -> bool {
        !self.is_timeout() && self.is_connection_closed()
    }

    /// Get URL if available
    pub fn url(&self) -> Option<&str> {
        match self {
            Error::Timeout { url: Some(u), .. } => Some(u),
            _ => None,
        }
    }
}

impl From<String> for Error {
    fn from(s: String) -> Self {
        Error::Pipeline(s)
    }
}

impl From<&str> for Error {
    fn from(s: &str) -> Self {
        Error::Pipeline(s.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_timeout_error() {
        let err = Error::timeout_with_url("read", 5000, "https://example.com");

        assert!(err.is_timeout());
        assert!(!err.is_recoverable());
        assert_eq!(err.url(), Some("https://example.com"));
    }

    #[test]
    fn test_url_only_on_timeouts() {
        assert_eq!(Error::connection_closed("reset").url(), None);
        assert_eq!(Error::invalid_request("no path").url(), None);
    }

    #[test]
    fn test_connection_closed_is_recoverable() {
        let err = Error::connection_closed("reset by peer");
        assert!(err.is_connection_closed());
        assert!(err.is_recoverable());
    }

    #[test]
    fn test_config_error_names_attribute() {
        let err = Error::config("host", "empty");
        assert!(err.to_string().contains("Wrong host"));
    }
}
