// Copyright (c) 2026 Bountyy Oy. All rights reserved.
// This software is proprietary and confidential.

//! # Courier - Stateful HTTP Connections for API Testing
//!
//! Connections bound to one server that remember what a browser would:
//! cookies per path, headers learned from responses, the CSRF token and
//! the last request id. Request bodies are templates; `values_for`
//! substitutes fields in JSON and XML bodies before they are sent.
//!
//! ## Features
//!
//! - Cookie jar per connection, scoped by path
//! - JSON and XML value substitution with per-row values for arrays
//! - Redirects followed on the same connection or routed to another one
//! - Polling of 202 Accepted operations
//! - Mock responses without touching the network
//! - Per call statistics dumped as JSON and YAML
//! - Errors delivered as responses carrying `fatal_error`
//!
//! ## Example
//!
//! ```rust,no_run
//! use courier::{Connection, ConnectionConfig, Request};
//! use serde_json::json;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let conn = Connection::new(ConnectionConfig::from_url("https://reqres.in")?)?;
//!
//!     let resp = conn
//!         .post(
//!             Request::new("/api/users")
//!                 .data(json!({"name": "morpheus", "job": "leader"}))
//!                 .values_for(json!({"job": "developer"})),
//!         )
//!         .await;
//!
//!     println!("{} {}", resp.status_code(), resp.data);
//!     conn.close();
//!     Ok(())
//! }
//! ```

pub mod config;
pub mod context;
pub mod error;
pub mod http;
pub mod registry;
pub mod stats;
pub mod value;

// Configuration
pub use config::{AsyncPollConfig, ConnectionConfig, LogHeaders, DEFAULT_PORT};

// Shared state
pub use context::{ClientContext, RequestDefaults};
pub use registry::{ConnectionRegistry, Registry};
pub use stats::{CallRecord, StatsAggregator, StatsTree};

// Errors
pub use error::{Error, Result};

// HTTP
pub use http::{
    basic_authentication, get_value_xml_tag, set_value_xml_tag, AsyncResource, AsyncResult,
    Connection, Cookie, CookieJar, HeaderValue, Headers, Method, MockResponse, RawResponse,
    Request, Response, ReqwestTransport, Transport,
};

// Values
pub use value::Value;

/// Courier version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
