// Copyright (c) 2026 Bountyy Oy. All rights reserved.
// This software is proprietary and confidential.

//! HTTP layer for courier
//!
//! Connections with cookie and header state, body substitution, response
//! normalization, 202 polling and redirect routing across connections.

mod auth;
mod client;
mod cookie;
mod headers;
mod poller;
mod processor;
mod redirect;
mod request;
mod response;
mod substitute;
mod transport;

pub use auth::basic_authentication;
pub use client::{Connection, ConnectionInner};
pub use cookie::{Cookie, CookieJar};
pub use headers::{find_header, HeaderEntry, HeaderValue, Headers, ResolvedHeaders};
pub use poller::{AsyncPoller, PollSource};
pub use processor::{CSRF_HEADER, REQUEST_ID_HEADER};
pub use redirect::MAX_REDIRECTS;
pub use request::{Method, PreparedRequest, Request, RequestBuilder};
pub use response::{AsyncResource, AsyncResult, MockResponse, RawResponse, Response};
pub use substitute::{get_value_xml_tag, set_value_xml_tag};
pub use transport::{ReqwestTransport, Transport};

/// Header names, lower-cased for lookups
pub const CONTENT_TYPE: &str = "content-type";
pub const ACCEPT_ENCODING: &str = "accept-encoding";
pub const COOKIE: &str = "cookie";
pub const SET_COOKIE: &str = "set-cookie";

pub const FORM_URLENCODED: &str = "application/x-www-form-urlencoded";
pub const JSON_CONTENT_TYPE: &str = "application/json";
