// Copyright (c) 2026 Bountyy Oy. All rights reserved.
// This software is proprietary and confidential.

//! Redirect following
//!
//! The per-connection counter counts consecutive redirects of the current
//! outer call. It goes back to 0 when a call completes without a redirect
//! and when the limit is hit.

use url::Url;

use super::response::Response;
use crate::config::ConnectionConfig;

/// Redirects followed before a chain is considered a loop
pub const MAX_REDIRECTS: u32 = 30;

/// What to do with a processed response
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RedirectDecision {
    /// Not a redirect, or redirects are off
    Done,
    /// Issue a GET for this path; absolute when it targets another server
    Follow(String),
    /// Loop protection kicked in
    LimitReached,
}

/// Decides whether a response is followed
pub struct RedirectResolver<'a> {
    config: &'a ConnectionConfig,
}

impl<'a> RedirectResolver<'a> {
    pub fn new(config: &'a ConnectionConfig) -> Self {
        Self { config }
    }

    /// Inspect `response` and advance `counter`
    pub fn decide(&self, counter: &mut u32, response: &Response) -> RedirectDecision {
        let location = match response.header("location") {
            Some(l) if self.config.auto_redirect && response.is_redirect() => l,
            _ => {
                *counter = 0;
                return RedirectDecision::Done;
            }
        };

        if *counter <= MAX_REDIRECTS {
            *counter += 1;
            let path = self.strip_own_origin(location);
            tracing::info!(count = *counter, location = %path, "Redirecting");
            RedirectDecision::Follow(path)
        } else {
            tracing::error!(
                count = *counter,
                "Maximum number of redirections for a single request reached. Be sure everything is correct, it seems there is a non ending loop"
            );
            *counter = 0;
            RedirectDecision::LimitReached
        }
    }

    /// Make a location relative when it points at this connection's server
    pub fn strip_own_origin(&self, location: &str) -> String {
        let base = self.config.base_url();
        let origin = self.config.origin();
        for prefix in [base.as_str(), origin.as_str()] {
            if let Some(rest) = location.strip_prefix(prefix) {
                if rest.is_empty() {
                    return "/".to_string();
                }
                if rest.starts_with('/') || rest.starts_with('?') {
                    return rest.to_string();
                }
            }
        }
        location.to_string()
    }
}

/// True for `http://` and `https://` paths
pub fn is_absolute(path: &str) -> bool {
    path.starts_with("http:") || path.starts_with("https:")
}

/// Server and relative path of an absolute location
pub fn split_absolute(location: &str) -> Option<(String, u16, String)> {
    let url = Url::parse(location).ok()?;
    let host = url.host_str()?.to_string();
    let port = url.port_or_known_default()?;
    let mut path = url.path().to_string();
    if let Some(query) = url.query() {
        path.push('?');
        path.push_str(query);
    }
    Some((host, port, path))
}
