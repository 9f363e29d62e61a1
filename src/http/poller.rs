// Copyright (c) 2026 Bountyy Oy. All rights reserved.
// This software is proprietary and confidential.

//! Polling of 202 Accepted operations
//!
//! The location announced by the 202 response is fetched once per second
//! until the completion field reads 100 or the wait budget is used up.

use std::time::Duration;

use async_trait::async_trait;
use serde_json::Value as JsonValue;

use super::response::{AsyncResource, AsyncResult, Response};
use crate::config::AsyncPollConfig;
use crate::error::Result;

/// Status code that triggers polling
pub const ACCEPTED: u16 = 202;

/// Interval between two polls
pub const POLL_INTERVAL: Duration = Duration::from_secs(1);

/// Something able to GET a path and hand back the decoded body
#[async_trait]
pub trait PollSource: Send {
    async fn fetch(&mut self, path: &str) -> Result<String>;
}

/// Drives the poll loop for one response
pub struct AsyncPoller<'a> {
    config: &'a AsyncPollConfig,
}

impl<'a> AsyncPoller<'a> {
    pub fn new(config: &'a AsyncPollConfig) -> Self {
        Self { config }
    }

    /// Poll location of `response`, if polling applies to it
    pub fn location(&self, response: &Response) -> Option<String> {
        if !self.config.is_enabled() || response.code != Some(ACCEPTED) {
            return None;
        }
        response
            .header(&self.config.header)
            .filter(|l| !l.is_empty())
            .map(String::from)
    }

    /// Poll until completion or budget exhaustion.
    ///
    /// Failures end the loop early and are logged; whatever was gathered
    /// up to that point is returned.
    pub async fn poll<S: PollSource + ?Sized>(&self, source: &mut S, location: &str) -> AsyncResult {
        let wait = self.config.wait_seconds;
        let mut elapsed = 0u64;
        let mut last_body = String::new();

        while elapsed <= wait {
            match source.fetch(location).await {
                Ok(body) => last_body = body,
                Err(e) => {
                    tracing::warn!(error = %e, location, "Async poll failed");
                    break;
                }
            }
            let completed = json_field(&last_body, &self.config.completed)
                .as_ref()
                .and_then(as_integer);
            if completed == Some(100) || elapsed >= wait {
                break;
            }
            elapsed += 1;
            tokio::time::sleep(POLL_INTERVAL).await;
        }

        let status = json_field(&last_body, &self.config.status)
            .map(|v| match v {
                JsonValue::String(s) => s,
                other => other.to_string(),
            })
            .unwrap_or_default();

        let mut result = AsyncResult {
            seconds_waited: elapsed,
            status,
            data: last_body,
            resource: None,
        };

        if !self.config.resource.is_empty() {
            let link = json_field(&result.data, &self.config.resource)
                .and_then(|v| v.as_str().map(String::from))
                .unwrap_or_default();
            if link.is_empty() {
                result.resource = Some(AsyncResource::default());
            } else {
                match source.fetch(&link).await {
                    Ok(data) => result.resource = Some(AsyncResource { data }),
                    Err(e) => tracing::warn!(error = %e, link, "Async resource fetch failed"),
                }
            }
        }

        tracing::info!(
            seconds = result.seconds_waited,
            status = %result.status,
            "Async operation finished"
        );
        result
    }
}

fn json_field(body: &str, field: &str) -> Option<JsonValue> {
    if field.is_empty() {
        return None;
    }
    let parsed: JsonValue = serde_json::from_str(body).ok()?;
    parsed.get(field).cloned()
}

fn as_integer(value: &JsonValue) -> Option<i64> {
    match value {
        JsonValue::Number(n) => n.as_i64().or_else(|| n.as_f64().map(|f| f as i64)),
        JsonValue::String(s) => s.trim().parse().ok(),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::Error;
    use std::collections::VecDeque;

    struct Scripted {
        bodies: VecDeque<Result<String>>,
        fetched: Vec<String>,
    }

    impl Scripted {
        fn new(bodies: Vec<Result<String>>) -> Self {
            Self {
                bodies: bodies.into(),
                fetched: Vec::new(),
            }
        }
    }

    #[async_trait]
    impl PollSource for Scripted {
        async fn fetch(&mut self, path: &str) -> Result<String> {
            self.fetched.push(path.to_string());
            self.bodies
                .pop_front()
                .unwrap_or_else(|| Err(Error::pipeline("script exhausted")))
        }
    }

    fn config(wait: u64) -> AsyncPollConfig {
        AsyncPollConfig {
            wait_seconds: wait,
            header: "location".to_string(),
            completed: "percComplete".to_string(),
            resource: String::new(),
            status: "status".to_string(),
        }
    }

    fn progress(p: u32) -> Result<String> {
        Ok(format!(r#"{{"percComplete": {}, "status": "running"}}"#, p))
    }

    #[tokio::test(start_paused = true)]
    async fn test_completes_early() {
        let cfg = config(10);
        let mut source = Scripted::new(vec![
            progress(10),
            progress(50),
            Ok(r#"{"percComplete": 100, "status": "done"}"#.to_string()),
        ]);

        let result = AsyncPoller::new(&cfg).poll(&mut source, "/op/1").await;
        assert_eq!(result.seconds_waited, 2);
        assert_eq!(result.status, "done");
        assert_eq!(source.fetched.len(), 3);
    }

    #[tokio::test(start_paused = true)]
    async fn test_budget_bounds_seconds_waited() {
        let cfg = config(3);
        let mut source = Scripted::new((0..10).map(|_| progress(5)).collect());

        let result = AsyncPoller::new(&cfg).poll(&mut source, "/op/1").await;
        assert_eq!(result.seconds_waited, 3);
        assert!(result.seconds_waited <= cfg.wait_seconds);
        assert_eq!(result.status, "running");
    }

    #[tokio::test(start_paused = true)]
    async fn test_resource_fetched() {
        let mut cfg = config(5);
        cfg.resource = "resourceLocation".to_string();
        let mut source = Scripted::new(vec![
            Ok(r#"{"percComplete": "100", "resourceLocation": "/customers/7"}"#.to_string()),
            Ok(r#"{"id": 7}"#.to_string()),
        ]);

        let result = AsyncPoller::new(&cfg).poll(&mut source, "/op/1").await;
        assert_eq!(result.seconds_waited, 0);
        assert_eq!(result.status, "");
        assert_eq!(result.resource.unwrap().data, r#"{"id": 7}"#);
        assert_eq!(source.fetched, vec!["/op/1", "/customers/7"]);
    }

    #[tokio::test(start_paused = true)]
    async fn test_failure_keeps_partial_result() {
        let cfg = config(5);
        let mut source = Scripted::new(vec![progress(20), Err(Error::connection_closed("reset"))]);

        let result = AsyncPoller::new(&cfg).poll(&mut source, "/op/1").await;
        assert_eq!(result.seconds_waited, 1);
        assert!(result.data.contains("20"));
    }

    #[test]
    fn test_location_requires_202_and_config() {
        let cfg = config(5);
        let poller = AsyncPoller::new(&cfg);
        let mut resp = Response {
            code: Some(202),
            ..Default::default()
        };
        assert!(poller.location(&resp).is_none());

        resp.header.insert("location".to_string(), "/op/1".to_string());
        assert_eq!(poller.location(&resp).as_deref(), Some("/op/1"));

        resp.code = Some(200);
        assert!(poller.location(&resp).is_none());

        let disabled = config(0);
        resp.code = Some(202);
        assert!(AsyncPoller::new(&disabled).location(&resp).is_none());
    }
}
