// Copyright (c) 2026 Bountyy Oy. All rights reserved.
// This software is proprietary and confidential.

//! Transport seam
//!
//! The pipeline only needs "send this method, path, headers and body and
//! give me what came back". [`ReqwestTransport`] is the production
//! implementation; tests plug in scripted transports.

use std::time::Duration;

use async_trait::async_trait;
use bytes::Bytes;
use parking_lot::RwLock;
use reqwest::redirect::Policy;
use reqwest::Client;

use super::redirect::is_absolute;
use super::request::Method;
use super::response::RawResponse;
use crate::config::ConnectionConfig;
use crate::error::{Error, Result};

/// Issues single HTTP exchanges
#[async_trait]
pub trait Transport: Send + Sync {
    /// Send one request. `path` is relative to the connection's server or
    /// an absolute URL.
    async fn send(
        &self,
        method: Method,
        path: &str,
        headers: &[(String, String)],
        body: Bytes,
    ) -> Result<RawResponse>;

    /// Drop and re-open the underlying connection
    async fn reconnect(&self) -> Result<()> {
        Ok(())
    }
}

/// reqwest-backed transport bound to one server
pub struct ReqwestTransport {
    client: RwLock<Client>,
    base_url: String,
    timeout: Option<Duration>,
    proxy: Option<String>,
}

impl ReqwestTransport {
    /// Create a transport for the server of `config`
    pub fn new(config: &ConnectionConfig) -> Result<Self> {
        let proxy = config
            .proxy
            .as_ref()
            .map(|(host, port)| format!("http://{}:{}", host, port));
        let client = build_client(config.timeout, proxy.as_deref())?;
        Ok(Self {
            client: RwLock::new(client),
            base_url: config.base_url(),
            timeout: config.timeout,
            proxy,
        })
    }

    fn url_for(&self, path: &str) -> String {
        if is_absolute(path) {
            path.to_string()
        } else if path.starts_with('/') {
            format!("{}{}", self.base_url, path)
        } else {
            format!("{}/{}", self.base_url, path)
        }
    }

    fn classify(&self, err: reqwest::Error, url: &str) -> Error {
        if err.is_timeout() {
            let ms = self.timeout.map(|t| t.as_millis() as u64).unwrap_or(0);
            Error::timeout_with_url("request", ms, url)
        } else if err.is_connect() || err.is_request() || err.is_body() {
            Error::connection_closed(err.to_string())
        } else {
            Error::Http(err)
        }
    }
}

fn build_client(timeout: Option<Duration>, proxy: Option<&str>) -> Result<Client> {
    let mut builder = Client::builder()
        .redirect(Policy::none())
        .danger_accept_invalid_certs(true)
        .cookie_store(false); // cookies are kept per connection

    if let Some(timeout) = timeout {
        builder = builder.timeout(timeout).connect_timeout(timeout);
    }

    if let Some(proxy_url) = proxy {
        builder = builder.proxy(
            reqwest::Proxy::all(proxy_url)
                .map_err(|e| Error::config("proxy", format!("Invalid proxy URL: {}", e)))?,
        );
    }

    Ok(builder.build()?)
}

#[async_trait]
impl Transport for ReqwestTransport {
    async fn send(
        &self,
        method: Method,
        path: &str,
        headers: &[(String, String)],
        body: Bytes,
    ) -> Result<RawResponse> {
        let url = self.url_for(path);
        let client = self.client.read().clone();

        let mut builder = client.request(method.into(), &url);
        for (name, value) in headers {
            builder = builder.header(name.as_str(), value.as_str());
        }
        if !body.is_empty() {
            builder = builder.body(body);
        }

        let response = builder.send().await.map_err(|e| self.classify(e, &url))?;

        let status = response.status();
        let headers = response
            .headers()
            .iter()
            .map(|(name, value)| {
                (
                    name.as_str().to_string(),
                    String::from_utf8_lossy(value.as_bytes()).into_owned(),
                )
            })
            .collect();
        let body = response.bytes().await.map_err(|e| self.classify(e, &url))?;

        Ok(RawResponse {
            code: status.as_u16(),
            message: status.canonical_reason().unwrap_or_default().to_string(),
            headers,
            body,
        })
    }

    async fn reconnect(&self) -> Result<()> {
        let client = build_client(self.timeout, self.proxy.as_deref())?;
        *self.client.write() = client;
        tracing::info!(server = %self.base_url, "Transport reconnected");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use wiremock::matchers::{body_string, header, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn transport_for(server: &MockServer, timeout: Option<Duration>) -> ReqwestTransport {
        let mut config = ConnectionConfig::from_url(&server.uri()).unwrap();
        config.timeout = timeout;
        ReqwestTransport::new(&config).unwrap()
    }

    #[tokio::test]
    async fn test_send_get() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/hello"))
            .and(header("x-test", "1"))
            .respond_with(
                ResponseTemplate::new(200)
                    .insert_header("Set-Cookie", "sid=1; path=/")
                    .set_body_string("hi"),
            )
            .mount(&server)
            .await;

        let transport = transport_for(&server, None);
        let raw = transport
            .send(
                Method::Get,
                "/hello",
                &[("X-Test".to_string(), "1".to_string())],
                Bytes::new(),
            )
            .await
            .unwrap();

        assert_eq!(raw.code, 200);
        assert_eq!(raw.message, "OK");
        assert_eq!(&raw.body[..], b"hi");
        assert!(raw.headers.iter().any(|(k, v)| k == "set-cookie" && v == "sid=1; path=/"));
    }

    #[tokio::test]
    async fn test_send_body_and_no_redirect_follow() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/users"))
            .and(body_string("{\"a\":1}"))
            .respond_with(ResponseTemplate::new(302).insert_header("Location", "/elsewhere"))
            .mount(&server)
            .await;

        let transport = transport_for(&server, None);
        let raw = transport
            .send(Method::Post, "/users", &[], Bytes::from_static(b"{\"a\":1}"))
            .await
            .unwrap();
        assert_eq!(raw.code, 302);
    }

    #[tokio::test]
    async fn test_timeout_is_classified() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(200).set_delay(Duration::from_millis(500)))
            .mount(&server)
            .await;

        let transport = transport_for(&server, Some(Duration::from_millis(50)));
        let err = transport
            .send(Method::Get, "/slow", &[], Bytes::new())
            .await
            .unwrap_err();
        assert!(err.is_timeout());
        assert!(!err.is_recoverable());
    }

    #[tokio::test]
    async fn test_refused_is_connection_closed() {
        let config = ConnectionConfig::new("127.0.0.1").port(1);
        let transport = ReqwestTransport::new(&config).unwrap();
        let err = transport
            .send(Method::Get, "/", &[], Bytes::new())
            .await
            .unwrap_err();
        assert!(err.is_connection_closed());
        transport.reconnect().await.unwrap();
    }
}
