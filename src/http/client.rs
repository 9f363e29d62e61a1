// Copyright (c) 2026 Bountyy Oy. All rights reserved.
// This software is proprietary and confidential.

//! Stateful HTTP connection
//!
//! A [`Connection`] is bound to one server. Every call runs the same
//! pipeline: build the request, send it (or answer from a mock), process
//! the response, poll a 202 if configured, and follow redirects. The
//! connection keeps cookies, headers learned from responses and the
//! previous request/response for log de-duplication.
//!
//! Handles are cheap to clone. Calls on one connection are serialized by
//! an async mutex around its session state.

use std::fmt;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use async_trait::async_trait;
use bytes::Bytes;
use futures::future::BoxFuture;
use tokio::sync::Mutex;

use super::cookie::CookieJar;
use super::headers::{HeaderValue, Headers};
use super::poller::{AsyncPoller, PollSource};
use super::processor::{decode_body, CallTiming, ResponseProcessor, SessionParts};
use super::redirect::{is_absolute, split_absolute, RedirectDecision, RedirectResolver};
use super::request::{Method, PreparedRequest, Request, RequestBuilder};
use super::response::{RawResponse, Response};
use super::transport::{ReqwestTransport, Transport};
use super::COOKIE;
use crate::config::ConnectionConfig;
use crate::context::{ClientContext, RequestDefaults};
use crate::error::{Error, Result};
use crate::registry::next_id;

/// Mutable per-connection state
#[derive(Debug, Default)]
struct SessionState {
    cookies: CookieJar,
    headers: Headers,
    prev_request: Option<PreparedRequest>,
    prev_response: Option<Response>,
    num_redirects: u32,
}

pub struct ConnectionInner {
    id: u64,
    config: ConnectionConfig,
    transport: Arc<dyn Transport>,
    context: Arc<ClientContext>,
    state: Mutex<SessionState>,
    closed: AtomicBool,
}

impl Drop for ConnectionInner {
    fn drop(&mut self) {
        if !self.closed.load(Ordering::SeqCst) {
            self.context.registry().unregister(self.id);
        }
    }
}

/// Result of one exchange
enum Outcome {
    Done(Response),
    /// Path targets a server without a usable registered connection
    Unroutable(String),
}

/// Connection to one server
#[derive(Clone)]
pub struct Connection {
    inner: Arc<ConnectionInner>,
}

impl Connection {
    /// Connect with the reqwest transport and the shared context
    pub fn new(config: ConnectionConfig) -> Result<Self> {
        Self::with_context(config, ClientContext::shared())
    }

    /// Connect with the reqwest transport and an explicit context
    pub fn with_context(config: ConnectionConfig, context: Arc<ClientContext>) -> Result<Self> {
        let config = config.validate()?;
        let transport = Arc::new(ReqwestTransport::new(&config)?);
        Self::build(config, transport, context)
    }

    /// Connect over a caller-supplied transport
    pub fn with_transport(
        config: ConnectionConfig,
        transport: Arc<dyn Transport>,
        context: Arc<ClientContext>,
    ) -> Result<Self> {
        let config = config.validate()?;
        Self::build(config, transport, context)
    }

    fn build(
        config: ConnectionConfig,
        transport: Arc<dyn Transport>,
        context: Arc<ClientContext>,
    ) -> Result<Self> {
        let state = SessionState {
            headers: config.headers.clone(),
            ..Default::default()
        };
        let inner = Arc::new(ConnectionInner {
            id: next_id(),
            config,
            transport,
            context,
            state: Mutex::new(state),
            closed: AtomicBool::new(false),
        });
        inner
            .context
            .registry()
            .register(inner.id, &inner.config.host, inner.config.port, &inner);
        tracing::info!(server = %inner.config.base_url(), "Connection created");
        Ok(Self { inner })
    }

    pub(crate) fn from_inner(inner: Arc<ConnectionInner>) -> Self {
        Self { inner }
    }

    pub fn id(&self) -> u64 {
        self.inner.id
    }

    pub fn config(&self) -> &ConnectionConfig {
        &self.inner.config
    }

    pub fn context(&self) -> &Arc<ClientContext> {
        &self.inner.context
    }

    pub fn is_closed(&self) -> bool {
        self.inner.closed.load(Ordering::SeqCst)
    }

    /// Copy of the cookie jar
    pub async fn cookies(&self) -> CookieJar {
        self.inner.state.lock().await.cookies.clone()
    }

    /// Store a cookie as if a response had set it
    pub async fn set_cookie(&self, path: &str, name: &str, value: &str) {
        self.inner.state.lock().await.cookies.set(path, name, value);
    }

    /// Current connection headers, including values learned from responses
    pub async fn headers(&self) -> Headers {
        self.inner.state.lock().await.headers.clone()
    }

    pub async fn set_header(&self, name: impl Into<String>, value: impl Into<HeaderValue>) {
        self.inner.state.lock().await.headers.insert(name, value);
    }

    /// Redirects followed by the call in progress; 0 between calls
    pub async fn num_redirects(&self) -> u32 {
        self.inner.state.lock().await.num_redirects
    }

    pub async fn get(&self, request: impl Into<Request>) -> Response {
        self.call(Method::Get, request.into()).await
    }

    pub async fn head(&self, request: impl Into<Request>) -> Response {
        self.call(Method::Head, request.into()).await
    }

    pub async fn post(&self, request: impl Into<Request>) -> Response {
        self.call(Method::Post, request.into()).await
    }

    pub async fn put(&self, request: impl Into<Request>) -> Response {
        self.call(Method::Put, request.into()).await
    }

    pub async fn patch(&self, request: impl Into<Request>) -> Response {
        self.call(Method::Patch, request.into()).await
    }

    pub async fn delete(&self, request: impl Into<Request>) -> Response {
        self.call(Method::Delete, request.into()).await
    }

    /// Dispatch by method name; unknown methods and missing paths yield a
    /// fatal response
    pub async fn send_request(&self, method: &str, request: impl Into<Request>) -> Response {
        let request = request.into();
        let method = match method.parse::<Method>() {
            Ok(m) if request.path.as_deref().map(|p| !p.is_empty()).unwrap_or(false) => m,
            _ => {
                let message = "send_request: it needs to be supplied a Request that includes a method and path. Supported methods: GET, HEAD, POST, PUT, DELETE, PATCH";
                tracing::error!("{}", message);
                return Response::fatal(message);
            }
        };
        self.call(method, request).await
    }

    /// GET and save the body.
    ///
    /// `target` is a directory (the file takes the basename of the path)
    /// or a file path. A missing parent directory is logged and the body
    /// not written.
    pub async fn download(&self, request: impl Into<Request>, target: impl AsRef<Path>) -> Response {
        let request = request.into();
        let path = request.path.clone().unwrap_or_default();
        let response = self.get(request).await;
        if response.is_fatal() {
            return response;
        }

        let save = download_target(&path, target.as_ref());
        let parent_exists = save
            .parent()
            .map(|p| p.as_os_str().is_empty() || p.is_dir())
            .unwrap_or(true);
        if !parent_exists {
            tracing::error!(
                "The folder {} doesn't exist",
                save.parent().map(|p| p.display().to_string()).unwrap_or_default()
            );
            return response;
        }
        if let Err(e) = tokio::fs::write(&save, &response.raw_body).await {
            tracing::error!(error = %e, file = %save.display(), "Could not save the response data");
        }
        response
    }

    /// Unregister and mark closed. Later calls return a fatal response.
    pub fn close(&self) {
        if self.inner.closed.swap(true, Ordering::SeqCst) {
            tracing::warn!(
                server = %self.inner.config.base_url(),
                "It was not possible to close the HTTP connection, already closed"
            );
            return;
        }
        self.inner.context.registry().unregister(self.inner.id);
        tracing::info!(server = %self.inner.config.base_url(), "the HTTP connection was closed");
    }

    async fn call(&self, method: Method, request: Request) -> Response {
        if self.is_closed() {
            tracing::warn!(server = %self.inner.config.base_url(), "Call on a closed connection");
            return Response::fatal("the HTTP connection is closed");
        }
        let timing = CallTiming::start();
        let mut state = self.inner.state.lock().await;
        match self.run(&mut state, method, request, timing).await {
            Ok(response) => response,
            Err(e) => {
                tracing::error!(error = %e, %method, url = e.url().unwrap_or(""), "Request failed");
                Response::fatal(e.to_string())
            }
        }
    }

    /// One outer call: the exchange and the redirects it leads to. The
    /// redirect counter is back at 0 whichever way the call ends.
    fn run<'a>(
        &'a self,
        state: &'a mut SessionState,
        method: Method,
        request: Request,
        timing: CallTiming,
    ) -> BoxFuture<'a, Result<Response>> {
        Box::pin(async move {
            let result = self.follow_chain(state, method, request, timing).await;
            state.num_redirects = 0;
            result
        })
    }

    async fn follow_chain(
        &self,
        state: &mut SessionState,
        method: Method,
        request: Request,
        timing: CallTiming,
    ) -> Result<Response> {
        let mut response = match self.exchange(state, method, &request, timing).await? {
            Outcome::Done(response) => response,
            Outcome::Unroutable(server) => {
                return Err(Error::invalid_request(format!(
                    "there is no active connection for {}",
                    server
                )))
            }
        };

        let resolver = RedirectResolver::new(&self.inner.config);
        loop {
            match resolver.decide(&mut state.num_redirects, &response) {
                RedirectDecision::Done | RedirectDecision::LimitReached => return Ok(response),
                RedirectDecision::Follow(path) => {
                    let follow = Request::new(path);
                    match self
                        .exchange(state, Method::Get, &follow, CallTiming::start())
                        .await?
                    {
                        Outcome::Done(next) => response = next,
                        Outcome::Unroutable(_) => return Ok(response),
                    }
                }
            }
        }
    }

    /// Build, send and process a single request
    async fn exchange(
        &self,
        state: &mut SessionState,
        method: Method,
        request: &Request,
        timing: CallTiming,
    ) -> Result<Outcome> {
        let config = &self.inner.config;
        let context = &self.inner.context;
        let defaults = context.defaults();

        let mut prepared =
            RequestBuilder::new(config, &defaults, &state.headers, &state.cookies)
                .build(method, request)?;

        if let Some((host, port, path)) = self.foreign_target(&prepared.path) {
            return self.forward(state, &prepared, request, &host, port, path).await;
        }

        let text = prepared.narrative(state.prev_request.as_ref(), config.debug, config.log_headers);
        context.set_last_request(text.clone());
        tracing::info!("{}", text);
        state.prev_request = Some(prepared.clone());

        let timing = timing.network();
        let mock = request.mock_response.as_ref().filter(|_| config.use_mocks);
        let raw = match mock {
            Some(mock) => {
                tracing::warn!("Pay attention!!! This is a mock response:");
                mock.clone().into_raw()
            }
            None => self.send_with_retry(&mut prepared).await?,
        };

        let processor = ResponseProcessor::new(config, context);
        let mut response = processor.process(
            raw,
            mock.is_some(),
            &timing,
            &prepared,
            SessionParts {
                cookies: &mut state.cookies,
                headers: &mut state.headers,
            },
        );

        let narrative = processor.narrative(&response, state.prev_response.as_ref());
        context.set_last_response(narrative.clone());
        if config.capture {
            context.capture(format!("{}\n{}", text, narrative));
        }
        tracing::info!("{}", narrative);

        let poller = AsyncPoller::new(&config.async_poll);
        if let Some(location) = poller.location(&response) {
            let mut source = SessionPollSource {
                connection: self,
                state: &*state,
                defaults: &defaults,
            };
            response.async_result = Some(poller.poll(&mut source, &location).await);
        }

        state.prev_response = Some(response.clone());
        Ok(Outcome::Done(response))
    }

    /// Send with one reconnect on a closed connection and one header
    /// refresh on 401/408
    async fn send_with_retry(&self, prepared: &mut PreparedRequest) -> Result<RawResponse> {
        let raw = match self.send(prepared).await {
            Ok(raw) => raw,
            Err(e) if e.is_timeout() => {
                tracing::warn!(error = %e, "The connection seems to be closed in the host machine. Timeout.");
                return Err(e);
            }
            Err(e) if e.is_connection_closed() => {
                tracing::warn!(
                    error = %e,
                    "The connection seems to be closed in the host machine. Trying to reconnect"
                );
                self.inner.transport.reconnect().await?;
                prepared.regenerate_headers();
                self.send(prepared).await?
            }
            Err(e) => return Err(e),
        };

        if (raw.code == 401 || raw.code == 408) && prepared.has_computed_headers() {
            tracing::warn!("Not authorized. Trying to generate a new token.");
            prepared.regenerate_headers();
            return self.send(prepared).await;
        }
        Ok(raw)
    }

    async fn send(&self, prepared: &PreparedRequest) -> Result<RawResponse> {
        self.inner
            .transport
            .send(
                prepared.method,
                &prepared.path,
                &prepared.wire_headers,
                prepared.body.clone(),
            )
            .await
    }

    /// Server and path of an absolute path pointing elsewhere
    fn foreign_target(&self, path: &str) -> Option<(String, u16, String)> {
        if !is_absolute(path) {
            return None;
        }
        let (host, port, rel) = split_absolute(path)?;
        let config = &self.inner.config;
        if host.eq_ignore_ascii_case(&config.host) && port == config.port {
            None
        } else {
            Some((host, port, rel))
        }
    }

    /// Hand the call to the connection registered for `host:port`, after
    /// copying cookies and headers over
    async fn forward(
        &self,
        state: &mut SessionState,
        prepared: &PreparedRequest,
        request: &Request,
        host: &str,
        port: u16,
        path: String,
    ) -> Result<Outcome> {
        let server = format!("{}:{}", host, port);
        let target = match self.inner.context.registry().find(host, port) {
            Some(inner) => Connection::from_inner(inner),
            None => {
                tracing::warn!(
                    "It seems like the http connection cannot redirect to {} because there is no active connection for that server. You need to create previously one.",
                    server
                );
                return Ok(Outcome::Unroutable(server));
            }
        };
        if target.is_closed() {
            tracing::warn!(server = %server, "Connection for the redirect target is closed");
            return Ok(Outcome::Unroutable(server));
        }

        let mut target_state = match target.inner.state.try_lock() {
            Ok(guard) => guard,
            Err(_) => {
                tracing::warn!(server = %server, "Connection for the redirect target is busy");
                return Ok(Outcome::Unroutable(server));
            }
        };

        target_state.cookies.merge(&state.cookies);
        let mut headers = prepared.headers.clone();
        headers.remove(COOKIE);
        target_state.headers.merge(&headers);

        let mut forwarded = request.clone();
        forwarded.path = Some(path);
        tracing::info!(server = %server, "Request forwarded to another connection");
        let response = target
            .run(&mut target_state, prepared.method, forwarded, CallTiming::start())
            .await?;
        Ok(Outcome::Done(response))
    }
}

impl fmt::Debug for Connection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Connection")
            .field("id", &self.inner.id)
            .field("server", &self.inner.config.base_url())
            .field("closed", &self.is_closed())
            .finish()
    }
}

/// Polls through the connection's transport with its headers and cookies
struct SessionPollSource<'a> {
    connection: &'a Connection,
    state: &'a SessionState,
    defaults: &'a RequestDefaults,
}

#[async_trait]
impl<'a> PollSource for SessionPollSource<'a> {
    async fn fetch(&mut self, path: &str) -> Result<String> {
        let inner = &self.connection.inner;
        let prepared = RequestBuilder::new(
            &inner.config,
            self.defaults,
            &self.state.headers,
            &self.state.cookies,
        )
        .build(Method::Get, &Request::new(path))?;
        let raw = inner
            .transport
            .send(Method::Get, &prepared.path, &prepared.wire_headers, Bytes::new())
            .await?;
        Ok(decode_body(&raw))
    }
}

fn download_target(request_path: &str, target: &Path) -> PathBuf {
    let clean = request_path.split('?').next().unwrap_or(request_path);
    let basename = Path::new(clean)
        .file_name()
        .map(|n| n.to_os_string())
        .unwrap_or_default();
    let as_dir = target.is_dir() || target.to_string_lossy().ends_with('/');
    if as_dir {
        target.join(basename)
    } else {
        target.to_path_buf()
    }
}
