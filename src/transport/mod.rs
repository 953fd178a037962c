//! The HTTP engine used by the timing engine.
//!
//! [`Transport`] is the seam between the redirect-following engine and the
//! wire: it performs exactly one exchange per call (or follows redirects
//! itself when its [`RedirectPolicy`] allows it) and reports connection
//! lifecycle events to the observer it is given.
//!
//! [`TracingTransport`] is the concrete implementation (hickory DNS, tokio
//! TCP, rustls TLS, hyper HTTP/1.1 and HTTP/2 with an idle pool). Tests plug
//! scripted transports in through the same trait.

mod client;
mod io;
mod pool;
mod tls;

use std::future::Future;
use std::sync::Arc;

use http_body_util::combinators::UnsyncBoxBody;
use http_body_util::BodyExt;
use hyper::body::Bytes;
use hyper::header::{HeaderMap, HeaderValue, LOCATION, USER_AGENT};
use hyper::{Method, StatusCode, Version};
use url::Url;

use crate::config::MAX_REDIRECT_HOPS;
use crate::error_handling::TransportError;
use crate::trace::{LifecycleObserver, TlsDetails};

pub use client::TracingTransport;
pub use tls::build_tls_config;

/// Response body as handed to callers.
pub type HopBody = UnsyncBoxBody<Bytes, TransportError>;

/// Whether a transport follows redirects on its own.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RedirectPolicy {
    /// Return every response as is.
    None,
    /// Follow up to this many redirects inside one `send`.
    Limited(usize),
}

impl Default for RedirectPolicy {
    fn default() -> Self {
        RedirectPolicy::Limited(MAX_REDIRECT_HOPS)
    }
}

/// One request to put on the wire.
#[derive(Debug, Clone)]
pub struct HopRequest {
    /// HTTP method
    pub method: Method,
    /// Absolute target URL
    pub url: Url,
    /// Extra request headers (Host is added by the transport)
    pub headers: HeaderMap,
}

impl HopRequest {
    /// Creates a request with no extra headers.
    pub fn new(method: Method, url: Url) -> Self {
        Self {
            method,
            url,
            headers: HeaderMap::new(),
        }
    }

    /// Sets the `User-Agent` header.
    pub fn with_user_agent(mut self, user_agent: &'static str) -> Self {
        self.headers
            .insert(USER_AGENT, HeaderValue::from_static(user_agent));
        self
    }
}

/// Response head plus a streaming body.
pub struct HopResponse {
    /// URL that produced this response
    pub url: Url,
    /// Status code
    pub status: StatusCode,
    /// Negotiated HTTP version
    pub version: Version,
    /// Response headers
    pub headers: HeaderMap,
    /// TLS parameters of the connection, `None` for plain HTTP
    pub tls: Option<TlsDetails>,
    /// Body, not yet read
    pub body: HopBody,
}

impl std::fmt::Debug for HopResponse {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HopResponse")
            .field("url", &self.url.as_str())
            .field("status", &self.status)
            .field("version", &self.version)
            .field("headers", &self.headers)
            .field("tls", &self.tls)
            .finish_non_exhaustive()
    }
}

/// An HTTP engine that reports connection lifecycle events.
pub trait Transport: Send + Sync {
    /// Performs the request, calling `observer` as the connection progresses.
    fn send(
        &self,
        request: HopRequest,
        observer: Arc<dyn LifecycleObserver>,
    ) -> impl Future<Output = Result<HopResponse, TransportError>> + Send;

    /// Current redirect policy.
    fn redirect_policy(&self) -> RedirectPolicy;

    /// Replaces the redirect policy.
    fn set_redirect_policy(&self, policy: RedirectPolicy);
}

/// Overrides a transport's redirect policy until dropped.
///
/// The previous policy is restored on drop, so early returns and `?` paths
/// leave the transport as they found it.
pub struct RedirectPolicyGuard<'a, T: Transport> {
    transport: &'a T,
    previous: RedirectPolicy,
}

impl<'a, T: Transport> RedirectPolicyGuard<'a, T> {
    /// Installs `policy` on `transport`.
    pub fn new(transport: &'a T, policy: RedirectPolicy) -> Self {
        let previous = transport.redirect_policy();
        transport.set_redirect_policy(policy);
        Self {
            transport,
            previous,
        }
    }
}

impl<T: Transport> Drop for RedirectPolicyGuard<'_, T> {
    fn drop(&mut self) {
        self.transport.set_redirect_policy(self.previous);
    }
}

/// Resolves the `Location` header of a redirect against the URL that
/// returned it.
pub fn redirect_location(base: &Url, headers: &HeaderMap) -> Result<Url, String> {
    let value = headers
        .get(LOCATION)
        .ok_or_else(|| "missing Location header".to_string())?;
    let location = value
        .to_str()
        .map_err(|e| format!("Location header is not valid text: {e}"))?;
    base.join(location)
        .map_err(|e| format!("cannot resolve Location '{location}': {e}"))
}

/// Reads a body to the end, returning the number of bytes seen.
///
/// Frames are counted and dropped, nothing is buffered.
pub async fn drain_body(body: &mut HopBody) -> Result<u64, TransportError> {
    let mut size = 0u64;
    while let Some(frame) = body.frame().await {
        if let Some(data) = frame?.data_ref() {
            size += data.len() as u64;
        }
    }
    Ok(size)
}
