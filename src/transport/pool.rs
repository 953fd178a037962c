//! Idle connection pool.
//!
//! A connection goes back to the pool only after its response body has been
//! read to the end, so anything checked out is ready for a new request.

use std::collections::HashMap;
use std::net::SocketAddr;
use std::pin::Pin;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::task::{Context, Poll};

use hyper::body::{Body, Bytes, Frame, Incoming, SizeHint};
use hyper::client::conn::{http1, http2};
use hyper::{Request, Response};
use http_body_util::Empty;
use log::debug;
use url::Url;

use super::io::FirstByteProbe;
use crate::trace::{LifecycleObserver, TlsDetails};

/// Request half of an HTTP/1.1 or HTTP/2 connection.
pub(crate) enum Sender {
    Http1(http1::SendRequest<Empty<Bytes>>),
    Http2(http2::SendRequest<Empty<Bytes>>),
}

impl Sender {
    pub(crate) fn is_http2(&self) -> bool {
        matches!(self, Sender::Http2(_))
    }

    pub(crate) fn is_closed(&self) -> bool {
        match self {
            Sender::Http1(sender) => sender.is_closed(),
            Sender::Http2(sender) => sender.is_closed(),
        }
    }

    pub(crate) async fn ready(&mut self) -> Result<(), hyper::Error> {
        match self {
            Sender::Http1(sender) => sender.ready().await,
            Sender::Http2(sender) => sender.ready().await,
        }
    }

    pub(crate) async fn send(
        &mut self,
        request: Request<Empty<Bytes>>,
    ) -> Result<Response<Incoming>, hyper::Error> {
        match self {
            Sender::Http1(sender) => sender.send_request(request).await,
            Sender::Http2(sender) => sender.send_request(request).await,
        }
    }
}

/// An established connection and what was learned while opening it.
pub(crate) struct PooledConnection {
    pub(crate) sender: Sender,
    pub(crate) local_addr: Option<SocketAddr>,
    pub(crate) remote_addr: Option<SocketAddr>,
    pub(crate) tls: Option<TlsDetails>,
    pub(crate) probe: FirstByteProbe,
}

impl PooledConnection {
    /// Sends `request` and reports the first response byte to `observer`.
    ///
    /// On HTTP/1.1 the first byte read after the request is the response.
    /// An HTTP/2 connection also carries SETTINGS, PING and WINDOW_UPDATE
    /// frames, so there the response headers arriving count as the first byte.
    pub(crate) async fn send_observed(
        &mut self,
        request: Request<Empty<Bytes>>,
        observer: &Arc<dyn LifecycleObserver>,
    ) -> Result<Response<Incoming>, hyper::Error> {
        if self.sender.is_http2() {
            let response = self.sender.send(request).await?;
            observer.got_first_response_byte();
            return Ok(response);
        }
        self.probe.arm(Arc::clone(observer));
        let sent = self.sender.send(request).await;
        self.probe.disarm();
        sent
    }
}

/// Connections are shared per scheme, host and port.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub(crate) struct PoolKey {
    pub(crate) scheme: String,
    pub(crate) host: String,
    pub(crate) port: u16,
}

impl PoolKey {
    pub(crate) fn from_url(url: &Url) -> Option<Self> {
        Some(Self {
            scheme: url.scheme().to_string(),
            host: url.host_str()?.to_ascii_lowercase(),
            port: url.port_or_known_default()?,
        })
    }
}

pub(crate) struct ConnectionPool {
    idle: Mutex<HashMap<PoolKey, Vec<PooledConnection>>>,
    max_idle_per_host: usize,
}

impl ConnectionPool {
    pub(crate) fn new(max_idle_per_host: usize) -> Self {
        Self {
            idle: Mutex::new(HashMap::new()),
            max_idle_per_host,
        }
    }

    fn idle(&self) -> MutexGuard<'_, HashMap<PoolKey, Vec<PooledConnection>>> {
        self.idle.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Takes the most recently returned live connection for `key`.
    pub(crate) fn checkout(&self, key: &PoolKey) -> Option<PooledConnection> {
        let mut idle = self.idle();
        let conns = idle.get_mut(key)?;
        while let Some(conn) = conns.pop() {
            if !conn.sender.is_closed() {
                return Some(conn);
            }
        }
        None
    }

    pub(crate) fn checkin(&self, key: PoolKey, conn: PooledConnection) {
        if conn.sender.is_closed() {
            return;
        }
        let mut idle = self.idle();
        let conns = idle.entry(key).or_default();
        conns.retain(|c| !c.sender.is_closed());
        if conns.len() < self.max_idle_per_host {
            conns.push(conn);
        }
    }

    /// Number of idle connections across all hosts.
    pub(crate) fn idle_count(&self) -> usize {
        self.idle().values().map(Vec::len).sum()
    }
}

struct Checkin {
    pool: Arc<ConnectionPool>,
    key: PoolKey,
    conn: PooledConnection,
}

/// Response body that hands its connection back once fully read.
///
/// Dropping it early closes nothing, the connection is simply not reused.
pub(crate) struct PooledBody {
    inner: Incoming,
    checkin: Option<Checkin>,
}

impl PooledBody {
    pub(crate) fn new(
        inner: Incoming,
        pool: Arc<ConnectionPool>,
        key: PoolKey,
        conn: PooledConnection,
    ) -> Self {
        Self {
            inner,
            checkin: Some(Checkin { pool, key, conn }),
        }
    }

    fn release(&mut self) {
        if let Some(Checkin { pool, key, conn }) = self.checkin.take() {
            debug!("Returning connection to {}:{} to the pool", key.host, key.port);
            pool.checkin(key, conn);
        }
    }
}

impl Body for PooledBody {
    type Data = Bytes;
    type Error = hyper::Error;

    fn poll_frame(
        self: Pin<&mut Self>,
        cx: &mut Context<'_>,
    ) -> Poll<Option<Result<Frame<Self::Data>, Self::Error>>> {
        let this = self.get_mut();
        let polled = Pin::new(&mut this.inner).poll_frame(cx);
        match &polled {
            Poll::Ready(None) => this.release(),
            Poll::Ready(Some(Ok(_))) if this.inner.is_end_stream() => this.release(),
            Poll::Ready(Some(Err(_))) => this.checkin = None,
            _ => {}
        }
        polled
    }

    fn is_end_stream(&self) -> bool {
        self.inner.is_end_stream()
    }

    fn size_hint(&self) -> SizeHint {
        self.inner.size_hint()
    }
}
