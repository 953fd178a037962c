//! Phase trace collection.
//!
//! A [`LifecycleObserver`] receives the connection lifecycle events of one
//! request attempt (DNS, TCP connect, TLS handshake, connection obtained,
//! first response byte) as the transport produces them. [`PhaseTracer`] is
//! the observer that turns those events into a [`TimingRecord`].
//!
//! Events may arrive from whatever task drives the connection, so the
//! tracer serializes every write through a mutex.

pub mod classify;

use std::io;
use std::net::{IpAddr, SocketAddr};
use std::sync::{Mutex, PoisonError};
use std::time::Duration;

use tokio::time::Instant;

pub use classify::{
    cipher_suite_name, classify_protocol, http_version_label, tls_version_name,
};

/// Negotiated TLS parameters, as reported by the handshake.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TlsDetails {
    /// IANA protocol version code (0x0304 for TLS 1.3)
    pub version: u16,
    /// IANA cipher suite code
    pub cipher_suite: u16,
    /// Whether the session was resumed
    pub resumed: bool,
    /// ALPN protocol selected by the server, if any
    pub alpn: Option<Vec<u8>>,
}

/// Connection handed to a request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConnInfo {
    /// The connection came from the idle pool
    pub reused: bool,
    /// Local socket address
    pub local_addr: Option<SocketAddr>,
    /// Peer socket address
    pub remote_addr: Option<SocketAddr>,
}

/// Receives connection lifecycle events for one request attempt.
///
/// Every method has an empty default so observers only implement what they
/// need. Transports call these synchronously as the connection progresses.
pub trait LifecycleObserver: Send + Sync {
    /// Name resolution is about to start.
    fn dns_start(&self, _host: &str) {}

    /// Name resolution finished (empty slice on failure).
    fn dns_done(&self, _addrs: &[IpAddr]) {}

    /// A TCP connect attempt to `addr` is starting.
    fn connect_start(&self, _addr: SocketAddr) {}

    /// The TCP connect attempt to `addr` finished.
    fn connect_done(&self, _addr: SocketAddr, _error: Option<&io::Error>) {}

    /// The TLS handshake is starting.
    fn tls_handshake_start(&self) {}

    /// The TLS handshake finished; `None` when it failed.
    fn tls_handshake_done(&self, _details: Option<&TlsDetails>) {}

    /// A connection (new or pooled) was obtained for the request.
    fn got_conn(&self, _info: &ConnInfo) {}

    /// The first byte of the response arrived.
    fn got_first_response_byte(&self) {}
}

/// Observer that ignores every event.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoopObserver;

impl LifecycleObserver for NoopObserver {}

/// Phase timings and connection facts for one request attempt.
///
/// Start instants are `None` until the matching event fires; durations stay
/// zero when their phase did not happen (pooled connection, plain HTTP, IP
/// literal host).
#[derive(Debug, Clone, Default, PartialEq)]
#[allow(missing_docs)]
pub struct TimingRecord {
    // DNS phase
    pub dns_lookup_start: Option<Instant>,
    pub dns_lookup_time: Duration,

    // TCP connect phase
    pub tcp_connect_start: Option<Instant>,
    pub tcp_conn_time: Duration,

    // TLS phase
    pub tls_handshake_start: Option<Instant>,
    pub tls_handshake_time: Duration,
    /// Human label, e.g. "TLS 1.3"
    pub tls_version: Option<String>,
    /// Human label, e.g. "ECDHE-RSA-AES128-GCM-SHA256"
    pub tls_cipher_suite: Option<String>,
    pub tls_resumption: bool,

    /// From the end of the TLS handshake to the first response byte
    pub waiting_for_server_time: Duration,

    pub first_byte_time: Option<Instant>,
    /// Time to first byte, measured from the TCP connect start of this hop
    pub ttfb: Duration,

    pub local_addr: Option<String>,
    /// Peer address; the bare IP from the connect target until the
    /// connection-obtained event reports the full socket address
    pub remote_addr: Option<String>,

    pub connection_reused: bool,

    /// "HTTP", "HTTPS", "HTTP/2" or "HTTP/3"
    pub protocol: String,
    /// Version string of the response, e.g. "HTTP/1.1"
    pub http_version: String,
}

#[derive(Debug, Default)]
struct TracerState {
    record: TimingRecord,
    waiting_since: Option<Instant>,
}

/// Observer that fills a [`TimingRecord`] from lifecycle events.
///
/// A done-event without its start-event is ignored.
#[derive(Debug, Default)]
pub struct PhaseTracer {
    state: Mutex<TracerState>,
}

impl PhaseTracer {
    /// Creates a tracer with an empty record.
    pub fn new() -> Self {
        Self::default()
    }

    /// Copy of the record as it stands.
    pub fn snapshot(&self) -> TimingRecord {
        self.with_state(|state| state.record.clone())
    }

    fn with_state<R>(&self, f: impl FnOnce(&mut TracerState) -> R) -> R {
        let mut guard = self.state.lock().unwrap_or_else(PoisonError::into_inner);
        f(&mut guard)
    }
}

impl LifecycleObserver for PhaseTracer {
    fn dns_start(&self, _host: &str) {
        self.with_state(|s| s.record.dns_lookup_start = Some(Instant::now()));
    }

    fn dns_done(&self, _addrs: &[IpAddr]) {
        self.with_state(|s| {
            if let Some(start) = s.record.dns_lookup_start {
                s.record.dns_lookup_time = start.elapsed();
            }
        });
    }

    fn connect_start(&self, _addr: SocketAddr) {
        self.with_state(|s| s.record.tcp_connect_start = Some(Instant::now()));
    }

    fn connect_done(&self, addr: SocketAddr, error: Option<&io::Error>) {
        if error.is_some() {
            return;
        }
        self.with_state(|s| {
            if let Some(start) = s.record.tcp_connect_start {
                s.record.tcp_conn_time = start.elapsed();
                // fallback until got_conn reports the real socket pair
                s.record.remote_addr = Some(addr.ip().to_string());
            }
        });
    }

    fn tls_handshake_start(&self) {
        self.with_state(|s| s.record.tls_handshake_start = Some(Instant::now()));
    }

    fn tls_handshake_done(&self, details: Option<&TlsDetails>) {
        self.with_state(|s| {
            if let Some(start) = s.record.tls_handshake_start {
                s.record.tls_handshake_time = start.elapsed();
                if let Some(details) = details {
                    s.record.tls_version = Some(tls_version_name(details.version));
                    s.record.tls_cipher_suite = Some(cipher_suite_name(details.cipher_suite));
                    s.record.tls_resumption = details.resumed;
                }
            }
            s.waiting_since = Some(Instant::now());
        });
    }

    fn got_conn(&self, info: &ConnInfo) {
        self.with_state(|s| {
            s.record.connection_reused = info.reused;
            if let Some(local) = info.local_addr {
                s.record.local_addr = Some(local.to_string());
            }
            if let Some(remote) = info.remote_addr {
                s.record.remote_addr = Some(remote.to_string());
            }
        });
    }

    fn got_first_response_byte(&self) {
        self.with_state(|s| {
            let now = Instant::now();
            s.record.first_byte_time = Some(now);
            if let Some(waiting_since) = s.waiting_since {
                s.record.waiting_for_server_time = now.duration_since(waiting_since);
            }
            if let Some(connect_start) = s.record.tcp_connect_start {
                s.record.ttfb = now.duration_since(connect_start);
            }
        });
    }
}
