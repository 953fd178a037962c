use std::net::{IpAddr, SocketAddr};
use std::sync::{Arc, Mutex, PoisonError};

use hickory_resolver::TokioAsyncResolver;
use http_body_util::{BodyExt, Empty};
use hyper::body::Bytes;
use hyper::client::conn::{http1, http2};
use hyper::header::HOST;
use hyper::{Request, Version};
use hyper_util::rt::{TokioExecutor, TokioIo};
use log::{debug, warn};
use rustls::ClientConfig;
use tokio::net::TcpStream;
use tokio_rustls::TlsConnector;
use url::{Host, Position, Url};

use super::io::{FirstByteProbe, Io, ObservedIo};
use super::pool::{ConnectionPool, PoolKey, PooledBody, PooledConnection, Sender};
use super::tls::{negotiated_details, server_name};
use super::{drain_body, redirect_location, HopRequest, HopResponse, RedirectPolicy, Transport};
use crate::config::MAX_IDLE_CONNECTIONS_PER_HOST;
use crate::error_handling::TransportError;
use crate::trace::{ConnInfo, LifecycleObserver, TlsDetails};

/// Transport that opens its own connections so every phase can be observed.
///
/// DNS goes through hickory (skipped for IP literals), TCP through tokio,
/// TLS through rustls, and HTTP/1.1 or HTTP/2 through hyper depending on
/// ALPN. Connections are kept in an idle pool between requests; a request
/// served from the pool reports `got_conn` with `reused` set and no DNS,
/// connect or handshake events.
pub struct TracingTransport {
    resolver: Arc<TokioAsyncResolver>,
    tls: TlsConnector,
    pool: Arc<ConnectionPool>,
    redirect_policy: Mutex<RedirectPolicy>,
}

impl TracingTransport {
    /// Creates a transport with an empty pool and the default redirect policy.
    pub fn new(resolver: Arc<TokioAsyncResolver>, tls_config: Arc<ClientConfig>) -> Self {
        Self {
            resolver,
            tls: TlsConnector::from(tls_config),
            pool: Arc::new(ConnectionPool::new(MAX_IDLE_CONNECTIONS_PER_HOST)),
            redirect_policy: Mutex::new(RedirectPolicy::default()),
        }
    }

    /// Number of connections currently parked in the idle pool.
    pub fn idle_connections(&self) -> usize {
        self.pool.idle_count()
    }

    /// Performs a single request/response exchange.
    async fn exchange(
        &self,
        request: &HopRequest,
        observer: &Arc<dyn LifecycleObserver>,
    ) -> Result<HopResponse, TransportError> {
        let key = PoolKey::from_url(&request.url).ok_or_else(|| TransportError::InvalidTarget {
            url: request.url.to_string(),
            reason: "URL has no host or port".to_string(),
        })?;

        let (mut conn, reused) = match self.checkout_ready(&key).await {
            Some(conn) => (conn, true),
            None => (self.connect(&request.url, &key, observer.as_ref()).await?, false),
        };
        observer.got_conn(&ConnInfo {
            reused,
            local_addr: conn.local_addr,
            remote_addr: conn.remote_addr,
        });

        let http_request = build_request(request, conn.sender.is_http2())?;
        let (parts, incoming) = conn.send_observed(http_request, observer).await?.into_parts();

        debug!(
            "{} {} -> {} ({:?}, reused: {})",
            request.method, request.url, parts.status, parts.version, reused
        );

        let tls = conn.tls.clone();
        let body = PooledBody::new(incoming, Arc::clone(&self.pool), key, conn)
            .map_err(TransportError::from)
            .boxed_unsync();

        Ok(HopResponse {
            url: request.url.clone(),
            status: parts.status,
            version: parts.version,
            headers: parts.headers,
            tls,
            body,
        })
    }

    async fn checkout_ready(&self, key: &PoolKey) -> Option<PooledConnection> {
        while let Some(mut conn) = self.pool.checkout(key) {
            match conn.sender.ready().await {
                Ok(()) => return Some(conn),
                Err(e) => debug!("Discarding pooled connection to {}: {e}", key.host),
            }
        }
        None
    }

    /// Opens a new connection: resolve, connect, handshake.
    async fn connect(
        &self,
        url: &Url,
        key: &PoolKey,
        observer: &dyn LifecycleObserver,
    ) -> Result<PooledConnection, TransportError> {
        let host = url.host().ok_or_else(|| TransportError::InvalidTarget {
            url: url.to_string(),
            reason: "URL has no host".to_string(),
        })?;
        let addrs = match &host {
            Host::Ipv4(ip) => vec![IpAddr::V4(*ip)],
            Host::Ipv6(ip) => vec![IpAddr::V6(*ip)],
            Host::Domain(domain) => self.resolve(domain, observer).await?,
        };

        let tcp = connect_any(&addrs, key.port, observer).await?;
        let local_addr = tcp.local_addr().ok();
        let remote_addr = tcp.peer_addr().ok();

        let (stream, tls): (Box<dyn Io>, Option<TlsDetails>) = match url.scheme() {
            "https" => {
                let (stream, details) = self.handshake(&host, tcp, observer).await?;
                (Box::new(stream), details)
            }
            "http" => (Box::new(tcp), None),
            other => {
                return Err(TransportError::InvalidTarget {
                    url: url.to_string(),
                    reason: format!("unsupported scheme '{other}'"),
                })
            }
        };

        let probe = FirstByteProbe::default();
        let io = TokioIo::new(ObservedIo::new(stream, probe.clone()));
        let negotiated_h2 = tls
            .as_ref()
            .and_then(|t| t.alpn.as_deref())
            .is_some_and(|alpn| alpn == b"h2");

        let sender = if negotiated_h2 {
            let (sender, connection) = http2::handshake(TokioExecutor::new(), io).await?;
            tokio::spawn(async move {
                if let Err(e) = connection.await {
                    debug!("HTTP/2 connection closed: {e}");
                }
            });
            Sender::Http2(sender)
        } else {
            let (sender, connection) = http1::handshake(io).await?;
            tokio::spawn(async move {
                if let Err(e) = connection.await {
                    debug!("HTTP/1.1 connection closed: {e}");
                }
            });
            Sender::Http1(sender)
        };

        Ok(PooledConnection {
            sender,
            local_addr,
            remote_addr,
            tls,
            probe,
        })
    }

    async fn resolve(
        &self,
        domain: &str,
        observer: &dyn LifecycleObserver,
    ) -> Result<Vec<IpAddr>, TransportError> {
        observer.dns_start(domain);
        match self.resolver.lookup_ip(domain).await {
            Ok(lookup) => {
                let addrs: Vec<IpAddr> = lookup.iter().collect();
                observer.dns_done(&addrs);
                if addrs.is_empty() {
                    return Err(TransportError::NoAddresses(domain.to_string()));
                }
                debug!("Resolved {domain} to {addrs:?}");
                Ok(addrs)
            }
            Err(e) => {
                observer.dns_done(&[]);
                Err(TransportError::Dns {
                    host: domain.to_string(),
                    source: e,
                })
            }
        }
    }

    async fn handshake(
        &self,
        host: &Host<&str>,
        tcp: TcpStream,
        observer: &dyn LifecycleObserver,
    ) -> Result<(tokio_rustls::client::TlsStream<TcpStream>, Option<TlsDetails>), TransportError>
    {
        let server_name = server_name(host).map_err(|e| TransportError::InvalidTarget {
            url: host.to_string(),
            reason: format!("not a valid TLS server name: {e}"),
        })?;

        observer.tls_handshake_start();
        match self.tls.connect(server_name, tcp).await {
            Ok(stream) => {
                let details = negotiated_details(stream.get_ref().1);
                observer.tls_handshake_done(details.as_ref());
                Ok((stream, details))
            }
            Err(e) => {
                observer.tls_handshake_done(None);
                Err(TransportError::Tls {
                    host: host.to_string(),
                    source: e,
                })
            }
        }
    }
}

impl Transport for TracingTransport {
    async fn send(
        &self,
        request: HopRequest,
        observer: Arc<dyn LifecycleObserver>,
    ) -> Result<HopResponse, TransportError> {
        let policy = self.redirect_policy();
        let mut request = request;
        let mut followed = 0usize;
        loop {
            let mut response = self.exchange(&request, &observer).await?;
            let RedirectPolicy::Limited(max) = policy else {
                return Ok(response);
            };
            if !response.status.is_redirection() {
                return Ok(response);
            }
            // a 3xx without a usable Location is returned as is
            let Ok(next) = redirect_location(&response.url, &response.headers) else {
                return Ok(response);
            };
            if followed >= max {
                return Err(TransportError::TooManyRedirects(followed));
            }
            followed += 1;
            drain_body(&mut response.body).await?;
            debug!("Following redirect {followed} to {next}");
            request.url = next;
        }
    }

    fn redirect_policy(&self) -> RedirectPolicy {
        *self
            .redirect_policy
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
    }

    fn set_redirect_policy(&self, policy: RedirectPolicy) {
        *self
            .redirect_policy
            .lock()
            .unwrap_or_else(PoisonError::into_inner) = policy;
    }
}

/// Tries each address in order, returning the first connected stream.
async fn connect_any(
    addrs: &[IpAddr],
    port: u16,
    observer: &dyn LifecycleObserver,
) -> Result<TcpStream, TransportError> {
    let mut last_error = None;
    for ip in addrs {
        let addr = SocketAddr::new(*ip, port);
        observer.connect_start(addr);
        match TcpStream::connect(addr).await {
            Ok(stream) => {
                observer.connect_done(addr, None);
                if let Err(e) = stream.set_nodelay(true) {
                    warn!("Failed to set TCP_NODELAY on {addr}: {e}");
                }
                return Ok(stream);
            }
            Err(e) => {
                observer.connect_done(addr, Some(&e));
                debug!("Connect to {addr} failed: {e}");
                last_error = Some((addr, e));
            }
        }
    }
    match last_error {
        Some((addr, source)) => Err(TransportError::Connect {
            addr: addr.to_string(),
            source,
        }),
        None => Err(TransportError::NoAddresses(format!("port {port}"))),
    }
}

/// HTTP/1.1 wants origin-form plus Host, HTTP/2 wants the absolute URI.
fn build_request(request: &HopRequest, http2: bool) -> Result<Request<Empty<Bytes>>, TransportError> {
    let mut builder = Request::builder().method(request.method.clone());
    builder = if http2 {
        builder
            .uri(&request.url[..Position::AfterQuery])
            .version(Version::HTTP_2)
    } else {
        builder
            .uri(&request.url[Position::BeforePath..Position::AfterQuery])
            .header(HOST, &request.url[Position::BeforeHost..Position::AfterPort])
    };
    for (name, value) in &request.headers {
        builder = builder.header(name, value);
    }
    Ok(builder.body(Empty::new())?)
}

#[cfg(test)]
mod tests {
    use super::*;
    use hyper::Method;

    fn request(url: &str) -> HopRequest {
        HopRequest::new(Method::HEAD, Url::parse(url).expect("valid URL in test"))
            .with_user_agent("headview")
    }

    #[test]
    fn test_build_request_http1_origin_form() {
        let req = build_request(&request("http://example.com:8080/a/b?c=d#frag"), false)
            .expect("request");
        assert_eq!(req.uri(), "/a/b?c=d");
        assert_eq!(req.method(), Method::HEAD);
        assert_eq!(
            req.headers().get(HOST).map(|v| v.as_bytes()),
            Some(&b"example.com:8080"[..])
        );
        assert!(req.headers().contains_key(hyper::header::USER_AGENT));
    }

    #[test]
    fn test_build_request_http2_absolute_form() {
        let req = build_request(&request("https://example.com/x?y=1#frag"), true)
            .expect("request");
        assert_eq!(req.uri(), "https://example.com/x?y=1");
        assert_eq!(req.version(), Version::HTTP_2);
        assert!(!req.headers().contains_key(HOST));
    }

    #[test]
    fn test_build_request_default_port_omitted_from_host() {
        let req = build_request(&request("https://example.com/"), false).expect("request");
        assert_eq!(
            req.headers().get(HOST).map(|v| v.as_bytes()),
            Some(&b"example.com"[..])
        );
    }

    #[tokio::test]
    async fn test_connect_any_reports_each_attempt() {
        use std::sync::Mutex as StdMutex;

        #[derive(Default)]
        struct Attempts(StdMutex<Vec<(SocketAddr, bool)>>);
        impl LifecycleObserver for Attempts {
            fn connect_done(&self, addr: SocketAddr, error: Option<&std::io::Error>) {
                self.0.lock().expect("lock").push((addr, error.is_none()));
            }
        }

        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.expect("bind");
        let port = listener.local_addr().expect("addr").port();
        let observer = Attempts::default();
        let stream = connect_any(&[IpAddr::from([127, 0, 0, 1])], port, &observer)
            .await
            .expect("connect");
        assert_eq!(stream.peer_addr().expect("peer").port(), port);
        let attempts = observer.0.lock().expect("lock").clone();
        assert_eq!(attempts.len(), 1);
        assert!(attempts[0].1);
    }

    #[tokio::test]
    async fn test_connect_any_with_no_addresses() {
        let err = connect_any(&[], 80, &crate::trace::NoopObserver)
            .await
            .expect_err("should fail");
        assert!(matches!(err, TransportError::NoAddresses(_)));
    }
}
