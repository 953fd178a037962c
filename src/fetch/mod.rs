//! Redirect-following timing engine.
//!
//! [`perform_get_request`] sends a HEAD request, times it, and follows
//! redirects one hop at a time so each hop gets its own [`TimingRecord`].
//! Hops run strictly in order: the next URL depends on the previous response.

use std::collections::HashSet;
use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use hyper::header::HeaderMap;
use hyper::{Method, StatusCode, Version};
use log::{debug, info};
use tokio::time::Instant;
use url::Url;

use crate::config::{HOP_TIMEOUT, MAX_REDIRECT_HOPS, USER_AGENT};
use crate::error_handling::{TraceError, TransportError};
use crate::trace::{
    cipher_suite_name, classify_protocol, http_version_label, tls_version_name, PhaseTracer,
    TimingRecord,
};
use crate::transport::{
    drain_body, redirect_location, HopRequest, RedirectPolicy, RedirectPolicyGuard, Transport,
};
use crate::utils::TimingReport;

/// What one hop returned.
#[derive(Debug, Clone)]
pub struct ResponseInfo {
    /// URL requested by this hop
    pub url: Url,
    /// Response status
    pub status: StatusCode,
    /// Negotiated HTTP version
    pub version: Version,
    /// Response headers
    pub headers: HeaderMap,
    /// Body size in bytes as received
    pub content_size: u64,
    /// From send to response headers
    pub request_sending_time: Duration,
    /// Wall-clock time the hop started
    pub start_time: DateTime<Utc>,
}

impl ResponseInfo {
    /// Whether this hop answered with a redirect.
    pub fn is_redirect(&self) -> bool {
        self.status.is_redirection()
    }
}

/// Measurements of a single hop, before they are committed to the report.
struct Hop {
    info: ResponseInfo,
    record: TimingRecord,
    elapsed: Duration,
    content_transfer: Duration,
}

/// Times `url` and every redirect after it.
///
/// Returns one [`TimingRecord`] and one [`ResponseInfo`] per hop, in hop
/// order. The report's headline durations describe the first hop only.
///
/// The transport's redirect policy is set to [`RedirectPolicy::None`] for the
/// duration of the call and restored afterwards, whether the call succeeds or
/// not.
///
/// # Errors
///
/// Any hop failing, a URL repeating, more than
/// [`MAX_REDIRECT_HOPS`](crate::config::MAX_REDIRECT_HOPS) redirects, or a
/// redirect without a usable `Location` aborts the whole call.
pub async fn perform_get_request<T: Transport>(
    transport: &T,
    url: &str,
) -> Result<(TimingReport, Vec<ResponseInfo>), TraceError> {
    let mut current = Url::parse(url).map_err(|e| TraceError::RequestCreationFailed {
        url: url.to_string(),
        reason: e.to_string(),
    })?;

    let _policy = RedirectPolicyGuard::new(transport, RedirectPolicy::None);

    let mut report = TimingReport::default();
    let mut responses = Vec::new();
    let mut visited: HashSet<Url> = HashSet::new();
    let mut depth = 0usize;

    loop {
        if visited.contains(&current) {
            return Err(TraceError::RedirectLoop {
                url: current.to_string(),
            });
        }
        if depth > MAX_REDIRECT_HOPS {
            return Err(TraceError::RedirectLimitExceeded {
                max: MAX_REDIRECT_HOPS,
                url: current.to_string(),
            });
        }
        visited.insert(current.clone());

        let hop = match tokio::time::timeout(HOP_TIMEOUT, perform_hop(transport, &current)).await
        {
            Ok(result) => result,
            Err(_) => Err(TransportError::Timeout(HOP_TIMEOUT)),
        }
        .map_err(|source| TraceError::RequestFailed {
            url: current.to_string(),
            depth,
            source,
        })?;

        debug!(
            "Hop {depth}: {} {} ({} bytes, reused: {})",
            hop.info.status, current, hop.info.content_size, hop.record.connection_reused
        );

        report.freeze_first_hop(
            hop.info.request_sending_time,
            hop.elapsed,
            hop.content_transfer,
        );
        report.records.push(hop.record);

        let next = if hop.info.is_redirect() {
            Some(
                redirect_location(&current, &hop.info.headers).map_err(|reason| {
                    TraceError::RedirectLocationInvalid {
                        url: current.to_string(),
                        depth,
                        reason,
                    }
                })?,
            )
        } else {
            None
        };
        responses.push(hop.info);

        match next {
            Some(next) => {
                current = next;
                depth += 1;
            }
            None => break,
        }
    }

    info!(
        "Timed {} in {} hop(s), total {:?}",
        url,
        report.hop_count(),
        report.total_request_time
    );
    Ok((report, responses))
}

/// Sends one HEAD request with a fresh tracer and drains the body.
async fn perform_hop<T: Transport>(transport: &T, url: &Url) -> Result<Hop, TransportError> {
    let tracer = Arc::new(PhaseTracer::new());
    let request = HopRequest::new(Method::HEAD, url.clone()).with_user_agent(USER_AGENT);

    let start_time = Utc::now();
    let hop_start = Instant::now();
    let mut response = transport.send(request, tracer.clone()).await?;
    let request_sending_time = hop_start.elapsed();

    let transfer_start = Instant::now();
    let content_size = drain_body(&mut response.body).await?;
    let content_transfer = transfer_start.elapsed();
    let elapsed = hop_start.elapsed();

    let mut record = tracer.snapshot();
    record.protocol = classify_protocol(response.version, response.tls.is_some()).to_string();
    record.http_version = http_version_label(response.version);
    // pooled connections skip the handshake, the labels come from the response
    if let (None, Some(tls)) = (&record.tls_version, &response.tls) {
        record.tls_version = Some(tls_version_name(tls.version));
        record.tls_cipher_suite = Some(cipher_suite_name(tls.cipher_suite));
        record.tls_resumption = tls.resumed;
    }

    Ok(Hop {
        info: ResponseInfo {
            url: url.clone(),
            status: response.status,
            version: response.version,
            headers: response.headers,
            content_size,
            request_sending_time,
            start_time,
        },
        record,
        elapsed,
        content_transfer,
    })
}
