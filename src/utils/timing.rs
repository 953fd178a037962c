//! Timing report and aggregation.
//!
//! A [`TimingReport`] holds one [`TimingRecord`] per hop plus the headline
//! request durations taken from the first hop. The extract functions flatten
//! it into seconds for charting or export.

use std::time::Duration;

use strum::IntoEnumIterator;
use strum_macros::{Display, EnumIter};

use crate::trace::TimingRecord;

/// Timings of one logical request across its whole redirect chain.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct TimingReport {
    /// One record per hop, in hop order
    pub records: Vec<TimingRecord>,
    /// First hop: from send to response headers
    pub request_sending_time: Duration,
    /// First hop: total minus request sending
    pub server_processing_time: Duration,
    /// First hop: from hop start until its body was drained
    pub total_request_time: Duration,
    /// First hop: time spent draining the body
    pub content_transfer_time: Duration,
}

impl TimingReport {
    /// Number of hops recorded.
    pub fn hop_count(&self) -> usize {
        self.records.len()
    }

    /// Sets the headline durations unless a hop already set them.
    ///
    /// Returns `false` when the durations were already frozen.
    pub(crate) fn freeze_first_hop(
        &mut self,
        request_sending: Duration,
        elapsed: Duration,
        content_transfer: Duration,
    ) -> bool {
        if !self.records.is_empty() {
            return false;
        }
        self.request_sending_time = request_sending;
        self.server_processing_time = elapsed.saturating_sub(request_sending);
        self.total_request_time = elapsed;
        self.content_transfer_time = content_transfer;
        true
    }
}

/// Per-connection phases, in report order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Display, EnumIter)]
pub enum ConnectionPhase {
    /// Name resolution
    #[strum(to_string = "DNS Lookup")]
    Dns,
    /// TCP connect
    #[strum(to_string = "TCP Connection")]
    TcpConnect,
    /// TLS handshake
    #[strum(to_string = "TLS Handshake")]
    TlsHandshake,
    /// Time to first byte
    #[strum(to_string = "Time to First Byte")]
    TimeToFirstByte,
}

impl ConnectionPhase {
    /// Duration of this phase in `record`.
    pub fn duration(self, record: &TimingRecord) -> Duration {
        match self {
            ConnectionPhase::Dns => record.dns_lookup_time,
            ConnectionPhase::TcpConnect => record.tcp_conn_time,
            ConnectionPhase::TlsHandshake => record.tls_handshake_time,
            ConnectionPhase::TimeToFirstByte => record.ttfb,
        }
    }
}

/// Phases of the headline request, in report order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Display, EnumIter)]
pub enum RequestPhase {
    /// Send start to response headers
    #[strum(to_string = "Request Sending")]
    RequestSending,
    /// Waiting on the server
    #[strum(to_string = "Server Processing")]
    ServerProcessing,
    /// Body download
    #[strum(to_string = "Content Transfer")]
    ContentTransfer,
}

impl RequestPhase {
    /// Duration of this phase in `report`.
    pub fn duration(self, report: &TimingReport) -> Duration {
        match self {
            RequestPhase::RequestSending => report.request_sending_time,
            RequestPhase::ServerProcessing => report.server_processing_time,
            RequestPhase::ContentTransfer => report.content_transfer_time,
        }
    }
}

/// Flattens every hop into `[DNS, TCP, TLS, TTFB]` seconds, hop after hop.
pub fn extract_connection_durations(report: &TimingReport) -> Vec<f64> {
    report
        .records
        .iter()
        .flat_map(|record| ConnectionPhase::iter().map(move |phase| phase.duration(record)))
        .map(|d| d.as_secs_f64())
        .collect()
}

/// Headline durations as `[request sending, server processing, content transfer]` seconds.
pub fn extract_durations(report: &TimingReport) -> Vec<f64> {
    RequestPhase::iter()
        .map(|phase| phase.duration(report).as_secs_f64())
        .collect()
}
