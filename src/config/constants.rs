//! Configuration constants.
//!
//! Fixed protocol parameters shared by the timing engine, the tracing
//! transport and the resource collector.

use std::time::Duration;

/// User-Agent sent with every request.
pub const USER_AGENT: &str = "headview";

/// Maximum number of redirect hops to follow.
///
/// Hop depth starts at 0 for the initial request; a redirect that would take
/// the depth past this value fails the whole call.
pub const MAX_REDIRECT_HOPS: usize = 10;

/// Timeout for one hop of the timing engine (send plus body drain).
pub const HOP_TIMEOUT: Duration = Duration::from_secs(30);

/// Timeout for a single sub-resource fetch in size mode.
pub const RESOURCE_TIMEOUT: Duration = Duration::from_secs(10);

/// Timeout for the page request in size mode.
pub const PAGE_TIMEOUT: Duration = Duration::from_secs(30);

/// Default number of resource fetches allowed in flight at once.
pub const DEFAULT_CONCURRENCY: usize = 10;

// Network operation timeouts
/// DNS query timeout in seconds
pub const DNS_TIMEOUT_SECS: u64 = 5;

/// Idle connections kept per origin by the tracing transport.
pub const MAX_IDLE_CONNECTIONS_PER_HOST: usize = 4;

/// Scheme prepended to targets given without one.
pub const DEFAULT_SCHEME: &str = "https://";
