//! DNS resolver initialization.

use std::sync::Arc;
use std::time::Duration;

use hickory_resolver::config::{ResolverConfig, ResolverOpts};
use hickory_resolver::TokioAsyncResolver;
use log::debug;

use crate::config::DNS_TIMEOUT_SECS;

/// Creates the resolver used by the tracing transport.
///
/// Uses the system configuration (`/etc/resolv.conf`, hosts file) when it
/// can be read, and hickory's default upstreams otherwise. Timeouts are kept
/// short so a dead resolver shows up as a failed hop rather than a hang.
pub fn init_resolver() -> Arc<TokioAsyncResolver> {
    let (config, mut opts) = match hickory_resolver::system_conf::read_system_conf() {
        Ok(system) => system,
        Err(e) => {
            debug!("Falling back to default DNS configuration: {e}");
            (ResolverConfig::default(), ResolverOpts::default())
        }
    };
    opts.timeout = Duration::from_secs(DNS_TIMEOUT_SECS);
    opts.attempts = 2;
    // one lookup per request keeps the DNS phase honest
    opts.cache_size = 0;
    Arc::new(TokioAsyncResolver::tokio(config, opts))
}
