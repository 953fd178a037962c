//! Shared resource setup.
//!
//! Everything the binary needs before it can measure anything:
//! - Logger
//! - rustls crypto provider
//! - DNS resolver
//! - reqwest client for size mode
//! - Tracing transport for the timing engine
//! - Semaphore bounding resource fetches

mod client;
mod logger;
mod resolver;

use std::sync::Arc;

use rustls::crypto::{ring::default_provider, CryptoProvider};
use tokio::sync::Semaphore;

use crate::error_handling::InitializationError;
use crate::transport::{build_tls_config, TracingTransport};

pub use client::init_client;
pub use logger::init_logger_with;
pub use resolver::init_resolver;

/// Creates the semaphore bounding concurrent resource fetches.
///
/// A count of zero is raised to one so the collector can never deadlock.
pub fn init_semaphore(count: usize) -> Arc<Semaphore> {
    Arc::new(Semaphore::new(count.max(1)))
}

/// Installs ring as the process-wide rustls provider.
pub fn init_crypto_provider() {
    // already installed is fine
    let _ = CryptoProvider::install_default(default_provider());
}

/// Builds the transport used by the timing engine.
///
/// # Errors
///
/// Returns `InitializationError::TlsConfigError` if the TLS configuration
/// cannot be built.
pub fn init_transport() -> Result<Arc<TracingTransport>, InitializationError> {
    let resolver = init_resolver();
    let tls_config = build_tls_config()?;
    Ok(Arc::new(TracingTransport::new(resolver, tls_config)))
}
