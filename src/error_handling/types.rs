//! Error type definitions.
//!
//! This module defines every error produced by the library, plus the
//! [`ErrorKind`] categorization used for reporting.

use std::time::Duration;

use log::SetLoggerError;
use reqwest::Error as ReqwestError;
use strum_macros::EnumIter as EnumIterMacro;
use thiserror::Error;

/// Error types for initialization failures.
#[derive(Error, Debug)]
#[allow(clippy::enum_variant_names)] // All variants end with "Error" by convention
pub enum InitializationError {
    /// Error initializing the logger.
    #[error("Logger initialization error: {0}")]
    LoggerError(#[from] SetLoggerError),

    /// Error initializing the HTTP client.
    #[error("HTTP client initialization error: {0}")]
    HttpClientError(#[from] ReqwestError),

    /// Error initializing the TLS configuration.
    #[error("TLS configuration error: {0}")]
    TlsConfigError(#[from] rustls::Error),
}

/// Failures raised by a [`Transport`](crate::transport::Transport) while
/// carrying out one exchange.
#[derive(Error, Debug)]
pub enum TransportError {
    /// The URL cannot be sent (no host, unsupported scheme, ...).
    #[error("invalid request target {url}: {reason}")]
    InvalidTarget {
        /// Offending URL
        url: String,
        /// Why it was rejected
        reason: String,
    },

    /// DNS resolution failed.
    #[error("DNS lookup for {host} failed: {source}")]
    Dns {
        /// Host being resolved
        host: String,
        /// Resolver error
        #[source]
        source: hickory_resolver::error::ResolveError,
    },

    /// DNS resolution returned nothing usable.
    #[error("no addresses found for {0}")]
    NoAddresses(String),

    /// Every TCP connect attempt failed; carries the last error.
    #[error("TCP connect to {addr} failed: {source}")]
    Connect {
        /// Last address tried
        addr: String,
        /// Socket error
        #[source]
        source: std::io::Error,
    },

    /// TLS handshake failed.
    #[error("TLS handshake with {host} failed: {source}")]
    Tls {
        /// Server name used for the handshake
        host: String,
        /// Handshake error
        #[source]
        source: std::io::Error,
    },

    /// HTTP protocol failure on an established connection.
    #[error("HTTP exchange failed: {0}")]
    Http(#[from] hyper::Error),

    /// The request could not be assembled.
    #[error("could not build request: {0}")]
    Request(#[from] http::Error),

    /// Transport-level redirect following gave up.
    #[error("stopped after {0} redirects")]
    TooManyRedirects(usize),

    /// The exchange did not complete in time.
    #[error("timed out after {0:?}")]
    Timeout(Duration),
}

/// Fatal errors of the redirect-following timing engine.
#[derive(Error, Debug)]
pub enum TraceError {
    /// Malformed URL or request; nothing was sent.
    #[error("error creating request for {url}: {reason}")]
    RequestCreationFailed {
        /// URL as given
        url: String,
        /// Why the request could not be built
        reason: String,
    },

    /// Transport-level failure for one hop.
    #[error("error sending request to {url} (hop {depth}): {source}")]
    RequestFailed {
        /// URL of the failing hop
        url: String,
        /// Hop depth, 0 for the initial request
        depth: usize,
        /// Underlying transport failure
        #[source]
        source: TransportError,
    },

    /// A URL came back around in the redirect chain.
    #[error("redirect loop detected at URL: {url}")]
    RedirectLoop {
        /// URL seen twice
        url: String,
    },

    /// The chain is longer than the hop limit.
    #[error("max redirect depth reached ({max}) before requesting {url}")]
    RedirectLimitExceeded {
        /// Hop limit
        max: usize,
        /// URL that would have been requested next
        url: String,
    },

    /// A 3xx response carried a missing or malformed `Location`.
    #[error("error reading redirect location from {url} (hop {depth}): {reason}")]
    RedirectLocationInvalid {
        /// URL whose response carried the bad header
        url: String,
        /// Hop depth of that response
        depth: usize,
        /// What was wrong with the header
        reason: String,
    },
}

/// Fatal errors of size mode (the page itself could not be measured).
#[derive(Error, Debug)]
pub enum SizeError {
    /// The page URL is malformed.
    #[error("error creating request for size calculation of {url}: {reason}")]
    RequestCreationFailed {
        /// URL as given
        url: String,
        /// Parse failure
        reason: String,
    },

    /// The page request failed.
    #[error("error sending request for size calculation of {url}: {source}")]
    RequestFailed {
        /// Page URL
        url: String,
        /// Client failure
        #[source]
        source: ReqwestError,
    },

    /// The page body could not be read.
    #[error("error reading response body of {url}: {source}")]
    BodyReadFailed {
        /// Page URL
        url: String,
        /// Client failure
        #[source]
        source: ReqwestError,
    },
}

/// Non-fatal failure of one sub-resource fetch in size mode.
#[derive(Error, Debug)]
pub enum ResourceFetchError {
    /// The reference could not be resolved against the page URL.
    #[error("error parsing resource URL {link}: {source}")]
    InvalidUrl {
        /// Reference as written in the document
        link: String,
        /// Parse failure
        #[source]
        source: url::ParseError,
    },

    /// The request failed (connect, TLS, timeout, ...).
    #[error("error fetching resource {url}: {source}")]
    Fetch {
        /// Absolute resource URL
        url: String,
        /// Client failure
        #[source]
        source: ReqwestError,
    },

    /// The body stopped mid-transfer.
    #[error("error reading resource body {url}: {source}")]
    Body {
        /// Absolute resource URL
        url: String,
        /// Client failure
        #[source]
        source: ReqwestError,
    },

    /// The fetch task itself died.
    #[error("fetch task for {url} did not complete: {reason}")]
    TaskFailed {
        /// Absolute resource URL
        url: String,
        /// Join failure description
        reason: String,
    },
}

/// Error categories surfaced to the user.
///
/// Every library error maps onto exactly one kind; only
/// [`ErrorKind::ResourceFetchFailed`] is non-fatal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, EnumIterMacro)]
pub enum ErrorKind {
    /// Malformed URL or method
    RequestCreationFailed,
    /// DNS, connect, TLS, HTTP or timeout failure
    RequestFailed,
    /// A URL reappeared in the redirect chain
    RedirectLoop,
    /// More redirects than the hop limit
    RedirectLimitExceeded,
    /// Unusable `Location` header
    RedirectLocationInvalid,
    /// One sub-resource could not be measured
    ResourceFetchFailed,
}

impl std::fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl ErrorKind {
    /// Returns a human-readable label for the kind.
    pub fn as_str(&self) -> &'static str {
        match self {
            ErrorKind::RequestCreationFailed => "Request creation failed",
            ErrorKind::RequestFailed => "Request failed",
            ErrorKind::RedirectLoop => "Redirect loop",
            ErrorKind::RedirectLimitExceeded => "Redirect limit exceeded",
            ErrorKind::RedirectLocationInvalid => "Invalid redirect location",
            ErrorKind::ResourceFetchFailed => "Resource fetch failed",
        }
    }
}

/// Finds the category of the first library error in `err`'s chain.
///
/// Returns `None` for failures that are not request errors, such as a
/// rejected target or a failed initialization.
pub fn error_kind(err: &anyhow::Error) -> Option<ErrorKind> {
    err.chain().find_map(|cause| {
        if let Some(e) = cause.downcast_ref::<TraceError>() {
            Some(e.kind())
        } else if let Some(e) = cause.downcast_ref::<SizeError>() {
            Some(e.kind())
        } else {
            cause.downcast_ref::<ResourceFetchError>().map(ResourceFetchError::kind)
        }
    })
}

impl TraceError {
    /// Category of this error.
    pub fn kind(&self) -> ErrorKind {
        match self {
            TraceError::RequestCreationFailed { .. } => ErrorKind::RequestCreationFailed,
            TraceError::RequestFailed { .. } => ErrorKind::RequestFailed,
            TraceError::RedirectLoop { .. } => ErrorKind::RedirectLoop,
            TraceError::RedirectLimitExceeded { .. } => ErrorKind::RedirectLimitExceeded,
            TraceError::RedirectLocationInvalid { .. } => ErrorKind::RedirectLocationInvalid,
        }
    }
}

impl SizeError {
    /// Category of this error.
    pub fn kind(&self) -> ErrorKind {
        match self {
            SizeError::RequestCreationFailed { .. } => ErrorKind::RequestCreationFailed,
            SizeError::RequestFailed { .. } | SizeError::BodyReadFailed { .. } => {
                ErrorKind::RequestFailed
            }
        }
    }
}

impl ResourceFetchError {
    /// Category of this error.
    pub fn kind(&self) -> ErrorKind {
        ErrorKind::ResourceFetchFailed
    }

    /// The URL (or raw reference) this failure is about.
    pub fn url(&self) -> &str {
        match self {
            ResourceFetchError::InvalidUrl { link, .. } => link,
            ResourceFetchError::Fetch { url, .. }
            | ResourceFetchError::Body { url, .. }
            | ResourceFetchError::TaskFailed { url, .. } => url,
        }
    }
}
