//! Error handling.
//!
//! Errors are split by who raises them:
//! - **Transport**: one exchange on the wire failed ([`TransportError`])
//! - **Trace**: the redirect-following timing engine gave up ([`TraceError`])
//! - **Size**: the size-mode page could not be fetched ([`SizeError`])
//! - **Resource**: one sub-resource could not be measured ([`ResourceFetchError`]),
//!   reported as a warning only
//!
//! [`ErrorKind`] is the user-facing categorization shared by all of them.

mod types;

// Re-export public API
pub use types::{
    error_kind, ErrorKind, InitializationError, ResourceFetchError, SizeError, TraceError,
    TransportError,
};
