//! HTTP client for size mode.

use std::sync::Arc;

use reqwest::{redirect, ClientBuilder};

use crate::config::{MAX_REDIRECT_HOPS, PAGE_TIMEOUT, USER_AGENT};
use crate::error_handling::InitializationError;

/// Creates the `reqwest` client used to fetch a page and its resources.
///
/// - User-Agent `headview`
/// - Redirects followed up to the hop limit
/// - Certificate verification disabled, like the tracing transport
/// - A page-level timeout; resource fetches set a shorter one per request
///
/// # Errors
///
/// Returns `InitializationError::HttpClientError` if the client cannot be built.
pub fn init_client() -> Result<Arc<reqwest::Client>, InitializationError> {
    let client = ClientBuilder::new()
        .user_agent(USER_AGENT)
        .redirect(redirect::Policy::limited(MAX_REDIRECT_HOPS))
        .danger_accept_invalid_certs(true)
        .timeout(PAGE_TIMEOUT)
        .build()?;
    Ok(Arc::new(client))
}
