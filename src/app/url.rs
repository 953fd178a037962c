//! Target URL normalization.

use log::warn;
use url::Url;

use crate::config::DEFAULT_SCHEME;

/// Longest target accepted, matching common browser and server limits.
const MAX_URL_LENGTH: usize = 2048;

/// Prepends `https://` when the target has no scheme.
///
/// Only a leading `scheme://` counts, so a URL inside the query string does
/// not. A target that already names a scheme is returned untouched: `ftp://host`
/// stays an ftp URL and is rejected later.
pub fn add_default_protocol(url: &str) -> String {
    if has_scheme(url) {
        url.to_string()
    } else {
        format!("{DEFAULT_SCHEME}{url}")
    }
}

/// Whether `url` starts with `scheme://` (RFC 3986 scheme characters).
fn has_scheme(url: &str) -> bool {
    url.split_once("://").is_some_and(|(scheme, _)| {
        scheme.starts_with(|c: char| c.is_ascii_alphabetic())
            && scheme
                .chars()
                .all(|c| c.is_ascii_alphanumeric() || matches!(c, '+' | '-' | '.'))
    })
}

/// Applies the default scheme and checks the target is a usable http(s) URL.
///
/// Logs a warning and returns `None` for targets that are too long, do not
/// parse, have no host, or use another scheme.
pub fn validate_and_normalize_url(url: &str) -> Option<Url> {
    let trimmed = url.trim();
    let normalized = add_default_protocol(trimmed);
    if normalized.len() > MAX_URL_LENGTH {
        warn!(
            "URL exceeds maximum length ({} > {MAX_URL_LENGTH}): {}...",
            normalized.len(),
            &normalized[..normalized.char_indices().nth(50).map_or(normalized.len(), |(i, _)| i)]
        );
        return None;
    }

    match Url::parse(&normalized) {
        Ok(parsed) if !matches!(parsed.scheme(), "http" | "https") => {
            warn!("Unsupported scheme '{}' in URL: {trimmed}", parsed.scheme());
            None
        }
        Ok(parsed) if parsed.host_str().map_or(true, str::is_empty) => {
            warn!("URL has no host: {trimmed}");
            None
        }
        Ok(parsed) => Some(parsed),
        Err(e) => {
            warn!("Invalid URL {trimmed}: {e}");
            None
        }
    }
}
