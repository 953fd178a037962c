//! Resource reference extraction.

use std::collections::HashSet;
use std::sync::LazyLock;

use log::error;
use scraper::{Html, Selector};
use url::Url;

use crate::error_handling::ResourceFetchError;

/// Elements whose `href` or `src` points at a sub-resource.
const RESOURCE_SELECTOR: &str = "link[href], script[src], img[src]";

static RESOURCE_ELEMENTS: LazyLock<Option<Selector>> = LazyLock::new(|| {
    Selector::parse(RESOURCE_SELECTOR)
        .map_err(|e| error!("Failed to parse selector '{RESOURCE_SELECTOR}': {e}"))
        .ok()
});

/// References found in a document, resolved against its base URL.
#[derive(Debug, Default)]
pub struct ExtractedLinks {
    /// Distinct absolute URLs in document order
    pub urls: Vec<Url>,
    /// References that could not be resolved
    pub invalid: Vec<ResourceFetchError>,
}

/// Collects every `link[href]`, `script[src]` and `img[src]` reference.
///
/// `href` wins over `src` when an element has both. Empty references are
/// skipped and each resolved URL appears once.
pub fn extract_resource_links(html: &str, base_url: &Url) -> ExtractedLinks {
    let mut links = ExtractedLinks::default();
    let Some(selector) = RESOURCE_ELEMENTS.as_ref() else {
        return links;
    };

    let document = Html::parse_document(html);
    let mut seen = HashSet::new();
    for element in document.select(selector) {
        let value = element.value();
        let Some(reference) = value.attr("href").or_else(|| value.attr("src")) else {
            continue;
        };
        let reference = reference.trim();
        if reference.is_empty() {
            continue;
        }
        match base_url.join(reference) {
            Ok(url) => {
                if seen.insert(url.clone()) {
                    links.urls.push(url);
                }
            }
            Err(source) => links.invalid.push(ResourceFetchError::InvalidUrl {
                link: reference.to_string(),
                source,
            }),
        }
    }
    links
}
