//! Concurrent resource size collection.
//!
//! Size mode fetches a page, finds the sub-resources it references and
//! measures every one of them with a bounded number of fetches in flight.
//! Failed fetches become warnings; whatever was measured is always returned.

mod extract;

use std::collections::BTreeMap;
use std::sync::Arc;

use futures::stream::{FuturesUnordered, StreamExt};
use futures::FutureExt;
use hyper::body::Bytes;
use log::{debug, info, warn};
use reqwest::header::{HeaderMap, CONTENT_TYPE};
use tokio::sync::Mutex;
use url::Url;

use crate::config::{PAGE_TIMEOUT, RESOURCE_TIMEOUT};
use crate::error_handling::{ResourceFetchError, SizeError};
use crate::initialization::init_semaphore;

pub use extract::{extract_resource_links, ExtractedLinks};

/// One measured URL.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Resource {
    /// Absolute URL
    pub url: String,
    /// Body size in bytes
    pub size: u64,
    /// `Content-Type` header as sent, empty when absent
    pub content_type: String,
}

/// Resources bucketed by content type.
///
/// Buckets iterate in content-type order; order inside a bucket is whatever
/// order the fetches finished in.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ResourceMap {
    by_type: BTreeMap<String, Vec<Resource>>,
}

impl ResourceMap {
    /// Adds a resource to the bucket of its content type.
    pub fn insert(&mut self, resource: Resource) {
        self.by_type
            .entry(resource.content_type.clone())
            .or_default()
            .push(resource);
    }

    /// Number of resources across all buckets.
    pub fn len(&self) -> usize {
        self.by_type.values().map(Vec::len).sum()
    }

    /// Whether nothing was measured.
    pub fn is_empty(&self) -> bool {
        self.by_type.is_empty()
    }

    /// Sum of every resource size.
    pub fn total_size(&self) -> u64 {
        self.by_type.keys().map(|t| self.type_total(t)).sum()
    }

    /// Sum of sizes in one bucket, 0 for an unknown type.
    pub fn type_total(&self, content_type: &str) -> u64 {
        self.by_type
            .get(content_type)
            .map(|resources| resources.iter().map(|r| r.size).sum())
            .unwrap_or(0)
    }

    /// Resources of one content type.
    pub fn get(&self, content_type: &str) -> Option<&[Resource]> {
        self.by_type.get(content_type).map(Vec::as_slice)
    }

    /// Buckets in content-type order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &[Resource])> {
        self.by_type
            .iter()
            .map(|(content_type, resources)| (content_type.as_str(), resources.as_slice()))
    }
}

/// A fetched HTML page ready to be scanned.
#[derive(Debug, Clone)]
pub struct Page {
    /// Final URL after redirects, used as the base URL
    pub url: Url,
    /// `Content-Type` of the page, empty when absent
    pub content_type: String,
    /// Raw body
    pub body: Bytes,
}

impl Page {
    /// The page itself as a resource.
    pub fn as_resource(&self) -> Resource {
        Resource {
            url: self.url.to_string(),
            size: self.body.len() as u64,
            content_type: self.content_type.clone(),
        }
    }
}

/// Outcome of size mode.
#[derive(Debug)]
pub struct SizeReport {
    /// URL the page was finally served from
    pub base_url: Url,
    /// Page plus every resource that could be measured
    pub resources: ResourceMap,
    /// Resources that could not be measured
    pub warnings: Vec<ResourceFetchError>,
}

/// Fetches `url` and measures it together with everything it references.
///
/// # Errors
///
/// Only the page itself is fatal: a malformed URL, a failed request or a
/// body that cannot be read. Resource failures end up in
/// [`SizeReport::warnings`].
pub async fn perform_get_size(
    client: Arc<reqwest::Client>,
    url: &str,
    concurrency: usize,
) -> Result<SizeReport, SizeError> {
    let target = Url::parse(url).map_err(|e| SizeError::RequestCreationFailed {
        url: url.to_string(),
        reason: e.to_string(),
    })?;

    info!("Fetching {target} for size calculation");
    let response = client
        .get(target.clone())
        .timeout(PAGE_TIMEOUT)
        .send()
        .await
        .map_err(|source| SizeError::RequestFailed {
            url: target.to_string(),
            source,
        })?;

    let page_url = response.url().clone();
    let content_type = content_type_of(response.headers());
    let body = response
        .bytes()
        .await
        .map_err(|source| SizeError::BodyReadFailed {
            url: page_url.to_string(),
            source,
        })?;

    let page = Page {
        url: page_url,
        content_type,
        body,
    };
    Ok(calculate_size(client, &page, concurrency).await)
}

/// Measures `page` and every resource it references.
///
/// At most `concurrency` fetches run at once (at least one). Each fetch has
/// its own timeout and failures never stop the others.
pub async fn calculate_size(
    client: Arc<reqwest::Client>,
    page: &Page,
    concurrency: usize,
) -> SizeReport {
    // scraper's document is not Send, keep it out of the async part
    let ExtractedLinks {
        urls,
        invalid: mut warnings,
    } = extract_resource_links(&String::from_utf8_lossy(&page.body), &page.url);
    debug!("Found {} resource reference(s) on {}", urls.len(), page.url);

    let semaphore = init_semaphore(concurrency);
    let shared = Arc::new(Mutex::new(ResourceMap::default()));
    let mut tasks = FuturesUnordered::new();

    for url in urls {
        let task_url = url.to_string();
        let permit = match Arc::clone(&semaphore).acquire_owned().await {
            Ok(permit) => permit,
            Err(e) => {
                warnings.push(ResourceFetchError::TaskFailed {
                    url: task_url,
                    reason: e.to_string(),
                });
                continue;
            }
        };

        let client = Arc::clone(&client);
        let shared = Arc::clone(&shared);
        let handle = tokio::spawn(async move {
            let _permit = permit;
            let resource = fetch_resource(&client, url).await?;
            debug!("{} -> {} bytes ({})", resource.url, resource.size, resource.content_type);
            shared.lock().await.insert(resource);
            Ok::<(), ResourceFetchError>(())
        });
        tasks.push(handle.map(move |joined| (task_url, joined)));
    }

    while let Some((url, joined)) = tasks.next().await {
        match joined {
            Ok(Ok(())) => {}
            Ok(Err(e)) => warnings.push(e),
            Err(e) => warnings.push(ResourceFetchError::TaskFailed {
                url,
                reason: e.to_string(),
            }),
        }
    }

    let mut resources = match Arc::try_unwrap(shared) {
        Ok(mutex) => mutex.into_inner(),
        Err(shared) => shared.lock().await.clone(),
    };
    resources.insert(page.as_resource());

    for warning in &warnings {
        warn!("{}: {warning}", warning.kind());
    }
    info!(
        "Measured {} resource(s) on {}, {} failed",
        resources.len(),
        page.url,
        warnings.len()
    );

    SizeReport {
        base_url: page.url.clone(),
        resources,
        warnings,
    }
}

/// GETs one resource and counts its body without keeping it.
async fn fetch_resource(
    client: &reqwest::Client,
    url: Url,
) -> Result<Resource, ResourceFetchError> {
    let mut response = client
        .get(url.clone())
        .timeout(RESOURCE_TIMEOUT)
        .send()
        .await
        .map_err(|source| ResourceFetchError::Fetch {
            url: url.to_string(),
            source,
        })?;

    let content_type = content_type_of(response.headers());
    let mut size = 0u64;
    while let Some(chunk) = response
        .chunk()
        .await
        .map_err(|source| ResourceFetchError::Body {
            url: url.to_string(),
            source,
        })?
    {
        size += chunk.len() as u64;
    }

    Ok(Resource {
        url: url.to_string(),
        size,
        content_type,
    })
}

fn content_type_of(headers: &HeaderMap) -> String {
    headers
        .get(CONTENT_TYPE)
        .and_then(|value| value.to_str().ok())
        .unwrap_or_default()
        .to_string()
}
