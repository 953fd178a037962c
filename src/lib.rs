//! headview library: HTTP request phase timing and page resource sizing
//!
//! The timing engine sends a HEAD request, follows every redirect one hop at
//! a time and records DNS, TCP connect, TLS handshake, server wait and
//! content transfer for each hop. Size mode fetches a page and measures it
//! together with every stylesheet, script and image it references.
//!
//! # Example
//!
//! ```no_run
//! use headview::fetch::perform_get_request;
//! use headview::initialization::{init_crypto_provider, init_transport};
//!
//! # #[tokio::main]
//! # async fn main() -> Result<(), Box<dyn std::error::Error>> {
//! init_crypto_provider();
//! let transport = init_transport()?;
//! let (report, responses) = perform_get_request(&*transport, "https://example.com").await?;
//! println!(
//!     "{} hop(s), first hop took {:?}, final status {}",
//!     report.hop_count(),
//!     report.total_request_time,
//!     responses.last().map(|r| r.status.as_u16()).unwrap_or_default()
//! );
//! # Ok(())
//! # }
//! ```
//!
//! # Requirements
//!
//! This library requires a Tokio runtime.

#![warn(missing_docs)]

pub mod app;
pub mod config;
pub mod error_handling;
pub mod fetch;
pub mod initialization;
pub mod resources;
pub mod trace;
pub mod transport;
pub mod utils;

// Re-export public API
pub use config::{LogFormat, LogLevel, Opt};
pub use fetch::{perform_get_request, ResponseInfo};
pub use resources::{calculate_size, perform_get_size, Resource, ResourceMap, SizeReport};
pub use run::{run, RunOutcome};
pub use trace::TimingRecord;
pub use utils::{extract_connection_durations, extract_durations, TimingReport};

// Ties the CLI options to the two modes
mod run {
    use anyhow::{Context, Result};
    use log::info;

    use crate::app::validate_and_normalize_url;
    use crate::config::Opt;
    use crate::fetch::{perform_get_request, ResponseInfo};
    use crate::initialization::{init_client, init_transport};
    use crate::resources::{perform_get_size, SizeReport};
    use crate::utils::TimingReport;

    /// What a run produced, ready for presentation.
    #[derive(Debug)]
    pub enum RunOutcome {
        /// Timing mode: one record and one response per hop
        Timing {
            /// Per-hop records and first-hop headline durations
            report: TimingReport,
            /// Per-hop responses
            responses: Vec<ResponseInfo>,
        },
        /// Size mode
        Size(SizeReport),
    }

    /// Runs the mode selected by `opt` against its target URL.
    ///
    /// # Errors
    ///
    /// Returns an error if the target is not a usable URL, if the HTTP engine
    /// cannot be initialized, or if the mode itself fails (any fatal
    /// [`TraceError`](crate::error_handling::TraceError) or
    /// [`SizeError`](crate::error_handling::SizeError)).
    pub async fn run(opt: &Opt) -> Result<RunOutcome> {
        let url = validate_and_normalize_url(&opt.url)
            .with_context(|| format!("Invalid target URL '{}'", opt.url))?;

        if opt.size {
            info!("Size mode for {url} with concurrency {}", opt.concurrency);
            let client = init_client().context("Failed to initialize HTTP client")?;
            let report = perform_get_size(client, url.as_str(), opt.concurrency)
                .await
                .context("Size calculation failed")?;
            Ok(RunOutcome::Size(report))
        } else {
            info!("Timing {url}");
            let transport = init_transport().context("Failed to initialize transport")?;
            let (report, responses) = perform_get_request(&*transport, url.as_str())
                .await
                .context("Request failed")?;
            Ok(RunOutcome::Timing { report, responses })
        }
    }
}
