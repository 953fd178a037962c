//! Binary-side helpers: target normalization and report rendering.

pub mod output;
pub mod url;

pub use output::{format_duration, format_size, print_size_report, print_timing_report};
pub use url::{add_default_protocol, validate_and_normalize_url};
