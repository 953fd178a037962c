//! Shared helpers.
//!
//! - Timing report and the aggregation functions that flatten it

mod timing;

pub use timing::{
    extract_connection_durations, extract_durations, ConnectionPhase, RequestPhase, TimingReport,
};
