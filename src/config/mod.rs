//! Application configuration and constants.
//!
//! This module provides:
//! - Fixed protocol parameters (user agent, timeouts, redirect limit)
//! - CLI option types and parsing

mod constants;
mod types;

// Re-export all constants
pub use constants::*;
pub use types::{LogFormat, LogLevel, Opt};
