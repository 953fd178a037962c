//! Configuration types and CLI options.
//!
//! This module defines enums and structs used for command-line argument parsing
//! and configuration.

use clap::{Parser, ValueEnum};

use crate::config::constants::DEFAULT_CONCURRENCY;

/// Logging level for the application.
///
/// Controls the verbosity of log output, from most restrictive (Error) to most
/// verbose (Trace). Used with the `--log-level` CLI option.
#[derive(Clone, Debug, ValueEnum)]
pub enum LogLevel {
    /// Only error messages
    Error,
    /// Error and warning messages
    Warn,
    /// Error, warning, and informational messages
    Info,
    /// All messages except trace
    Debug,
    /// All messages including trace
    Trace,
}

impl From<LogLevel> for log::LevelFilter {
    fn from(l: LogLevel) -> Self {
        match l {
            LogLevel::Error => log::LevelFilter::Error,
            LogLevel::Warn => log::LevelFilter::Warn,
            LogLevel::Info => log::LevelFilter::Info,
            LogLevel::Debug => log::LevelFilter::Debug,
            LogLevel::Trace => log::LevelFilter::Trace,
        }
    }
}

/// Log output format.
///
/// Controls how log messages are formatted:
/// - `Plain`: Human-readable format with colors (default)
/// - `Json`: Structured JSON format for machine parsing
#[derive(Clone, Debug, ValueEnum)]
pub enum LogFormat {
    /// Human-readable format with colors (default)
    Plain,
    /// Structured JSON format for machine parsing
    Json,
}

/// Command-line options.
///
/// # Examples
///
/// ```bash
/// # Phase timings for every hop of the redirect chain
/// headview example.com
///
/// # Include response headers
/// headview https://example.com --headers
///
/// # Size of the page and every linked resource, 4 fetches at a time
/// headview example.com --size --concurrency 4
/// ```
#[derive(Debug, Parser)]
#[command(
    name = "headview",
    version,
    about = "Times DNS, TCP, TLS, server wait and transfer for an HTTP request and its redirects."
)]
pub struct Opt {
    /// Target URL (https:// is assumed when no scheme is given)
    pub url: String,

    /// Print response headers for every hop
    #[arg(long)]
    pub headers: bool,

    /// Measure the size of the page and every resource it references
    #[arg(long)]
    pub size: bool,

    /// Maximum resource fetches in flight (size mode)
    #[arg(long, default_value_t = DEFAULT_CONCURRENCY)]
    pub concurrency: usize,

    /// Log level: error|warn|info|debug|trace
    #[arg(long, value_enum, default_value_t = LogLevel::Warn)]
    pub log_level: LogLevel,

    /// Log format: plain|json
    #[arg(long, value_enum, default_value_t = LogFormat::Plain)]
    pub log_format: LogFormat,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_log_level_conversion() {
        assert_eq!(
            log::LevelFilter::from(LogLevel::Error),
            log::LevelFilter::Error
        );
        assert_eq!(
            log::LevelFilter::from(LogLevel::Warn),
            log::LevelFilter::Warn
        );
        assert_eq!(
            log::LevelFilter::from(LogLevel::Info),
            log::LevelFilter::Info
        );
        assert_eq!(
            log::LevelFilter::from(LogLevel::Debug),
            log::LevelFilter::Debug
        );
        assert_eq!(
            log::LevelFilter::from(LogLevel::Trace),
            log::LevelFilter::Trace
        );
    }

    #[test]
    fn test_opt_defaults() {
        let opt = Opt::try_parse_from(["headview", "example.com"]).expect("should parse");
        assert_eq!(opt.url, "example.com");
        assert!(!opt.headers);
        assert!(!opt.size);
        assert_eq!(opt.concurrency, DEFAULT_CONCURRENCY);
        assert!(matches!(opt.log_level, LogLevel::Warn));
        assert!(matches!(opt.log_format, LogFormat::Plain));
    }

    #[test]
    fn test_opt_size_mode_flags() {
        let opt = Opt::try_parse_from([
            "headview",
            "https://example.com",
            "--size",
            "--concurrency",
            "3",
            "--log-format",
            "json",
        ])
        .expect("should parse");
        assert!(opt.size);
        assert_eq!(opt.concurrency, 3);
        assert!(matches!(opt.log_format, LogFormat::Json));
    }

    #[test]
    fn test_opt_requires_url() {
        assert!(Opt::try_parse_from(["headview"]).is_err());
    }
}
