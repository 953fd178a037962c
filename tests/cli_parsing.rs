//! Tests for CLI argument parsing.

use clap::Parser;
use headview::config::{LogFormat, LogLevel, DEFAULT_CONCURRENCY};
use headview::Opt;

#[test]
fn test_timing_mode_defaults() {
    let opt = Opt::try_parse_from(["headview", "example.com"]).expect("should parse");
    assert_eq!(opt.url, "example.com");
    assert!(!opt.headers);
    assert!(!opt.size);
    assert_eq!(opt.concurrency, DEFAULT_CONCURRENCY);
    assert!(matches!(opt.log_level, LogLevel::Warn));
    assert!(matches!(opt.log_format, LogFormat::Plain));
}

#[test]
fn test_size_mode_flags() {
    let opt = Opt::try_parse_from([
        "headview",
        "https://example.com",
        "--size",
        "--concurrency",
        "3",
        "--log-level",
        "debug",
        "--log-format",
        "json",
    ])
    .expect("should parse");
    assert!(opt.size);
    assert_eq!(opt.concurrency, 3);
    assert!(matches!(opt.log_level, LogLevel::Debug));
    assert!(matches!(opt.log_format, LogFormat::Json));
}

#[test]
fn test_flags_may_precede_url() {
    let opt = Opt::try_parse_from(["headview", "--headers", "example.com"]).expect("should parse");
    assert!(opt.headers);
    assert_eq!(opt.url, "example.com");
}

#[test]
fn test_missing_url_is_rejected() {
    assert!(Opt::try_parse_from(["headview"]).is_err());
}

#[test]
fn test_invalid_values_are_rejected() {
    assert!(Opt::try_parse_from(["headview", "example.com", "--concurrency", "-1"]).is_err());
    assert!(Opt::try_parse_from(["headview", "example.com", "--log-level", "loud"]).is_err());
    assert!(Opt::try_parse_from(["headview", "example.com", "--log-format", "xml"]).is_err());
}

#[test]
fn test_version_flag() {
    let err = Opt::try_parse_from(["headview", "--version"]).expect_err("version exits early");
    assert_eq!(err.kind(), clap::error::ErrorKind::DisplayVersion);
    assert!(err.to_string().contains(env!("CARGO_PKG_VERSION")));
}
