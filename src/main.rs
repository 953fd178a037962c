//! Main application entry point (CLI binary).
//!
//! Thin wrapper around the `headview` library that handles:
//! - Command-line argument parsing
//! - Logger initialization
//! - Printing the report

use anyhow::{Context, Result};
use clap::Parser;
use std::process;

use headview::app::{print_size_report, print_timing_report};
use headview::error_handling::error_kind;
use headview::initialization::{init_crypto_provider, init_logger_with};
use headview::{run, Opt, RunOutcome};

#[tokio::main]
async fn main() -> Result<()> {
    let opt = Opt::parse();

    init_logger_with(opt.log_level.clone().into(), opt.log_format.clone())
        .context("Failed to initialize logger")?;

    init_crypto_provider();

    match run(&opt).await {
        Ok(RunOutcome::Timing { report, responses }) => {
            print_timing_report(&report, &responses, opt.headers);
            Ok(())
        }
        Ok(RunOutcome::Size(report)) => {
            print_size_report(&report);
            Ok(())
        }
        Err(e) => {
            match error_kind(&e) {
                Some(kind) => eprintln!("headview error ({kind}): {e:#}"),
                None => eprintln!("headview error: {e:#}"),
            }
            process::exit(1);
        }
    }
}
