//! # Live Source Smoke Run
//!
//! Runs every job of the catalogue once against the real upstreams and prints
//! what would be written. Nothing reaches the spreadsheet: the sink used here
//! only prints.
//!
//! Not part of CI; it depends on network access and a local Chrome.
//!
//! ```text
//! cargo run -p project_tests --bin test_sources -- --skip-gold
//! ```

#![forbid(unsafe_code)]
#![warn(rust_2018_idioms, unused_qualifications)]

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use clap::Parser;

use lib_common::browser::{BrowserManager, BrowserMode, BrowserOptions};
use lib_common::connections::sheets::{format_for_sheet, is_a1_cell, CellSink, SinkError};
use lib_common::loggers::{setup_logging, LogSettings};
use lib_common::markets::catalog::{crypto_job, etf_job, gold_job, DEFAULT_SHEET_NAME};
use lib_common::retrieve::{ApiClient, HttpFetcher, HttpOptions};
use lib_common::{Orchestrator, Outcome};

#[derive(Parser, Debug)]
#[clap(about = "Runs every price source once and prints the values", version)]
struct Args {
    /// Skip the browser-rendered gold source.
    #[clap(long)]
    skip_gold: bool,

    /// Reuse one browser process instead of one per call.
    #[clap(long)]
    shared_browser: bool,

    #[clap(long, default_value_t = 30)]
    http_timeout_secs: u64,
}

/// Prints instead of writing.
struct PrintSink;

#[async_trait]
impl CellSink for PrintSink {
    async fn set_cell(&self, sheet_name: &str, cell_address: &str, value: &str) -> Result<(), SinkError> {
        if !is_a1_cell(cell_address) {
            return Err(SinkError::InvalidCell(cell_address.to_string()));
        }
        println!("  would write {sheet_name}!{cell_address} <- {value}");
        Ok(())
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = Args::parse();
    let _guard = setup_logging(&LogSettings {
        file_prefix: "test_sources".to_string(),
        ..LogSettings::default()
    })?;

    let http = HttpOptions {
        timeout: Duration::from_secs(args.http_timeout_secs),
        ..HttpOptions::default()
    };
    let fetcher: Arc<dyn HttpFetcher> = Arc::new(ApiClient::new(None, None, &http)?);
    let browser = Arc::new(BrowserManager::new(BrowserOptions {
        mode: if args.shared_browser { BrowserMode::Shared } else { BrowserMode::PerCall },
        ..BrowserOptions::default()
    }));
    let orchestrator = Orchestrator::new(Arc::new(PrintSink));

    let mut jobs = Vec::new();
    if !args.skip_gold {
        jobs.push(gold_job(DEFAULT_SHEET_NAME, browser.clone()));
    }
    jobs.push(etf_job(DEFAULT_SHEET_NAME, fetcher.clone()));
    jobs.push(crypto_job(DEFAULT_SHEET_NAME, fetcher));

    println!("--- Starting live source run ---");
    let reports = orchestrator.run_all_sequential(&jobs).await;
    browser.close().await;

    for report in &reports {
        println!("\n[{}] {} ms", report.job, report.elapsed.as_millis());
        for outcome in &report.outcomes {
            match &outcome.outcome {
                Outcome::Written { cell, value } => println!("  ✅ {:<14} {cell} = {value}", outcome.source_id),
                Outcome::Computed { amount } => {
                    println!("  ✅ {:<14} {}", outcome.source_id, format_for_sheet(*amount, '.'))
                }
                Outcome::Failed(e) => println!("  ❌ {:<14} {} ({e})", outcome.source_id, e.kind()),
            }
        }
    }

    let failed: usize = reports.iter().map(|r| r.failed()).sum();
    println!("\n--- Done: {failed} source(s) failed ---");
    if failed > 0 {
        std::process::exit(1);
    }
    Ok(())
}
