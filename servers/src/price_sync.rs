//! # price_sync
//!
//! Publishes the SJC gold price, the E1VFVN30 ETF price and BTC/ETH/BNB in
//! VND to fixed cells of a spreadsheet.
//!
//! 1. Load `.env`, resolve configuration and start logging.
//! 2. Run every job once, one after another, before any timer fires.
//! 3. Hand the jobs (and the optional liveness ping) to the cron scheduler.
//! 4. On Ctrl-C/SIGTERM stop the scheduler and close the browser.

use std::sync::Arc;

use anyhow::Result;
use static_init::dynamic;
use tracing::{error, info, warn};

use lib_common::browser::{BrowserManager, BrowserOptions};
use lib_common::connections::{LivenessProbe, SheetsClient};
use lib_common::loggers::{setup_logging, LogSettings};
use lib_common::markets::catalog::{crypto_job, etf_job, gold_job};
use lib_common::retrieve::{ApiClient, HttpFetcher};
use lib_common::utils::{get_process_info, ProcessInfo, ProcessInfoError};
use lib_common::Orchestrator;

mod price_sync_logic;
use price_sync_logic::config::{self, FileLayer};
use price_sync_logic::scheduler::{build_scheduler, Scheduled};

// load .env files before anything else
#[dynamic]
static DOTENV_INIT: () = {
    dotenvy::dotenv().ok();
};

#[dynamic]
pub static PROCESSINFO: Result<ProcessInfo, ProcessInfoError> = get_process_info();

#[tokio::main]
async fn main() -> Result<()> {
    let _ = &*DOTENV_INIT;

    let (settings, file_layer) = config::load_config()?;

    let file_prefix = match &*PROCESSINFO {
        Ok(info) => info.process_basename.clone(),
        Err(_) => "price_sync".to_string(),
    };
    let _log_guard = setup_logging(&LogSettings {
        log_dir: settings.log_dir.clone(),
        level: settings.log_level.clone(),
        file_prefix,
    })?;

    match &*PROCESSINFO {
        Ok(process_info) => info!("{}", process_info),
        Err(e) => warn!(error = %e, "process info unavailable"),
    }
    match &file_layer {
        FileLayer::Loaded(path) => info!(path = %path.display(), "config file loaded"),
        FileLayer::Missing(path) => info!(path = %path.display(), "no config file, using defaults and env/CLI"),
    }

    // Shared collaborators
    let fetcher: Arc<dyn HttpFetcher> = Arc::new(ApiClient::new(None, None, &settings.http)?);
    let sheets = SheetsClient::new(settings.sheet_id.clone(), settings.sheet_token.clone(), &settings.http)?;
    let orchestrator = Arc::new(Orchestrator::new(Arc::new(sheets)).with_decimal_separator(settings.decimal_separator));
    let browser = Arc::new(BrowserManager::new(BrowserOptions {
        mode: settings.browser_mode,
        chrome_path: settings.chrome_path.clone(),
        ..BrowserOptions::default()
    }));
    info!(
        sheet = %settings.sheet_name,
        browser_mode = ?settings.browser_mode,
        http_retries = settings.http.max_retries,
        "pipeline ready"
    );

    let sheet = settings.sheet_name.as_str();
    let schedule = vec![
        Scheduled {
            job: gold_job(sheet, browser.clone()),
            cron: settings.gold_cron.clone(),
        },
        Scheduled {
            job: etf_job(sheet, fetcher.clone()),
            cron: settings.etf_cron.clone(),
        },
        Scheduled {
            job: crypto_job(sheet, fetcher.clone()),
            cron: settings.crypto_cron.clone(),
        },
    ];

    // Startup pass: strictly sequential, before the scheduler exists.
    let startup_jobs: Vec<_> = schedule.iter().map(|s| s.job.clone()).collect();
    let reports = orchestrator.run_all_sequential(&startup_jobs).await;
    let failed: usize = reports.iter().map(|r| r.failed()).sum();
    info!(jobs = reports.len(), failed, "startup pass finished");

    let liveness = settings
        .liveness_url
        .clone()
        .map(|url| (Arc::new(LivenessProbe::new(url, fetcher.clone())), settings.liveness_cron.clone()));

    let mut scheduler = build_scheduler(settings.timezone, orchestrator.clone(), schedule, liveness).await?;
    scheduler.start().await?;
    info!("scheduler started");

    price_sync_logic::wait_for_shutdown().await;

    if let Err(e) = scheduler.shutdown().await {
        error!(error = %e, "scheduler shutdown failed");
    }
    browser.close().await;

    info!("Shutdown complete.");
    Ok(())
}
