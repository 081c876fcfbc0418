use std::fs;
use std::path::PathBuf;
use std::time::Duration;

use anyhow::{anyhow, bail, Context, Result};
use chrono_tz::Tz;
use clap::Parser;
use serde::{Deserialize, Serialize};

use lib_common::browser::BrowserMode;
use lib_common::markets::catalog::DEFAULT_SHEET_NAME;
use lib_common::retrieve::HttpOptions;

/// Every field is optional here so the three layers (defaults, file,
/// env/CLI) can be merged; `Settings` is the validated result.
#[derive(Parser, Deserialize, Serialize, Debug, Clone, Default)]
#[clap(about = "Collects gold, ETF and crypto prices and publishes them to a spreadsheet", version)]
#[serde(rename_all = "camelCase")]
pub struct Config {
    #[clap(long, env = "PRICE_SYNC_CONFIG_PATH", help = "Path to the JSON configuration file.")]
    pub config_path: Option<PathBuf>,

    #[clap(long, env = "PRICE_SYNC_SHEET_ID", help = "Spreadsheet id to publish to (required).")]
    pub sheet_id: Option<String>,

    #[clap(long, env = "PRICE_SYNC_SHEET_TOKEN", help = "Bearer token for the Sheets API.")]
    pub sheet_token: Option<String>,

    #[clap(long, env = "PRICE_SYNC_SHEET_NAME", help = "Sheet (tab) holding the price cells.")]
    pub sheet_name: Option<String>,

    #[clap(long, env = "PRICE_SYNC_DECIMAL_SEPARATOR", help = "Decimal separator the sheet locale expects ('.' or ',').")]
    pub decimal_separator: Option<char>,

    #[clap(long, env = "PRICE_SYNC_LOG_DIR", help = "Directory for log files.")]
    pub log_dir: Option<PathBuf>,

    #[clap(long, env = "PRICE_SYNC_LOG_LEVEL", help = "Log filter used when RUST_LOG is unset.")]
    pub log_level: Option<String>,

    #[clap(long, env = "PRICE_SYNC_TIMEZONE", help = "IANA timezone the cron expressions are evaluated in.")]
    pub timezone: Option<String>,

    #[clap(long, env = "PRICE_SYNC_GOLD_CRON", help = "Cron expression (with seconds) for the gold job.")]
    pub gold_cron: Option<String>,

    #[clap(long, env = "PRICE_SYNC_ETF_CRON", help = "Cron expression (with seconds) for the ETF job.")]
    pub etf_cron: Option<String>,

    #[clap(long, env = "PRICE_SYNC_CRYPTO_CRON", help = "Cron expression (with seconds) for the crypto job.")]
    pub crypto_cron: Option<String>,

    #[clap(long, env = "PRICE_SYNC_LIVENESS_URL", help = "Health-check URL pinged on its own cadence.")]
    pub liveness_url: Option<String>,

    #[clap(long, env = "PRICE_SYNC_LIVENESS_CRON", help = "Cron expression (with seconds) for the liveness ping.")]
    pub liveness_cron: Option<String>,

    #[clap(long, env = "PRICE_SYNC_BROWSER_MODE", help = "Browser lifecycle: per-call or shared.")]
    pub browser_mode: Option<String>,

    #[clap(long, env = "PRICE_SYNC_CHROME_PATH", help = "Chrome/Chromium executable override.")]
    pub chrome_path: Option<PathBuf>,

    #[clap(long, env = "PRICE_SYNC_HTTP_TIMEOUT_SECS", help = "Upper bound for one HTTP request.")]
    pub http_timeout_secs: Option<u64>,

    #[clap(long, env = "PRICE_SYNC_HTTP_MAX_RETRIES", help = "Transient HTTP retries (0 disables).")]
    pub http_max_retries: Option<u32>,
}

impl Config {
    /// 'other' overrides 'self' wherever it is `Some`.
    fn merge(self, other: Config) -> Config {
        Config {
            config_path: other.config_path.or(self.config_path),
            sheet_id: other.sheet_id.or(self.sheet_id),
            sheet_token: other.sheet_token.or(self.sheet_token),
            sheet_name: other.sheet_name.or(self.sheet_name),
            decimal_separator: other.decimal_separator.or(self.decimal_separator),
            log_dir: other.log_dir.or(self.log_dir),
            log_level: other.log_level.or(self.log_level),
            timezone: other.timezone.or(self.timezone),
            gold_cron: other.gold_cron.or(self.gold_cron),
            etf_cron: other.etf_cron.or(self.etf_cron),
            crypto_cron: other.crypto_cron.or(self.crypto_cron),
            liveness_url: other.liveness_url.or(self.liveness_url),
            liveness_cron: other.liveness_cron.or(self.liveness_cron),
            browser_mode: other.browser_mode.or(self.browser_mode),
            chrome_path: other.chrome_path.or(self.chrome_path),
            http_timeout_secs: other.http_timeout_secs.or(self.http_timeout_secs),
            http_max_retries: other.http_max_retries.or(self.http_max_retries),
        }
    }

    fn defaults() -> Config {
        Config {
            sheet_name: Some(DEFAULT_SHEET_NAME.to_string()),
            decimal_separator: Some('.'),
            log_dir: Some(PathBuf::from("./logs")),
            log_level: Some("info".to_string()),
            timezone: Some("Asia/Ho_Chi_Minh".to_string()),
            gold_cron: Some("0 5 8-17 * * Mon-Sat".to_string()),
            etf_cron: Some("0 */15 9-15 * * Mon-Fri".to_string()),
            crypto_cron: Some("0 */10 * * * *".to_string()),
            liveness_cron: Some("0 */5 * * * *".to_string()),
            browser_mode: Some("per-call".to_string()),
            http_timeout_secs: Some(30),
            http_max_retries: Some(0),
            ..Default::default()
        }
    }
}

/// Validated runtime settings.
#[derive(Debug, Clone)]
pub struct Settings {
    pub sheet_id: String,
    pub sheet_token: Option<String>,
    pub sheet_name: String,
    pub decimal_separator: char,
    pub log_dir: PathBuf,
    pub log_level: String,
    pub timezone: Tz,
    pub gold_cron: String,
    pub etf_cron: String,
    pub crypto_cron: String,
    pub liveness_url: Option<String>,
    pub liveness_cron: String,
    pub browser_mode: BrowserMode,
    pub chrome_path: Option<PathBuf>,
    pub http: HttpOptions,
}

/// Where the file layer came from, reported once logging is up.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FileLayer {
    Loaded(PathBuf),
    Missing(PathBuf),
}

pub fn parse_browser_mode(raw: &str) -> Result<BrowserMode> {
    match raw.trim().to_ascii_lowercase().as_str() {
        "per-call" | "per_call" | "percall" => Ok(BrowserMode::PerCall),
        "shared" => Ok(BrowserMode::Shared),
        other => bail!("unknown browser mode `{other}` (expected per-call or shared)"),
    }
}

fn required<T>(value: Option<T>, name: &str) -> Result<T> {
    value.ok_or_else(|| anyhow!("missing configuration value `{name}`"))
}

impl TryFrom<Config> for Settings {
    type Error = anyhow::Error;

    fn try_from(config: Config) -> Result<Self> {
        let sheet_id = config
            .sheet_id
            .filter(|id| !id.trim().is_empty())
            .ok_or_else(|| anyhow!("PRICE_SYNC_SHEET_ID is required"))?;

        let decimal_separator = required(config.decimal_separator, "decimal_separator")?;
        if decimal_separator != '.' && decimal_separator != ',' {
            bail!("decimal separator must be '.' or ',', got '{decimal_separator}'");
        }

        let timezone_name = required(config.timezone, "timezone")?;
        let timezone: Tz = timezone_name
            .parse()
            .map_err(|e| anyhow!("invalid timezone `{timezone_name}`: {e}"))?;

        let http = HttpOptions {
            timeout: Duration::from_secs(required(config.http_timeout_secs, "http_timeout_secs")?),
            max_retries: required(config.http_max_retries, "http_max_retries")?,
            ..HttpOptions::default()
        };

        Ok(Settings {
            sheet_id,
            sheet_token: config.sheet_token.filter(|t| !t.is_empty()),
            sheet_name: required(config.sheet_name, "sheet_name")?,
            decimal_separator,
            log_dir: required(config.log_dir, "log_dir")?,
            log_level: required(config.log_level, "log_level")?,
            timezone,
            gold_cron: required(config.gold_cron, "gold_cron")?,
            etf_cron: required(config.etf_cron, "etf_cron")?,
            crypto_cron: required(config.crypto_cron, "crypto_cron")?,
            liveness_url: config.liveness_url.filter(|u| !u.is_empty()),
            liveness_cron: required(config.liveness_cron, "liveness_cron")?,
            browser_mode: parse_browser_mode(&required(config.browser_mode, "browser_mode")?)?,
            chrome_path: config.chrome_path,
            http,
        })
    }
}

/// Merges the three layers: defaults < file < env/CLI.
pub fn resolve(cli: Config) -> Result<(Settings, FileLayer)> {
    let file_path = cli
        .config_path
        .clone()
        .unwrap_or_else(|| PathBuf::from("price_sync.json"));

    let mut current = Config::defaults();
    let layer = if file_path.exists() {
        let text = fs::read_to_string(&file_path)
            .with_context(|| format!("reading config file {}", file_path.display()))?;
        let file_config: Config = serde_json::from_str(&text)
            .with_context(|| format!("parsing config file {}", file_path.display()))?;
        current = current.merge(file_config);
        FileLayer::Loaded(file_path)
    } else {
        FileLayer::Missing(file_path)
    };

    let settings = Settings::try_from(current.merge(cli))?;
    Ok((settings, layer))
}

/// Parses CLI/env and resolves the final settings.
pub fn load_config() -> Result<(Settings, FileLayer)> {
    resolve(Config::parse())
}
