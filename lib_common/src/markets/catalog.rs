//! # Source Catalogue
//!
//! The static wiring of sources to jobs and cells. Cell addresses are fixed
//! here and never derived at runtime; only the sheet name is configurable.
//!
//! | job      | source         | cell |
//! |----------|----------------|------|
//! | `gold`   | `gold_sjc`     | B2   |
//! | `etf`    | `etf_e1vfvn30` | B3   |
//! | `crypto` | `usdt_vnd`     | B4   |
//! | `crypto` | `btc`          | B5   |
//! | `crypto` | `eth`          | B6   |
//! | `crypto` | `bnb`          | B7   |

use std::sync::Arc;

use rust_decimal::Decimal;

use crate::core::normalizer::{NormalizeProfile, UnitCorrection};
use crate::core::orchestrator::{Job, RateBinding, SourceBinding};
use crate::markets::crypto::{SimplePriceConfig, SimplePriceSource, SpotTickerSource, TickerConfig};
use crate::markets::etf::{OhlcConfig, OhlcSeriesSource};
use crate::markets::model::{CellTarget, Currency};
use crate::retrieve::HttpFetcher;

#[cfg(feature = "browser")]
use crate::browser::PageRenderer;
#[cfg(feature = "browser")]
use crate::markets::gold::{RetailGoldSource, RetailPageConfig};

pub const DEFAULT_SHEET_NAME: &str = "Prices";

pub const GOLD_JOB: &str = "gold";
pub const ETF_JOB: &str = "etf";
pub const CRYPTO_JOB: &str = "crypto";

/// A published value: the source id and its fixed cell.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CellSlot {
    pub source_id: &'static str,
    pub cell: &'static str,
}

impl CellSlot {
    const fn new(source_id: &'static str, cell: &'static str) -> Self {
        Self { source_id, cell }
    }

    fn target(self, sheet_name: &str) -> CellTarget {
        CellTarget::new(sheet_name, self.cell)
    }
}

pub const GOLD_SJC: CellSlot = CellSlot::new("gold_sjc", "B2");
pub const ETF_E1VFVN30: CellSlot = CellSlot::new("etf_e1vfvn30", "B3");
pub const USDT_VND: CellSlot = CellSlot::new("usdt_vnd", "B4");

/// Spot pairs converted through the USDT/VND rate, with their ticker symbol.
pub const CRYPTO_PAIRS: &[(CellSlot, &str)] = &[
    (CellSlot::new("btc", "B5"), "BTCUSDT"),
    (CellSlot::new("eth", "B6"), "ETHUSDT"),
    (CellSlot::new("bnb", "B7"), "BNBUSDT"),
];

/// Every published value.
pub fn cell_map() -> Vec<CellSlot> {
    let fixed = [GOLD_SJC, ETF_E1VFVN30, USDT_VND];
    fixed.into_iter().chain(CRYPTO_PAIRS.iter().map(|(slot, _)| *slot)).collect()
}

pub fn cell_address(source_id: &str) -> Option<&'static str> {
    cell_map().into_iter().find(|slot| slot.source_id == source_id).map(|slot| slot.cell)
}

/// The SJC board quotes thousand VND with dot grouping (`83.500`).
#[cfg(feature = "browser")]
pub fn gold_job(sheet_name: &str, renderer: Arc<dyn PageRenderer>) -> Job {
    let source = RetailGoldSource::new(RetailPageConfig::sjc(), renderer);
    let profile = NormalizeProfile::localized(Currency::Vnd).with_scale(Decimal::from(1000));
    Job::new(GOLD_JOB).with_source(SourceBinding::direct(Arc::new(source), profile, GOLD_SJC.target(sheet_name)))
}

/// The chart API flips between VND and thousand VND; the unit correction
/// brings both to whole VND.
pub fn etf_job(sheet_name: &str, fetcher: Arc<dyn HttpFetcher>) -> Job {
    let source = OhlcSeriesSource::new(OhlcConfig::e1vfvn30(), fetcher);
    let profile = NormalizeProfile::plain(Currency::Vnd).with_unit_correction(UnitCorrection::thousands());
    Job::new(ETF_JOB).with_source(SourceBinding::direct(Arc::new(source), profile, ETF_E1VFVN30.target(sheet_name)))
}

/// USDT/VND first, then every pair converted with it.
pub fn crypto_job(sheet_name: &str, fetcher: Arc<dyn HttpFetcher>) -> Job {
    let rate_source = SimplePriceSource::new(SimplePriceConfig::usdt_vnd(), fetcher.clone());
    let mut job = Job::new(CRYPTO_JOB).with_rate(RateBinding {
        source: Arc::new(rate_source),
        profile: NormalizeProfile::plain(Currency::Vnd),
        base: Currency::Usdt,
        target: Some(USDT_VND.target(sheet_name)),
    });

    for (slot, symbol) in CRYPTO_PAIRS {
        let source = SpotTickerSource::new(TickerConfig::binance(slot.source_id, symbol), fetcher.clone());
        job = job.with_source(SourceBinding::converted(
            Arc::new(source),
            NormalizeProfile::plain(Currency::Usdt),
            slot.target(sheet_name),
        ));
    }
    job
}

/// Every job in startup order. The browser job goes first so the heavy
/// launch happens before anything else is in flight.
#[cfg(feature = "browser")]
pub fn all_jobs(sheet_name: &str, fetcher: Arc<dyn HttpFetcher>, renderer: Arc<dyn PageRenderer>) -> Vec<Job> {
    vec![
        gold_job(sheet_name, renderer),
        etf_job(sheet_name, fetcher.clone()),
        crypto_job(sheet_name, fetcher),
    ]
}

/// Every REST job in startup order.
#[cfg(not(feature = "browser"))]
pub fn all_jobs(sheet_name: &str, fetcher: Arc<dyn HttpFetcher>) -> Vec<Job> {
    vec![etf_job(sheet_name, fetcher.clone()), crypto_job(sheet_name, fetcher)]
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::orchestrator::Pricing;
    use crate::retrieve::FetchError;
    use async_trait::async_trait;
    use serde_json::Value;

    struct Unused;

    #[cfg(feature = "browser")]
    struct NoPage;

    #[cfg(feature = "browser")]
    #[async_trait]
    impl PageRenderer for NoPage {
        async fn render(&self, request: &crate::browser::RenderRequest) -> Result<String, crate::browser::BrowserError> {
            Err(crate::browser::BrowserError::LaunchFailed(format!("not rendering {}", request.url)))
        }
    }

    #[async_trait]
    impl HttpFetcher for Unused {
        async fn get_json(&self, url: &str, _query: &[(&str, String)]) -> Result<Value, FetchError> {
            Err(FetchError::Client(format!("unexpected call to {url}")))
        }

        async fn get_text(&self, url: &str) -> Result<String, FetchError> {
            Err(FetchError::Client(format!("unexpected call to {url}")))
        }
    }

    #[test]
    fn cells_are_unique() {
        let map = cell_map();
        let mut cells: Vec<&str> = map.iter().map(|slot| slot.cell).collect();
        cells.sort_unstable();
        cells.dedup();
        assert_eq!(cells.len(), map.len());
        assert_eq!(cell_address("sol"), None);
    }

    fn published(job: &Job) -> Vec<(String, CellTarget)> {
        let rate = job
            .rate
            .iter()
            .filter_map(|r| r.target.clone().map(|t| (r.source.id().to_string(), t)));
        let sources = job.sources.iter().map(|b| (b.source.id().to_string(), b.target.clone()));
        rate.chain(sources).collect()
    }

    #[test]
    fn every_source_writes_its_own_cell() {
        let mut jobs = vec![etf_job("Prices", Arc::new(Unused)), crypto_job("Prices", Arc::new(Unused))];
        #[cfg(feature = "browser")]
        jobs.push(gold_job("Prices", Arc::new(NoPage)));

        let mut seen = 0;
        for job in &jobs {
            for (id, target) in published(job) {
                assert_eq!(cell_address(&id), Some(target.cell_address.as_str()), "{id}");
                seen += 1;
            }
        }
        let expected = if cfg!(feature = "browser") { cell_map().len() } else { cell_map().len() - 1 };
        assert_eq!(seen, expected);
    }

    #[test]
    fn crypto_job_converts_every_pair() {
        let job = crypto_job("Prices", Arc::new(Unused));
        let rate = job.rate.as_ref().unwrap();
        assert_eq!(rate.source.id(), "usdt_vnd");
        assert_eq!(rate.target, Some(CellTarget::new("Prices", "B4")));

        assert_eq!(job.sources.len(), CRYPTO_PAIRS.len());
        assert!(job.sources.iter().all(|b| b.pricing == Pricing::ConvertedByRate));
        let cells: Vec<String> = job.sources.iter().map(|b| b.target.cell_address.clone()).collect();
        assert_eq!(cells, vec!["B5", "B6", "B7"]);
    }

    #[test]
    fn etf_job_uses_the_unit_correction() {
        let job = etf_job("Prices", Arc::new(Unused));
        let binding = &job.sources[0];
        assert_eq!(binding.profile.unit_correction, Some(UnitCorrection::thousands()));
        assert_eq!(binding.target, CellTarget::new("Prices", "B3"));
        assert!(job.rate.is_none());
    }
}
