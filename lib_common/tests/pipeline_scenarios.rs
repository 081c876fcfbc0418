//! End-to-end pipeline runs against fake upstreams and a mocked sheet.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use mockall::{mock, predicate::*};
use serde_json::{json, Value};

use lib_common::connections::sheets::{CellSink, SinkError};
use lib_common::core::normalizer::NormalizeProfile;
use lib_common::ingestors::{ExtractError, PriceSource};
use lib_common::markets::catalog::{crypto_job, etf_job};
use lib_common::markets::model::RawValue;
use lib_common::retrieve::{FetchError, HttpFetcher};
use lib_common::{CellTarget, Currency, ErrorKind, Job, Orchestrator, Outcome, RawReading, SourceBinding};

mock! {
    Sheet {}

    #[async_trait]
    impl CellSink for Sheet {
        async fn set_cell(&self, sheet_name: &str, cell_address: &str, value: &str) -> Result<(), SinkError>;
    }
}

/// Answers by URL and `symbol` query, like the real endpoints would.
struct Upstream {
    rate: Option<Value>,
    calls: AtomicUsize,
}

impl Upstream {
    fn new(rate: Option<Value>) -> Arc<Self> {
        Arc::new(Self {
            rate,
            calls: AtomicUsize::new(0),
        })
    }
}

#[async_trait]
impl HttpFetcher for Upstream {
    async fn get_json(&self, url: &str, query: &[(&str, String)]) -> Result<Value, FetchError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        let symbol = query
            .iter()
            .find(|(k, _)| *k == "symbol")
            .map(|(_, v)| v.as_str())
            .unwrap_or_default();

        if url.contains("simple/price") {
            return self.rate.clone().ok_or_else(|| FetchError::Status {
                url: url.to_string(),
                status: 429,
                body: "rate limited".to_string(),
            });
        }
        if url.contains("ohlcs") {
            return Ok(json!({"t": [1, 2, 3], "c": [35990, 36010, 36050]}));
        }
        match symbol {
            "BTCUSDT" => Ok(json!({"symbol": "BTCUSDT", "price": "65000.5"})),
            "ETHUSDT" => Ok(json!({"symbol": "ETHUSDT", "price": "3000"})),
            _ => Err(FetchError::Status {
                url: url.to_string(),
                status: 400,
                body: "{\"code\":-1121,\"msg\":\"Invalid symbol.\"}".to_string(),
            }),
        }
    }

    async fn get_text(&self, url: &str) -> Result<String, FetchError> {
        Err(FetchError::Client(format!("no text endpoint at {url}")))
    }
}

#[derive(Default)]
struct RecordingSheet {
    writes: Mutex<Vec<(String, String)>>,
    unavailable: Option<&'static str>,
}

impl RecordingSheet {
    fn rejecting(cell: &'static str) -> Self {
        Self {
            unavailable: Some(cell),
            ..Self::default()
        }
    }

    fn cells(&self) -> Vec<(String, String)> {
        self.writes.lock().unwrap().clone()
    }
}

#[async_trait]
impl CellSink for RecordingSheet {
    async fn set_cell(&self, sheet_name: &str, cell_address: &str, value: &str) -> Result<(), SinkError> {
        if self.unavailable == Some(cell_address) {
            return Err(SinkError::Rejected {
                range: format!("{sheet_name}!{cell_address}"),
                status: 503,
                body: "backend unavailable".to_string(),
            });
        }
        self.writes
            .lock()
            .unwrap()
            .push((cell_address.to_string(), value.to_string()));
        Ok(())
    }
}

fn cell(address: &str, value: &str) -> (String, String) {
    (address.to_string(), value.to_string())
}

#[tokio::test]
async fn scenario_a_etf_last_close_is_written_once() {
    let mut sheet = MockSheet::new();
    sheet
        .expect_set_cell()
        .with(eq("Prices"), eq("B3"), eq("36050"))
        .times(1)
        .returning(|_, _, _| Ok(()));

    let orchestrator = Orchestrator::new(Arc::new(sheet));
    let report = orchestrator.run_job(&etf_job("Prices", Upstream::new(None))).await;

    assert!(report.is_clean());
    assert_eq!(report.written(), 1);
}

#[tokio::test]
async fn scenario_b_btc_is_converted_with_the_fetched_rate() {
    let sheet = Arc::new(RecordingSheet::default());
    let orchestrator = Orchestrator::new(sheet.clone());
    let upstream = Upstream::new(Some(json!({"tether": {"vnd": 25500}})));

    let report = orchestrator.run_job(&crypto_job("Prices", upstream)).await;

    let cells = sheet.cells();
    assert!(cells.contains(&cell("B4", "25500")));
    assert!(cells.contains(&cell("B5", "1657512750")));
    assert!(cells.contains(&cell("B6", "76500000")));
    // BNB is rejected upstream; its siblings are unaffected.
    assert_eq!(report.failed(), 1);
    assert_eq!(
        report.outcome("bnb").and_then(|o| o.error()).map(|e| e.kind()),
        Some(ErrorKind::FetchFailed)
    );
}

#[tokio::test]
async fn rejected_rate_cell_still_feeds_conversions() {
    let sheet = Arc::new(RecordingSheet::rejecting("B4"));
    let orchestrator = Orchestrator::new(sheet.clone());
    let upstream = Upstream::new(Some(json!({"tether": {"vnd": 25500}})));

    let report = orchestrator.run_job(&crypto_job("Prices", upstream)).await;

    assert_eq!(
        report.outcome("usdt_vnd").and_then(|o| o.error()).map(|e| e.kind()),
        Some(ErrorKind::SinkWriteFailed)
    );
    assert_eq!(sheet.cells(), vec![cell("B5", "1657512750"), cell("B6", "76500000")]);
    for id in ["btc", "eth"] {
        assert!(report.outcome(id).map(|o| !o.is_failure()).unwrap_or(false), "{id}");
    }
    assert_eq!(
        report.outcome("bnb").and_then(|o| o.error()).map(|e| e.kind()),
        Some(ErrorKind::FetchFailed)
    );
}

#[tokio::test]
async fn rate_failure_blocks_conversions_but_not_independent_sources() {
    let sheet = Arc::new(RecordingSheet::default());
    let orchestrator = Orchestrator::new(sheet.clone());
    let upstream = Upstream::new(None);

    let mut job = crypto_job("Prices", upstream.clone());
    job.sources.extend(etf_job("Prices", upstream.clone()).sources);

    let report = orchestrator.run_job(&job).await;

    // One call for the ETF, one for the rate; no ticker was queried.
    assert_eq!(upstream.calls.load(Ordering::SeqCst), 2);
    assert_eq!(sheet.cells(), vec![cell("B3", "36050")]);
    for id in ["btc", "eth", "bnb"] {
        let kind = report.outcome(id).and_then(|o| o.error()).map(|e| e.kind());
        assert_eq!(kind, Some(ErrorKind::MissingRate), "{id}");
    }
    assert_eq!(
        report.outcome("usdt_vnd").and_then(|o| o.error()).map(|e| e.kind()),
        Some(ErrorKind::FetchFailed)
    );
}

#[tokio::test]
async fn rewriting_the_same_price_is_a_plain_overwrite() {
    let mut sheet = MockSheet::new();
    sheet
        .expect_set_cell()
        .with(eq("Prices"), eq("B3"), eq("36050"))
        .times(2)
        .returning(|_, _, _| Ok(()));

    let orchestrator = Orchestrator::new(Arc::new(sheet));
    let job = etf_job("Prices", Upstream::new(None));
    let reports = orchestrator.run_all_sequential(&[job.clone(), job]).await;

    assert_eq!(reports.len(), 2);
    assert!(reports.iter().all(|r| r.written() == 1));
}

#[tokio::test]
async fn sink_failures_are_reported_per_source() {
    let mut sheet = MockSheet::new();
    sheet
        .expect_set_cell()
        .times(1)
        .returning(|_, cell, _| Err(SinkError::InvalidCell(cell.to_string())));

    let orchestrator = Orchestrator::new(Arc::new(sheet));
    let report = orchestrator.run_job(&etf_job("Prices", Upstream::new(None))).await;

    assert_eq!(
        report.outcome("etf_e1vfvn30").and_then(|o| o.error()).map(|e| e.kind()),
        Some(ErrorKind::SinkWriteFailed)
    );
}

struct NeverFound;

#[async_trait]
impl PriceSource for NeverFound {
    fn id(&self) -> &str {
        "never_found"
    }

    async fn extract(&self) -> Result<RawReading, ExtractError> {
        Err(ExtractError::NotFound {
            source_id: "never_found".to_string(),
            detail: "no label".to_string(),
        })
    }
}

struct Constant(&'static str, &'static str);

#[async_trait]
impl PriceSource for Constant {
    fn id(&self) -> &str {
        self.0
    }

    async fn extract(&self) -> Result<RawReading, ExtractError> {
        Ok(RawReading::now(self.0, RawValue::from(self.1)))
    }
}

#[tokio::test]
async fn failed_source_does_not_stop_its_job() {
    let sheet = Arc::new(RecordingSheet::default());
    let orchestrator = Orchestrator::new(sheet.clone());
    let job = Job::new("mixed")
        .with_source(SourceBinding::direct(
            Arc::new(NeverFound),
            NormalizeProfile::localized(Currency::Vnd),
            CellTarget::new("Prices", "B2"),
        ))
        .with_source(SourceBinding::direct(
            Arc::new(Constant("other", "1.250.000")),
            NormalizeProfile::localized(Currency::Vnd),
            CellTarget::new("Prices", "B9"),
        ));

    let report = orchestrator.run_job(&job).await;

    assert_eq!(sheet.cells(), vec![cell("B9", "1250000")]);
    assert!(matches!(
        report.outcome("never_found").map(|o| &o.outcome),
        Some(Outcome::Failed(e)) if e.kind() == ErrorKind::NotFound
    ));
}

#[cfg(feature = "browser")]
mod rendered {
    use super::*;
    use lib_common::browser::{BrowserError, PageRenderer, RenderRequest};
    use lib_common::markets::catalog::gold_job;

    struct Page(Option<&'static str>);

    #[async_trait]
    impl PageRenderer for Page {
        async fn render(&self, request: &RenderRequest) -> Result<String, BrowserError> {
            self.0.map(str::to_string).ok_or_else(|| BrowserError::MarkerTimeout {
                url: request.url.clone(),
                selector: request.marker.clone(),
                timeout_secs: request.marker_timeout.as_secs(),
            })
        }
    }

    #[tokio::test]
    async fn scenario_c_unlabelled_page_writes_nothing_and_siblings_run() {
        let sheet = Arc::new(RecordingSheet::default());
        let orchestrator = Orchestrator::new(sheet.clone());
        let html = "<table><tr><td>Nhẫn 9999</td><td>82.100</td></tr></table>";

        let mut job = gold_job("Prices", Arc::new(Page(Some(html))));
        job.sources.extend(etf_job("Prices", Upstream::new(None)).sources);

        let report = orchestrator.run_job(&job).await;

        assert_eq!(
            report.outcome("gold_sjc").and_then(|o| o.error()).map(|e| e.kind()),
            Some(ErrorKind::NotFound)
        );
        assert_eq!(sheet.cells(), vec![cell("B3", "36050")]);
    }

    #[tokio::test]
    async fn labelled_gold_row_is_written_in_whole_dong() {
        let sheet = Arc::new(RecordingSheet::default());
        let orchestrator = Orchestrator::new(sheet.clone());
        let html = "<table><tr><td>Vàng miếng SJC 1L, 10L</td><td>83.500</td><td>85.500</td></tr></table>";

        let report = orchestrator.run_job(&gold_job("Prices", Arc::new(Page(Some(html))))).await;

        assert!(report.is_clean());
        assert_eq!(sheet.cells(), vec![cell("B2", "83500000")]);
    }

    #[tokio::test]
    async fn marker_timeout_is_logged_and_later_jobs_still_run() {
        let sheet = Arc::new(RecordingSheet::default());
        let orchestrator = Orchestrator::new(sheet.clone());
        let jobs = vec![
            gold_job("Prices", Arc::new(Page(None))),
            etf_job("Prices", Upstream::new(None)),
        ];

        let reports = orchestrator.run_all_sequential(&jobs).await;

        assert_eq!(
            reports[0].outcome("gold_sjc").and_then(|o| o.error()).map(|e| e.kind()),
            Some(ErrorKind::Timeout)
        );
        assert_eq!(reports[1].written(), 1);
        assert_eq!(sheet.cells(), vec![cell("B3", "36050")]);
    }
}
