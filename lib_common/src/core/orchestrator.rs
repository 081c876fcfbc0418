//! # Ingestion Orchestrator
//!
//! Runs one job start to finish: every source in the job is extracted,
//! normalized, converted where needed and written to its fixed cell. Nothing
//! persists between runs except what the sources themselves hold (e.g. the
//! browser manager).
//!
//! ## Ordering within a job:
//! 1. `Direct` sources, each isolated from the others.
//! 2. Phase 1: the job's rate source, if any. Its value is optionally
//!    published to its own cell.
//! 3. Phase 2: `ConvertedByRate` sources. They only run when phase 1 produced
//!    a rate; otherwise each is reported as `MissingRate` without being
//!    extracted.
//!
//! Every failure becomes an `Outcome::Failed` in the `JobReport`. No failure
//! escapes `run_job`.

use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use tokio::time::Instant;
use tracing::{debug, info, warn};

use crate::connections::sheets::{format_for_sheet, CellSink};
use crate::core::conversion::{convert, ConversionError};
use crate::core::normalizer::{normalize, NormalizeProfile};
use crate::core::report::{JobReport, Outcome, PipelineError, SourceOutcome};
use crate::ingestors::PriceSource;
use crate::markets::model::{CanonicalPrice, CellTarget, Currency, ExchangeRate};

/// How a source's normalized price reaches the sheet.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Pricing {
    /// Written as normalized.
    Direct,
    /// Multiplied by the job's exchange rate first.
    ConvertedByRate,
}

/// A source together with everything needed to publish it.
#[derive(Clone)]
pub struct SourceBinding {
    pub source: Arc<dyn PriceSource>,
    pub profile: NormalizeProfile,
    pub pricing: Pricing,
    pub target: CellTarget,
}

impl SourceBinding {
    pub fn direct(source: Arc<dyn PriceSource>, profile: NormalizeProfile, target: CellTarget) -> Self {
        Self {
            source,
            profile,
            pricing: Pricing::Direct,
            target,
        }
    }

    pub fn converted(source: Arc<dyn PriceSource>, profile: NormalizeProfile, target: CellTarget) -> Self {
        Self {
            source,
            profile,
            pricing: Pricing::ConvertedByRate,
            target,
        }
    }
}

/// The phase-1 source of a job with converted prices.
#[derive(Clone)]
pub struct RateBinding {
    pub source: Arc<dyn PriceSource>,
    /// Its currency becomes the rate's quote currency.
    pub profile: NormalizeProfile,
    /// Currency the dependent prices are quoted in.
    pub base: Currency,
    /// Where the rate itself is published, if anywhere.
    pub target: Option<CellTarget>,
}

/// A named group of sources sharing a trigger.
#[derive(Clone)]
pub struct Job {
    pub name: String,
    pub rate: Option<RateBinding>,
    pub sources: Vec<SourceBinding>,
}

impl Job {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            rate: None,
            sources: Vec::new(),
        }
    }

    pub fn with_rate(mut self, rate: RateBinding) -> Self {
        self.rate = Some(rate);
        self
    }

    pub fn with_source(mut self, binding: SourceBinding) -> Self {
        self.sources.push(binding);
        self
    }

    /// Every source id in execution order, rate source included.
    pub fn source_ids(&self) -> Vec<String> {
        let direct = self.bindings(Pricing::Direct).map(|b| b.source.id().to_string());
        let rate = self.rate.iter().map(|r| r.source.id().to_string());
        let dependent = self.bindings(Pricing::ConvertedByRate).map(|b| b.source.id().to_string());
        direct.chain(rate).chain(dependent).collect()
    }

    fn bindings(&self, pricing: Pricing) -> impl Iterator<Item = &SourceBinding> + '_ {
        self.sources.iter().filter(move |b| b.pricing == pricing)
    }
}

/// Drives jobs against one sink.
pub struct Orchestrator {
    sink: Arc<dyn CellSink>,
    decimal_separator: char,
}

impl Orchestrator {
    pub fn new(sink: Arc<dyn CellSink>) -> Self {
        Self {
            sink,
            decimal_separator: '.',
        }
    }

    /// Separator used when pre-formatting values for the sheet's locale.
    pub fn with_decimal_separator(mut self, separator: char) -> Self {
        self.decimal_separator = separator;
        self
    }

    /// Runs every job once, strictly one after another.
    pub async fn run_all_sequential(&self, jobs: &[Job]) -> Vec<JobReport> {
        let mut reports = Vec::with_capacity(jobs.len());
        for job in jobs {
            reports.push(self.run_job(job).await);
        }
        reports
    }

    /// Runs one job. Never fails; see the report for per-source results.
    pub async fn run_job(&self, job: &Job) -> JobReport {
        let started_at = Utc::now();
        let clock = Instant::now();
        info!(job = %job.name, sources = job.sources.len(), "job started");

        let mut outcomes = Vec::with_capacity(job.sources.len() + 1);

        for binding in job.bindings(Pricing::Direct) {
            let started = Instant::now();
            let result = self.run_source(binding, None).await;
            outcomes.push(record(&job.name, binding.source.id(), started, result));
        }

        let rate = match &job.rate {
            Some(rate_binding) => {
                let started = Instant::now();
                let result = self.run_rate(rate_binding).await;
                let (outcome_result, rate) = match result {
                    Ok((published, rate)) => (published, Some(rate)),
                    Err(e) => (Err(e), None),
                };
                outcomes.push(record(&job.name, rate_binding.source.id(), started, outcome_result));
                rate
            }
            None => None,
        };

        for binding in job.bindings(Pricing::ConvertedByRate) {
            let started = Instant::now();
            let result = match &rate {
                Some(rate) => self.run_source(binding, Some(rate)).await,
                None => {
                    debug!(job = %job.name, source = binding.source.id(), "no rate this run, skipping extraction");
                    Err(PipelineError::from(ConversionError::MissingRate {
                        source_id: binding.source.id().to_string(),
                        base: binding.profile.currency,
                        quote: Currency::Vnd,
                    }))
                }
            };
            outcomes.push(record(&job.name, binding.source.id(), started, result));
        }

        let report = JobReport {
            job: job.name.clone(),
            started_at,
            elapsed: clock.elapsed(),
            outcomes,
        };
        report.log_summary();
        report
    }

    async fn run_source(
        &self,
        binding: &SourceBinding,
        rate: Option<&ExchangeRate>,
    ) -> Result<Outcome, PipelineError> {
        let reading = binding.source.extract().await?;
        let price = normalize(&reading, &binding.profile)?;
        let price = match binding.pricing {
            Pricing::Direct => price,
            Pricing::ConvertedByRate => convert(&price, rate)?,
        };
        self.publish(&price, &binding.target).await
    }

    /// The rate survives a failed write of its own cell; only extraction,
    /// normalization or an unusable value withhold it from phase 2.
    async fn run_rate(
        &self,
        binding: &RateBinding,
    ) -> Result<(Result<Outcome, PipelineError>, ExchangeRate), PipelineError> {
        let reading = binding.source.extract().await?;
        let price = normalize(&reading, &binding.profile)?;
        let rate = ExchangeRate::from_price(&price, binding.base)?;
        debug!(source = %price.source_id, base = %rate.base, quote = %rate.quote, rate = %rate.rate, "exchange rate ready");

        let published = match &binding.target {
            Some(target) => self.publish(&price, target).await,
            None => Ok(Outcome::Computed { amount: price.amount }),
        };
        Ok((published, rate))
    }

    async fn publish(&self, price: &CanonicalPrice, target: &CellTarget) -> Result<Outcome, PipelineError> {
        let value = format_for_sheet(price.amount, self.decimal_separator);
        self.sink
            .set_cell(&target.sheet_name, &target.cell_address, &value)
            .await?;
        Ok(Outcome::Written {
            cell: target.clone(),
            value,
        })
    }
}

fn record(job: &str, source_id: &str, started: Instant, result: Result<Outcome, PipelineError>) -> SourceOutcome {
    let elapsed: Duration = started.elapsed();
    let elapsed_ms = elapsed.as_millis() as u64;
    let outcome = match result {
        Ok(outcome) => {
            match &outcome {
                Outcome::Written { cell, value } => {
                    info!(job, source = source_id, cell = %cell, value = %value, elapsed_ms, "price written")
                }
                Outcome::Computed { amount } => {
                    info!(job, source = source_id, amount = %amount, elapsed_ms, "price computed")
                }
                Outcome::Failed(_) => {}
            }
            outcome
        }
        Err(error) => {
            warn!(job, source = source_id, kind = %error.kind(), error = %error, elapsed_ms, "source failed");
            Outcome::Failed(error)
        }
    };
    SourceOutcome {
        source_id: source_id.to_string(),
        elapsed,
        outcome,
    }
}
