//! # Job Reports
//!
//! Per-source outcomes of one job run. A failure is confined to its own
//! source: the report records it, logs it with its category and moves on.

use std::fmt;
use std::time::Duration;

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::Serialize;
use thiserror::Error;
use tracing::{info, warn};

use crate::connections::sheets::SinkError;
use crate::core::conversion::ConversionError;
use crate::core::normalizer::NormalizeError;
use crate::ingestors::ExtractError;
use crate::markets::model::CellTarget;

/// Stage-tagged failure of a single source.
#[derive(Debug, Error)]
pub enum PipelineError {
    #[error("extract: {0}")]
    Extract(#[from] ExtractError),
    #[error("normalize: {0}")]
    Normalize(#[from] NormalizeError),
    #[error("convert: {0}")]
    Conversion(#[from] ConversionError),
    #[error("sink: {0}")]
    Sink(#[from] SinkError),
}

/// Flat failure category, stable across error detail changes. Used in logs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    LaunchFailed,
    Timeout,
    NotFound,
    EmptyResponse,
    FetchFailed,
    BrowserFailed,
    NotNumeric,
    InvalidValue,
    MissingRate,
    SinkWriteFailed,
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            ErrorKind::LaunchFailed => "launch_failed",
            ErrorKind::Timeout => "timeout",
            ErrorKind::NotFound => "not_found",
            ErrorKind::EmptyResponse => "empty_response",
            ErrorKind::FetchFailed => "fetch_failed",
            ErrorKind::BrowserFailed => "browser_failed",
            ErrorKind::NotNumeric => "not_numeric",
            ErrorKind::InvalidValue => "invalid_value",
            ErrorKind::MissingRate => "missing_rate",
            ErrorKind::SinkWriteFailed => "sink_write_failed",
        };
        f.write_str(label)
    }
}

impl PipelineError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            PipelineError::Extract(e) => match e {
                ExtractError::LaunchFailed { .. } => ErrorKind::LaunchFailed,
                ExtractError::Timeout { .. } => ErrorKind::Timeout,
                ExtractError::NotFound { .. } => ErrorKind::NotFound,
                ExtractError::EmptyResponse { .. } => ErrorKind::EmptyResponse,
                ExtractError::Browser { .. } => ErrorKind::BrowserFailed,
                ExtractError::Fetch { .. } => ErrorKind::FetchFailed,
            },
            PipelineError::Normalize(NormalizeError::NotNumeric { .. }) => ErrorKind::NotNumeric,
            PipelineError::Normalize(_) => ErrorKind::InvalidValue,
            PipelineError::Conversion(ConversionError::MissingRate { .. }) => ErrorKind::MissingRate,
            PipelineError::Conversion(_) => ErrorKind::InvalidValue,
            PipelineError::Sink(_) => ErrorKind::SinkWriteFailed,
        }
    }
}

/// What happened to one source in one run.
#[derive(Debug)]
pub enum Outcome {
    /// The value was written to the sheet.
    Written { cell: CellTarget, value: String },
    /// Produced and converted, but the source has no cell (e.g. a rate that is
    /// only used for conversion).
    Computed { amount: Decimal },
    Failed(PipelineError),
}

#[derive(Debug)]
pub struct SourceOutcome {
    pub source_id: String,
    pub elapsed: Duration,
    pub outcome: Outcome,
}

impl SourceOutcome {
    pub fn is_failure(&self) -> bool {
        matches!(self.outcome, Outcome::Failed(_))
    }

    pub fn error(&self) -> Option<&PipelineError> {
        match &self.outcome {
            Outcome::Failed(e) => Some(e),
            _ => None,
        }
    }
}

/// Everything one job run produced, in execution order.
#[derive(Debug)]
pub struct JobReport {
    pub job: String,
    pub started_at: DateTime<Utc>,
    pub elapsed: Duration,
    pub outcomes: Vec<SourceOutcome>,
}

impl JobReport {
    pub fn outcome(&self, source_id: &str) -> Option<&SourceOutcome> {
        self.outcomes.iter().find(|o| o.source_id == source_id)
    }

    pub fn written(&self) -> usize {
        self.outcomes
            .iter()
            .filter(|o| matches!(o.outcome, Outcome::Written { .. }))
            .count()
    }

    pub fn failed(&self) -> usize {
        self.outcomes.iter().filter(|o| o.is_failure()).count()
    }

    pub fn is_clean(&self) -> bool {
        self.failed() == 0
    }

    /// One summary line per run; failures are already logged individually.
    pub fn log_summary(&self) {
        let elapsed_ms = self.elapsed.as_millis() as u64;
        if self.is_clean() {
            info!(job = %self.job, written = self.written(), elapsed_ms, "job finished");
        } else {
            let failed: Vec<String> = self
                .outcomes
                .iter()
                .filter_map(|o| o.error().map(|e| format!("{}:{}", o.source_id, e.kind())))
                .collect();
            warn!(
                job = %self.job,
                written = self.written(),
                failed = self.failed(),
                failures = %failed.join(","),
                elapsed_ms,
                "job finished with failures"
            );
        }
    }
}
