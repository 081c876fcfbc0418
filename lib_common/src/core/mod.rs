//! # Core Pipeline Module
//!
//! The part of `lib_common` that turns raw readings into published cells.
//! Everything here is source-agnostic: adapters plug in through the
//! `PriceSource` trait and the sheet through `CellSink`.
//!
//! ## Contained Modules:
//!
//! - **`normalizer`**: Pure parsing of locale-formatted text and JSON numbers
//!   into canonical amounts, including the per-source unit correction.
//! - **`conversion`**: Stablecoin to local currency conversion using the rate
//!   fetched in the same run.
//! - **`orchestrator`**: Sequences one job (direct sources, rate phase,
//!   dependent sources) and writes every successful value.
//! - **`report`**: Per-source outcomes and the error taxonomy used in logs.

#![forbid(unsafe_code)]
#![warn(rust_2018_idioms, unused_qualifications)]

pub mod conversion;
pub mod normalizer;
pub mod orchestrator;
pub mod report;

pub use conversion::{convert, ConversionError};
pub use normalizer::{normalize, NormalizeError, NormalizeProfile, NumberFormat, UnitCorrection};
pub use orchestrator::{Job, Orchestrator, Pricing, RateBinding, SourceBinding};
pub use report::{ErrorKind, JobReport, Outcome, PipelineError, SourceOutcome};
