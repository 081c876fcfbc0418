//! # Connections Module
//!
//! Outbound collaborators that are not price sources.
//!
//! ## Contained Modules:
//!
//! - **`sheets`**: the `CellSink` capability and its Google Sheets client.
//! - **`liveness`**: periodic health-check ping.

#![forbid(unsafe_code)]
#![warn(rust_2018_idioms, unused_qualifications)]

/// Spreadsheet cell writes.
pub mod sheets;

/// External liveness ping.
pub mod liveness;

pub use liveness::LivenessProbe;
pub use sheets::{format_for_sheet, CellSink, SheetsClient, SinkError};
