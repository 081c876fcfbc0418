//! # Loggers Module
//!
//! Structured logging for every binary in the workspace. Library code only
//! emits `tracing` events; installing the subscriber is left to `main`.

#![forbid(unsafe_code)]
#![warn(rust_2018_idioms, unused_qualifications)]

/// Console + rolling JSON file subscriber.
pub mod tracing_setup;

pub use tracing_setup::{setup_logging, LogSettings, LoggingError};
