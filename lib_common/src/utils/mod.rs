//! # Utilities Module
//!
//! Helpers that do not belong to the pipeline itself.
//!
//! ## Contained Modules:
//!
//! - **`misc`**: process information (`sys_info`) used for startup logging
//!   and log file naming.

#![forbid(unsafe_code)]
#![warn(rust_2018_idioms, unused_qualifications)]

/// Miscellaneous helpers.
pub mod misc;

pub use misc::sys_info::{get_process_info, ProcessInfo, ProcessInfoError};
