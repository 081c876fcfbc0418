//! # Process Information
//!
//! Identity of the running daemon: executable, pid and host. Logged once at
//! startup and used to name the rolling log files.

use std::path::Path;
use std::{env, fmt};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ProcessInfoError {
    #[error("I/O error occurred: {0}")]
    IoError(#[from] std::io::Error),

    #[error("executable path {0} has no file name")]
    NoBasename(String),
}

/// # Process Information
///
/// Snapshot taken once; nothing here changes while the process runs.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProcessInfo {
    /// The full path to the current executable.
    pub process_current_exe: String,
    /// Executable file name without extension.
    pub process_basename: String,
    pub process_pid: u32,
    pub process_host: String,
    pub started_at: DateTime<Utc>,
}

impl fmt::Display for ProcessInfo {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} (pid {}) on {} from {}, started {}",
            self.process_basename,
            self.process_pid,
            self.process_host,
            self.process_current_exe,
            self.started_at.to_rfc3339(),
        )
    }
}

/// File stem of `path`, e.g. `price_sync` for `/usr/local/bin/price_sync`.
pub fn basename_of(path: &Path) -> Result<String, ProcessInfoError> {
    path.file_stem()
        .map(|stem| stem.to_string_lossy().into_owned())
        .ok_or_else(|| ProcessInfoError::NoBasename(path.display().to_string()))
}

/// # Get Process Information
///
/// Collects the executable path, basename, pid and hostname of the current
/// process. An unreadable hostname is reported as `unknown` rather than
/// failing.
pub fn get_process_info() -> Result<ProcessInfo, ProcessInfoError> {
    let current_exe = env::current_exe()?;
    let basename = basename_of(&current_exe)?;
    let host = hostname::get()
        .map(|h| h.to_string_lossy().into_owned())
        .unwrap_or_else(|_| "unknown".to_string());

    Ok(ProcessInfo {
        process_current_exe: current_exe.to_string_lossy().into_owned(),
        process_basename: basename,
        process_pid: std::process::id(),
        process_host: host,
        started_at: Utc::now(),
    })
}
