//! Error types for netcap-bench-report

use std::process::ExitStatus;

use thiserror::Error;

/// Analysis error type
#[derive(Error, Debug)]
pub enum ReportError {
    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// CSV read or write error
    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    /// An external tool could not be started
    #[error("failed to start `{program}`: {source}")]
    Spawn {
        /// Program that was executed
        program: String,
        /// Underlying spawn error
        #[source]
        source: std::io::Error,
    },

    /// tshark ran but reported failure
    #[error("tshark failed ({0})")]
    Tshark(ExitStatus),

    /// Drawing a plot failed
    #[error("plot error: {0}")]
    Plot(String),

    /// Nothing to analyse
    #[error("no {0} found in input")]
    Empty(&'static str),
}

impl ReportError {
    pub(crate) fn plot(err: impl std::fmt::Display) -> Self {
        Self::Plot(err.to_string())
    }
}

/// Result type alias
pub type ReportResult<T> = std::result::Result<T, ReportError>;
