//! Analysis of benchmark artifacts
//!
//! This crate turns what a run leaves behind into tables and plots:
//!
//! - Capture files, via `tshark` field extraction, into per-connection lifetimes
//! - iperf3 client logs into congestion-window series
//! - CSV exports and PNG plots of both

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod connections;
pub mod cwnd;
pub mod error;
pub mod export;
pub mod plot;
pub mod tshark;

pub use connections::{ConnectionKey, ConnectionSummary, ConnectionTracker, TcpFlags};
pub use cwnd::{CwndSample, CwndSeries};
pub use error::{ReportError, ReportResult};
pub use export::CsvExporter;
pub use plot::{ConnectionPlotter, CwndPlotter, Marker};
pub use tshark::TsharkExtractor;
