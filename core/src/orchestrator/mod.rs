//! Orchestrator for the benchmark run lifecycle
//!
//! The Orchestrator drives one fixed sequence:
//! - Start the throughput server, then the packet capture
//! - Let both run for the configured duration
//! - Stop the capture, then the server
//!
//! Shutdown order is fixed so the capture never records the server going
//! away.
//!
//! # Example
//!
//! ```ignore
//! use netcap_bench_core::{BenchmarkConfig, OrchestratorBuilder};
//!
//! let orchestrator = OrchestratorBuilder::new()
//!     .config(BenchmarkConfig::new(8080).with_interface("lo"))
//!     .build()?;
//!
//! let report = orchestrator.run_with_signal_handling().await?;
//! ```

mod builder;
mod executor;
mod report;
mod state;

pub use builder::OrchestratorBuilder;
pub use executor::Orchestrator;
pub use report::{CaptureFileStatus, LifecycleEvent, RunReport, StopRecord};
pub use state::RunState;

#[cfg(test)]
mod tests;
