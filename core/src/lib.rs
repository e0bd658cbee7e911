//! netcap-bench-core: process orchestration for network throughput benchmarks
//!
//! This crate runs a throughput-measurement server alongside a packet
//! capture for a fixed duration and stops them in order, including:
//!
//! - Benchmark configuration and validation
//! - Command lines for iperf3 and tcpdump
//! - Owned child process handles with explicit stop outcomes
//! - A cancellable run timer
//! - The orchestrator and its run report
//! - A paced TCP traffic sender for the client side
//!
//! The capture tool normally needs root (or `CAP_NET_RAW`). That is a
//! deployment requirement; the orchestrator only warns when it is missing.

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod config;
pub mod error;
pub mod orchestrator;
pub mod preflight;
pub mod process;
pub mod sender;
pub mod timer;
pub mod tool;

pub use config::*;
pub use error::*;
pub use orchestrator::{
    CaptureFileStatus, LifecycleEvent, Orchestrator, OrchestratorBuilder, RunReport, RunState,
    StopRecord,
};
pub use process::{ManagedProcess, ProcessRole, StopOutcome};
pub use sender::{SendReport, SenderConfig, TrafficSender};
pub use timer::{CancellableTimer, TimerOutcome};
pub use tool::{Iperf3Server, TcpdumpCapture, ToolCommand, ToolSpec};
