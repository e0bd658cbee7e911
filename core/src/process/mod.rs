//! Owned handles for the child processes of a run
//!
//! A [`ManagedProcess`] is the only way the orchestrator touches a child:
//!
//! 1. `start` spawns it without waiting for readiness
//! 2. `signal_stop` delivers its catchable stop signal once
//! 3. `wait_exit` optionally reaps it within a bound
//!
//! Dropping a handle that was never signalled sends the stop signal, so a
//! child is never left running when a run bails out early.

mod handle;

pub use handle::{ManagedProcess, StopOutcome};

use std::fmt;

/// Which child a handle belongs to
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ProcessRole {
    /// Throughput-measurement server
    Server,
    /// Packet capture
    Capture,
}

impl ProcessRole {
    /// Lowercase label used in logs and errors
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Server => "server",
            Self::Capture => "capture",
        }
    }
}

impl fmt::Display for ProcessRole {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
