//! Outcome of a single run

use std::path::PathBuf;
use std::process::ExitStatus;
use std::time::{Duration, Instant};

use crate::process::{ProcessRole, StopOutcome};
use crate::timer::TimerOutcome;

use super::state::RunState;

/// A state transition and when it happened
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LifecycleEvent {
    /// State entered
    pub state: RunState,
    /// Offset from the start of the run
    pub offset: Duration,
}

/// What happened when a child was asked to stop
#[derive(Debug, Clone, Copy)]
pub struct StopRecord {
    /// Which child
    pub role: ProcessRole,
    /// Process id of the child
    pub pid: u32,
    /// Offset from the start of the run at which the signal was issued
    pub offset: Duration,
    /// Delivery result
    pub outcome: StopOutcome,
    /// Exit status, when the child was reaped within the exit wait
    pub exit_status: Option<ExitStatus>,
}

/// Presence of the capture file after the run
///
/// Only existence and size are recorded; the file content is never read.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CaptureFileStatus {
    /// Expected path
    pub path: PathBuf,
    /// Size in bytes if the file exists
    pub size: Option<u64>,
}

impl CaptureFileStatus {
    /// Whether the file exists
    pub fn exists(&self) -> bool {
        self.size.is_some()
    }
}

/// Report of one orchestrated run
#[derive(Debug, Clone)]
pub struct RunReport {
    started_at: Instant,

    /// State transitions in order
    pub events: Vec<LifecycleEvent>,

    /// Server pid, if it was spawned
    pub server_pid: Option<u32>,

    /// Capture pid, if it was spawned
    pub capture_pid: Option<u32>,

    /// Stop attempts in the order they were made
    pub stops: Vec<StopRecord>,

    /// How the running phase ended
    pub timer: Option<TimerOutcome>,

    /// Child whose exit ended the running phase early, if any
    pub early_exit: Option<ProcessRole>,

    /// Children that exited before they were signalled, in detection order
    pub unexpected_exits: Vec<ProcessRole>,

    /// Capture file presence, checked after shutdown
    pub capture_file: Option<CaptureFileStatus>,

    /// Failures tolerated under the best-effort policy
    pub warnings: Vec<String>,

    /// Total wall-clock time of the run
    pub elapsed: Duration,
}

impl RunReport {
    pub(crate) fn new() -> Self {
        Self {
            started_at: Instant::now(),
            events: Vec::new(),
            server_pid: None,
            capture_pid: None,
            stops: Vec::new(),
            timer: None,
            early_exit: None,
            unexpected_exits: Vec::new(),
            capture_file: None,
            warnings: Vec::new(),
            elapsed: Duration::ZERO,
        }
    }

    /// Offset from the start of the run
    pub(crate) fn now(&self) -> Duration {
        self.started_at.elapsed()
    }

    pub(crate) fn record(&mut self, state: RunState) {
        let offset = self.now();
        self.events.push(LifecycleEvent { state, offset });
    }

    pub(crate) fn finish(&mut self) {
        self.elapsed = self.now();
    }

    /// When `state` was entered
    pub fn offset_of(&self, state: RunState) -> Option<Duration> {
        self.events
            .iter()
            .find(|e| e.state == state)
            .map(|e| e.offset)
    }

    /// Stop record for `role`
    pub fn stop_of(&self, role: ProcessRole) -> Option<&StopRecord> {
        self.stops.iter().find(|s| s.role == role)
    }

    /// Whether the run reached `Done`
    pub fn completed(&self) -> bool {
        self.events.last().is_some_and(|e| e.state.is_terminal())
    }
}
