//! Run lifecycle state machine

use std::fmt;

use crate::error::{BenchError, BenchResult};

/// Lifecycle of a benchmark run
///
/// `Idle -> ServerStarted -> CaptureStarted -> Running -> CaptureStopped ->
/// ServerStopped -> Done`. There are no backward transitions and no error
/// state; a failed child does not change the sequence.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum RunState {
    /// Nothing started yet
    Idle,
    /// Server spawn attempted
    ServerStarted,
    /// Capture spawn attempted
    CaptureStarted,
    /// Waiting out the run duration
    Running,
    /// Capture asked to stop
    CaptureStopped,
    /// Server asked to stop
    ServerStopped,
    /// Run finished
    Done,
}

impl RunState {
    /// The only state reachable from this one
    pub fn successor(self) -> Option<Self> {
        match self {
            Self::Idle => Some(Self::ServerStarted),
            Self::ServerStarted => Some(Self::CaptureStarted),
            Self::CaptureStarted => Some(Self::Running),
            Self::Running => Some(Self::CaptureStopped),
            Self::CaptureStopped => Some(Self::ServerStopped),
            Self::ServerStopped => Some(Self::Done),
            Self::Done => None,
        }
    }

    /// Move to `next`, rejecting anything but the direct successor
    pub fn advance(self, next: Self) -> BenchResult<Self> {
        if self.successor() == Some(next) {
            Ok(next)
        } else {
            Err(BenchError::InvalidTransition {
                from: self,
                to: next,
            })
        }
    }

    /// Whether the run has finished
    pub fn is_terminal(self) -> bool {
        self == Self::Done
    }
}

impl fmt::Display for RunState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Idle => "idle",
            Self::ServerStarted => "server-started",
            Self::CaptureStarted => "capture-started",
            Self::Running => "running",
            Self::CaptureStopped => "capture-stopped",
            Self::ServerStopped => "server-stopped",
            Self::Done => "done",
        };
        f.write_str(name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_full_sequence() {
        let mut state = RunState::Idle;
        let mut visited = vec![state];
        while let Some(next) = state.successor() {
            state = state.advance(next).unwrap();
            visited.push(state);
        }

        assert!(state.is_terminal());
        assert_eq!(visited.len(), 7);
        assert!(visited.windows(2).all(|w| w[0] < w[1]));
    }

    #[test]
    fn test_skipping_a_state_is_rejected() {
        let err = RunState::Idle.advance(RunState::Running).unwrap_err();
        assert_eq!(
            err.to_string(),
            "invalid state transition from idle to running"
        );
    }

    #[test]
    fn test_no_backward_transition() {
        assert!(RunState::CaptureStopped
            .advance(RunState::Running)
            .is_err());
        assert!(RunState::Done.advance(RunState::Idle).is_err());
    }

    #[test]
    fn test_server_stops_after_capture() {
        assert_eq!(
            RunState::CaptureStopped.successor(),
            Some(RunState::ServerStopped)
        );
        assert!(RunState::Running.advance(RunState::ServerStopped).is_err());
    }
}
