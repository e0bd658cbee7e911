//! Cancellable fixed-duration wait
//!
//! The running phase of a benchmark is a plain sleep. Modelling it as a timer
//! tied to the orchestrator's shutdown channel lets Ctrl+C, or an early child
//! exit, end it without changing the default unconditional behaviour.

use std::time::Duration;

use tokio::sync::broadcast::{self, error::RecvError};

/// How a timed wait ended
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TimerOutcome {
    /// The full duration passed
    Elapsed,
    /// A shutdown signal arrived first
    Cancelled,
}

/// Sleep that can be cut short through a broadcast channel
pub struct CancellableTimer {
    cancel_rx: broadcast::Receiver<()>,
}

impl CancellableTimer {
    /// Create a timer listening on `cancel_rx`
    pub fn new(cancel_rx: broadcast::Receiver<()>) -> Self {
        Self { cancel_rx }
    }

    /// Wait for `duration` or until cancelled
    ///
    /// A zero duration returns immediately. If every sender is dropped the
    /// timer can no longer be cancelled and simply runs to completion.
    pub async fn wait(&mut self, duration: Duration) -> TimerOutcome {
        if duration.is_zero() {
            return TimerOutcome::Elapsed;
        }

        let sleep = tokio::time::sleep(duration);
        tokio::pin!(sleep);
        let mut listening = true;

        loop {
            tokio::select! {
                () = &mut sleep => return TimerOutcome::Elapsed,
                res = self.cancel_rx.recv(), if listening => match res {
                    Ok(()) | Err(RecvError::Lagged(_)) => return TimerOutcome::Cancelled,
                    Err(RecvError::Closed) => listening = false,
                },
            }
        }
    }
}
