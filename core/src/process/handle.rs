//! Child process handle

use std::process::{ExitStatus, Stdio};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use nix::errno::Errno;
use nix::sys::signal::kill;
use nix::unistd::Pid;
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::process::{Child, Command};
use tokio::task::JoinHandle;

use crate::config::StopSignal;
use crate::error::{BenchError, BenchResult};
use crate::tool::ToolCommand;

use super::ProcessRole;

/// How long to let the stderr forwarder drain after a child exits
const STDERR_DRAIN: Duration = Duration::from_millis(200);

/// Result of asking a child to stop
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StopOutcome {
    /// The signal was delivered
    Signaled(StopSignal),
    /// The child had already exited; status is known when it was reaped here
    AlreadyExited(Option<ExitStatus>),
}

impl StopOutcome {
    /// Whether the child was gone before the signal
    pub fn already_exited(&self) -> bool {
        matches!(self, Self::AlreadyExited(_))
    }
}

/// A running child owned by the orchestrator
pub struct ManagedProcess {
    role: ProcessRole,
    program: String,
    pid: u32,
    child: Child,
    stop_signal: StopSignal,
    signaled: bool,
    last_stderr: Arc<Mutex<Option<String>>>,
    stderr_task: Option<JoinHandle<()>>,
}

impl ManagedProcess {
    /// Spawn `command` without waiting for it to become ready
    ///
    /// Stdin is closed and stdout discarded. Stderr is forwarded to the log
    /// at debug level under the child's role. Must be called from within a
    /// tokio runtime.
    pub fn start(
        role: ProcessRole,
        command: &ToolCommand,
        stop_signal: StopSignal,
    ) -> BenchResult<Self> {
        let spawn_err = |source| BenchError::Spawn {
            role,
            program: command.program.clone(),
            source,
        };

        let mut child = Command::new(&command.program)
            .args(&command.args)
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::piped())
            .spawn()
            .map_err(spawn_err)?;

        let pid = child.id().ok_or_else(|| {
            spawn_err(std::io::Error::other("child exited before its pid was read"))
        })?;

        let last_stderr = Arc::new(Mutex::new(None));
        let stderr_task = child.stderr.take().map(|stderr| {
            let last = Arc::clone(&last_stderr);
            tokio::spawn(async move {
                let mut lines = BufReader::new(stderr).lines();
                while let Ok(Some(line)) = lines.next_line().await {
                    tracing::debug!(role = %role, "{}", line);
                    if let Ok(mut slot) = last.lock() {
                        *slot = Some(line);
                    }
                }
            })
        });

        tracing::debug!(role = %role, pid, command = %command, "Spawned child");

        Ok(Self {
            role,
            program: command.program.clone(),
            pid,
            child,
            stop_signal,
            signaled: false,
            last_stderr,
            stderr_task,
        })
    }

    /// Role of this child
    pub fn role(&self) -> ProcessRole {
        self.role
    }

    /// Operating-system process id
    pub fn pid(&self) -> u32 {
        self.pid
    }

    /// Program that was spawned
    pub fn program(&self) -> &str {
        &self.program
    }

    /// Whether a stop signal has been issued
    pub fn is_signaled(&self) -> bool {
        self.signaled
    }

    /// Exit status if the child has exited, reaping it
    pub fn try_exited(&mut self) -> BenchResult<Option<ExitStatus>> {
        Ok(self.child.try_wait()?)
    }

    /// Deliver this child's configured stop signal
    pub fn signal_stop(&mut self) -> BenchResult<StopOutcome> {
        self.send_signal(self.stop_signal)
    }

    /// Deliver `signal`
    ///
    /// A child that is already gone is reported as
    /// [`StopOutcome::AlreadyExited`] rather than as an error.
    pub fn send_signal(&mut self, signal: StopSignal) -> BenchResult<StopOutcome> {
        if let Some(status) = self.child.try_wait()? {
            self.signaled = true;
            return Ok(StopOutcome::AlreadyExited(Some(status)));
        }

        match kill(Pid::from_raw(self.pid as i32), signal.as_nix()) {
            Ok(()) => {
                self.signaled = true;
                Ok(StopOutcome::Signaled(signal))
            }
            Err(Errno::ESRCH) => {
                self.signaled = true;
                Ok(StopOutcome::AlreadyExited(None))
            }
            Err(source) => Err(BenchError::Signal {
                role: self.role,
                pid: self.pid,
                source,
            }),
        }
    }

    /// Wait up to `timeout` for the child to exit
    ///
    /// Returns `None` when the child is still running after the wait.
    pub async fn wait_exit(&mut self, timeout: Duration) -> BenchResult<Option<ExitStatus>> {
        match tokio::time::timeout(timeout, self.child.wait()).await {
            Ok(status) => Ok(Some(status?)),
            Err(_) => Ok(None),
        }
    }

    /// Last line the child wrote to stderr
    ///
    /// Gives the forwarder a moment to drain once the child has exited, so a
    /// final diagnostic is not lost.
    pub async fn last_stderr(&mut self) -> Option<String> {
        if let Some(task) = self.stderr_task.take() {
            if task.is_finished() || self.child.try_wait().ok().flatten().is_some() {
                let _ = tokio::time::timeout(STDERR_DRAIN, task).await;
            } else {
                self.stderr_task = Some(task);
            }
        }
        self.last_stderr.lock().ok().and_then(|slot| slot.clone())
    }
}

impl Drop for ManagedProcess {
    fn drop(&mut self) {
        if self.signaled {
            return;
        }
        if let Ok(None) = self.child.try_wait() {
            tracing::warn!(
                role = %self.role,
                pid = self.pid,
                signal = %self.stop_signal,
                "Stopping child that was never signalled"
            );
            let _ = kill(Pid::from_raw(self.pid as i32), self.stop_signal.as_nix());
        }
    }
}

impl std::fmt::Debug for ManagedProcess {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ManagedProcess")
            .field("role", &self.role)
            .field("program", &self.program)
            .field("pid", &self.pid)
            .field("signaled", &self.signaled)
            .finish()
    }
}
