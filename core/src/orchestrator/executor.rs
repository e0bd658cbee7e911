//! Orchestrator execution logic

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::broadcast;

use crate::config::{BenchmarkConfig, StopSignal};
use crate::error::{BenchError, BenchResult};
use crate::preflight;
use crate::process::{ManagedProcess, ProcessRole, StopOutcome};
use crate::timer::{CancellableTimer, TimerOutcome};
use crate::tool::{ToolCommand, ToolSpec};

use super::report::{CaptureFileStatus, RunReport, StopRecord};
use super::state::RunState;

/// How often children are checked while `abort_on_child_exit` is set
const CHILD_POLL_INTERVAL: Duration = Duration::from_millis(250);

/// Orchestrator manages the benchmark lifecycle
///
/// Responsible for starting both children, waiting out the run duration and
/// stopping them in order. It exclusively owns the child handles for the
/// duration of [`Orchestrator::run`].
pub struct Orchestrator {
    /// Benchmark configuration
    pub(crate) config: BenchmarkConfig,

    /// Throughput server command builder
    pub(crate) server_tool: Arc<dyn ToolSpec>,

    /// Packet capture command builder
    pub(crate) capture_tool: Arc<dyn ToolSpec>,

    /// Shutdown signal sender, cancels the running phase
    pub(crate) shutdown_tx: broadcast::Sender<()>,
}

impl Orchestrator {
    /// Create a new orchestrator
    ///
    /// Use `OrchestratorBuilder` for a more ergonomic construction.
    pub fn new(
        config: BenchmarkConfig,
        server_tool: Arc<dyn ToolSpec>,
        capture_tool: Arc<dyn ToolSpec>,
    ) -> Self {
        let (shutdown_tx, _) = broadcast::channel(1);

        Self {
            config,
            server_tool,
            capture_tool,
            shutdown_tx,
        }
    }

    /// Get a shutdown signal receiver
    pub fn shutdown_receiver(&self) -> broadcast::Receiver<()> {
        self.shutdown_tx.subscribe()
    }

    /// End the running phase early; children are still stopped in order
    pub fn shutdown(&self) {
        let _ = self.shutdown_tx.send(());
    }

    /// Get the benchmark configuration
    pub fn config(&self) -> &BenchmarkConfig {
        &self.config
    }

    /// Run the benchmark
    ///
    /// Under [`FailurePolicy::Strict`](crate::FailurePolicy::Strict) the first
    /// observed failure is returned; any child already started is stopped
    /// when its handle is dropped. Under the best-effort policy failures are
    /// logged, collected in [`RunReport::warnings`] and the sequence continues.
    pub async fn run(&self) -> BenchResult<RunReport> {
        let mut report = RunReport::new();
        report.record(RunState::Idle);

        tracing::info!(
            server_ip = %self.config.server_ip,
            port = self.config.port,
            interface = %self.config.interface,
            output_file = %self.config.output_file.display(),
            duration_secs = self.config.duration_secs,
            policy = ?self.config.failure_policy,
            "Starting benchmark run"
        );

        self.preflight(&mut report)?;

        let server_cmd = self.server_tool.command(&self.config);
        let mut server = self.spawn(
            ProcessRole::Server,
            &server_cmd,
            self.config.server_signal,
            &mut report,
        )?;
        report.server_pid = server.as_ref().map(ManagedProcess::pid);
        let state = self.transition(RunState::Idle, RunState::ServerStarted, &mut report)?;

        let capture_cmd = self.capture_tool.command(&self.config);
        let mut capture = self.spawn(
            ProcessRole::Capture,
            &capture_cmd,
            self.config.capture_signal,
            &mut report,
        )?;
        report.capture_pid = capture.as_ref().map(ManagedProcess::pid);
        let state = self.transition(state, RunState::CaptureStarted, &mut report)?;

        let grace = self.config.startup_grace();
        if !grace.is_zero() {
            tokio::time::sleep(grace).await;
        }
        for child in [server.as_mut(), capture.as_mut()].into_iter().flatten() {
            self.check_exited(child, &mut report).await?;
        }

        let state = self.transition(state, RunState::Running, &mut report)?;
        tracing::info!(
            duration_secs = self.config.duration_secs,
            "Server and capture running"
        );
        let outcome = self
            .wait_running(server.as_mut(), capture.as_mut(), &mut report)
            .await?;
        report.timer = Some(outcome);
        if outcome == TimerOutcome::Cancelled {
            tracing::info!("Running phase ended early");
        }

        if let Some(capture) = capture.as_mut() {
            self.stop_child(capture, &mut report).await?;
        }
        let state = self.transition(state, RunState::CaptureStopped, &mut report)?;

        if let Some(server) = server.as_mut() {
            self.stop_child(server, &mut report).await?;
        }
        let state = self.transition(state, RunState::ServerStopped, &mut report)?;

        self.check_capture_file(&mut report).await?;
        self.transition(state, RunState::Done, &mut report)?;
        report.finish();

        tracing::info!(
            elapsed_secs = report.elapsed.as_secs_f64(),
            capture_bytes = ?report.capture_file.as_ref().and_then(|f| f.size),
            warnings = report.warnings.len(),
            "Benchmark run completed"
        );

        Ok(report)
    }

    /// Run with Ctrl+C signal handling
    ///
    /// Ctrl+C ends the running phase; the capture and server are then
    /// stopped as usual.
    pub async fn run_with_signal_handling(&self) -> BenchResult<RunReport> {
        let shutdown_tx = self.shutdown_tx.clone();

        let signal_handle = tokio::spawn(async move {
            match tokio::signal::ctrl_c().await {
                Ok(()) => {
                    tracing::info!("Received Ctrl+C, stopping capture and server...");
                    let _ = shutdown_tx.send(());
                }
                Err(e) => {
                    tracing::error!(error = %e, "Failed to listen for Ctrl+C");
                }
            }
        });

        let result = self.run().await;

        signal_handle.abort();

        result
    }

    /// Return `err` under the strict policy, log and record it otherwise
    fn escalate(&self, err: BenchError, report: &mut RunReport) -> BenchResult<()> {
        if self.config.failure_policy.is_strict() {
            return Err(err);
        }
        tracing::warn!(error = %err, "Continuing despite failure");
        report.warnings.push(err.to_string());
        Ok(())
    }

    fn transition(
        &self,
        from: RunState,
        to: RunState,
        report: &mut RunReport,
    ) -> BenchResult<RunState> {
        let next = from.advance(to)?;
        report.record(next);
        tracing::debug!(state = %next, "State transition");
        Ok(next)
    }

    fn preflight(&self, report: &mut RunReport) -> BenchResult<()> {
        // An explicit refusal to overwrite is honoured under both policies
        preflight::check_output(&self.config.output_file, self.config.output_policy)?;

        if let Err(err) = preflight::probe_port(self.config.server_ip, self.config.port) {
            self.escalate(err, report)?;
        }

        if !preflight::has_capture_privilege() {
            tracing::warn!(
                interface = %self.config.interface,
                "Not running as root; the capture tool may be refused access to the interface"
            );
        }

        Ok(())
    }

    fn spawn(
        &self,
        role: ProcessRole,
        command: &ToolCommand,
        signal: StopSignal,
        report: &mut RunReport,
    ) -> BenchResult<Option<ManagedProcess>> {
        tracing::info!(role = %role, command = %command, "Starting {role}");

        match ManagedProcess::start(role, command, signal) {
            Ok(child) => {
                tracing::info!(role = %role, pid = child.pid(), "Started {role}");
                Ok(Some(child))
            }
            Err(err) => {
                self.escalate(err, report)?;
                Ok(None)
            }
        }
    }

    /// Describe why `child` is no longer running, if it has exited
    async fn exited_error(&self, child: &mut ManagedProcess) -> BenchResult<Option<BenchError>> {
        let Some(status) = child.try_exited()? else {
            return Ok(None);
        };
        let stderr = child.last_stderr().await;

        let err = match child.role() {
            ProcessRole::Server => BenchError::ServerExited { status, stderr },
            ProcessRole::Capture => match stderr {
                Some(detail) if preflight::is_privilege_diagnostic(&detail) => {
                    BenchError::CapturePrivilege {
                        interface: self.config.interface.clone(),
                        detail,
                    }
                }
                stderr => BenchError::CaptureExited { status, stderr },
            },
        };
        Ok(Some(err))
    }

    /// Escalate an unprompted exit of `child`, once per child
    ///
    /// Returns whether the child has exited.
    async fn check_exited(
        &self,
        child: &mut ManagedProcess,
        report: &mut RunReport,
    ) -> BenchResult<bool> {
        if report.unexpected_exits.contains(&child.role()) {
            return Ok(true);
        }
        let Some(err) = self.exited_error(child).await? else {
            return Ok(false);
        };
        report.unexpected_exits.push(child.role());
        self.escalate(err, report)?;
        Ok(true)
    }

    /// Wait out the run duration
    ///
    /// Only the shutdown channel can end the wait early, unless
    /// `abort_on_child_exit` is set, in which case a child exiting on its own
    /// does too.
    async fn wait_running(
        &self,
        mut server: Option<&mut ManagedProcess>,
        mut capture: Option<&mut ManagedProcess>,
        report: &mut RunReport,
    ) -> BenchResult<TimerOutcome> {
        let mut timer = CancellableTimer::new(self.shutdown_tx.subscribe());
        let duration = self.config.duration();

        if !self.config.abort_on_child_exit {
            return Ok(timer.wait(duration).await);
        }

        let wait = timer.wait(duration);
        tokio::pin!(wait);
        let mut poll = tokio::time::interval(CHILD_POLL_INTERVAL);

        loop {
            tokio::select! {
                outcome = &mut wait => return Ok(outcome),
                _ = poll.tick() => {
                    let children = [server.as_deref_mut(), capture.as_deref_mut()];
                    for child in children.into_iter().flatten() {
                        if self.check_exited(child, report).await? {
                            tracing::warn!(
                                role = %child.role(),
                                "Child exited during run, ending early"
                            );
                            report.early_exit = Some(child.role());
                            return Ok(TimerOutcome::Cancelled);
                        }
                    }
                }
            }
        }
    }

    async fn stop_child(
        &self,
        child: &mut ManagedProcess,
        report: &mut RunReport,
    ) -> BenchResult<()> {
        let role = child.role();
        let pid = child.pid();
        let offset = report.now();

        let outcome = match child.signal_stop() {
            Ok(outcome) => outcome,
            Err(err) => return self.escalate(err, report),
        };

        let mut record = StopRecord {
            role,
            pid,
            offset,
            outcome,
            exit_status: None,
        };

        match outcome {
            StopOutcome::Signaled(signal) => {
                tracing::info!(role = %role, pid, signal = %signal, "Stopping {role}");
            }
            StopOutcome::AlreadyExited(status) => {
                tracing::warn!(role = %role, pid, status = ?status, "{role} had already exited");
                record.exit_status = status;
                report.stops.push(record);
                self.check_exited(child, report).await?;
                return Ok(());
            }
        }

        let Some(timeout) = self.config.exit_timeout() else {
            report.stops.push(record);
            return Ok(());
        };

        match child.wait_exit(timeout).await? {
            Some(status) => {
                tracing::debug!(role = %role, pid, status = %status, "Child exited");
                record.exit_status = Some(status);
                report.stops.push(record);
                Ok(())
            }
            None => {
                report.stops.push(record);
                self.escalate(BenchError::TerminationTimeout { role, pid, timeout }, report)
            }
        }
    }

    async fn check_capture_file(&self, report: &mut RunReport) -> BenchResult<()> {
        let path = self.config.output_file.clone();
        let size = tokio::fs::metadata(&path).await.ok().map(|m| m.len());
        report.capture_file = Some(CaptureFileStatus {
            path: path.clone(),
            size,
        });

        match size {
            Some(bytes) => {
                tracing::info!(path = %path.display(), bytes, "Capture file written");
                Ok(())
            }
            None => self.escalate(BenchError::CaptureFileMissing { path }, report),
        }
    }
}

impl std::fmt::Debug for Orchestrator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Orchestrator")
            .field("config", &self.config)
            .field("server_tool", &self.server_tool.name())
            .field("capture_tool", &self.capture_tool.name())
            .finish()
    }
}
