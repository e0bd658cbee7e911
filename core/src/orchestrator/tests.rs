//! Tests for the Orchestrator module
//!
//! Real iperf3/tcpdump are replaced by shell stand-ins that run until
//! signalled, so these tests need neither the tools nor root.

use super::builder::OrchestratorBuilder;
use super::state::RunState;
use crate::config::{BenchmarkConfig, FailurePolicy, OutputPolicy};
use crate::error::BenchError;
use crate::process::ProcessRole;
use crate::timer::TimerOutcome;
use crate::tool::{ToolCommand, ToolSpec};

use std::net::{IpAddr, Ipv4Addr, TcpListener};
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

// ============================================================================
// Stand-in tools
// ============================================================================

/// Runs `sh -c <script> <output_file>`, so the script sees the capture path
/// as `$0`
struct ShellTool {
    name: &'static str,
    script: &'static str,
}

impl ShellTool {
    fn new(name: &'static str, script: &'static str) -> Self {
        Self { name, script }
    }

    /// Long-running server stand-in
    fn server() -> Arc<dyn ToolSpec> {
        Arc::new(Self::new("fake-server", "exec sleep 60"))
    }

    /// Capture stand-in that creates the output file, then runs until stopped
    fn capture() -> Arc<dyn ToolSpec> {
        Arc::new(Self::new("fake-capture", "touch \"$0\"; exec sleep 60"))
    }
}

impl ToolSpec for ShellTool {
    fn name(&self) -> &str {
        self.name
    }

    fn command(&self, config: &BenchmarkConfig) -> ToolCommand {
        ToolCommand::new("sh")
            .arg("-c")
            .arg(self.script)
            .arg(config.output_file.to_string_lossy())
    }
}

const LOOPBACK: IpAddr = IpAddr::V4(Ipv4Addr::LOCALHOST);

fn free_port() -> u16 {
    TcpListener::bind((LOOPBACK, 0))
        .unwrap()
        .local_addr()
        .unwrap()
        .port()
}

fn test_config(dir: &Path, duration_secs: u64) -> BenchmarkConfig {
    BenchmarkConfig {
        server_ip: LOOPBACK,
        port: free_port(),
        interface: "lo".to_string(),
        output_file: dir.join("server_capture.pcap"),
        duration_secs,
        exit_timeout_ms: Some(5_000),
        ..Default::default()
    }
}

fn builder(config: BenchmarkConfig) -> OrchestratorBuilder {
    OrchestratorBuilder::new()
        .config(config)
        .server_tool(ShellTool::server())
        .capture_tool(ShellTool::capture())
}

// ============================================================================
// Builder
// ============================================================================

#[test]
fn test_builder_defaults_to_iperf3_and_tcpdump() {
    let orchestrator = OrchestratorBuilder::new().build().unwrap();
    let debug = format!("{orchestrator:?}");

    assert!(debug.contains("iperf3"));
    assert!(debug.contains("tcpdump"));
    assert_eq!(orchestrator.config().port, 8080);
}

#[test]
fn test_builder_setters() {
    let orchestrator = OrchestratorBuilder::new()
        .port(5201)
        .interface("h7-eth0")
        .output_file("/tmp/h7.pcap")
        .duration(Duration::from_secs(150))
        .failure_policy(FailurePolicy::Strict)
        .build()
        .unwrap();

    let config = orchestrator.config();
    assert_eq!(config.port, 5201);
    assert_eq!(config.interface, "h7-eth0");
    assert_eq!(config.duration_secs, 150);
    assert!(config.failure_policy.is_strict());
}

#[test]
fn test_builder_invalid_config() {
    let result = OrchestratorBuilder::new().port(0).build();
    assert!(matches!(result, Err(BenchError::Config(_))));
}

// ============================================================================
// Integration Tests
// ============================================================================

#[tokio::test]
async fn test_run_end_to_end() {
    let dir = tempfile::tempdir().unwrap();
    let config = test_config(dir.path(), 2);
    let output = config.output_file.clone();

    let report = builder(config).build().unwrap().run().await.expect("Run failed");

    assert!(report.server_pid.is_some());
    assert!(report.capture_pid.is_some());
    assert_eq!(report.timer, Some(TimerOutcome::Elapsed));
    assert!(report.completed());
    assert!(report.warnings.is_empty(), "{:?}", report.warnings);

    let capture_stop = report.stop_of(ProcessRole::Capture).expect("capture stop");
    let server_stop = report.stop_of(ProcessRole::Server).expect("server stop");
    assert!(capture_stop.offset >= Duration::from_secs(2));
    assert!(capture_stop.offset < server_stop.offset);
    assert_eq!(report.stops[0].role, ProcessRole::Capture);
    assert_eq!(report.stops[1].role, ProcessRole::Server);
    assert!(!capture_stop.outcome.already_exited());
    assert!(capture_stop.exit_status.is_some());

    let running = report.offset_of(RunState::Running).unwrap();
    assert!(capture_stop.offset - running >= Duration::from_secs(2));
    assert!(capture_stop.offset - running < Duration::from_secs(4));

    assert!(output.exists());
    assert!(report.capture_file.as_ref().unwrap().exists());
}

#[tokio::test]
async fn test_lifecycle_events_in_order() {
    let dir = tempfile::tempdir().unwrap();
    let report = builder(test_config(dir.path(), 0))
        .build()
        .unwrap()
        .run()
        .await
        .unwrap();

    let states: Vec<RunState> = report.events.iter().map(|e| e.state).collect();
    assert_eq!(
        states,
        [
            RunState::Idle,
            RunState::ServerStarted,
            RunState::CaptureStarted,
            RunState::Running,
            RunState::CaptureStopped,
            RunState::ServerStopped,
            RunState::Done,
        ]
    );
    assert!(report.events.windows(2).all(|w| w[0].offset <= w[1].offset));
}

#[tokio::test]
async fn test_capture_always_stopped_before_server() {
    for _ in 0..3 {
        let dir = tempfile::tempdir().unwrap();
        let report = builder(test_config(dir.path(), 0))
            .build()
            .unwrap()
            .run()
            .await
            .unwrap();

        let roles: Vec<ProcessRole> = report.stops.iter().map(|s| s.role).collect();
        assert_eq!(roles, [ProcessRole::Capture, ProcessRole::Server]);
    }
}

#[tokio::test]
async fn test_zero_duration_proceeds_immediately() {
    let dir = tempfile::tempdir().unwrap();
    let report = builder(test_config(dir.path(), 0))
        .build()
        .unwrap()
        .run()
        .await
        .unwrap();

    let running = report.offset_of(RunState::Running).unwrap();
    let capture_stop = report.stop_of(ProcessRole::Capture).unwrap();
    assert!(capture_stop.offset - running < Duration::from_millis(500));
    assert_eq!(report.timer, Some(TimerOutcome::Elapsed));
}

#[tokio::test]
async fn test_server_already_exited_is_tolerated() {
    let dir = tempfile::tempdir().unwrap();
    let config = BenchmarkConfig {
        startup_grace_ms: 300,
        ..test_config(dir.path(), 0)
    };

    let report = builder(config)
        .server_tool(Arc::new(ShellTool::new("short-server", "exit 0")))
        .build()
        .unwrap()
        .run()
        .await
        .expect("best-effort run should not fail");

    let server_stop = report.stop_of(ProcessRole::Server).unwrap();
    assert!(server_stop.outcome.already_exited());
    assert!(report.completed());
    assert_eq!(report.warnings.len(), 1);
    assert!(report
        .warnings
        .iter()
        .any(|w| w.starts_with("server exited before shutdown")));
}

#[tokio::test]
async fn test_server_exit_during_run_is_recorded() {
    let dir = tempfile::tempdir().unwrap();
    let config = test_config(dir.path(), 1);

    let report = builder(config)
        .server_tool(Arc::new(ShellTool::new("dying-server", "sleep 0.3; exit 3")))
        .build()
        .unwrap()
        .run()
        .await
        .expect("best-effort run should not fail");

    let server_stop = report.stop_of(ProcessRole::Server).unwrap();
    assert!(server_stop.outcome.already_exited());
    assert_eq!(server_stop.exit_status.and_then(|s| s.code()), Some(3));
    assert_eq!(report.unexpected_exits, vec![ProcessRole::Server]);
    assert_eq!(report.warnings.len(), 1);
    assert!(report.warnings[0].starts_with("server exited before shutdown"));
    assert!(report.completed());
}

#[tokio::test]
async fn test_strict_server_exit_during_run_fails() {
    let dir = tempfile::tempdir().unwrap();
    let config = BenchmarkConfig {
        failure_policy: FailurePolicy::Strict,
        ..test_config(dir.path(), 1)
    };

    let result = builder(config)
        .server_tool(Arc::new(ShellTool::new(
            "dying-server",
            "sleep 0.3; echo 'iperf3: error' >&2; exit 3",
        )))
        .build()
        .unwrap()
        .run()
        .await;

    match result {
        Err(BenchError::ServerExited { status, stderr }) => {
            assert_eq!(status.code(), Some(3));
            assert_eq!(stderr.as_deref(), Some("iperf3: error"));
        }
        other => panic!("Expected ServerExited, got {other:?}"),
    }
}

#[tokio::test]
async fn test_strict_capture_exit_during_run_fails() {
    let dir = tempfile::tempdir().unwrap();
    let config = BenchmarkConfig {
        failure_policy: FailurePolicy::Strict,
        ..test_config(dir.path(), 1)
    };

    let result = builder(config)
        .capture_tool(Arc::new(ShellTool::new(
            "dying-capture",
            "touch \"$0\"; sleep 0.3; exit 4",
        )))
        .build()
        .unwrap()
        .run()
        .await;

    match result {
        Err(BenchError::CaptureExited { status, .. }) => assert_eq!(status.code(), Some(4)),
        other => panic!("Expected CaptureExited, got {other:?}"),
    }
}

#[tokio::test]
async fn test_strict_server_exit_fails() {
    let dir = tempfile::tempdir().unwrap();
    let config = BenchmarkConfig {
        startup_grace_ms: 300,
        failure_policy: FailurePolicy::Strict,
        ..test_config(dir.path(), 0)
    };

    let result = builder(config)
        .server_tool(Arc::new(ShellTool::new(
            "busy-server",
            "echo 'iperf3: error - unable to start listener' >&2; exit 1",
        )))
        .build()
        .unwrap()
        .run()
        .await;

    match result {
        Err(BenchError::ServerExited { status, stderr }) => {
            assert_eq!(status.code(), Some(1));
            assert!(stderr.unwrap().contains("unable to start listener"));
        }
        other => panic!("Expected ServerExited, got {other:?}"),
    }
}

#[tokio::test]
async fn test_strict_capture_without_privilege() {
    let dir = tempfile::tempdir().unwrap();
    let config = BenchmarkConfig {
        startup_grace_ms: 300,
        failure_policy: FailurePolicy::Strict,
        ..test_config(dir.path(), 0)
    };

    let result = builder(config)
        .capture_tool(Arc::new(ShellTool::new(
            "denied-capture",
            "echo 'tcpdump: lo: permission denied' >&2; exit 1",
        )))
        .build()
        .unwrap()
        .run()
        .await;

    match result {
        Err(err @ BenchError::CapturePrivilege { .. }) => {
            assert!(err.is_privilege_error());
            assert!(err.to_string().contains("`lo`"));
        }
        other => panic!("Expected CapturePrivilege, got {other:?}"),
    }
}

#[tokio::test]
async fn test_strict_capture_exit_without_privilege_hint() {
    let dir = tempfile::tempdir().unwrap();
    let config = BenchmarkConfig {
        startup_grace_ms: 300,
        failure_policy: FailurePolicy::Strict,
        ..test_config(dir.path(), 0)
    };

    let result = builder(config)
        .capture_tool(Arc::new(ShellTool::new(
            "broken-capture",
            "echo 'tcpdump: lo0: No such device exists' >&2; exit 1",
        )))
        .build()
        .unwrap()
        .run()
        .await;

    assert!(matches!(result, Err(BenchError::CaptureExited { .. })));
}

#[tokio::test]
async fn test_strict_port_in_use() {
    let holder = TcpListener::bind((LOOPBACK, 0)).unwrap();
    let dir = tempfile::tempdir().unwrap();
    let config = BenchmarkConfig {
        port: holder.local_addr().unwrap().port(),
        failure_policy: FailurePolicy::Strict,
        ..test_config(dir.path(), 0)
    };

    let result = builder(config).build().unwrap().run().await;
    assert!(matches!(result, Err(BenchError::PortInUse { .. })));
}

#[tokio::test]
async fn test_best_effort_port_in_use_continues() {
    let holder = TcpListener::bind((LOOPBACK, 0)).unwrap();
    let dir = tempfile::tempdir().unwrap();
    let config = BenchmarkConfig {
        port: holder.local_addr().unwrap().port(),
        ..test_config(dir.path(), 0)
    };

    let report = builder(config).build().unwrap().run().await.unwrap();
    assert!(report.completed());
    assert!(report.warnings.iter().any(|w| w.contains("already in use")));
}

#[tokio::test]
async fn test_output_policy_fail() {
    let dir = tempfile::tempdir().unwrap();
    let config = BenchmarkConfig {
        output_policy: OutputPolicy::Fail,
        ..test_config(dir.path(), 0)
    };
    std::fs::write(&config.output_file, b"old").unwrap();

    let result = builder(config).build().unwrap().run().await;
    assert!(matches!(result, Err(BenchError::OutputExists { .. })));
}

#[tokio::test]
async fn test_missing_server_program_best_effort() {
    let dir = tempfile::tempdir().unwrap();
    let config = BenchmarkConfig {
        server_program: "/nonexistent/iperf3".to_string(),
        ..test_config(dir.path(), 0)
    };

    let report = OrchestratorBuilder::new()
        .config(config)
        .capture_tool(ShellTool::capture())
        .build()
        .unwrap()
        .run()
        .await
        .unwrap();

    assert!(report.server_pid.is_none());
    assert!(report.capture_pid.is_some());
    assert_eq!(report.stops.len(), 1);
    assert_eq!(report.stops[0].role, ProcessRole::Capture);
    assert!(report.completed());
}

#[tokio::test]
async fn test_missing_server_program_strict() {
    let dir = tempfile::tempdir().unwrap();
    let config = BenchmarkConfig {
        server_program: "/nonexistent/iperf3".to_string(),
        failure_policy: FailurePolicy::Strict,
        ..test_config(dir.path(), 0)
    };

    let result = OrchestratorBuilder::new()
        .config(config)
        .capture_tool(ShellTool::capture())
        .build()
        .unwrap()
        .run()
        .await;

    assert!(matches!(
        result,
        Err(BenchError::Spawn {
            role: ProcessRole::Server,
            ..
        })
    ));
}

#[tokio::test]
async fn test_missing_capture_file() {
    let dir = tempfile::tempdir().unwrap();
    let quiet_capture: Arc<dyn ToolSpec> = Arc::new(ShellTool::new("quiet", "exec sleep 60"));

    let report = builder(test_config(dir.path(), 0))
        .capture_tool(Arc::clone(&quiet_capture))
        .build()
        .unwrap()
        .run()
        .await
        .unwrap();
    assert!(!report.capture_file.as_ref().unwrap().exists());
    assert_eq!(report.warnings.len(), 1);

    let strict = BenchmarkConfig {
        failure_policy: FailurePolicy::Strict,
        ..test_config(dir.path(), 0)
    };
    let result = builder(strict)
        .capture_tool(quiet_capture)
        .build()
        .unwrap()
        .run()
        .await;
    assert!(matches!(result, Err(BenchError::CaptureFileMissing { .. })));
}

#[tokio::test]
async fn test_shutdown_cancels_running_phase() {
    let dir = tempfile::tempdir().unwrap();
    let orchestrator = builder(test_config(dir.path(), 30)).build().unwrap();

    let (result, ()) = tokio::join!(orchestrator.run(), async {
        tokio::time::sleep(Duration::from_millis(500)).await;
        orchestrator.shutdown();
    });

    let report = result.unwrap();
    assert_eq!(report.timer, Some(TimerOutcome::Cancelled));
    assert!(report.elapsed < Duration::from_secs(10));

    // Shutdown order is unchanged by cancellation
    assert_eq!(report.stops[0].role, ProcessRole::Capture);
    assert_eq!(report.stops[1].role, ProcessRole::Server);
}

#[tokio::test]
async fn test_abort_on_child_exit() {
    let dir = tempfile::tempdir().unwrap();
    let config = BenchmarkConfig {
        abort_on_child_exit: true,
        ..test_config(dir.path(), 30)
    };

    let report = builder(config)
        .server_tool(Arc::new(ShellTool::new("crashing-server", "sleep 0.3; exit 2")))
        .build()
        .unwrap()
        .run()
        .await
        .unwrap();

    assert_eq!(report.early_exit, Some(ProcessRole::Server));
    assert_eq!(report.timer, Some(TimerOutcome::Cancelled));
    assert!(report.elapsed < Duration::from_secs(10));
    assert!(report.stop_of(ProcessRole::Server).unwrap().outcome.already_exited());
    // Reported once, by the running-phase check
    assert_eq!(report.unexpected_exits, vec![ProcessRole::Server]);
    assert_eq!(report.warnings.len(), 1);
}

#[tokio::test]
async fn test_strict_termination_timeout() {
    let dir = tempfile::tempdir().unwrap();
    let config = BenchmarkConfig {
        failure_policy: FailurePolicy::Strict,
        exit_timeout_ms: Some(200),
        ..test_config(dir.path(), 0)
    };

    // SIGINT stays ignored across exec, so the capture outlives its stop signal
    let stubborn = ShellTool::new("stubborn-capture", "trap '' INT; touch \"$0\"; exec sleep 2");

    let result = builder(config)
        .capture_tool(Arc::new(stubborn))
        .build()
        .unwrap()
        .run()
        .await;

    match result {
        Err(BenchError::TerminationTimeout { role, timeout, .. }) => {
            assert_eq!(role, ProcessRole::Capture);
            assert_eq!(timeout, Duration::from_millis(200));
        }
        other => panic!("Expected TerminationTimeout, got {other:?}"),
    }
}
