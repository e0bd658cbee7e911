//! `run` command

use std::net::IpAddr;
use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::Args;
use netcap_bench_core::{
    BenchmarkConfig, FailurePolicy, OrchestratorBuilder, OutputPolicy, RunReport, StopOutcome,
    StopSignal,
};

/// Arguments of the `run` command
///
/// Every flag is optional so that values from `--config` survive unless the
/// flag is given explicitly.
#[derive(Args, Debug)]
pub struct RunArgs {
    /// JSON file holding a benchmark configuration
    #[arg(short, long)]
    pub config: Option<PathBuf>,

    /// Address the server binds [default: 0.0.0.0]
    #[arg(long)]
    pub server_ip: Option<IpAddr>,

    /// Server port, also used as the capture filter [default: 8080]
    #[arg(short, long)]
    pub port: Option<u16>,

    /// Capture interface [default: eth0]
    #[arg(short, long)]
    pub interface: Option<String>,

    /// Capture file [default: server_capture.pcap]
    #[arg(short, long)]
    pub output_file: Option<PathBuf>,

    /// Running duration in seconds [default: 250]
    #[arg(short, long)]
    pub duration: Option<u64>,

    /// Throughput server executable [default: iperf3]
    #[arg(long)]
    pub server_program: Option<String>,

    /// Packet capture executable [default: tcpdump]
    #[arg(long)]
    pub capture_program: Option<String>,

    /// Signal stopping the capture: INT, TERM or HUP [default: INT]
    #[arg(long)]
    pub capture_signal: Option<StopSignal>,

    /// Signal stopping the server: INT, TERM or HUP [default: TERM]
    #[arg(long)]
    pub server_signal: Option<StopSignal>,

    /// Abort on the first failure instead of logging it
    #[arg(long)]
    pub strict: bool,

    /// Refuse to start when the capture file already exists
    #[arg(long)]
    pub fail_if_exists: bool,

    /// End the run early when either child exits on its own
    #[arg(long)]
    pub abort_on_child_exit: bool,

    /// Pause after start before checking both children are alive [default: 0]
    #[arg(long)]
    pub startup_grace_ms: Option<u64>,

    /// Bounded wait for each child after its stop signal, 0 disables [default: 5000]
    #[arg(long)]
    pub exit_timeout_ms: Option<u64>,
}

impl RunArgs {
    /// Build the effective configuration
    pub fn load_config(&self) -> Result<BenchmarkConfig> {
        let mut config = match &self.config {
            Some(path) => BenchmarkConfig::from_json_file(path)
                .with_context(|| format!("Failed to load config from: {}", path.display()))?,
            None => BenchmarkConfig::default(),
        };

        if let Some(ip) = self.server_ip {
            config.server_ip = ip;
        }
        if let Some(port) = self.port {
            config.port = port;
        }
        if let Some(interface) = &self.interface {
            config.interface = interface.clone();
        }
        if let Some(path) = &self.output_file {
            config.output_file = path.clone();
        }
        if let Some(duration) = self.duration {
            config.duration_secs = duration;
        }
        if let Some(program) = &self.server_program {
            config.server_program = program.clone();
        }
        if let Some(program) = &self.capture_program {
            config.capture_program = program.clone();
        }
        if let Some(signal) = self.capture_signal {
            config.capture_signal = signal;
        }
        if let Some(signal) = self.server_signal {
            config.server_signal = signal;
        }
        if self.strict {
            config.failure_policy = FailurePolicy::Strict;
        }
        if self.fail_if_exists {
            config.output_policy = OutputPolicy::Fail;
        }
        if self.abort_on_child_exit {
            config.abort_on_child_exit = true;
        }
        if let Some(grace) = self.startup_grace_ms {
            config.startup_grace_ms = grace;
        }
        if let Some(timeout) = self.exit_timeout_ms {
            config.exit_timeout_ms = (timeout > 0).then_some(timeout);
        }

        Ok(config)
    }

    /// Run the benchmark
    pub async fn execute(&self) -> Result<()> {
        let config = self.load_config()?;
        print_banner(&config);

        let orchestrator = OrchestratorBuilder::new()
            .config(config)
            .build()
            .context("Invalid benchmark configuration")?;

        let report = orchestrator
            .run_with_signal_handling()
            .await
            .context("Benchmark run failed")?;

        print_report(&report);
        Ok(())
    }
}

fn print_banner(config: &BenchmarkConfig) {
    println!("\n{}", "=".repeat(70));
    println!("   netcap-bench - Throughput Server Capture");
    println!("{}", "=".repeat(70));
    println!();
    println!("Configuration:");
    println!("  Server:       {} {}:{}", config.server_program, config.server_ip, config.port);
    println!("  Capture:      {} on {}", config.capture_program, config.interface);
    println!("  Output file:  {}", config.output_file.display());
    println!("  Duration:     {}s", config.duration_secs);
    println!(
        "  Policy:       {}",
        if config.failure_policy.is_strict() { "strict" } else { "best-effort" }
    );
    println!("{}", "=".repeat(70));
    println!();
}

fn print_report(report: &RunReport) {
    println!();
    println!("Run finished in {:.1}s", report.elapsed.as_secs_f64());

    for event in &report.events {
        println!("  {:>8.2}s  {}", event.offset.as_secs_f64(), event.state);
    }

    for stop in &report.stops {
        let outcome = match stop.outcome {
            StopOutcome::Signaled(signal) => format!("sent {signal}"),
            StopOutcome::AlreadyExited(_) => "already exited".to_string(),
        };
        let status = stop
            .exit_status
            .map(|s| s.to_string())
            .unwrap_or_else(|| "still running".to_string());
        println!("  {:<8} pid {:<8} {} ({})", stop.role, stop.pid, outcome, status);
    }

    for role in &report.unexpected_exits {
        println!("  {role} exited before it was stopped");
    }

    match &report.capture_file {
        Some(file) => match file.size {
            Some(size) => println!("Capture file: {} ({} bytes)", file.path.display(), size),
            None => println!("Capture file: {} (missing)", file.path.display()),
        },
        None => println!("Capture file: not checked"),
    }

    if !report.warnings.is_empty() {
        println!();
        println!("Warnings:");
        for warning in &report.warnings {
            println!("  - {warning}");
        }
    }
}
