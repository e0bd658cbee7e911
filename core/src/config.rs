//! Benchmark configuration types

use std::fmt;
use std::net::{IpAddr, Ipv4Addr};
use std::path::{Path, PathBuf};
use std::str::FromStr;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::{BenchError, BenchResult};

/// Port the throughput server listens on unless configured otherwise
pub const DEFAULT_PORT: u16 = 8080;

/// Seconds both children run before shutdown begins
pub const DEFAULT_DURATION_SECS: u64 = 250;

/// Capture file written when no path is configured
pub const DEFAULT_OUTPUT_FILE: &str = "server_capture.pcap";

/// Benchmark configuration
///
/// Everything a run needs is carried here and handed to the orchestrator at
/// construction time; nothing is read from process-wide state.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct BenchmarkConfig {
    /// Address the throughput server binds (`0.0.0.0` binds every address)
    pub server_ip: IpAddr,

    /// Port served by the throughput server and used as the capture filter
    pub port: u16,

    /// Interface the capture listens on
    pub interface: String,

    /// Path of the capture file
    pub output_file: PathBuf,

    /// How long both children run, in seconds
    pub duration_secs: u64,

    /// Throughput server executable
    pub server_program: String,

    /// Packet capture executable
    pub capture_program: String,

    /// Signal used to stop the server
    pub server_signal: StopSignal,

    /// Signal used to stop the capture
    pub capture_signal: StopSignal,

    /// Whether observed failures abort the run or are only logged
    pub failure_policy: FailurePolicy,

    /// What to do when the capture file already exists
    pub output_policy: OutputPolicy,

    /// End the running phase early when either child exits on its own
    pub abort_on_child_exit: bool,

    /// Pause after starting both children before checking they are alive
    pub startup_grace_ms: u64,

    /// Bounded wait for each child to exit after it is signalled; `null`
    /// signals without waiting
    pub exit_timeout_ms: Option<u64>,
}

impl Default for BenchmarkConfig {
    fn default() -> Self {
        Self {
            server_ip: IpAddr::V4(Ipv4Addr::UNSPECIFIED),
            port: DEFAULT_PORT,
            interface: "eth0".to_string(),
            output_file: PathBuf::from(DEFAULT_OUTPUT_FILE),
            duration_secs: DEFAULT_DURATION_SECS,
            server_program: "iperf3".to_string(),
            capture_program: "tcpdump".to_string(),
            server_signal: StopSignal::Terminate,
            capture_signal: StopSignal::Interrupt,
            failure_policy: FailurePolicy::BestEffort,
            output_policy: OutputPolicy::Overwrite,
            abort_on_child_exit: false,
            startup_grace_ms: 0,
            exit_timeout_ms: Some(5_000),
        }
    }
}

impl BenchmarkConfig {
    /// Create a config for the given port with default settings otherwise
    pub fn new(port: u16) -> Self {
        Self {
            port,
            ..Default::default()
        }
    }

    /// Load a config from a JSON file; missing fields take their defaults
    pub fn from_json_file(path: impl AsRef<Path>) -> BenchResult<Self> {
        let raw = std::fs::read_to_string(path.as_ref())?;
        serde_json::from_str(&raw).map_err(|e| {
            BenchError::config(format!("{}: {e}", path.as_ref().display()))
        })
    }

    /// Set the interface
    pub fn with_interface(mut self, interface: impl Into<String>) -> Self {
        self.interface = interface.into();
        self
    }

    /// Set the capture file path
    pub fn with_output_file(mut self, path: impl Into<PathBuf>) -> Self {
        self.output_file = path.into();
        self
    }

    /// Set the running duration
    pub fn with_duration(mut self, duration: Duration) -> Self {
        self.duration_secs = duration.as_secs();
        self
    }

    /// Set the failure policy
    pub fn with_failure_policy(mut self, policy: FailurePolicy) -> Self {
        self.failure_policy = policy;
        self
    }

    /// Running duration
    pub fn duration(&self) -> Duration {
        Duration::from_secs(self.duration_secs)
    }

    /// Startup grace period
    pub fn startup_grace(&self) -> Duration {
        Duration::from_millis(self.startup_grace_ms)
    }

    /// Bounded exit wait, if any
    pub fn exit_timeout(&self) -> Option<Duration> {
        self.exit_timeout_ms.map(Duration::from_millis)
    }

    /// Validate the configuration
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.port == 0 {
            return Err(ConfigError::InvalidPort(
                "port must be between 1 and 65535".into(),
            ));
        }

        if self.interface.trim().is_empty() {
            return Err(ConfigError::MissingField("interface"));
        }

        if self.output_file.as_os_str().is_empty() {
            return Err(ConfigError::MissingField("output_file"));
        }

        if self.server_program.trim().is_empty() {
            return Err(ConfigError::MissingField("server_program"));
        }

        if self.capture_program.trim().is_empty() {
            return Err(ConfigError::MissingField("capture_program"));
        }

        Ok(())
    }
}

/// How the orchestrator reacts to failures it observes
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FailurePolicy {
    /// Log the failure and keep going through the fixed sequence
    #[default]
    BestEffort,
    /// Stop the run and return the failure
    Strict,
}

impl FailurePolicy {
    /// Whether failures abort the run
    pub fn is_strict(self) -> bool {
        self == Self::Strict
    }
}

/// What to do with an existing capture file
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OutputPolicy {
    /// Let the capture tool overwrite it
    #[default]
    Overwrite,
    /// Refuse to start
    Fail,
}

/// Termination signal delivered to a child
///
/// Only catchable signals are offered; a child is never force-killed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StopSignal {
    /// SIGINT
    Interrupt,
    /// SIGTERM
    Terminate,
    /// SIGHUP
    Hangup,
}

impl StopSignal {
    /// Platform signal for this variant
    pub fn as_nix(self) -> nix::sys::signal::Signal {
        use nix::sys::signal::Signal;
        match self {
            Self::Interrupt => Signal::SIGINT,
            Self::Terminate => Signal::SIGTERM,
            Self::Hangup => Signal::SIGHUP,
        }
    }
}

impl fmt::Display for StopSignal {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_nix().as_str())
    }
}

impl FromStr for StopSignal {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let name = s.trim().to_ascii_uppercase();
        match name.strip_prefix("SIG").unwrap_or(&name) {
            "INT" | "INTERRUPT" => Ok(Self::Interrupt),
            "TERM" | "TERMINATE" => Ok(Self::Terminate),
            "HUP" | "HANGUP" => Ok(Self::Hangup),
            _ => Err(ConfigError::InvalidSignal(s.to_string())),
        }
    }
}

/// Configuration validation errors
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    /// Invalid port value
    #[error("Invalid port: {0}")]
    InvalidPort(String),

    /// A required field is empty
    #[error("Missing value for `{0}`")]
    MissingField(&'static str),

    /// A size or count that must be positive is zero
    #[error("`{0}` must be greater than zero")]
    Zero(&'static str),

    /// Unknown stop signal name
    #[error("Invalid stop signal `{0}` (expected INT, TERM or HUP)")]
    InvalidSignal(String),
}
