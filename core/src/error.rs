//! Error types for netcap-bench-core

use std::net::{IpAddr, SocketAddr};
use std::path::PathBuf;
use std::process::ExitStatus;
use std::time::Duration;

use thiserror::Error;

use crate::orchestrator::RunState;
use crate::process::ProcessRole;

/// Core error type
///
/// Each failure the orchestrator can observe has its own variant so callers
/// can tell a busy port from a capture that lacked privilege.
#[derive(Error, Debug)]
pub enum BenchError {
    /// Configuration error
    #[error("configuration error: {0}")]
    Config(String),

    /// The server port is already bound by another socket
    #[error("port {port} on {ip} is already in use")]
    PortInUse {
        /// Address the probe tried to bind
        ip: IpAddr,
        /// Port the probe tried to bind
        port: u16,
    },

    /// A child process could not be spawned
    #[error("failed to start {role} `{program}`: {source}")]
    Spawn {
        /// Which child failed
        role: ProcessRole,
        /// Program that was executed
        program: String,
        /// Underlying spawn error
        #[source]
        source: std::io::Error,
    },

    /// The throughput server exited before it was asked to stop
    #[error("server exited before shutdown ({status}){}", fmt_stderr(.stderr))]
    ServerExited {
        /// Exit status of the server
        status: ExitStatus,
        /// Last line the server wrote to stderr
        stderr: Option<String>,
    },

    /// The capture tool was refused access to the interface
    #[error("capture on `{interface}` lacks privilege: {detail}")]
    CapturePrivilege {
        /// Interface the capture was started on
        interface: String,
        /// Diagnostic reported by the capture tool
        detail: String,
    },

    /// The capture tool exited before it was asked to stop
    #[error("capture exited before shutdown ({status}){}", fmt_stderr(.stderr))]
    CaptureExited {
        /// Exit status of the capture tool
        status: ExitStatus,
        /// Last line the capture tool wrote to stderr
        stderr: Option<String>,
    },

    /// The output file exists and the output policy forbids reuse
    #[error("output file {} already exists", .path.display())]
    OutputExists {
        /// Existing output path
        path: PathBuf,
    },

    /// No capture file was found after the run
    #[error("capture file {} was not produced", .path.display())]
    CaptureFileMissing {
        /// Expected output path
        path: PathBuf,
    },

    /// Delivering a stop signal failed for a reason other than the process
    /// having already exited
    #[error("failed to signal {role} (pid {pid}): {source}")]
    Signal {
        /// Which child was signalled
        role: ProcessRole,
        /// Process id that was signalled
        pid: u32,
        /// Platform error
        #[source]
        source: nix::Error,
    },

    /// A signalled child did not exit within the configured wait
    #[error("{role} (pid {pid}) did not exit within {timeout:?}")]
    TerminationTimeout {
        /// Which child is still running
        role: ProcessRole,
        /// Process id of the child
        pid: u32,
        /// How long the orchestrator waited
        timeout: Duration,
    },

    /// The run lifecycle was driven out of order
    #[error("invalid state transition from {from} to {to}")]
    InvalidTransition {
        /// Current state
        from: RunState,
        /// Requested state
        to: RunState,
    },

    /// The traffic sender could not reach the server
    #[error("failed to connect to {addr}: {source}")]
    Connect {
        /// Server address
        addr: SocketAddr,
        /// Underlying connect error
        #[source]
        source: std::io::Error,
    },

    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

fn fmt_stderr(stderr: &Option<String>) -> String {
    match stderr {
        Some(line) => format!(": {line}"),
        None => String::new(),
    }
}

impl BenchError {
    /// Create a configuration error
    pub fn config(msg: impl Into<String>) -> Self {
        Self::Config(msg.into())
    }

    /// Whether this error means the capture tool could not open the interface
    pub fn is_privilege_error(&self) -> bool {
        matches!(self, Self::CapturePrivilege { .. })
    }
}

/// Result type alias
pub type BenchResult<T> = std::result::Result<T, BenchError>;

#[cfg(test)]
mod tests {
    use super::*;
    use std::os::unix::process::ExitStatusExt;

    #[test]
    fn test_port_in_use_message() {
        let err = BenchError::PortInUse {
            ip: "127.0.0.1".parse().unwrap(),
            port: 8080,
        };
        assert_eq!(err.to_string(), "port 8080 on 127.0.0.1 is already in use");
    }

    #[test]
    fn test_exited_message_includes_stderr() {
        let err = BenchError::CaptureExited {
            status: ExitStatus::from_raw(1 << 8),
            stderr: Some("tcpdump: eth9: No such device exists".into()),
        };
        let msg = err.to_string();
        assert!(msg.starts_with("capture exited before shutdown"));
        assert!(msg.ends_with(": tcpdump: eth9: No such device exists"));
    }

    #[test]
    fn test_exited_message_without_stderr() {
        let err = BenchError::ServerExited {
            status: ExitStatus::from_raw(1 << 8),
            stderr: None,
        };
        assert!(err.to_string().ends_with(')'));
    }

    #[test]
    fn test_privilege_classification() {
        let err = BenchError::CapturePrivilege {
            interface: "lo".into(),
            detail: "Operation not permitted".into(),
        };
        assert!(err.is_privilege_error());
        assert!(!BenchError::config("x").is_privilege_error());
    }
}
