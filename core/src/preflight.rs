//! Checks run before any child is started
//!
//! The orchestrator runs these and then either logs or returns the result,
//! depending on the failure policy.

use std::io::ErrorKind;
use std::net::{IpAddr, TcpListener};
use std::path::Path;

use crate::config::OutputPolicy;
use crate::error::{BenchError, BenchResult};

/// Check that `ip:port` can be bound
///
/// The probe listener is released before returning, so the server can take
/// the port right after. Another process may still grab it in between.
pub fn probe_port(ip: IpAddr, port: u16) -> BenchResult<()> {
    match TcpListener::bind((ip, port)) {
        Ok(listener) => {
            drop(listener);
            Ok(())
        }
        Err(e) if e.kind() == ErrorKind::AddrInUse => Err(BenchError::PortInUse { ip, port }),
        Err(e) => Err(BenchError::Io(e)),
    }
}

/// Apply the output policy to an existing capture file
pub fn check_output(path: &Path, policy: OutputPolicy) -> BenchResult<()> {
    if !path.exists() {
        return Ok(());
    }

    match policy {
        OutputPolicy::Overwrite => {
            tracing::info!(path = %path.display(), "Existing capture file will be overwritten");
            Ok(())
        }
        OutputPolicy::Fail => Err(BenchError::OutputExists {
            path: path.to_path_buf(),
        }),
    }
}

/// Whether the process runs with root privilege
///
/// Packet capture normally needs it; running without it is still allowed
/// since capabilities or group permissions may grant access.
pub fn has_capture_privilege() -> bool {
    nix::unistd::geteuid().is_root()
}

/// Whether a capture tool diagnostic points at missing privilege
pub fn is_privilege_diagnostic(line: &str) -> bool {
    let line = line.to_ascii_lowercase();
    line.contains("permission") || line.contains("not permitted")
}
