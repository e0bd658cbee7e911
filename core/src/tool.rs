//! Command lines for the external throughput server and capture tools
//!
//! The orchestrator never talks to either tool beyond starting it and
//! signalling it, so a tool is fully described by how its command line is
//! derived from a [`BenchmarkConfig`].

use std::fmt;

use crate::config::BenchmarkConfig;

/// A program and its arguments, ready to spawn
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ToolCommand {
    /// Executable name or path
    pub program: String,
    /// Arguments, not shell-interpreted
    pub args: Vec<String>,
}

impl ToolCommand {
    /// Create a command with no arguments
    pub fn new(program: impl Into<String>) -> Self {
        Self {
            program: program.into(),
            args: Vec::new(),
        }
    }

    /// Append one argument
    pub fn arg(mut self, arg: impl Into<String>) -> Self {
        self.args.push(arg.into());
        self
    }

    /// Append several arguments
    pub fn args<I, S>(mut self, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.args.extend(args.into_iter().map(Into::into));
        self
    }
}

impl fmt::Display for ToolCommand {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.program)?;
        for arg in &self.args {
            write!(f, " {arg}")?;
        }
        Ok(())
    }
}

/// Builds the command line of an external tool from the benchmark config
///
/// Implementations exist for iperf3 and tcpdump; tests substitute stand-ins
/// that behave like long-running tools.
pub trait ToolSpec: Send + Sync {
    /// Tool identifier used in logs (e.g., "iperf3", "tcpdump")
    fn name(&self) -> &str;

    /// Command line for this run
    fn command(&self, config: &BenchmarkConfig) -> ToolCommand;
}

/// iperf3 in server mode
///
/// Runs in the foreground (no `-D`) so the spawned pid is the server itself
/// and can be signalled directly.
#[derive(Debug, Clone)]
pub struct Iperf3Server {
    program: String,
}

impl Iperf3Server {
    /// Use the given iperf3 executable
    pub fn new(program: impl Into<String>) -> Self {
        Self {
            program: program.into(),
        }
    }
}

impl Default for Iperf3Server {
    fn default() -> Self {
        Self::new("iperf3")
    }
}

impl ToolSpec for Iperf3Server {
    fn name(&self) -> &str {
        "iperf3"
    }

    fn command(&self, config: &BenchmarkConfig) -> ToolCommand {
        let cmd = ToolCommand::new(&self.program).args(["-s", "-p"]).arg(config.port.to_string());
        if config.server_ip.is_unspecified() {
            cmd
        } else {
            cmd.arg("-B").arg(config.server_ip.to_string())
        }
    }
}

/// tcpdump writing a capture file filtered to the server port
#[derive(Debug, Clone)]
pub struct TcpdumpCapture {
    program: String,
}

impl TcpdumpCapture {
    /// Use the given tcpdump executable
    pub fn new(program: impl Into<String>) -> Self {
        Self {
            program: program.into(),
        }
    }
}

impl Default for TcpdumpCapture {
    fn default() -> Self {
        Self::new("tcpdump")
    }
}

impl ToolSpec for TcpdumpCapture {
    fn name(&self) -> &str {
        "tcpdump"
    }

    fn command(&self, config: &BenchmarkConfig) -> ToolCommand {
        // -U flushes per packet so an interrupted capture still leaves
        // complete records on disk
        ToolCommand::new(&self.program)
            .arg("-i")
            .arg(&config.interface)
            .arg("-w")
            .arg(config.output_file.to_string_lossy())
            .arg("-U")
            .args(["port".to_string(), config.port.to_string()])
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[test]
    fn test_iperf3_server_all_addresses() {
        let config = BenchmarkConfig::default();
        let cmd = Iperf3Server::default().command(&config);
        assert_eq!(cmd.to_string(), "iperf3 -s -p 8080");
    }

    #[test]
    fn test_iperf3_server_bind_address() {
        let config = BenchmarkConfig {
            server_ip: "10.0.0.7".parse().unwrap(),
            ..BenchmarkConfig::new(5201)
        };
        let cmd = Iperf3Server::new("/usr/local/bin/iperf3").command(&config);
        assert_eq!(cmd.program, "/usr/local/bin/iperf3");
        assert_eq!(cmd.args, ["-s", "-p", "5201", "-B", "10.0.0.7"]);
    }

    #[test]
    fn test_tcpdump_capture_command() {
        let config = BenchmarkConfig::default()
            .with_interface("h7-eth0")
            .with_output_file("out/run.pcap")
            .with_duration(Duration::from_secs(1));
        let cmd = TcpdumpCapture::default().command(&config);
        assert_eq!(
            cmd.to_string(),
            "tcpdump -i h7-eth0 -w out/run.pcap -U port 8080"
        );
    }
}
