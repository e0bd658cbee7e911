//! Builder pattern for Orchestrator construction

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use crate::config::{BenchmarkConfig, FailurePolicy};
use crate::error::{BenchError, BenchResult};
use crate::tool::{Iperf3Server, TcpdumpCapture, ToolSpec};

use super::executor::Orchestrator;

/// Builder for creating an Orchestrator with proper configuration
///
/// Tools default to iperf3 and tcpdump using the programs named in the
/// config.
///
/// # Example
///
/// ```ignore
/// let orchestrator = OrchestratorBuilder::new()
///     .port(8080)
///     .interface("lo")
///     .duration(Duration::from_secs(250))
///     .build()?;
/// ```
pub struct OrchestratorBuilder {
    config: BenchmarkConfig,
    server: Option<Arc<dyn ToolSpec>>,
    capture: Option<Arc<dyn ToolSpec>>,
}

impl OrchestratorBuilder {
    /// Create a new orchestrator builder with default configuration
    pub fn new() -> Self {
        Self {
            config: BenchmarkConfig::default(),
            server: None,
            capture: None,
        }
    }

    /// Set the full benchmark configuration
    pub fn config(mut self, config: BenchmarkConfig) -> Self {
        self.config = config;
        self
    }

    /// Set the server port
    pub fn port(mut self, port: u16) -> Self {
        self.config.port = port;
        self
    }

    /// Set the capture interface
    pub fn interface(mut self, interface: impl Into<String>) -> Self {
        self.config.interface = interface.into();
        self
    }

    /// Set the capture file path
    pub fn output_file(mut self, path: impl Into<PathBuf>) -> Self {
        self.config.output_file = path.into();
        self
    }

    /// Set the running duration
    pub fn duration(mut self, duration: Duration) -> Self {
        self.config.duration_secs = duration.as_secs();
        self
    }

    /// Set the failure policy
    pub fn failure_policy(mut self, policy: FailurePolicy) -> Self {
        self.config.failure_policy = policy;
        self
    }

    /// Use a custom throughput server tool
    pub fn server_tool(mut self, tool: Arc<dyn ToolSpec>) -> Self {
        self.server = Some(tool);
        self
    }

    /// Use a custom capture tool
    pub fn capture_tool(mut self, tool: Arc<dyn ToolSpec>) -> Self {
        self.capture = Some(tool);
        self
    }

    /// Build the orchestrator
    ///
    /// # Errors
    ///
    /// Returns an error if configuration validation fails.
    pub fn build(self) -> BenchResult<Orchestrator> {
        self.config
            .validate()
            .map_err(|e| BenchError::config(e.to_string()))?;

        let server: Arc<dyn ToolSpec> = match self.server {
            Some(tool) => tool,
            None => Arc::new(Iperf3Server::new(&self.config.server_program)),
        };
        let capture: Arc<dyn ToolSpec> = match self.capture {
            Some(tool) => tool,
            None => Arc::new(TcpdumpCapture::new(&self.config.capture_program)),
        };

        Ok(Orchestrator::new(self.config, server, capture))
    }
}

impl Default for OrchestratorBuilder {
    fn default() -> Self {
        Self::new()
    }
}
