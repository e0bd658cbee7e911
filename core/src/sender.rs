//! Paced TCP traffic sender
//!
//! Writes a fixed number of bytes to the throughput server in small chunks
//! with a pause after each one, optionally with Nagle's algorithm and
//! delayed ACKs turned off. This is the client-side workload whose packets
//! the capture records.

use std::net::{IpAddr, Ipv4Addr, SocketAddr};
use std::time::{Duration, Instant};

use serde::{Deserialize, Serialize};
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpStream;
use tracing::{debug, info, trace, warn};

use crate::config::{ConfigError, DEFAULT_PORT};
use crate::error::{BenchError, BenchResult};

/// Bytes sent per run unless configured otherwise
pub const DEFAULT_TOTAL_BYTES: u64 = 4096;

/// Bytes written per chunk unless configured otherwise
pub const DEFAULT_CHUNK_BYTES: usize = 40;

/// Pause after each chunk unless configured otherwise, in microseconds
pub const DEFAULT_INTERVAL_US: u64 = 500;

/// Largest server reply that is read back
const RESPONSE_BUF: usize = 1024;

/// Traffic sender configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SenderConfig {
    /// Server address
    pub server_ip: IpAddr,

    /// Server port
    pub port: u16,

    /// Total payload size
    pub total_bytes: u64,

    /// Payload written per chunk
    pub chunk_bytes: usize,

    /// Pause after each chunk in microseconds; tokio timers round this up
    /// to whole milliseconds
    pub interval_us: u64,

    /// Set `TCP_NODELAY`
    pub disable_nagle: bool,

    /// Set `TCP_QUICKACK` where the platform has it
    pub disable_delayed_ack: bool,

    /// How long to wait for a reply once everything is sent; `None` waits
    /// until the server replies or closes
    pub response_timeout_ms: Option<u64>,
}

impl Default for SenderConfig {
    fn default() -> Self {
        Self {
            server_ip: IpAddr::V4(Ipv4Addr::UNSPECIFIED),
            port: DEFAULT_PORT,
            total_bytes: DEFAULT_TOTAL_BYTES,
            chunk_bytes: DEFAULT_CHUNK_BYTES,
            interval_us: DEFAULT_INTERVAL_US,
            disable_nagle: false,
            disable_delayed_ack: false,
            response_timeout_ms: Some(1_000),
        }
    }
}

impl SenderConfig {
    /// Server socket address
    pub fn addr(&self) -> SocketAddr {
        SocketAddr::new(self.server_ip, self.port)
    }

    /// Pause after each chunk
    pub fn interval(&self) -> Duration {
        Duration::from_micros(self.interval_us)
    }

    /// Validate the configuration
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.port == 0 {
            return Err(ConfigError::InvalidPort(
                "port must be between 1 and 65535".into(),
            ));
        }
        if self.chunk_bytes == 0 {
            return Err(ConfigError::Zero("chunk_bytes"));
        }
        Ok(())
    }
}

/// Outcome of one send
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SendReport {
    /// Payload bytes written
    pub bytes_sent: u64,
    /// Number of writes
    pub chunks: u64,
    /// Time from connect to the last write
    pub elapsed: Duration,
    /// Whether `TCP_NODELAY` was applied
    pub nodelay: bool,
    /// Whether `TCP_QUICKACK` was applied
    pub quickack: bool,
    /// Server reply, if any arrived
    pub response: Option<String>,
}

/// Sends paced traffic to a server
#[derive(Debug, Clone)]
pub struct TrafficSender {
    config: SenderConfig,
}

impl TrafficSender {
    /// Create a sender, validating `config`
    pub fn new(config: SenderConfig) -> BenchResult<Self> {
        config
            .validate()
            .map_err(|e| BenchError::config(e.to_string()))?;
        Ok(Self { config })
    }

    /// Sender configuration
    pub fn config(&self) -> &SenderConfig {
        &self.config
    }

    /// Connect, send the whole payload and read the reply
    pub async fn run(&self) -> BenchResult<SendReport> {
        let addr = self.config.addr();
        let mut stream = TcpStream::connect(addr)
            .await
            .map_err(|source| BenchError::Connect { addr, source })?;
        info!(%addr, "Connected to server");

        if self.config.disable_nagle {
            stream.set_nodelay(true)?;
            info!("Nagle's algorithm disabled (TCP_NODELAY)");
        }
        let nodelay = self.config.disable_nagle;

        let quickack = self.config.disable_delayed_ack
            && match set_quickack(&stream) {
                Ok(()) => {
                    info!("Delayed ACK disabled (TCP_QUICKACK)");
                    true
                }
                Err(e) => {
                    warn!(error = %e, "Could not disable delayed ACK");
                    false
                }
            };

        let started = Instant::now();
        let (bytes_sent, chunks) = self.send_payload(&mut stream).await?;
        let elapsed = started.elapsed();
        info!(
            bytes_sent,
            chunks,
            elapsed_ms = elapsed.as_millis() as u64,
            "Finished sending"
        );

        let response = self.read_response(&mut stream).await?;
        if let Err(e) = stream.shutdown().await {
            debug!(error = %e, "Shutdown after send failed");
        }

        Ok(SendReport {
            bytes_sent,
            chunks,
            elapsed,
            nodelay,
            quickack,
            response,
        })
    }

    async fn send_payload(&self, stream: &mut TcpStream) -> BenchResult<(u64, u64)> {
        let chunk = vec![b'A'; self.config.chunk_bytes];
        let total = self.config.total_bytes;
        let interval = self.config.interval();

        let mut sent = 0u64;
        let mut chunks = 0u64;
        while sent < total {
            let len = (total - sent).min(chunk.len() as u64) as usize;
            stream.write_all(&chunk[..len]).await?;
            sent += len as u64;
            chunks += 1;
            trace!(bytes = len, sent, total, "Sent chunk");

            if !interval.is_zero() {
                tokio::time::sleep(interval).await;
            }
        }
        stream.flush().await?;
        Ok((sent, chunks))
    }

    async fn read_response(&self, stream: &mut TcpStream) -> BenchResult<Option<String>> {
        let mut buf = [0u8; RESPONSE_BUF];
        let read = match self.config.response_timeout_ms {
            Some(ms) => {
                let wait = Duration::from_millis(ms);
                match tokio::time::timeout(wait, stream.read(&mut buf)).await {
                    Ok(read) => read?,
                    Err(_) => {
                        debug!(timeout_ms = ms, "No server response");
                        return Ok(None);
                    }
                }
            }
            None => stream.read(&mut buf).await?,
        };

        if read == 0 {
            return Ok(None);
        }
        let response = String::from_utf8_lossy(&buf[..read]).into_owned();
        info!(response = %response, "Server response");
        Ok(Some(response))
    }
}

#[cfg(target_os = "linux")]
fn set_quickack(stream: &TcpStream) -> std::io::Result<()> {
    socket2::SockRef::from(stream).set_tcp_quickack(true)
}

#[cfg(not(target_os = "linux"))]
fn set_quickack(_stream: &TcpStream) -> std::io::Result<()> {
    Err(std::io::Error::new(
        std::io::ErrorKind::Unsupported,
        "TCP_QUICKACK is not available on this platform",
    ))
}
