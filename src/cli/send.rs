//! `send` command

use std::net::IpAddr;

use anyhow::{Context, Result};
use clap::Args;
use netcap_bench_core::{SenderConfig, TrafficSender};

/// Arguments of the `send` command
#[derive(Args, Debug)]
pub struct SendArgs {
    /// Server address
    #[arg(long, default_value = "0.0.0.0")]
    pub server_ip: IpAddr,

    /// Server port
    #[arg(short, long, default_value = "8080")]
    pub port: u16,

    /// Total bytes to send
    #[arg(long, default_value = "4096")]
    pub total_bytes: u64,

    /// Bytes written per interval
    #[arg(long, default_value = "40")]
    pub rate_bytes: usize,

    /// Pause after each write, in microseconds
    #[arg(long, default_value = "500")]
    pub interval_us: u64,

    /// Disable Nagle's algorithm (TCP_NODELAY)
    #[arg(long)]
    pub disable_nagle: bool,

    /// Disable delayed ACK (TCP_QUICKACK, Linux only)
    #[arg(long)]
    pub disable_delayed_ack: bool,

    /// Wait for a server reply after sending, 0 waits until it replies or closes
    #[arg(long, default_value = "1000")]
    pub response_timeout_ms: u64,
}

impl SendArgs {
    /// Sender configuration for these flags
    pub fn sender_config(&self) -> SenderConfig {
        SenderConfig {
            server_ip: self.server_ip,
            port: self.port,
            total_bytes: self.total_bytes,
            chunk_bytes: self.rate_bytes,
            interval_us: self.interval_us,
            disable_nagle: self.disable_nagle,
            disable_delayed_ack: self.disable_delayed_ack,
            response_timeout_ms: (self.response_timeout_ms > 0)
                .then_some(self.response_timeout_ms),
        }
    }

    /// Send the payload
    pub async fn execute(&self) -> Result<()> {
        let sender =
            TrafficSender::new(self.sender_config()).context("Invalid sender configuration")?;
        let addr = sender.config().addr();

        let report = sender
            .run()
            .await
            .with_context(|| format!("Sending to {addr} failed"))?;

        println!("Connected to server at {addr}");
        if report.nodelay {
            println!("  TCP_NODELAY:  set");
        }
        if report.quickack {
            println!("  TCP_QUICKACK: set");
        }
        println!(
            "Sent {} bytes in {} chunks ({:.3}s)",
            report.bytes_sent,
            report.chunks,
            report.elapsed.as_secs_f64()
        );
        match &report.response {
            Some(response) => println!("Server response: {response}"),
            None => println!("No server response"),
        }
        Ok(())
    }
}
