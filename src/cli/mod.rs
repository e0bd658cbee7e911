//! CLI argument parsing and command dispatch

use anyhow::Result;
use clap::{Parser, Subcommand};

mod analyze;
mod run;
mod send;

pub use analyze::{CaptureArgs, CwndArgs};
pub use run::RunArgs;
pub use send::SendArgs;

/// netcap-bench - throughput server and packet capture benchmark
#[derive(Parser, Debug)]
#[command(name = "netcap-bench")]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    /// Enable verbose logging
    #[arg(short, long, global = true)]
    pub verbose: bool,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Run the server and capture for a fixed duration
    Run(RunArgs),
    /// Send paced TCP traffic to a server
    Send(SendArgs),
    /// Reconstruct connection lifetimes from a capture
    AnalyzeCapture(CaptureArgs),
    /// Extract congestion-window series from iperf3 client logs
    AnalyzeCwnd(CwndArgs),
}

impl Cli {
    /// Execute the selected command
    pub async fn run(&self) -> Result<()> {
        match &self.command {
            Commands::Run(args) => args.execute().await,
            Commands::Send(args) => args.execute().await,
            Commands::AnalyzeCapture(args) => args.execute().await,
            Commands::AnalyzeCwnd(args) => args.execute(),
        }
    }
}
