//! TCP header extraction from capture files via `tshark`

use std::path::Path;
use std::process::Stdio;

use tokio::process::Command;
use tracing::{debug, info};

use crate::error::{ReportError, ReportResult};

/// Fields extracted per packet, in CSV column order
pub const TCP_FIELDS: [&str; 6] = [
    "frame.time_epoch",
    "ip.src",
    "ip.dst",
    "tcp.srcport",
    "tcp.dstport",
    "tcp.flags",
];

/// Runs `tshark` to dump TCP header fields of a capture into CSV
#[derive(Debug, Clone)]
pub struct TsharkExtractor {
    program: String,
}

impl Default for TsharkExtractor {
    fn default() -> Self {
        Self::new("tshark")
    }
}

impl TsharkExtractor {
    /// Use `program` as the tshark executable
    pub fn new(program: impl Into<String>) -> Self {
        Self {
            program: program.into(),
        }
    }

    /// Arguments passed to tshark for `pcap`
    pub fn command_args(pcap: &Path) -> Vec<String> {
        let mut args = vec![
            "-r".to_string(),
            pcap.display().to_string(),
            "-T".to_string(),
            "fields".to_string(),
        ];
        for field in TCP_FIELDS {
            args.push("-e".to_string());
            args.push(field.to_string());
        }
        for option in ["header=y", "separator=,", "quote=d", "occurrence=f"] {
            args.push("-E".to_string());
            args.push(option.to_string());
        }
        args
    }

    /// Extract fields of `pcap` into `csv`, overwriting it
    pub async fn extract(&self, pcap: &Path, csv: &Path) -> ReportResult<()> {
        let out = std::fs::File::create(csv)?;
        let args = Self::command_args(pcap);
        debug!(program = %self.program, ?args, "Running field extraction");

        let status = Command::new(&self.program)
            .args(&args)
            .stdin(Stdio::null())
            .stdout(Stdio::from(out))
            .status()
            .await
            .map_err(|source| ReportError::Spawn {
                program: self.program.clone(),
                source,
            })?;

        if !status.success() {
            return Err(ReportError::Tshark(status));
        }

        info!(pcap = %pcap.display(), csv = %csv.display(), "Extracted TCP fields");
        Ok(())
    }
}
