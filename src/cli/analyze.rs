//! `analyze-capture` and `analyze-cwnd` commands

use std::path::PathBuf;
use std::time::Duration;

use anyhow::{Context, Result};
use clap::Args;
use netcap_bench_report::{
    ConnectionPlotter, ConnectionTracker, CsvExporter, CwndPlotter, CwndSeries, Marker,
    TsharkExtractor,
};
use plotters::style::{GREEN, RED};

/// Field dump written next to the working directory when extracting a capture
const DEFAULT_FIELDS_CSV: &str = "tcp_fields.csv";

/// Arguments of the `analyze-capture` command
#[derive(Args, Debug)]
pub struct CaptureArgs {
    /// Capture file to extract TCP fields from with tshark
    #[arg(long, required_unless_present = "fields_csv")]
    pub pcap: Option<PathBuf>,

    /// Field CSV to read; with --pcap, where the extraction is written [default: tcp_fields.csv]
    #[arg(long)]
    pub fields_csv: Option<PathBuf>,

    /// tshark executable
    #[arg(long, default_value = "tshark")]
    pub tshark: String,

    /// Seconds assigned to connections with no FIN+ACK or RST
    #[arg(long, default_value = "100")]
    pub default_duration: u64,

    /// Write connection summaries to this CSV
    #[arg(long)]
    pub csv: Option<PathBuf>,

    /// Write a duration scatter plot to this PNG
    #[arg(long)]
    pub plot: Option<PathBuf>,

    /// Attack start, seconds after the first connection
    #[arg(long)]
    pub attack_start: Option<f64>,

    /// Attack end, seconds after the first connection
    #[arg(long)]
    pub attack_end: Option<f64>,
}

impl CaptureArgs {
    /// Extract, summarise and export connection lifetimes
    pub async fn execute(&self) -> Result<()> {
        let fields_csv = self
            .fields_csv
            .clone()
            .unwrap_or_else(|| PathBuf::from(DEFAULT_FIELDS_CSV));

        if let Some(pcap) = &self.pcap {
            TsharkExtractor::new(&self.tshark)
                .extract(pcap, &fields_csv)
                .await
                .with_context(|| format!("Failed to extract TCP fields from: {}", pcap.display()))?;
        }

        let file = std::fs::File::open(&fields_csv)
            .with_context(|| format!("Failed to open field CSV: {}", fields_csv.display()))?;
        let tracker = ConnectionTracker::from_csv(file)
            .with_context(|| format!("Failed to parse field CSV: {}", fields_csv.display()))?;

        let summaries = tracker.summaries(Duration::from_secs(self.default_duration));
        println!(
            "Processed {} connections ({} rows skipped).",
            summaries.len(),
            tracker.skipped_rows()
        );
        if summaries.is_empty() {
            tracing::warn!("No valid connections were found");
            return Ok(());
        }

        let terminated = summaries.iter().filter(|s| s.terminated).count();
        println!("  Terminated:   {}", terminated);
        println!("  Still open:   {}", summaries.len() - terminated);

        if let Some(path) = &self.csv {
            CsvExporter::export_connections(&summaries, path)
                .with_context(|| format!("Failed to write {}", path.display()))?;
            println!("Wrote {}", path.display());
        }

        if let Some(path) = &self.plot {
            ConnectionPlotter::plot(&summaries, &self.markers(), path)
                .with_context(|| format!("Failed to plot {}", path.display()))?;
            println!("Wrote {}", path.display());
        }

        Ok(())
    }

    fn markers(&self) -> Vec<Marker> {
        let mut markers = Vec::new();
        if let Some(offset) = self.attack_start {
            markers.push(Marker::new(offset, "Attack Start", RED));
        }
        if let Some(offset) = self.attack_end {
            markers.push(Marker::new(offset, "Attack End", GREEN));
        }
        markers
    }
}

/// Arguments of the `analyze-cwnd` command
#[derive(Args, Debug)]
pub struct CwndArgs {
    /// iperf3 client log files
    #[arg(long = "log", required = true, num_args = 1..)]
    pub logs: Vec<PathBuf>,

    /// Write all samples to this CSV
    #[arg(long)]
    pub csv: Option<PathBuf>,

    /// Directory receiving one `<log name>.png` per log
    #[arg(long)]
    pub plot_dir: Option<PathBuf>,
}

impl CwndArgs {
    /// Parse, export and plot congestion-window series
    pub fn execute(&self) -> Result<()> {
        let mut all = Vec::with_capacity(self.logs.len());
        for log in &self.logs {
            let series = CwndSeries::from_file(log)
                .with_context(|| format!("Failed to read iperf3 log: {}", log.display()))?;
            match series.max_cwnd() {
                Some(max) => println!(
                    "{}: {} samples, max cwnd {:.2} KBytes",
                    series.name(),
                    series.samples.len(),
                    max
                ),
                None => {
                    tracing::warn!(log = %log.display(), "No cwnd samples found");
                    continue;
                }
            }
            all.push(series);
        }

        if let Some(path) = &self.csv {
            CsvExporter::export_cwnd(&all, path)
                .with_context(|| format!("Failed to write {}", path.display()))?;
            println!("Wrote {}", path.display());
        }

        if let Some(dir) = &self.plot_dir {
            std::fs::create_dir_all(dir)
                .with_context(|| format!("Failed to create plot directory: {}", dir.display()))?;
            for series in &all {
                let path = dir.join(format!("{}.png", series.name()));
                CwndPlotter::plot(series, &path)
                    .with_context(|| format!("Failed to plot {}", path.display()))?;
                println!("Wrote {}", path.display());
            }
        }

        Ok(())
    }
}
