//! CSV export functionality

use std::fs::File;
use std::path::Path;

use chrono::{DateTime, SecondsFormat, Utc};
use csv::Writer;

use crate::connections::ConnectionSummary;
use crate::cwnd::CwndSeries;
use crate::error::ReportResult;

/// Writes analysis results as CSV
pub struct CsvExporter;

impl CsvExporter {
    /// Export connection summaries, one row per connection
    pub fn export_connections(summaries: &[ConnectionSummary], path: &Path) -> ReportResult<()> {
        let file = File::create(path)?;
        let mut wtr = Writer::from_writer(file);

        wtr.write_record([
            "start_epoch",
            "start_utc",
            "src_ip",
            "dst_ip",
            "src_port",
            "dst_port",
            "duration_secs",
            "terminated",
        ])?;

        for summary in summaries {
            wtr.write_record([
                format!("{:.6}", summary.start),
                epoch_to_rfc3339(summary.start),
                summary.key.src_ip.clone(),
                summary.key.dst_ip.clone(),
                summary.key.src_port.clone(),
                summary.key.dst_port.clone(),
                format!("{:.6}", summary.duration),
                summary.terminated.to_string(),
            ])?;
        }

        wtr.flush()?;
        Ok(())
    }

    /// Export congestion-window series; rows carry the log they came from
    pub fn export_cwnd(series: &[CwndSeries], path: &Path) -> ReportResult<()> {
        let file = File::create(path)?;
        let mut wtr = Writer::from_writer(file);

        wtr.write_record(["log", "time_secs", "cwnd_kbytes"])?;

        for s in series {
            let name = s.name();
            for sample in &s.samples {
                wtr.write_record([
                    name.clone(),
                    format!("{:.2}", sample.time),
                    format!("{:.2}", sample.cwnd_kbytes),
                ])?;
            }
        }

        wtr.flush()?;
        Ok(())
    }
}

/// Render epoch seconds as an RFC 3339 UTC timestamp, empty if out of range
fn epoch_to_rfc3339(epoch: f64) -> String {
    let secs = epoch.floor();
    let nanos = ((epoch - secs) * 1e9).round().min(999_999_999.0) as u32;
    DateTime::<Utc>::from_timestamp(secs as i64, nanos)
        .map(|t| t.to_rfc3339_opts(SecondsFormat::Millis, true))
        .unwrap_or_default()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::connections::ConnectionKey;
    use crate::cwnd::CwndSample;
    use std::path::PathBuf;

    #[test]
    fn test_epoch_rendering() {
        assert_eq!(epoch_to_rfc3339(0.0), "1970-01-01T00:00:00.000Z");
        assert_eq!(
            epoch_to_rfc3339(1_700_000_000.25),
            "2023-11-14T22:13:20.250Z"
        );
    }

    #[test]
    fn test_export_connections() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("connections.csv");
        let summaries = vec![ConnectionSummary {
            key: ConnectionKey {
                src_ip: "10.0.0.1".into(),
                dst_ip: "10.0.0.7".into(),
                src_port: "40000".into(),
                dst_port: "8080".into(),
            },
            start: 1_700_000_000.0,
            duration: 1.5,
            terminated: true,
        }];

        CsvExporter::export_connections(&summaries, &path).unwrap();

        let written = std::fs::read_to_string(&path).unwrap();
        let mut lines = written.lines();
        assert!(lines.next().unwrap().starts_with("start_epoch,start_utc"));
        assert_eq!(
            lines.next().unwrap(),
            "1700000000.000000,2023-11-14T22:13:20.000Z,10.0.0.1,10.0.0.7,40000,8080,1.500000,true"
        );
        assert!(lines.next().is_none());
    }

    #[test]
    fn test_export_cwnd() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("cwnd.csv");
        let series = vec![CwndSeries {
            source: PathBuf::from("/tmp/iperf_h1.log"),
            samples: vec![
                CwndSample {
                    time: 1.0,
                    cwnd_kbytes: 99.0,
                },
                CwndSample {
                    time: 2.0,
                    cwnd_kbytes: 1228.8,
                },
            ],
        }];

        CsvExporter::export_cwnd(&series, &path).unwrap();

        let written = std::fs::read_to_string(&path).unwrap();
        assert_eq!(
            written,
            "log,time_secs,cwnd_kbytes\niperf_h1.log,1.00,99.00\niperf_h1.log,2.00,1228.80\n"
        );
    }
}
