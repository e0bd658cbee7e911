//! Congestion-window series from iperf3 client logs

use std::io::BufRead;
use std::path::{Path, PathBuf};

use crate::error::ReportResult;

/// One interval report: when it ended and the sender's cwnd at that point
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CwndSample {
    /// Interval end, seconds since the test started
    pub time: f64,
    /// Congestion window in KBytes
    pub cwnd_kbytes: f64,
}

/// All samples from one log file
#[derive(Debug, Clone)]
pub struct CwndSeries {
    /// Log the samples came from
    pub source: PathBuf,
    /// Samples sorted by time
    pub samples: Vec<CwndSample>,
}

impl CwndSeries {
    /// Parse an iperf3 log file
    pub fn from_file(path: impl AsRef<Path>) -> ReportResult<Self> {
        let file = std::fs::File::open(path.as_ref())?;
        let samples = parse_log(std::io::BufReader::new(file))?;
        Ok(Self {
            source: path.as_ref().to_path_buf(),
            samples,
        })
    }

    /// File name of the source log
    pub fn name(&self) -> String {
        self.source
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| "cwnd".to_string())
    }

    /// Largest cwnd in the series
    pub fn max_cwnd(&self) -> Option<f64> {
        self.samples.iter().map(|s| s.cwnd_kbytes).reduce(f64::max)
    }
}

/// Parse every interval line of an iperf3 client log, sorted by time
pub fn parse_log<R: BufRead>(reader: R) -> ReportResult<Vec<CwndSample>> {
    let mut samples = Vec::new();
    for line in reader.lines() {
        if let Some(sample) = parse_line(&line?) {
            samples.push(sample);
        }
    }
    samples.sort_by(|a, b| a.time.total_cmp(&b.time));
    Ok(samples)
}

/// Parse one sender interval line
///
/// Matches lines of the form
/// `[  5]   1.00-2.00   sec  1.25 MBytes  10.5 Mbits/sec    0   99.0 KBytes`.
/// Receiver lines, summary lines and rates in Gbits/sec do not match.
pub fn parse_line(line: &str) -> Option<CwndSample> {
    let open = line.find('[')?;
    let rest = &line[open + 1..];
    let close = rest.find(']')?;
    let id = rest[..close].trim();
    if id.is_empty() || !id.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }

    let mut tokens = rest[close + 1..].split_whitespace();

    let (_, end) = tokens.next()?.split_once('-')?;
    let time = number(end)?;
    if tokens.next()? != "sec" {
        return None;
    }

    number(tokens.next()?)?;
    bytes_unit(tokens.next()?)?;

    number(tokens.next()?)?;
    if !matches!(tokens.next()?, "bits/sec" | "Kbits/sec" | "Mbits/sec") {
        return None;
    }

    let retransmits = tokens.next()?;
    if !retransmits.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }

    let cwnd = number(tokens.next()?)? * bytes_unit(tokens.next()?)?;
    Some(CwndSample {
        time,
        cwnd_kbytes: cwnd,
    })
}

/// Plain decimal: digits with an optional fractional part
fn number(token: &str) -> Option<f64> {
    let (int, frac) = match token.split_once('.') {
        Some((int, frac)) => (int, Some(frac)),
        None => (token, None),
    };
    let digits = |s: &str| !s.is_empty() && s.bytes().all(|b| b.is_ascii_digit());
    if !digits(int) || frac.is_some_and(|f| !digits(f)) {
        return None;
    }
    token.parse().ok()
}

/// KBytes multiplier for a byte unit
fn bytes_unit(token: &str) -> Option<f64> {
    match token {
        "KBytes" => Some(1.0),
        "MBytes" => Some(1024.0),
        _ => None,
    }
}
