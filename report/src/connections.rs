//! Per-connection lifetimes from tshark field exports
//!
//! Input rows are `time_epoch, ip.src, ip.dst, tcp.srcport, tcp.dstport,
//! tcp.flags`, as written by [`TsharkExtractor`](crate::TsharkExtractor).
//! A connection starts at its first packet and ends at the first RST or the
//! first FIN+ACK seen for the same 4-tuple. Direction matters: each side of a
//! TCP exchange is tracked as its own connection.

use std::collections::HashMap;
use std::io::Read;
use std::time::Duration;

use crate::error::ReportResult;

/// Duration assigned to connections that never terminate in the capture
pub const DEFAULT_OPEN_DURATION: Duration = Duration::from_secs(100);

/// TCP header flag bits
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct TcpFlags(u16);

impl TcpFlags {
    /// FIN
    pub const FIN: u16 = 0x01;
    /// SYN
    pub const SYN: u16 = 0x02;
    /// RST
    pub const RST: u16 = 0x04;
    /// ACK
    pub const ACK: u16 = 0x10;

    /// Wrap raw flag bits
    pub fn from_bits(bits: u16) -> Self {
        Self(bits)
    }

    /// Parse a flags field such as `0x0012` or `18`
    ///
    /// The radix follows the prefix (`0x`, `0o`, `0b`, otherwise decimal).
    /// Anything unparsable yields no flags.
    pub fn parse(field: &str) -> Self {
        let field = field.trim();
        let (digits, radix) = match field.get(..2) {
            Some("0x") | Some("0X") => (&field[2..], 16),
            Some("0o") | Some("0O") => (&field[2..], 8),
            Some("0b") | Some("0B") => (&field[2..], 2),
            _ => (field, 10),
        };
        u16::from_str_radix(digits, radix)
            .map(Self)
            .unwrap_or_default()
    }

    /// Whether every bit in `mask` is set
    pub fn contains(self, mask: u16) -> bool {
        self.0 & mask == mask
    }

    /// SYN set
    pub fn syn(self) -> bool {
        self.contains(Self::SYN)
    }

    /// ACK set
    pub fn ack(self) -> bool {
        self.contains(Self::ACK)
    }

    /// FIN set
    pub fn fin(self) -> bool {
        self.contains(Self::FIN)
    }

    /// RST set
    pub fn rst(self) -> bool {
        self.contains(Self::RST)
    }

    /// Whether this packet ends a connection (RST, or FIN together with ACK)
    pub fn terminates(self) -> bool {
        self.rst() || (self.fin() && self.ack())
    }
}

/// Directional 4-tuple identifying a connection
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ConnectionKey {
    /// Source address
    pub src_ip: String,
    /// Destination address
    pub dst_ip: String,
    /// Source port
    pub src_port: String,
    /// Destination port
    pub dst_port: String,
}

#[derive(Debug, Clone, Copy)]
struct Lifetime {
    start: f64,
    end: Option<f64>,
}

/// One connection's start time and how long it lasted
#[derive(Debug, Clone, PartialEq)]
pub struct ConnectionSummary {
    /// Connection 4-tuple
    pub key: ConnectionKey,
    /// Epoch seconds of the first packet
    pub start: f64,
    /// Seconds until termination, or the default for open connections
    pub duration: f64,
    /// Whether a terminating packet was seen
    pub terminated: bool,
}

/// Accumulates packets into connection lifetimes
#[derive(Debug, Default)]
pub struct ConnectionTracker {
    connections: HashMap<ConnectionKey, Lifetime>,
    rows: usize,
    skipped: usize,
}

impl ConnectionTracker {
    /// Create an empty tracker
    pub fn new() -> Self {
        Self::default()
    }

    /// Build a tracker from tshark CSV output
    ///
    /// Short rows and rows whose time does not parse (including the header)
    /// are skipped.
    pub fn from_csv<R: Read>(reader: R) -> ReportResult<Self> {
        let mut csv = csv::ReaderBuilder::new()
            .has_headers(false)
            .flexible(true)
            .from_reader(reader);

        let mut tracker = Self::new();
        for record in csv.records() {
            let record = record?;
            let fields: Vec<&str> = record.iter().collect();
            tracker.push_row(&fields);
        }

        tracing::debug!(
            rows = tracker.rows,
            skipped = tracker.skipped,
            connections = tracker.len(),
            "Parsed TCP fields"
        );
        Ok(tracker)
    }

    /// Feed one exported row
    pub fn push_row(&mut self, fields: &[&str]) {
        self.rows += 1;

        let [time, src_ip, dst_ip, src_port, dst_port, flags, ..] = fields else {
            tracing::trace!(?fields, "Skipping row with insufficient fields");
            self.skipped += 1;
            return;
        };
        let Ok(time) = time.trim().parse::<f64>() else {
            tracing::trace!(time, "Skipping row with invalid time");
            self.skipped += 1;
            return;
        };

        let key = ConnectionKey {
            src_ip: src_ip.to_string(),
            dst_ip: dst_ip.to_string(),
            src_port: src_port.to_string(),
            dst_port: dst_port.to_string(),
        };
        self.observe(key, time, TcpFlags::parse(flags));
    }

    /// Record one packet
    pub fn observe(&mut self, key: ConnectionKey, time: f64, flags: TcpFlags) {
        let lifetime = self.connections.entry(key).or_insert(Lifetime {
            start: time,
            end: None,
        });

        if lifetime.end.is_none() && flags.terminates() {
            lifetime.end = Some(time);
        }
    }

    /// Number of distinct connections
    pub fn len(&self) -> usize {
        self.connections.len()
    }

    /// Whether no connection was seen
    pub fn is_empty(&self) -> bool {
        self.connections.is_empty()
    }

    /// Rows ignored while parsing
    pub fn skipped_rows(&self) -> usize {
        self.skipped
    }

    /// Connection summaries sorted by start time
    ///
    /// Connections with no terminating packet are given `open_duration`.
    pub fn summaries(&self, open_duration: Duration) -> Vec<ConnectionSummary> {
        let open = open_duration.as_secs_f64();
        let mut out: Vec<ConnectionSummary> = self
            .connections
            .iter()
            .map(|(key, lifetime)| ConnectionSummary {
                key: key.clone(),
                start: lifetime.start,
                duration: lifetime.end.map_or(open, |end| end - lifetime.start),
                terminated: lifetime.end.is_some(),
            })
            .collect();

        out.sort_by(|a, b| a.start.total_cmp(&b.start).then_with(|| a.key.cmp(&b.key)));
        out
    }
}
