//! The flow log: a machine-readable stream of data-plane events.
//!
//! One event per line, tab-separated:
//!
//! ```text
//! <ts_us>  <action>  <kind>  <bytes>  <counter>  [from|to  <ip>  <port>]  [<extra>...]
//! ```
//!
//! The file is flushed after every line so an abrupt termination loses
//! at most the line being written. Write failures are reported through
//! tracing and do not disturb the data plane.

use std::fs::File;
use std::io::Write;
use std::net::SocketAddr;
use std::path::Path;
use std::time::{SystemTime, UNIX_EPOCH};

use tracing::warn;

/// First classification field of a log line.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Action {
    Rec,
    Sent,
    Forward,
    Error,
}

impl Action {
    fn as_str(self) -> &'static str {
        match self {
            Action::Rec => "rec",
            Action::Sent => "sent",
            Action::Forward => "forward",
            Action::Error => "error",
        }
    }
}

/// Second classification field of a log line.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EventKind {
    Native,
    Muxed,
    Demuxed,
    RohcFeedback,
    BadSeparator,
    DemuxBadLength,
    ComprFailed,
    DecompFailed,
}

impl EventKind {
    fn as_str(self) -> &'static str {
        match self {
            EventKind::Native => "native",
            EventKind::Muxed => "muxed",
            EventKind::Demuxed => "demuxed",
            EventKind::RohcFeedback => "ROHC_feedback",
            EventKind::BadSeparator => "bad_separator",
            EventKind::DemuxBadLength => "demux_bad_length",
            EventKind::ComprFailed => "compr_failed",
            EventKind::DecompFailed => "decomp_failed",
        }
    }
}

/// Peer address column, tagged with the transfer direction.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PeerColumn {
    From(SocketAddr),
    To(SocketAddr),
}

/// Microseconds since the Unix epoch, the timestamp base of every line.
pub fn timestamp_micros() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_micros() as u64)
        .unwrap_or(0)
}

/// Append-only event sink. A disabled sink swallows events.
pub struct FlowLog {
    file: Option<File>,
}

impl FlowLog {
    /// A sink that discards every event.
    pub fn disabled() -> Self {
        Self { file: None }
    }

    /// Create (truncate) the log file at `path`.
    pub fn create(path: &Path) -> std::io::Result<Self> {
        Ok(Self {
            file: Some(File::create(path)?),
        })
    }

    pub fn is_enabled(&self) -> bool {
        self.file.is_some()
    }

    /// Append one event line.
    pub fn event(
        &mut self,
        action: Action,
        kind: EventKind,
        bytes: usize,
        counter: u64,
        peer: Option<PeerColumn>,
        extras: &[&str],
    ) {
        let Some(file) = self.file.as_mut() else {
            return;
        };

        let mut line = format!(
            "{}\t{}\t{}\t{}\t{}",
            timestamp_micros(),
            action.as_str(),
            kind.as_str(),
            bytes,
            counter
        );
        match peer {
            Some(PeerColumn::From(addr)) => {
                line.push_str(&format!("\tfrom\t{}\t{}", addr.ip(), addr.port()));
            }
            Some(PeerColumn::To(addr)) => {
                line.push_str(&format!("\tto\t{}\t{}", addr.ip(), addr.port()));
            }
            None => {}
        }
        for extra in extras {
            line.push('\t');
            line.push_str(extra);
        }
        line.push('\n');

        if let Err(e) = file.write_all(line.as_bytes()).and_then(|()| file.flush()) {
            warn!("flow log write failed: {e}");
        }
    }
}
