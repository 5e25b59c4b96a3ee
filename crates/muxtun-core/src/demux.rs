//! Incoming bundle demultiplexer.
//!
//! Walks a received datagram, decoding one separator per packet and
//! slicing out the payloads in order. Structural faults (a separator
//! with the marker bit set, or a declared length running past the end of
//! the datagram) drop the remainder of the datagram but keep everything
//! decoded before the fault.

extern crate alloc;
use alloc::vec::Vec;

use crate::error::{DemuxError, SeparatorError};
use crate::separator::decode;

/// Result of demultiplexing one datagram.
#[derive(Debug, PartialEq, Eq)]
pub struct Demuxed {
    /// Payloads decoded before any structural fault, in bundle order.
    pub packets: Vec<Vec<u8>>,
    /// The structural fault that aborted the datagram, if any.
    pub error: Option<DemuxError>,
}

/// Split `datagram` into its payloads.
pub fn demux(datagram: &[u8]) -> Demuxed {
    let mut packets = Vec::new();
    let mut pos = 0;

    while pos < datagram.len() {
        let decoded = match decode(&datagram[pos..]) {
            Ok(d) => d,
            Err(SeparatorError::BadSeparator(b)) => {
                return Demuxed {
                    packets,
                    error: Some(DemuxError::BadSeparator(b)),
                };
            }
            Err(_) => {
                // A truncated separator cannot declare a length at all;
                // report it as a length fault against the remaining bytes.
                return Demuxed {
                    packets,
                    error: Some(DemuxError::BadLength {
                        declared: 0,
                        remaining: datagram.len() - pos,
                    }),
                };
            }
        };

        let start = pos + decoded.consumed;
        let end = start + decoded.len;
        if end > datagram.len() {
            return Demuxed {
                packets,
                error: Some(DemuxError::BadLength {
                    declared: decoded.len,
                    remaining: datagram.len() - start,
                }),
            };
        }

        packets.push(datagram[start..end].to_vec());
        pos = end;
    }

    Demuxed {
        packets,
        error: None,
    }
}
