//! Header compression codec for the muxtun data plane.
//!
//! The codec sits on both tunnel paths: egress packets are compressed
//! before multiplexing, ingress payloads are decompressed after
//! demultiplexing. Two variants exist: [`HeaderCodec::Passthrough`]
//! (identity, always available) and [`HeaderCodec::Rohc`], a binding to
//! librohc behind the `rohc` cargo feature.

pub mod error;
#[cfg(feature = "rohc")]
pub mod rohc;

pub use error::CodecError;
#[cfg(feature = "rohc")]
pub use rohc::RohcCodec;

/// Outcome of compressing one egress packet.
#[derive(Debug, PartialEq, Eq)]
pub enum CompressOutcome {
    /// The compressed packet, ready to multiplex.
    Packet(Vec<u8>),
    /// The compressed form exceeded the reassembly unit; the caller
    /// multiplexes the original packet uncompressed instead.
    Segmented,
}

/// Outcome of decompressing one ingress payload.
#[derive(Debug, PartialEq, Eq)]
pub enum DecompressOutcome {
    /// The reconstructed IP packet, ready to inject.
    Packet(Vec<u8>),
    /// The payload carried only feedback or a non-final segment; nothing
    /// to inject. A normal condition.
    FeedbackOnly,
}

/// The pluggable header codec.
pub enum HeaderCodec {
    /// Identity codec: packets pass both directions unmodified.
    Passthrough,
    /// ROHC compression and decompression contexts.
    #[cfg(feature = "rohc")]
    Rohc(RohcCodec),
}

impl HeaderCodec {
    /// Create the ROHC codec. `seed` feeds the CID allocator; the value
    /// stream it produces is reproducible given the seed.
    #[cfg(feature = "rohc")]
    pub fn rohc(seed: u64) -> Result<Self, CodecError> {
        Ok(HeaderCodec::Rohc(RohcCodec::new(seed)?))
    }

    /// Whether this codec actually rewrites headers.
    pub fn is_compressing(&self) -> bool {
        !matches!(self, HeaderCodec::Passthrough)
    }

    /// Compress one egress packet.
    pub fn compress(&mut self, pkt: &[u8]) -> Result<CompressOutcome, CodecError> {
        match self {
            HeaderCodec::Passthrough => Ok(CompressOutcome::Packet(pkt.to_vec())),
            #[cfg(feature = "rohc")]
            HeaderCodec::Rohc(codec) => codec.compress(pkt),
        }
    }

    /// Decompress one ingress payload.
    pub fn decompress(&mut self, pkt: &[u8]) -> Result<DecompressOutcome, CodecError> {
        match self {
            HeaderCodec::Passthrough => Ok(DecompressOutcome::Packet(pkt.to_vec())),
            #[cfg(feature = "rohc")]
            HeaderCodec::Rohc(codec) => codec.decompress(pkt),
        }
    }
}

impl core::fmt::Debug for HeaderCodec {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        match self {
            HeaderCodec::Passthrough => f.write_str("Passthrough"),
            #[cfg(feature = "rohc")]
            HeaderCodec::Rohc(_) => f.write_str("Rohc"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn passthrough_is_identity_both_ways() {
        let mut codec = HeaderCodec::Passthrough;
        let pkt = vec![0x45, 0x00, 0x00, 0x28, 0xAB, 0xCD];

        match codec.compress(&pkt).unwrap() {
            CompressOutcome::Packet(out) => assert_eq!(out, pkt),
            other => panic!("expected Packet, got {other:?}"),
        }
        match codec.decompress(&pkt).unwrap() {
            DecompressOutcome::Packet(out) => assert_eq!(out, pkt),
            other => panic!("expected Packet, got {other:?}"),
        }
    }

    #[test]
    fn passthrough_reports_not_compressing() {
        assert!(!HeaderCodec::Passthrough.is_compressing());
    }
}
