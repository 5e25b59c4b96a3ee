//! Error types for the codec layer.

/// Errors from header codec construction and per-packet operation.
///
/// Per-packet failures (`CompressFailed`, `DecompressFailed`) drop the
/// single packet involved; the session continues.
#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum CodecError {
    #[error("failed to create the ROHC compressor")]
    CompressorInit,
    #[error("failed to create the ROHC decompressor")]
    DecompressorInit,
    #[error("failed to enable ROHC profile 0x{0:04x}")]
    ProfileEnable(u32),
    #[error("failed to install ROHC trace callback")]
    TraceSetup,
    #[error("compression failed (status {0})")]
    CompressFailed(i32),
    #[error("decompression failed (status {0})")]
    DecompressFailed(i32),
}
