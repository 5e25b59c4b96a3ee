//! Error types for the node.

/// Errors that terminate the node. Everything else (per-datagram and
/// per-packet faults, send failures) is logged and survived by the
/// event loop.
#[derive(Debug, thiserror::Error)]
pub enum NodeError {
    #[error("configuration error: {0}")]
    Config(String),
    #[error("interface error: {0}")]
    Interface(#[from] muxtun_interfaces::InterfaceError),
    #[error("codec error: {0}")]
    Codec(#[from] muxtun_codec::CodecError),
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
    #[error("virtual device failed: {0}")]
    Device(std::io::Error),
    #[error("network wait failed: {0}")]
    Wait(std::io::Error),
}
