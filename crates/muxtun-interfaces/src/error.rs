//! Error types for the interfaces layer.

/// Errors from opening or querying the local network endpoints. All of
/// these are resource-acquisition failures and fatal at startup.
#[derive(Debug, thiserror::Error)]
pub enum InterfaceError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
    #[error("device name '{0}' does not fit IFNAMSIZ")]
    NameTooLong(String),
    #[error("failed to open tun/tap device '{name}': {source}")]
    DeviceOpen {
        name: String,
        source: std::io::Error,
    },
    #[error("interface '{0}' has no IPv4 address")]
    NoIpv4Address(String),
    #[error("interface lookup failed for '{name}': {source}")]
    InterfaceLookup {
        name: String,
        source: std::io::Error,
    },
}
