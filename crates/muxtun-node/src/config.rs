//! Node configuration.
//!
//! Settings come from two layers: an optional TOML file and the command
//! line, with explicit flags taking precedence. [`Config::resolve`]
//! merges the layers, applies defaults, normalizes the flush triggers,
//! and rejects incomplete configurations.

use std::net::Ipv4Addr;
use std::path::{Path, PathBuf};

use serde::Deserialize;

use muxtun_core::constants::{DEFAULT_PORT, DEFAULT_SIZE_THRESHOLD, TRIGGER_DISABLED_US};
use muxtun_core::Triggers;
use muxtun_interfaces::DeviceKind;

use crate::error::NodeError;

/// Values collected from the command line. `None` defers to the config
/// file, then to the built-in default.
#[derive(Debug, Default)]
pub struct Overrides {
    pub device: Option<String>,
    pub interface: Option<String>,
    pub peer: Option<Ipv4Addr>,
    pub port: Option<u16>,
    pub kind: Option<DeviceKind>,
    pub rohc: bool,
    pub limit_packets: Option<u32>,
    pub size_threshold: Option<usize>,
    pub timeout: Option<u64>,
    pub period: Option<u64>,
    pub log_file: Option<PathBuf>,
    pub auto_log: bool,
    pub debug: Option<u8>,
}

/// Top-level TOML configuration file.
#[derive(Debug, Default, Deserialize)]
pub struct FileConfig {
    #[serde(default)]
    pub device: DeviceSection,
    #[serde(default)]
    pub peer: PeerSection,
    #[serde(default)]
    pub codec: CodecSection,
    #[serde(default)]
    pub triggers: TriggersSection,
    #[serde(default)]
    pub log: LogSection,
}

/// The `[device]` section.
#[derive(Debug, Default, Deserialize)]
pub struct DeviceSection {
    /// Name of the tun/tap device to serve.
    pub name: Option<String>,
    /// "tun" (default) or "tap".
    pub kind: Option<String>,
    /// Name of the physical interface carrying the tunnel.
    pub interface: Option<String>,
}

/// The `[peer]` section.
#[derive(Debug, Default, Deserialize)]
pub struct PeerSection {
    pub address: Option<Ipv4Addr>,
    pub port: Option<u16>,
}

/// The `[codec]` section.
#[derive(Debug, Default, Deserialize)]
pub struct CodecSection {
    #[serde(default)]
    pub rohc: bool,
}

/// The `[triggers]` section. Absent values keep the trigger disabled.
#[derive(Debug, Default, Deserialize)]
pub struct TriggersSection {
    pub limit_packets: Option<u32>,
    pub size_threshold: Option<usize>,
    pub timeout: Option<u64>,
    pub period: Option<u64>,
}

/// The `[log]` section.
#[derive(Debug, Default, Deserialize)]
pub struct LogSection {
    pub file: Option<PathBuf>,
    #[serde(default)]
    pub auto: bool,
    pub debug: Option<u8>,
}

impl FileConfig {
    /// Load configuration from a TOML file.
    pub fn load(path: &Path) -> Result<Self, NodeError> {
        let content = std::fs::read_to_string(path)
            .map_err(|e| NodeError::Config(format!("failed to read config file: {e}")))?;
        Self::parse(&content)
    }

    /// Parse configuration from a TOML string.
    pub fn parse(s: &str) -> Result<Self, NodeError> {
        toml::from_str(s).map_err(|e| NodeError::Config(format!("failed to parse config: {e}")))
    }
}

/// Parse a device kind string.
pub fn parse_kind(s: &str) -> Result<DeviceKind, NodeError> {
    match s.to_lowercase().as_str() {
        "tun" => Ok(DeviceKind::Tun),
        "tap" => Ok(DeviceKind::Tap),
        other => Err(NodeError::Config(format!("unknown device kind: {other}"))),
    }
}

/// The resolved, validated node configuration.
#[derive(Debug)]
pub struct Config {
    pub device: String,
    pub kind: DeviceKind,
    pub interface: String,
    pub peer: Ipv4Addr,
    pub port: u16,
    pub rohc: bool,
    pub triggers: Triggers,
    /// Flow log destination; `None` disables the sink.
    pub flow_log: Option<PathBuf>,
    /// Debug verbosity, clamped to 0..=3.
    pub debug: u8,
}

impl Config {
    /// Merge command-line overrides over an optional config file.
    pub fn resolve(cli: Overrides, file: Option<FileConfig>) -> Result<Self, NodeError> {
        let file = file.unwrap_or_default();

        let device = cli
            .device
            .or(file.device.name)
            .ok_or_else(|| NodeError::Config("virtual device name is required (-i)".into()))?;
        let interface = cli.interface.or(file.device.interface).ok_or_else(|| {
            NodeError::Config("local physical interface name is required (-e)".into())
        })?;
        let peer = cli
            .peer
            .or(file.peer.address)
            .ok_or_else(|| NodeError::Config("peer address is required (-c)".into()))?;

        let kind = match (cli.kind, file.device.kind.as_deref()) {
            (Some(kind), _) => kind,
            (None, Some(s)) => parse_kind(s)?,
            (None, None) => DeviceKind::Tun,
        };

        let port = cli.port.or(file.peer.port).unwrap_or(DEFAULT_PORT);

        let triggers = Triggers::normalize(
            cli.limit_packets
                .or(file.triggers.limit_packets)
                .unwrap_or(0),
            cli.size_threshold
                .or(file.triggers.size_threshold)
                .unwrap_or(DEFAULT_SIZE_THRESHOLD),
            cli.timeout
                .or(file.triggers.timeout)
                .unwrap_or(TRIGGER_DISABLED_US),
            cli.period
                .or(file.triggers.period)
                .unwrap_or(TRIGGER_DISABLED_US),
        );

        let flow_log = match cli.log_file.or(file.log.file) {
            Some(path) => Some(path),
            None if cli.auto_log || file.log.auto => Some(PathBuf::from(auto_log_name())),
            None => None,
        };

        let debug = cli.debug.or(file.log.debug).unwrap_or(0).min(3);

        Ok(Self {
            device,
            kind,
            interface,
            peer,
            port,
            rohc: cli.rohc || file.codec.rohc,
            triggers,
            flow_log,
            debug,
        })
    }
}

/// Default flow-log file name: the current local date and time.
fn auto_log_name() -> String {
    chrono::Local::now().format("%Y-%m-%d_%H.%M.%S").to_string()
}
