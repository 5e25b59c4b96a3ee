use std::net::Ipv4Addr;
use std::path::PathBuf;
use std::process;

use clap::Parser;

use muxtun_codec::HeaderCodec;
use muxtun_interfaces::{DeviceKind, TunTap, UdpEndpoint};
use muxtun_node::config::{Config, FileConfig, Overrides};
use muxtun_node::engine::Engine;
use muxtun_node::error::NodeError;
use muxtun_node::flow_log::FlowLog;

/// Point-to-point tunnel optimizer: compresses packet headers and
/// multiplexes small packets into shared UDP datagrams.
#[derive(Parser)]
#[command(name = "muxtun", version)]
struct Cli {
    /// Name of the tun/tap device to serve
    #[arg(short = 'i', value_name = "name")]
    device: Option<String>,

    /// Name of the local physical interface carrying the tunnel
    #[arg(short = 'e', value_name = "name")]
    interface: Option<String>,

    /// Peer IPv4 address
    #[arg(short = 'c', value_name = "ip")]
    peer: Option<Ipv4Addr>,

    /// UDP port to listen on and send to
    #[arg(short = 'p', value_name = "port")]
    port: Option<u16>,

    /// Serve a tun (layer 3) device [default]
    #[arg(short = 'u', conflicts_with = "tap")]
    tun: bool,

    /// Serve a tap (layer 2) device
    #[arg(short = 'a')]
    tap: bool,

    /// Compress and decompress headers with ROHC
    #[arg(short = 'r')]
    rohc: bool,

    /// Packet-count flush trigger (0 = unset, max 100)
    #[arg(short = 'n', value_name = "count")]
    limit_packets: Option<u32>,

    /// Size-threshold flush trigger in bytes
    #[arg(short = 'b', value_name = "bytes")]
    size_threshold: Option<usize>,

    /// Idle-timeout flush trigger in microseconds
    #[arg(short = 't', value_name = "usec")]
    timeout: Option<u64>,

    /// Hard-period flush trigger in microseconds
    #[arg(short = 'P', value_name = "usec")]
    period: Option<u64>,

    /// Flow log file path
    #[arg(short = 'l', value_name = "path")]
    log_file: Option<PathBuf>,

    /// Auto-named flow log file (YYYY-MM-DD_HH.MM.SS)
    #[arg(short = 'L')]
    auto_log: bool,

    /// Debug verbosity, 0..3 (clamped)
    #[arg(short = 'd', value_name = "level")]
    debug: Option<u8>,

    /// TOML configuration file; explicit flags take precedence
    #[arg(long, value_name = "path")]
    config: Option<PathBuf>,
}

impl Cli {
    fn into_overrides(self) -> (Overrides, Option<PathBuf>) {
        let kind = if self.tap {
            Some(DeviceKind::Tap)
        } else if self.tun {
            Some(DeviceKind::Tun)
        } else {
            None
        };
        let overrides = Overrides {
            device: self.device,
            interface: self.interface,
            peer: self.peer,
            port: self.port,
            kind,
            rohc: self.rohc,
            limit_packets: self.limit_packets,
            size_threshold: self.size_threshold,
            timeout: self.timeout,
            period: self.period,
            log_file: self.log_file,
            auto_log: self.auto_log,
            debug: self.debug,
        };
        (overrides, self.config)
    }
}

#[tokio::main(flavor = "current_thread")]
async fn main() {
    let (overrides, config_path) = Cli::parse().into_overrides();

    let file = match config_path {
        Some(ref path) => match FileConfig::load(path) {
            Ok(f) => Some(f),
            Err(e) => {
                eprintln!("muxtun: {e}");
                process::exit(1);
            }
        },
        None => None,
    };

    let config = match Config::resolve(overrides, file) {
        Ok(c) => c,
        Err(e) => {
            eprintln!("muxtun: {e}");
            process::exit(1);
        }
    };

    muxtun_node::logging::init(config.debug);

    // The loop is infinite; reaching here means a fatal error.
    if let Err(e) = run(config).await {
        tracing::error!("fatal: {e}");
        process::exit(1);
    }
}

async fn run(config: Config) -> Result<(), NodeError> {
    let flow_log = match &config.flow_log {
        Some(path) => {
            tracing::info!(path = %path.display(), "flow log enabled");
            FlowLog::create(path).map_err(|e| {
                NodeError::Config(format!("cannot open flow log {}: {e}", path.display()))
            })?
        }
        None => FlowLog::disabled(),
    };

    let device = TunTap::open(&config.device, config.kind)?;
    let endpoint = UdpEndpoint::bind(&config.interface, config.port, config.peer).await?;
    let codec = build_codec(&config)?;

    let mut engine = Engine::new(device, endpoint, codec, config.triggers, flow_log);
    engine.run().await
}

#[cfg(feature = "rohc")]
fn build_codec(config: &Config) -> Result<HeaderCodec, NodeError> {
    use std::time::{SystemTime, UNIX_EPOCH};

    if !config.rohc {
        return Ok(HeaderCodec::Passthrough);
    }
    let seed = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs())
        .unwrap_or(0);
    tracing::info!(seed, "ROHC codec enabled");
    Ok(HeaderCodec::rohc(seed)?)
}

#[cfg(not(feature = "rohc"))]
fn build_codec(config: &Config) -> Result<HeaderCodec, NodeError> {
    if config.rohc {
        return Err(NodeError::Config(
            "this build does not include ROHC support; rebuild with the 'rohc' feature".into(),
        ));
    }
    Ok(HeaderCodec::Passthrough)
}
