//! Tunnel optimizer node: configuration, flow logging, and the event-loop
//! engine that ties the virtual device, the UDP endpoint, the header
//! codec, and the bundle buffer together.

pub mod config;
pub mod engine;
pub mod error;
pub mod flow_log;
pub mod logging;

pub use config::Config;
pub use engine::Engine;
pub use error::NodeError;
