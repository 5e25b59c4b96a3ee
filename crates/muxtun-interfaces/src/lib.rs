//! Network endpoints for the muxtun tunnel optimizer.
//!
//! Two I/O seams: the local virtual device (tun or tap) that the tunnel
//! reads native packets from, and the UDP socket that carries bundles to
//! the peer. Both are owned exclusively by the event loop; neither
//! spawns background tasks.

pub mod endpoint;
pub mod error;
pub mod testing;
pub mod vdev;

pub use endpoint::UdpEndpoint;
pub use error::InterfaceError;
pub use vdev::{DeviceKind, TunTap, VirtualDevice};
