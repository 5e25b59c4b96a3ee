//! Wire-format and trigger constants for the muxtun data plane.

// Separator wire format. Bit 7 of byte 0 is the most significant bit.
/// Boundary-marker bit of separator byte 0. Always 0 on the wire; a set
/// bit marks the datagram as malformed at demux time.
pub const MBB: u8 = 0x80;
/// Long-form flag of separator byte 0. 0 = one-byte separator, 1 = two.
pub const PFF: u8 = 0x40;
/// Largest payload length encodable in the one-byte separator form.
pub const SHORT_FORM_MAX: usize = 0x3F;
/// Largest payload length encodable in the two-byte separator form.
pub const LONG_FORM_MAX: usize = 0x3FFF;

// Datagram sizing.
/// Ceiling on the bundle size regardless of what the interface reports.
pub const MTU_CEILING: usize = 1500;
/// Smallest MTU the engine will operate with.
pub const MTU_FLOOR: usize = 128;
/// IPv4 + UDP tunneling overhead reserved by the default size threshold.
pub const TUNNEL_OVERHEAD: usize = 28;

// Trigger defaults and sentinels.
/// Hard ceiling on the packet-count trigger.
pub const MAX_BUNDLE_PACKETS: u32 = 100;
/// Default size threshold: `MTU_CEILING - TUNNEL_OVERHEAD`.
pub const DEFAULT_SIZE_THRESHOLD: usize = MTU_CEILING - TUNNEL_OVERHEAD;
/// Sentinel for the timeout and period triggers, microseconds (100 s).
/// A trigger left at the sentinel is effectively disabled.
pub const TRIGGER_DISABLED_US: u64 = 100_000_000;

/// Default UDP port for the tunnel.
pub const DEFAULT_PORT: u16 = 55555;
