//! Virtual network device (tun/tap) driver.
//!
//! Opens `/dev/net/tun`, attaches to the named device with `TUNSETIFF`
//! in no-packet-information mode, and drives the nonblocking descriptor
//! through tokio's `AsyncFd`. Reads and writes are packet-oriented: one
//! `read` returns one packet, one `write` injects one packet.

use std::io;
use std::os::fd::{AsRawFd, FromRawFd, OwnedFd};

use tokio::io::unix::AsyncFd;
use tracing::debug;

use crate::error::InterfaceError;

/// Read buffer for one packet from the device. Must be at least the MTU.
pub const DEVICE_READ_BUFFER: usize = 2048;

// From linux/if_tun.h; the libc crate does not export these.
const TUNSETIFF: libc::c_ulong = 0x4004_54ca;
const IFF_TUN: libc::c_short = 0x0001;
const IFF_TAP: libc::c_short = 0x0002;
const IFF_NO_PI: libc::c_short = 0x1000;

/// Layer of the virtual device: tun carries IP packets, tap carries
/// Ethernet frames.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DeviceKind {
    Tun,
    Tap,
}

impl DeviceKind {
    fn flags(self) -> libc::c_short {
        match self {
            DeviceKind::Tun => IFF_TUN | IFF_NO_PI,
            DeviceKind::Tap => IFF_TAP | IFF_NO_PI,
        }
    }
}

/// `struct ifreq` with the flags member of the union, padded to the full
/// kernel struct size so the ioctl reads and writes in bounds.
#[repr(C)]
struct IfReqFlags {
    ifr_name: [libc::c_char; libc::IFNAMSIZ],
    ifr_flags: libc::c_short,
    _pad: [u8; 22],
}

pub(crate) fn ifname_bytes(name: &str) -> Result<[libc::c_char; libc::IFNAMSIZ], InterfaceError> {
    let bytes = name.as_bytes();
    // One byte is reserved for the NUL terminator.
    if bytes.is_empty() || bytes.len() >= libc::IFNAMSIZ {
        return Err(InterfaceError::NameTooLong(name.to_string()));
    }
    let mut out = [0 as libc::c_char; libc::IFNAMSIZ];
    for (dst, &src) in out.iter_mut().zip(bytes) {
        *dst = src as libc::c_char;
    }
    Ok(out)
}

/// Packet-oriented endpoint the tunnel serves. The event loop is generic
/// over this seam so tests can drive it with an in-memory device.
#[allow(async_fn_in_trait)]
pub trait VirtualDevice {
    /// Read one packet. Resolves only when a packet is available.
    async fn recv(&self) -> io::Result<Vec<u8>>;

    /// Inject one packet into the device.
    async fn send(&self, pkt: &[u8]) -> io::Result<()>;

    /// Device name, for diagnostics.
    fn name(&self) -> &str;
}

/// A kernel tun or tap device.
pub struct TunTap {
    fd: AsyncFd<OwnedFd>,
    name: String,
    kind: DeviceKind,
}

impl TunTap {
    /// Attach to the named device in no-packet-information mode.
    pub fn open(name: &str, kind: DeviceKind) -> Result<Self, InterfaceError> {
        let ifr_name = ifname_bytes(name)?;

        let raw = unsafe {
            libc::open(
                c"/dev/net/tun".as_ptr(),
                libc::O_RDWR | libc::O_NONBLOCK | libc::O_CLOEXEC,
            )
        };
        if raw < 0 {
            return Err(InterfaceError::DeviceOpen {
                name: name.to_string(),
                source: io::Error::last_os_error(),
            });
        }
        // Owned from here on; closed on every subsequent error path.
        let fd = unsafe { OwnedFd::from_raw_fd(raw) };

        let mut ifr = IfReqFlags {
            ifr_name,
            ifr_flags: kind.flags(),
            _pad: [0; 22],
        };
        let rc = unsafe { libc::ioctl(fd.as_raw_fd(), TUNSETIFF, &mut ifr) };
        if rc < 0 {
            return Err(InterfaceError::DeviceOpen {
                name: name.to_string(),
                source: io::Error::last_os_error(),
            });
        }

        let fd = AsyncFd::new(fd)?;
        debug!(device = name, ?kind, "attached virtual device");

        Ok(Self {
            fd,
            name: name.to_string(),
            kind,
        })
    }

    pub fn kind(&self) -> DeviceKind {
        self.kind
    }
}

impl VirtualDevice for TunTap {
    async fn recv(&self) -> io::Result<Vec<u8>> {
        loop {
            let mut guard = self.fd.readable().await?;
            let result = guard.try_io(|inner| {
                let mut buf = vec![0u8; DEVICE_READ_BUFFER];
                let n = unsafe {
                    libc::read(
                        inner.as_raw_fd(),
                        buf.as_mut_ptr() as *mut libc::c_void,
                        buf.len(),
                    )
                };
                if n < 0 {
                    return Err(io::Error::last_os_error());
                }
                buf.truncate(n as usize);
                Ok(buf)
            });
            match result {
                Ok(packet) => return packet,
                Err(_would_block) => continue,
            }
        }
    }

    async fn send(&self, pkt: &[u8]) -> io::Result<()> {
        loop {
            let mut guard = self.fd.writable().await?;
            let result = guard.try_io(|inner| {
                let n = unsafe {
                    libc::write(
                        inner.as_raw_fd(),
                        pkt.as_ptr() as *const libc::c_void,
                        pkt.len(),
                    )
                };
                if n < 0 {
                    return Err(io::Error::last_os_error());
                }
                Ok(())
            });
            match result {
                Ok(written) => return written,
                Err(_would_block) => continue,
            }
        }
    }

    fn name(&self) -> &str {
        &self.name
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn kind_flags_include_no_packet_info() {
        assert_eq!(DeviceKind::Tun.flags(), IFF_TUN | IFF_NO_PI);
        assert_eq!(DeviceKind::Tap.flags(), IFF_TAP | IFF_NO_PI);
    }

    #[test]
    fn ifname_rejects_oversized_and_empty_names() {
        assert!(ifname_bytes("tun0").is_ok());
        assert!(ifname_bytes("").is_err());
        // 15 chars fit (IFNAMSIZ 16 with NUL), 16 do not.
        assert!(ifname_bytes(&"a".repeat(15)).is_ok());
        assert!(ifname_bytes(&"a".repeat(16)).is_err());
    }

    #[test]
    fn ifname_is_nul_terminated() {
        let name = ifname_bytes("tap3").unwrap();
        assert_eq!(name[3], b'3' as libc::c_char);
        assert_eq!(name[4], 0);
        assert_eq!(name[libc::IFNAMSIZ - 1], 0);
    }

    #[tokio::test]
    async fn opening_without_privileges_fails_cleanly() {
        // Either the clone device is absent or the ioctl is refused; in
        // both cases this must surface as DeviceOpen, not a panic.
        if let Err(e) = TunTap::open("muxtun-test0", DeviceKind::Tun) {
            assert!(matches!(e, InterfaceError::DeviceOpen { .. }));
        }
    }
}
