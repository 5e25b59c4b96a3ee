//! UDP endpoint bound to the physical interface carrying the tunnel.
//!
//! The socket is bound to the interface's own IPv4 address and the
//! multiplex port, so the source port of outgoing bundles equals the
//! destination port and the peer can tell bundles from native traffic.
//! The interface's address and MTU are discovered with the `SIOCGIFADDR`
//! and `SIOCGIFMTU` ioctls at bind time.

use std::io;
use std::net::{Ipv4Addr, SocketAddr, SocketAddrV4};
use std::os::fd::{AsRawFd, FromRawFd, OwnedFd};

use tokio::net::UdpSocket;
use tracing::{info, warn};

use muxtun_core::constants::{MTU_CEILING, MTU_FLOOR};

use crate::error::InterfaceError;
use crate::vdev::ifname_bytes;

/// Receive buffer for one datagram from the network.
pub const NET_RECV_BUFFER: usize = 2048;

/// `struct ifreq` with the address member of the union.
#[repr(C)]
struct IfReqAddr {
    ifr_name: [libc::c_char; libc::IFNAMSIZ],
    ifr_addr: libc::sockaddr_in,
    _pad: [u8; 8],
}

/// `struct ifreq` with the MTU member of the union.
#[repr(C)]
struct IfReqMtu {
    ifr_name: [libc::c_char; libc::IFNAMSIZ],
    ifr_mtu: libc::c_int,
    _pad: [u8; 20],
}

/// A short-lived blocking socket for the interface ioctls.
struct IoctlSocket(OwnedFd);

impl IoctlSocket {
    fn new() -> io::Result<Self> {
        let raw = unsafe { libc::socket(libc::AF_INET, libc::SOCK_DGRAM | libc::SOCK_CLOEXEC, 0) };
        if raw < 0 {
            return Err(io::Error::last_os_error());
        }
        Ok(Self(unsafe { OwnedFd::from_raw_fd(raw) }))
    }

    fn ipv4_addr(&self, name: &str) -> Result<Ipv4Addr, InterfaceError> {
        let mut ifr = IfReqAddr {
            ifr_name: ifname_bytes(name)?,
            ifr_addr: unsafe { std::mem::zeroed() },
            _pad: [0; 8],
        };
        let rc = unsafe { libc::ioctl(self.0.as_raw_fd(), libc::SIOCGIFADDR, &mut ifr) };
        if rc < 0 {
            return Err(InterfaceError::InterfaceLookup {
                name: name.to_string(),
                source: io::Error::last_os_error(),
            });
        }
        if libc::c_int::from(ifr.ifr_addr.sin_family) != libc::AF_INET {
            return Err(InterfaceError::NoIpv4Address(name.to_string()));
        }
        Ok(Ipv4Addr::from(u32::from_be(ifr.ifr_addr.sin_addr.s_addr)))
    }

    fn mtu(&self, name: &str) -> Result<usize, InterfaceError> {
        let mut ifr = IfReqMtu {
            ifr_name: ifname_bytes(name)?,
            ifr_mtu: 0,
            _pad: [0; 20],
        };
        let rc = unsafe { libc::ioctl(self.0.as_raw_fd(), libc::SIOCGIFMTU, &mut ifr) };
        if rc < 0 {
            return Err(InterfaceError::InterfaceLookup {
                name: name.to_string(),
                source: io::Error::last_os_error(),
            });
        }
        Ok(ifr.ifr_mtu.max(0) as usize)
    }
}

/// The tunnel's network socket, bound to the carrying interface.
pub struct UdpEndpoint {
    socket: UdpSocket,
    peer: SocketAddr,
    local: SocketAddrV4,
    mtu: usize,
}

impl UdpEndpoint {
    /// Bind to `iface`'s IPv4 address on `port`, targeting `peer_ip` on
    /// the same port.
    pub async fn bind(iface: &str, port: u16, peer_ip: Ipv4Addr) -> Result<Self, InterfaceError> {
        let probe = IoctlSocket::new()?;
        let local_ip = probe.ipv4_addr(iface)?;
        let raw_mtu = probe.mtu(iface)?;
        drop(probe);

        let mtu = raw_mtu.clamp(MTU_FLOOR, MTU_CEILING);
        if raw_mtu != mtu {
            warn!(
                interface = iface,
                raw_mtu, mtu, "interface MTU outside supported range, clamped"
            );
        }

        let socket = UdpSocket::bind(SocketAddrV4::new(local_ip, port)).await?;
        let local = match socket.local_addr()? {
            SocketAddr::V4(v4) => v4,
            SocketAddr::V6(_) => SocketAddrV4::new(local_ip, port),
        };

        // Both optimizers use the same port; with an explicit port this
        // is the configured value, with port 0 it is the bound one.
        let peer = SocketAddr::from((peer_ip, local.port()));
        info!(%local, %peer, mtu, "tunnel socket bound");

        Ok(Self {
            socket,
            peer,
            local,
            mtu,
        })
    }

    /// Send one bundle to the peer. Returns the number of bytes sent.
    pub async fn send_to_peer(&self, data: &[u8]) -> io::Result<usize> {
        self.socket.send_to(data, self.peer).await
    }

    /// Receive one datagram. Returns its length and source address.
    pub async fn recv_from(&self, buf: &mut [u8]) -> io::Result<(usize, SocketAddr)> {
        self.socket.recv_from(buf).await
    }

    /// Interface MTU clamped into the supported bundle range.
    pub fn mtu(&self) -> usize {
        self.mtu
    }

    pub fn peer(&self) -> SocketAddr {
        self.peer
    }

    pub fn local(&self) -> SocketAddrV4 {
        self.local
    }

    /// The port that identifies multiplexed traffic.
    pub fn multiplex_port(&self) -> u16 {
        self.local.port()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn bind_on_loopback_discovers_address_and_clamps_mtu() {
        let ep = UdpEndpoint::bind("lo", 0, Ipv4Addr::LOCALHOST)
            .await
            .expect("loopback bind");
        assert_eq!(*ep.local().ip(), Ipv4Addr::LOCALHOST);
        // Loopback reports a 64 KiB MTU; the endpoint clamps it.
        assert_eq!(ep.mtu(), MTU_CEILING);
    }

    #[tokio::test]
    async fn bind_on_missing_interface_fails() {
        let result = UdpEndpoint::bind("muxtun-no-such0", 0, Ipv4Addr::LOCALHOST).await;
        assert!(matches!(
            result,
            Err(InterfaceError::InterfaceLookup { .. })
        ));
    }

    #[tokio::test]
    async fn datagrams_flow_between_two_endpoints() {
        // Bind both ends on loopback with ephemeral ports, then retarget
        // each at the other's discovered port.
        let a = UdpEndpoint::bind("lo", 0, Ipv4Addr::LOCALHOST).await.unwrap();
        let b = UdpEndpoint::bind("lo", 0, Ipv4Addr::LOCALHOST).await.unwrap();

        let a_port = a.local().port();
        let b_port = b.local().port();

        let mut a = a;
        let mut b = b;
        a.peer = SocketAddr::from((Ipv4Addr::LOCALHOST, b_port));
        b.peer = SocketAddr::from((Ipv4Addr::LOCALHOST, a_port));

        let payload = vec![0x28u8, 0xAA, 0xBB];
        let sent = a.send_to_peer(&payload).await.unwrap();
        assert_eq!(sent, payload.len());

        let mut buf = vec![0u8; NET_RECV_BUFFER];
        let (n, src) = tokio::time::timeout(
            std::time::Duration::from_secs(2),
            b.recv_from(&mut buf),
        )
        .await
        .expect("timed out waiting for datagram")
        .unwrap();

        assert_eq!(&buf[..n], payload.as_slice());
        assert_eq!(src.port(), a_port);
    }
}
