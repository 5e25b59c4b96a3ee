//! In-memory [`VirtualDevice`] for exercising the event loop without a
//! kernel tun device.
//!
//! [`memory_device`] returns the device plus the test's two ends of it:
//! a sender that makes packets readable from the device, and a receiver
//! that observes packets the engine injects into it.

use std::io;

use tokio::sync::{mpsc, Mutex};

use crate::vdev::VirtualDevice;

/// A channel-backed virtual device.
pub struct MemoryDevice {
    name: String,
    ingress: Mutex<mpsc::UnboundedReceiver<Vec<u8>>>,
    egress: mpsc::UnboundedSender<Vec<u8>>,
}

/// Build a [`MemoryDevice`] along with its feed and observation channels.
pub fn memory_device(
    name: impl Into<String>,
) -> (
    MemoryDevice,
    mpsc::UnboundedSender<Vec<u8>>,
    mpsc::UnboundedReceiver<Vec<u8>>,
) {
    let (feed_tx, feed_rx) = mpsc::unbounded_channel();
    let (observe_tx, observe_rx) = mpsc::unbounded_channel();
    let device = MemoryDevice {
        name: name.into(),
        ingress: Mutex::new(feed_rx),
        egress: observe_tx,
    };
    (device, feed_tx, observe_rx)
}

impl VirtualDevice for MemoryDevice {
    async fn recv(&self) -> io::Result<Vec<u8>> {
        let mut rx = self.ingress.lock().await;
        rx.recv().await.ok_or_else(|| {
            io::Error::new(io::ErrorKind::UnexpectedEof, "memory device feed closed")
        })
    }

    async fn send(&self, pkt: &[u8]) -> io::Result<()> {
        self.egress.send(pkt.to_vec()).map_err(|_| {
            io::Error::new(io::ErrorKind::BrokenPipe, "memory device observer closed")
        })
    }

    fn name(&self) -> &str {
        &self.name
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn feeds_and_observes_packets() {
        let (device, feed, mut observe) = memory_device("mem0");
        assert_eq!(device.name(), "mem0");

        feed.send(vec![1, 2, 3]).unwrap();
        assert_eq!(device.recv().await.unwrap(), vec![1, 2, 3]);

        device.send(&[4, 5]).await.unwrap();
        assert_eq!(observe.recv().await.unwrap(), vec![4, 5]);
    }

    #[tokio::test]
    async fn closed_feed_surfaces_as_eof() {
        let (device, feed, _observe) = memory_device("mem1");
        drop(feed);
        let err = device.recv().await.unwrap_err();
        assert_eq!(err.kind(), io::ErrorKind::UnexpectedEof);
    }
}
