//! The event loop that runs the tunnel.
//!
//! A single task owns every piece of mutable state: the virtual device,
//! the UDP endpoint, the header codec contexts, the bundle buffer, and
//! the last-flush timestamp. Each iteration suspends exactly once, on a
//! `select!` across {socket readable, device readable, period timer},
//! and runs the chosen handler to completion. When both ingress sources
//! are ready the network is served first (`biased` ordering).
//!
//! Egress path: device read, optional compress, bundle append, flush on
//! trigger. Ingress path: socket read; datagrams from the multiplex port
//! are demultiplexed and decompressed, anything else is forwarded to the
//! device verbatim.

use std::net::SocketAddr;
use std::time::Duration;

use tokio::time::Instant;
use tracing::{debug, info, warn};

use muxtun_codec::{CompressOutcome, DecompressOutcome, HeaderCodec};
use muxtun_core::bundle::{Append, BundleBuffer};
use muxtun_core::demux::demux;
use muxtun_core::error::DemuxError;
use muxtun_core::trigger::{FlushReasons, Triggers};
use muxtun_interfaces::endpoint::{UdpEndpoint, NET_RECV_BUFFER};
use muxtun_interfaces::vdev::VirtualDevice;

use crate::error::NodeError;
use crate::flow_log::{Action, EventKind, FlowLog, PeerColumn};

/// The tunnel engine. Generic over the virtual device so tests can run
/// it against an in-memory device.
pub struct Engine<D: VirtualDevice> {
    device: D,
    endpoint: UdpEndpoint,
    codec: HeaderCodec,
    bundle: BundleBuffer,
    triggers: Triggers,
    flow_log: FlowLog,
    epoch: Instant,
    /// Time of the most recent flush (real or empty-tick), microseconds
    /// since `epoch`.
    last_sent_us: u64,
    tap2net: u64,
    net2tap: u64,
}

impl<D: VirtualDevice> Engine<D> {
    pub fn new(
        device: D,
        endpoint: UdpEndpoint,
        codec: HeaderCodec,
        triggers: Triggers,
        flow_log: FlowLog,
    ) -> Self {
        let bundle = BundleBuffer::new(endpoint.mtu());
        Self {
            device,
            endpoint,
            codec,
            bundle,
            triggers,
            flow_log,
            epoch: Instant::now(),
            last_sent_us: 0,
            tap2net: 0,
            net2tap: 0,
        }
    }

    fn now_us(&self) -> u64 {
        self.epoch.elapsed().as_micros() as u64
    }

    /// Run the loop until a fatal error. Does not return otherwise.
    pub async fn run(&mut self) -> Result<(), NodeError> {
        info!(
            device = self.device.name(),
            peer = %self.endpoint.peer(),
            mtu = self.endpoint.mtu(),
            triggers = ?self.triggers,
            "entering event loop"
        );

        let mut net_buf = vec![0u8; NET_RECV_BUFFER];

        loop {
            let remaining = self
                .triggers
                .time_until_period(self.now_us(), self.last_sent_us);

            tokio::select! {
                biased;

                result = self.endpoint.recv_from(&mut net_buf) => match result {
                    Ok((n, src)) => self.handle_net(&net_buf[..n], src).await?,
                    Err(e) if e.kind() == std::io::ErrorKind::Interrupted => {}
                    Err(e) => return Err(NodeError::Wait(e)),
                },

                result = self.device.recv() => match result {
                    Ok(pkt) => self.handle_device(&pkt).await?,
                    Err(e) if e.kind() == std::io::ErrorKind::Interrupted => {}
                    Err(e) => return Err(NodeError::Device(e)),
                },

                _ = tokio::time::sleep(Duration::from_micros(remaining)) => {
                    self.handle_period().await;
                }
            }
        }
    }

    /// Ingress: one datagram from the network.
    async fn handle_net(&mut self, datagram: &[u8], src: SocketAddr) -> Result<(), NodeError> {
        self.net2tap += 1;
        let counter = self.net2tap;

        if src.port() != self.endpoint.multiplex_port() {
            // Native pass-through: not from the multiplex port.
            self.device.send(datagram).await.map_err(NodeError::Device)?;
            debug!(bytes = datagram.len(), %src, "forwarded native datagram");
            self.flow_log.event(
                Action::Forward,
                EventKind::Native,
                datagram.len(),
                counter,
                Some(PeerColumn::From(src)),
                &[],
            );
            return Ok(());
        }

        self.flow_log.event(
            Action::Rec,
            EventKind::Muxed,
            datagram.len(),
            counter,
            Some(PeerColumn::From(src)),
            &[],
        );

        let result = demux(datagram);
        debug!(
            bytes = datagram.len(),
            packets = result.packets.len(),
            %src,
            "demultiplexed bundle"
        );

        for payload in &result.packets {
            match self.codec.decompress(payload) {
                Ok(DecompressOutcome::Packet(ip_pkt)) => {
                    self.device.send(&ip_pkt).await.map_err(NodeError::Device)?;
                    self.flow_log.event(
                        Action::Sent,
                        EventKind::Demuxed,
                        ip_pkt.len(),
                        counter,
                        None,
                        &[],
                    );
                }
                Ok(DecompressOutcome::FeedbackOnly) => {
                    info!("ROHC payload carried no IP packet");
                    self.flow_log.event(
                        Action::Rec,
                        EventKind::RohcFeedback,
                        datagram.len(),
                        counter,
                        Some(PeerColumn::From(src)),
                        &[],
                    );
                }
                Err(e) => {
                    warn!("decompression failed, packet dropped: {e}");
                    self.flow_log.event(
                        Action::Error,
                        EventKind::DecompFailed,
                        payload.len(),
                        counter,
                        None,
                        &[],
                    );
                }
            }
        }

        match result.error {
            Some(DemuxError::BadSeparator(b)) => {
                warn!("bad separator 0x{b:02x} in received bundle, remainder dropped");
                self.flow_log.event(
                    Action::Error,
                    EventKind::BadSeparator,
                    datagram.len(),
                    counter,
                    None,
                    &[],
                );
            }
            Some(DemuxError::BadLength {
                declared,
                remaining,
            }) => {
                warn!(declared, remaining, "separator length overruns the datagram, remainder dropped");
                self.flow_log.event(
                    Action::Error,
                    EventKind::DemuxBadLength,
                    datagram.len(),
                    counter,
                    None,
                    &[],
                );
            }
            None => {}
        }

        Ok(())
    }

    /// Egress: one packet from the virtual device.
    async fn handle_device(&mut self, pkt: &[u8]) -> Result<(), NodeError> {
        self.tap2net += 1;
        let counter = self.tap2net;
        self.flow_log
            .event(Action::Rec, EventKind::Native, pkt.len(), counter, None, &[]);

        let payload = match self.codec.compress(pkt) {
            Ok(CompressOutcome::Packet(compressed)) => compressed,
            Ok(CompressOutcome::Segmented) => {
                info!(
                    bytes = pkt.len(),
                    "compressed form exceeded the reassembly unit, sending uncompressed"
                );
                pkt.to_vec()
            }
            Err(e) => {
                warn!("compression failed, packet dropped: {e}");
                self.flow_log.event(
                    Action::Error,
                    EventKind::ComprFailed,
                    pkt.len(),
                    counter,
                    None,
                    &[],
                );
                return Ok(());
            }
        };

        let buffered_before = self.bundle.count();
        match self.bundle.try_append(&payload) {
            Ok(Append::Stored) => {}
            Ok(Append::MtuFlush(ready)) => {
                debug!(
                    bytes = ready.len(),
                    packets = buffered_before,
                    "MTU reached, flushing without the arriving packet"
                );
                self.send_bundle(ready, buffered_before, counter, &["MTU"])
                    .await;
                if let Err(e) = self.bundle.append_now(&payload) {
                    warn!(bytes = payload.len(), "packet cannot be bundled, dropped: {e}");
                    return Ok(());
                }
            }
            Err(e) => {
                warn!(bytes = payload.len(), "packet cannot be bundled, dropped: {e}");
                return Ok(());
            }
        }

        let now = self.now_us();
        let reasons =
            self.triggers
                .flush_reasons(now, self.last_sent_us, self.bundle.count(), self.bundle.size());
        if reasons.any() {
            let npkts = self.bundle.count();
            let bundle = self.bundle.drain();
            debug!(
                bytes = bundle.len(),
                packets = npkts,
                ?reasons,
                "flush triggered"
            );
            self.send_bundle(bundle, npkts, counter, &reason_names(&reasons))
                .await;
            self.last_sent_us = now;
        }

        Ok(())
    }

    /// The period timer expired with nothing arriving.
    async fn handle_period(&mut self) {
        let now = self.now_us();
        if !self.bundle.is_empty() {
            let npkts = self.bundle.count();
            let bundle = self.bundle.drain();
            debug!(bytes = bundle.len(), packets = npkts, "period expired, flushing");
            self.send_bundle(bundle, npkts, self.tap2net, &["period"])
                .await;
        }
        // Every expiry restarts the period, flush or not.
        self.last_sent_us = now;
    }

    /// Send one bundle to the peer; failures are logged and survived.
    async fn send_bundle(&mut self, bundle: Vec<u8>, npkts: u32, counter: u64, reasons: &[&str]) {
        if bundle.is_empty() {
            return;
        }
        match self.endpoint.send_to_peer(&bundle).await {
            Ok(sent) => {
                debug!(bytes = sent, packets = npkts, "bundle sent");
                let npkts_column = npkts.to_string();
                let mut extras: Vec<&str> = Vec::with_capacity(reasons.len() + 1);
                extras.push(&npkts_column);
                extras.extend_from_slice(reasons);
                self.flow_log.event(
                    Action::Sent,
                    EventKind::Muxed,
                    bundle.len(),
                    counter,
                    Some(PeerColumn::To(self.endpoint.peer())),
                    &extras,
                );
            }
            Err(e) => warn!("UDP send failed, bundle dropped: {e}"),
        }
    }
}

/// Reasons in their reporting order.
fn reason_names(reasons: &FlushReasons) -> Vec<&'static str> {
    let mut names = Vec::new();
    if reasons.numpacket_limit {
        names.push("numpacket_limit");
    }
    if reasons.size_limit {
        names.push("size_limit");
    }
    if reasons.timeout {
        names.push("timeout");
    }
    names
}
