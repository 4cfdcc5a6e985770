//! Presence listener.
//!
//! Binds the discovery port for the life of the node and turns valid
//! announcements into registry entries. A peer is reported once, on its
//! first announcement; repeats are ignored. Our own broadcasts echo back
//! and are filtered by source address.

use std::net::{IpAddr, Ipv4Addr, SocketAddr};

use anyhow::{Context, Result};
use socket2::{Domain, Protocol, Socket, Type};
use tokio::net::UdpSocket;
use tokio::sync::broadcast;

use lansend_core::config::LansendConfig;
use lansend_core::wire::{is_announcement, MAX_DATAGRAM};
use lansend_services::{Event, EventBus, PeerRegistry, Severity};

pub struct DiscoveryListener {
    port: u16,
    local_addr: IpAddr,
    registry: PeerRegistry,
    events: EventBus,
    shutdown: broadcast::Receiver<()>,
}

impl DiscoveryListener {
    pub fn new(
        config: &LansendConfig,
        local_addr: IpAddr,
        registry: PeerRegistry,
        events: EventBus,
        shutdown: broadcast::Receiver<()>,
    ) -> Self {
        Self {
            port: config.network.discovery_port,
            local_addr,
            registry,
            events,
            shutdown,
        }
    }

    /// Listen until shutdown. A bind failure ends the listener (and only
    /// the listener); receive errors are logged and skipped.
    pub async fn run(mut self) -> Result<()> {
        let socket = match make_listener_socket(self.port) {
            Ok(s) => s,
            Err(e) => {
                self.events.log(
                    Severity::Error,
                    format!("[discover] cannot bind UDP port {}: {e:#}", self.port),
                );
                return Err(e);
            }
        };

        tracing::info!(port = self.port, local = %self.local_addr, "discovery listener starting");
        self.events.log(
            Severity::Info,
            format!("[discover] listening on UDP {}", self.port),
        );

        let mut buf = vec![0u8; MAX_DATAGRAM];
        loop {
            tokio::select! {
                _ = self.shutdown.recv() => {
                    tracing::info!("discovery listener shutting down");
                    return Ok(());
                }
                result = socket.recv_from(&mut buf) => {
                    match result {
                        Ok((len, from)) => {
                            self.handle_datagram(&buf[..len], from.ip());
                        }
                        Err(e) => tracing::warn!(error = %e, "recv_from failed"),
                    }
                }
            }
        }
    }

    /// Apply one datagram. Returns true when it introduced a new peer.
    pub fn handle_datagram(&self, payload: &[u8], sender: IpAddr) -> bool {
        if !is_announcement(payload) {
            tracing::trace!(from = %sender, len = payload.len(), "ignoring non-announcement datagram");
            return false;
        }
        if sender == self.local_addr {
            tracing::trace!("ignoring own announcement");
            return false;
        }
        if !self.registry.insert(sender) {
            return false;
        }

        tracing::info!(peer = %sender, "peer discovered");
        self.events.emit(Event::PeerDiscovered { address: sender });
        self.events
            .log(Severity::Success, format!("✓ device discovered: {sender}"));
        true
    }
}

/// Create a UDP socket bound to the discovery port on all interfaces.
fn make_listener_socket(port: u16) -> Result<UdpSocket> {
    let socket = Socket::new(Domain::IPV4, Type::DGRAM, Some(Protocol::UDP)).context("socket()")?;
    socket.set_reuse_address(true).context("SO_REUSEADDR")?;
    socket.set_nonblocking(true).context("set_nonblocking")?;

    let bind_addr = SocketAddr::from((Ipv4Addr::UNSPECIFIED, port));
    socket.bind(&bind_addr.into()).context("bind()")?;

    UdpSocket::from_std(socket.into()).context("failed to convert to tokio UdpSocket")
}
