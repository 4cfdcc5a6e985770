//! Presence broadcast.
//!
//! Sends [`DISCOVERY_MAGIC`] to the broadcast address on a fixed interval.
//! A failed send is logged and simply retried on the next tick.

use std::net::{Ipv4Addr, SocketAddr, SocketAddrV4};
use std::time::Duration;

use anyhow::{Context, Result};
use socket2::{Domain, Protocol, Socket, Type};
use tokio::net::UdpSocket;
use tokio::sync::broadcast;
use tokio::time;

use lansend_core::config::LansendConfig;
use lansend_core::wire::DISCOVERY_MAGIC;
use lansend_services::{EventBus, Severity};

pub struct Beacon {
    target: SocketAddrV4,
    interval: Duration,
    events: EventBus,
    shutdown: broadcast::Receiver<()>,
}

impl Beacon {
    pub fn new(config: &LansendConfig, events: EventBus, shutdown: broadcast::Receiver<()>) -> Self {
        Self {
            target: SocketAddrV4::new(config.network.broadcast_addr, config.network.discovery_port),
            interval: Duration::from_secs(config.network.announce_interval_secs),
            events,
            shutdown,
        }
    }

    /// Broadcast until shutdown. Only socket setup can fail.
    pub async fn run(mut self) -> Result<()> {
        let socket = match make_broadcast_socket() {
            Ok(s) => s,
            Err(e) => {
                self.events.log(
                    Severity::Error,
                    format!("[announce] cannot open broadcast socket: {e:#}"),
                );
                return Err(e);
            }
        };

        tracing::info!(dest = %self.target, interval = ?self.interval, "presence broadcast starting");
        self.events
            .log(Severity::Info, "[announce] presence broadcast enabled");

        let mut interval = time::interval(self.interval);
        loop {
            tokio::select! {
                _ = self.shutdown.recv() => {
                    tracing::info!("presence broadcast shutting down");
                    return Ok(());
                }
                _ = interval.tick() => {
                    match socket.send_to(DISCOVERY_MAGIC, self.target).await {
                        Ok(n) => tracing::trace!(bytes = n, "presence sent"),
                        Err(e) => tracing::warn!(error = %e, "presence send failed"),
                    }
                }
            }
        }
    }
}

/// Create a UDP socket allowed to send to broadcast addresses.
fn make_broadcast_socket() -> Result<UdpSocket> {
    let socket = Socket::new(Domain::IPV4, Type::DGRAM, Some(Protocol::UDP)).context("socket()")?;
    socket.set_broadcast(true).context("SO_BROADCAST")?;
    socket.set_nonblocking(true).context("set_nonblocking")?;
    let bind_addr = SocketAddr::from((Ipv4Addr::UNSPECIFIED, 0));
    socket.bind(&bind_addr.into()).context("bind()")?;
    UdpSocket::from_std(socket.into()).context("failed to convert to tokio UdpSocket")
}
