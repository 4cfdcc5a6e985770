//! Peer discovery over UDP broadcast.
//!
//! Every node runs a [`beacon::Beacon`] that broadcasts the presence marker
//! and a [`listener::DiscoveryListener`] that records whoever sends it.
//! Discovered peers accumulate in the shared `PeerRegistry`.

use std::io;
use std::net::{IpAddr, Ipv4Addr, UdpSocket};

pub mod beacon;
pub mod listener;

pub use beacon::Beacon;
pub use listener::DiscoveryListener;

/// The address this host uses for outbound traffic, used to recognise our
/// own broadcasts. Falls back to loopback when no route exists.
pub fn local_ip() -> IpAddr {
    match outbound_ip() {
        Ok(ip) => ip,
        Err(e) => {
            tracing::debug!(error = %e, "no outbound route, assuming loopback");
            IpAddr::V4(Ipv4Addr::LOCALHOST)
        }
    }
}

// connect() on UDP only selects a route; nothing is sent.
fn outbound_ip() -> io::Result<IpAddr> {
    let socket = UdpSocket::bind((Ipv4Addr::UNSPECIFIED, 0))?;
    socket.connect((Ipv4Addr::new(8, 8, 8, 8), 80))?;
    Ok(socket.local_addr()?.ip())
}
