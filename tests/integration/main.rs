//! lansend integration test harness.
//!
//! Every test runs real nodes against each other over loopback. Each test
//! picks its own free ports and scratch directory, so tests can run in
//! parallel without stepping on each other.
//!
//!   cargo test --test integration

use std::net::{IpAddr, Ipv4Addr};
use std::path::PathBuf;
use std::time::Duration;

use lansend_core::LansendConfig;
use lansend_services::{Event, EventReceiver};

mod discovery;
mod transfer;

// ── Harness ───────────────────────────────────────────────────────────────────

pub const LOOPBACK: IpAddr = IpAddr::V4(Ipv4Addr::LOCALHOST);

/// An address no test traffic ever comes from.
pub const ELSEWHERE: IpAddr = IpAddr::V4(Ipv4Addr::new(10, 255, 255, 1));

/// A TCP port that was free a moment ago.
pub fn free_tcp_port() -> u16 {
    std::net::TcpListener::bind("127.0.0.1:0")
        .unwrap()
        .local_addr()
        .unwrap()
        .port()
}

/// A UDP port that was free a moment ago.
pub fn free_udp_port() -> u16 {
    std::net::UdpSocket::bind("127.0.0.1:0")
        .unwrap()
        .local_addr()
        .unwrap()
        .port()
}

/// A fresh, empty directory unique to this test and process.
pub fn scratch_dir(tag: &str) -> PathBuf {
    let dir = std::env::temp_dir().join(format!("lansend-it-{tag}-{}", std::process::id()));
    let _ = std::fs::remove_dir_all(&dir);
    std::fs::create_dir_all(&dir).unwrap();
    dir
}

/// Deterministic, non-repeating-looking content of `len` bytes.
pub fn pattern(len: usize) -> Vec<u8> {
    let mut state: u32 = 0x9e37_79b9;
    (0..len)
        .map(|_| {
            state ^= state << 13;
            state ^= state >> 17;
            state ^= state << 5;
            state as u8
        })
        .collect()
}

/// Config for a node that talks to other test nodes on loopback.
pub fn loopback_config(transfer_port: u16, storage: &std::path::Path) -> LansendConfig {
    let mut config = LansendConfig::default();
    config.network.transfer_port = transfer_port;
    config.network.broadcast_addr = Ipv4Addr::LOCALHOST;
    config.network.connect_timeout_secs = 2;
    config.network.announce_interval_secs = 1;
    config.transfer.storage_path = storage.to_path_buf();
    config.transfer.metadata_settle_ms = 10;
    config
}

/// Collect events until `done` matches one or `limit` passes.
pub async fn collect_until<F>(rx: &mut EventReceiver, limit: Duration, done: F) -> Vec<Event>
where
    F: Fn(&Event) -> bool,
{
    let mut seen = Vec::new();
    let _ = tokio::time::timeout(limit, async {
        while let Some(event) = rx.recv().await {
            let finished = done(&event);
            seen.push(event);
            if finished {
                break;
            }
        }
    })
    .await;
    seen
}

/// Give a freshly spawned receiver time to bind.
pub async fn settle() {
    tokio::time::sleep(Duration::from_millis(150)).await;
}
