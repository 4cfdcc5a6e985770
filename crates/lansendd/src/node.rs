//! Node — the handle a front end holds.
//!
//! Owns the shared state, spawns the network tasks, and exposes read-only
//! views. Everything the tasks have to say arrives on the [`EventReceiver`]
//! returned alongside the node.

use std::net::IpAddr;
use std::path::{Path, PathBuf};

use tokio::sync::broadcast;
use tokio::task::JoinHandle;

use lansend_core::LansendConfig;
use lansend_services::{
    EventBus, EventReceiver, PeerRegistry, TransferLedger, TransferRecord, TransferStats,
};

use crate::discovery::{self, Beacon, DiscoveryListener};
use crate::transfer::{Receiver, Sender, TransferError};

/// Result of one spawned transfer.
pub type TransferTask = JoinHandle<Result<TransferRecord, TransferError>>;

/// Handles to the two long-running discovery tasks.
pub struct DiscoveryTasks {
    pub beacon: JoinHandle<()>,
    pub listener: JoinHandle<()>,
}

pub struct Node {
    config: LansendConfig,
    local_addr: IpAddr,
    registry: PeerRegistry,
    ledger: TransferLedger,
    events: EventBus,
    sender: Sender,
    shutdown: broadcast::Sender<()>,
}

impl Node {
    /// Build a node and the single consumer of its events.
    pub fn new(config: LansendConfig) -> (Node, EventReceiver) {
        Self::with_local_addr(config, discovery::local_ip())
    }

    /// Like [`Node::new`] with an explicit address for self-filtering.
    pub fn with_local_addr(config: LansendConfig, local_addr: IpAddr) -> (Node, EventReceiver) {
        let (events, rx) = EventBus::channel();
        let ledger = TransferLedger::new();
        let sender = Sender::new(&config, ledger.clone(), events.clone());
        let (shutdown, _) = broadcast::channel(1);

        let node = Node {
            config,
            local_addr,
            registry: PeerRegistry::new(),
            ledger,
            events,
            sender,
            shutdown,
        };
        (node, rx)
    }

    pub fn config(&self) -> &LansendConfig {
        &self.config
    }

    pub fn local_addr(&self) -> IpAddr {
        self.local_addr
    }

    /// Start the beacon and the listener. Both run until [`Node::shutdown`].
    pub fn start_discovery(&self) -> DiscoveryTasks {
        let beacon = Beacon::new(&self.config, self.events.clone(), self.shutdown.subscribe());
        let listener = DiscoveryListener::new(
            &self.config,
            self.local_addr,
            self.registry.clone(),
            self.events.clone(),
            self.shutdown.subscribe(),
        );

        let beacon = tokio::spawn(async move {
            if let Err(e) = beacon.run().await {
                tracing::error!(error = %e, "presence broadcast failed");
            }
        });
        let listener = tokio::spawn(async move {
            if let Err(e) = listener.run().await {
                tracing::error!(error = %e, "discovery listener failed");
            }
        });

        DiscoveryTasks { beacon, listener }
    }

    /// Accept one inbound transfer in the background.
    pub fn start_receiving(&self) -> TransferTask {
        let receiver = Receiver::new(
            &self.config,
            self.ledger.clone(),
            self.events.clone(),
            self.shutdown.subscribe(),
        );
        tokio::spawn(receiver.run_once())
    }

    /// Send one file in the background.
    ///
    /// A missing file is rejected here, before anything is spawned.
    pub fn send_file(&self, peer: IpAddr, path: &Path) -> Result<TransferTask, TransferError> {
        let file = self.sender.prepare(path)?;
        let sender = self.sender.clone();
        Ok(tokio::spawn(async move { sender.send(peer, file).await }))
    }

    /// Send several files to one peer, strictly one after another.
    pub fn send_files(
        &self,
        peer: IpAddr,
        paths: Vec<PathBuf>,
    ) -> JoinHandle<Vec<Result<TransferRecord, TransferError>>> {
        let sender = self.sender.clone();
        tokio::spawn(async move { sender.send_files(peer, &paths).await })
    }

    /// Known peers, sorted.
    pub fn list_peers(&self) -> Vec<IpAddr> {
        self.registry.snapshot()
    }

    pub fn get_stats(&self) -> TransferStats {
        self.ledger.stats()
    }

    /// Up to `limit` most recent records, newest first.
    pub fn get_history(&self, limit: usize) -> Vec<TransferRecord> {
        self.ledger.recent(limit)
    }

    /// History bounded by the configured window.
    pub fn history(&self) -> Vec<TransferRecord> {
        self.get_history(self.config.transfer.history_window)
    }

    /// Signal every task started by this node to stop at its next
    /// suspension point. Transfers already streaming run to the end.
    pub fn shutdown(&self) {
        // Err only means nothing is subscribed.
        let _ = self.shutdown.send(());
    }
}
