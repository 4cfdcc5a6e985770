//! lansendd — local-network peer discovery and file transfer.
//!
//! The daemon binary is one front end for this library; any other front end
//! drives a [`Node`] and drains its `EventReceiver` the same way.

pub mod discovery;
pub mod node;
pub mod transfer;

pub use node::{DiscoveryTasks, Node, TransferTask};
pub use transfer::TransferError;
