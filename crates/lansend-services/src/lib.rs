//! lansend-services — state shared between the network tasks and whoever
//! presents their results: the peer registry, the transfer ledger, and the
//! event bus.

pub mod event;
pub mod ledger;
pub mod peer;

pub use event::{Event, EventBus, EventReceiver, Severity};
pub use ledger::{Direction, TransferLedger, TransferRecord, TransferStats, TransferStatus};
pub use peer::PeerRegistry;
