//! lansend-core — wire format, configuration, and formatting helpers.
//! All other lansend crates depend on this one.

pub mod config;
pub mod format;
pub mod wire;

pub use config::LansendConfig;
pub use wire::{TransferMetadata, WireError};
