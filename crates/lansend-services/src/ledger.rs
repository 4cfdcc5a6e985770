//! Transfer ledger — append-only history plus running totals.
//!
//! Every transfer attempt that got as far as a connection leaves exactly one
//! [`TransferRecord`]. Records are never edited; a retry is a new record.
//! [`TransferStats`] only ever counts completed records.

use std::net::IpAddr;
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::{SystemTime, UNIX_EPOCH};

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Direction {
    Sent,
    Received,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TransferStatus {
    Completed,
    Failed,
}

/// One finished transfer attempt.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TransferRecord {
    pub direction: Direction,
    /// Name as sent, or as written to disk for received files.
    pub filename: String,
    /// Announced size in bytes.
    pub size: u64,
    pub peer: IpAddr,
    /// Unix seconds when the attempt ended.
    pub timestamp: u64,
    pub status: TransferStatus,
}

impl TransferRecord {
    /// Build a record stamped with the current time.
    pub fn new(
        direction: Direction,
        filename: impl Into<String>,
        size: u64,
        peer: IpAddr,
        status: TransferStatus,
    ) -> Self {
        Self {
            direction,
            filename: filename.into(),
            size,
            peer,
            timestamp: now_secs(),
            status,
        }
    }

    pub fn is_completed(&self) -> bool {
        self.status == TransferStatus::Completed
    }
}

/// Aggregate counters over completed transfers. Never decrease.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TransferStats {
    pub bytes_sent: u64,
    pub bytes_received: u64,
    pub files_sent: u64,
    pub files_received: u64,
}

#[derive(Debug, Default)]
struct LedgerInner {
    records: Vec<TransferRecord>,
    stats: TransferStats,
}

/// Shared handle to the ledger. Cloning is cheap; all clones see one ledger.
#[derive(Debug, Clone, Default)]
pub struct TransferLedger {
    inner: Arc<Mutex<LedgerInner>>,
}

fn now_secs() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs())
        .unwrap_or(0)
}

impl TransferLedger {
    pub fn new() -> Self {
        Self::default()
    }

    // Critical sections never panic, so a poisoned lock still holds
    // consistent data.
    fn lock(&self) -> MutexGuard<'_, LedgerInner> {
        self.inner.lock().unwrap_or_else(|e| e.into_inner())
    }

    /// Append a record and fold it into the counters if it completed.
    pub fn append(&self, record: TransferRecord) {
        let mut inner = self.lock();
        if record.is_completed() {
            match record.direction {
                Direction::Sent => {
                    inner.stats.bytes_sent += record.size;
                    inner.stats.files_sent += 1;
                }
                Direction::Received => {
                    inner.stats.bytes_received += record.size;
                    inner.stats.files_received += 1;
                }
            }
        }
        inner.records.push(record);
    }

    pub fn stats(&self) -> TransferStats {
        self.lock().stats
    }

    /// Up to `limit` most recent records, newest first.
    pub fn recent(&self, limit: usize) -> Vec<TransferRecord> {
        self.lock().records.iter().rev().take(limit).cloned().collect()
    }

    /// Total number of records, failed ones included.
    pub fn len(&self) -> usize {
        self.lock().records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
