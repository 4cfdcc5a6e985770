//! File transfer over TCP.
//!
//! A transfer is one connection carrying one metadata frame and one file.
//! The [`receiver`] serves a single inbound connection per activation; the
//! [`sender`] opens one outbound connection per file.

use std::io;
use std::net::SocketAddr;
use std::path::PathBuf;
use std::time::{Duration, Instant};

use lansend_core::WireError;
use lansend_services::{Direction, Event, EventBus};

pub mod receiver;
pub mod sender;

pub use receiver::Receiver;
pub use sender::{OutgoingFile, Sender};

/// Name recorded for an attempt whose metadata never parsed.
pub const UNKNOWN_FILENAME: &str = "unknown";

// ── Errors ────────────────────────────────────────────────────────────────────

/// Why a transfer attempt ended without completing. Every variant is
/// terminal for its attempt; nothing here is retried.
#[derive(Debug, thiserror::Error)]
pub enum TransferError {
    #[error("file not found: {}", .0.display())]
    NotFound(PathBuf),

    #[error("cannot listen on port {port}: {source}")]
    Bind { port: u16, source: io::Error },

    #[error("accept failed: {0}")]
    Accept(#[source] io::Error),

    #[error("connection to {peer} failed: {source}")]
    Connect { peer: SocketAddr, source: io::Error },

    #[error("connection to {peer} timed out after {secs}s")]
    ConnectTimeout { peer: SocketAddr, secs: u64 },

    #[error(transparent)]
    Metadata(#[from] WireError),

    #[error("connection closed after {moved} of {expected} bytes")]
    Incomplete { moved: u64, expected: u64 },

    #[error("receiver stopped before a peer connected")]
    Cancelled,

    #[error("i/o error: {0}")]
    Io(#[from] io::Error),
}

// ── Progress ──────────────────────────────────────────────────────────────────

/// Average rate since `elapsed` began. Zero when no time has passed.
pub fn average_speed(moved: u64, elapsed: Duration) -> f64 {
    let secs = elapsed.as_secs_f64();
    if secs > 0.0 {
        moved as f64 / secs
    } else {
        0.0
    }
}

/// Counts bytes for one transfer and reports each chunk on the bus.
pub(crate) struct ProgressMeter {
    direction: Direction,
    filename: String,
    filesize: u64,
    moved: u64,
    started: Instant,
}

impl ProgressMeter {
    pub(crate) fn start(direction: Direction, filename: &str, filesize: u64) -> Self {
        Self {
            direction,
            filename: filename.to_string(),
            filesize,
            moved: 0,
            started: Instant::now(),
        }
    }

    pub(crate) fn moved(&self) -> u64 {
        self.moved
    }

    pub(crate) fn advance(&mut self, n: usize, events: &EventBus) {
        self.moved += n as u64;
        let speed = average_speed(self.moved, self.started.elapsed());
        tracing::trace!(
            filename = %self.filename,
            moved = self.moved,
            total = self.filesize,
            "chunk moved"
        );
        events.emit(Event::TransferProgress {
            direction: self.direction,
            bytes_moved: self.moved,
            filesize: self.filesize,
            filename: self.filename.clone(),
            speed,
        });
    }
}

// ── Filenames ─────────────────────────────────────────────────────────────────

/// Reduce a peer-supplied filename to a single path component.
///
/// Only directory parts (either separator) are removed; every other
/// character is kept as sent. An empty name, `.` or `..` becomes
/// [`UNKNOWN_FILENAME`], so a received file always lands directly inside
/// the storage directory.
pub fn sanitize_filename(raw: &str) -> String {
    let base = raw.rsplit(['/', '\\']).next().unwrap_or(raw);
    match base {
        "" | "." | ".." => UNKNOWN_FILENAME.to_string(),
        name => name.to_string(),
    }
}
