//! lansend wire format — everything that crosses the network.
//!
//! Two protocols live here:
//!
//! * Discovery (UDP): a bare datagram whose payload is exactly
//!   [`DISCOVERY_MAGIC`]. No fields, no version. Anything else is ignored.
//! * Transfer (TCP): a length-prefixed JSON metadata frame followed by the
//!   raw file bytes.
//!
//! ```text
//! [4 bytes]         metadata length N, big-endian u32
//! [N bytes]         UTF-8 JSON {"filename": <string>, "filesize": <u64>}
//! [filesize bytes]  file content
//! ```
//!
//! There is no acknowledgement, trailer or checksum. Changing anything here
//! breaks interop with every deployed peer.

use serde::{Deserialize, Serialize};
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};

// ── Discovery ─────────────────────────────────────────────────────────────────

/// Presence marker broadcast by every beacon.
pub const DISCOVERY_MAGIC: &[u8] = b"PRESENCE_XENDER";

/// UDP port for presence broadcast and listen.
pub const DEFAULT_DISCOVERY_PORT: u16 = 6020;

/// Seconds between two presence broadcasts.
pub const ANNOUNCE_INTERVAL_SECS: u64 = 2;

/// Largest datagram the listener reads. The magic is far smaller.
pub const MAX_DATAGRAM: usize = 1024;

/// True when a datagram is a presence announcement (exact byte match).
pub fn is_announcement(payload: &[u8]) -> bool {
    payload == DISCOVERY_MAGIC
}

// ── Transfer ──────────────────────────────────────────────────────────────────

/// TCP port the receiver listens on.
pub const DEFAULT_TRANSFER_PORT: u16 = 5001;

/// Payload read/write granularity on both sides of a transfer.
pub const CHUNK_SIZE: usize = 8192;

/// Bound on the sender's connect step.
pub const CONNECT_TIMEOUT_SECS: u64 = 15;

/// Pause between writing the metadata frame and the first payload byte.
/// Pacing only: the receiver does not acknowledge the frame.
pub const METADATA_SETTLE_MS: u64 = 100;

/// Pause between consecutive files of a multi-file send.
pub const INTER_FILE_DELAY_MS: u64 = 500;

/// Marker prepended to every received filename.
pub const RECEIVED_PREFIX: &str = "RECU_";

/// Size of the big-endian length prefix.
pub const LENGTH_PREFIX_LEN: usize = 4;

/// Upper bound accepted for the metadata length prefix.
/// A filename plus an integer never comes close; anything larger is garbage.
pub const MAX_METADATA_LEN: usize = 64 * 1024;

/// Describes the file that follows the frame on a transfer connection.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TransferMetadata {
    pub filename: String,
    pub filesize: u64,
}

/// Serialize metadata into a complete frame: length prefix + JSON.
pub fn encode_metadata(meta: &TransferMetadata) -> Result<Vec<u8>, WireError> {
    let json = serde_json::to_vec(meta).map_err(WireError::InvalidJson)?;
    if json.len() > MAX_METADATA_LEN {
        return Err(WireError::MetadataTooLarge(json.len()));
    }

    let mut frame = Vec::with_capacity(LENGTH_PREFIX_LEN + json.len());
    frame.extend_from_slice(&(json.len() as u32).to_be_bytes());
    frame.extend_from_slice(&json);
    Ok(frame)
}

/// Interpret a length prefix, rejecting sizes above [`MAX_METADATA_LEN`].
pub fn metadata_len(prefix: [u8; LENGTH_PREFIX_LEN]) -> Result<usize, WireError> {
    let len = u32::from_be_bytes(prefix) as usize;
    if len > MAX_METADATA_LEN {
        return Err(WireError::MetadataTooLarge(len));
    }
    Ok(len)
}

/// Decode the JSON body of a frame (without its length prefix).
///
/// Both fields are required; a missing `filename` or `filesize` is malformed.
pub fn decode_metadata(body: &[u8]) -> Result<TransferMetadata, WireError> {
    serde_json::from_slice(body).map_err(WireError::InvalidJson)
}

/// Read one metadata frame from a stream.
///
/// Fails with [`WireError::Io`] if the peer closes before the frame is whole.
pub async fn read_metadata<R>(reader: &mut R) -> Result<TransferMetadata, WireError>
where
    R: AsyncRead + Unpin,
{
    let mut prefix = [0u8; LENGTH_PREFIX_LEN];
    reader.read_exact(&mut prefix).await?;
    let len = metadata_len(prefix)?;

    let mut body = vec![0u8; len];
    reader.read_exact(&mut body).await?;
    decode_metadata(&body)
}

/// Write one metadata frame to a stream and flush it.
pub async fn write_metadata<W>(writer: &mut W, meta: &TransferMetadata) -> Result<(), WireError>
where
    W: AsyncWrite + Unpin,
{
    let frame = encode_metadata(meta)?;
    writer.write_all(&frame).await?;
    writer.flush().await?;
    Ok(())
}

// ── Errors ────────────────────────────────────────────────────────────────────

/// Errors that can arise when reading or writing wire-format data.
#[derive(Debug, thiserror::Error)]
pub enum WireError {
    #[error("metadata length {0} exceeds maximum {}", MAX_METADATA_LEN)]
    MetadataTooLarge(usize),

    #[error("malformed metadata: {0}")]
    InvalidJson(#[source] serde_json::Error),

    #[error("metadata frame i/o: {0}")]
    Io(#[from] std::io::Error),
}

// ── Tests ─────────────────────────────────────────────────────────────────────
