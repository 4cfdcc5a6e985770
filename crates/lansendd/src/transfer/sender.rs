//! Outbound transfers.
//!
//! Idle → Connecting → MetadataSent → Streaming → Completed | Failed
//!
//! Each file gets its own connection. A multi-file send runs the files one
//! after another with a short pause between them; independent calls are not
//! serialized against each other.

use std::net::{IpAddr, SocketAddr};
use std::path::{Path, PathBuf};
use std::time::Duration;

use tokio::io::{AsyncReadExt, AsyncWrite, AsyncWriteExt};
use tokio::net::TcpStream;

use lansend_core::config::LansendConfig;
use lansend_core::format::format_size;
use lansend_core::wire::{self, TransferMetadata, CHUNK_SIZE};
use lansend_services::{
    Direction, Event, EventBus, Severity, TransferLedger, TransferRecord, TransferStatus,
};

use super::{ProgressMeter, TransferError};

/// A local file validated and measured before any connection is made.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OutgoingFile {
    pub path: PathBuf,
    /// Basename sent to the peer.
    pub filename: String,
    pub filesize: u64,
}

#[derive(Clone)]
pub struct Sender {
    port: u16,
    connect_timeout: Duration,
    metadata_settle: Duration,
    inter_file_delay: Duration,
    ledger: TransferLedger,
    events: EventBus,
}

impl Sender {
    pub fn new(config: &LansendConfig, ledger: TransferLedger, events: EventBus) -> Self {
        Self {
            port: config.network.transfer_port,
            connect_timeout: Duration::from_secs(config.network.connect_timeout_secs),
            metadata_settle: Duration::from_millis(config.transfer.metadata_settle_ms),
            inter_file_delay: Duration::from_millis(config.transfer.inter_file_delay_ms),
            ledger,
            events,
        }
    }

    /// Check that `path` is a regular file and capture its name and size.
    ///
    /// Runs synchronously so callers learn about a bad path immediately.
    pub fn prepare(&self, path: &Path) -> Result<OutgoingFile, TransferError> {
        let meta = match std::fs::metadata(path) {
            Ok(m) if m.is_file() => m,
            _ => {
                tracing::warn!(path = %path.display(), "file to send not found");
                self.events.notify("File not found");
                self.events.log(
                    Severity::Error,
                    format!("✗ file not found: {}", path.display()),
                );
                return Err(TransferError::NotFound(path.to_path_buf()));
            }
        };

        let filename = path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| super::UNKNOWN_FILENAME.to_string());

        Ok(OutgoingFile {
            path: path.to_path_buf(),
            filename,
            filesize: meta.len(),
        })
    }

    /// Validate and send one file.
    pub async fn send_file(&self, peer: IpAddr, path: &Path) -> Result<TransferRecord, TransferError> {
        let file = self.prepare(path)?;
        self.send(peer, file).await
    }

    /// Send files one at a time, pausing between them. A failed file does
    /// not stop the ones after it.
    pub async fn send_files(
        &self,
        peer: IpAddr,
        paths: &[PathBuf],
    ) -> Vec<Result<TransferRecord, TransferError>> {
        let mut results = Vec::with_capacity(paths.len());
        for (i, path) in paths.iter().enumerate() {
            if i > 0 {
                tokio::time::sleep(self.inter_file_delay).await;
            }
            results.push(self.send_file(peer, path).await);
        }
        results
    }

    /// Connect to `peer` and stream a prepared file.
    ///
    /// A connect failure leaves no ledger entry; anything after the
    /// connection is up is recorded, completed or failed.
    pub async fn send(&self, peer: IpAddr, file: OutgoingFile) -> Result<TransferRecord, TransferError> {
        let stream = match self.connect(peer).await {
            Ok(s) => s,
            Err(err) => {
                tracing::warn!(peer = %peer, error = %err, "connect failed");
                self.events
                    .notify(format!("Connection to {peer} failed: {err}"));
                self.events
                    .log(Severity::Error, format!("✗ could not connect to {peer}: {err}"));
                return Err(err);
            }
        };

        self.deliver(peer, stream, &file).await
    }

    /// Stream `file` over an established connection and record the outcome.
    pub(crate) async fn deliver<W>(
        &self,
        peer: IpAddr,
        conn: W,
        file: &OutgoingFile,
    ) -> Result<TransferRecord, TransferError>
    where
        W: AsyncWrite + Unpin,
    {
        tracing::info!(peer = %peer, filename = %file.filename, filesize = file.filesize, "sending file");
        match self.stream_file(conn, file).await {
            Ok(()) => Ok(self.complete(peer, file)),
            Err(err) => Err(self.fail(peer, file, err)),
        }
    }

    async fn connect(&self, peer: IpAddr) -> Result<TcpStream, TransferError> {
        let addr = SocketAddr::new(peer, self.port);
        match tokio::time::timeout(self.connect_timeout, TcpStream::connect(addr)).await {
            Ok(Ok(stream)) => Ok(stream),
            Ok(Err(source)) => Err(TransferError::Connect { peer: addr, source }),
            Err(_) => Err(TransferError::ConnectTimeout {
                peer: addr,
                secs: self.connect_timeout.as_secs(),
            }),
        }
    }

    /// Write the metadata frame, pause, then exactly `filesize` bytes.
    pub(crate) async fn stream_file<W>(&self, mut conn: W, file: &OutgoingFile) -> Result<(), TransferError>
    where
        W: AsyncWrite + Unpin,
    {
        let meta = TransferMetadata {
            filename: file.filename.clone(),
            filesize: file.filesize,
        };
        wire::write_metadata(&mut conn, &meta).await?;
        tokio::time::sleep(self.metadata_settle).await;

        self.events.emit(Event::TransferStarted {
            direction: Direction::Sent,
            filename: file.filename.clone(),
            filesize: file.filesize,
        });

        // Bounded by the announced size so a growing file cannot overrun
        // the frame.
        let mut source = tokio::fs::File::open(&file.path).await?.take(file.filesize);
        let mut meter = ProgressMeter::start(Direction::Sent, &file.filename, file.filesize);
        let mut buf = vec![0u8; CHUNK_SIZE];

        loop {
            let n = source.read(&mut buf).await?;
            if n == 0 {
                break;
            }
            conn.write_all(&buf[..n]).await?;
            meter.advance(n, &self.events);
        }

        if meter.moved() < file.filesize {
            return Err(TransferError::Incomplete {
                moved: meter.moved(),
                expected: file.filesize,
            });
        }

        conn.flush().await?;
        conn.shutdown().await?;
        Ok(())
    }

    fn complete(&self, peer: IpAddr, file: &OutgoingFile) -> TransferRecord {
        let record = TransferRecord::new(
            Direction::Sent,
            file.filename.clone(),
            file.filesize,
            peer,
            TransferStatus::Completed,
        );
        self.ledger.append(record.clone());

        tracing::info!(peer = %peer, filename = %file.filename, bytes = file.filesize, "file sent");
        self.events.notify(format!("File sent to {peer}"));
        self.events.log(
            Severity::Success,
            format!(
                "✓ file sent to {peer}: {} ({})",
                file.filename,
                format_size(file.filesize)
            ),
        );
        self.events.emit(Event::StatsChanged);
        self.events.emit(Event::HistoryChanged);
        record
    }

    fn fail(&self, peer: IpAddr, file: &OutgoingFile, err: TransferError) -> TransferError {
        self.ledger.append(TransferRecord::new(
            Direction::Sent,
            file.filename.clone(),
            file.filesize,
            peer,
            TransferStatus::Failed,
        ));

        tracing::warn!(peer = %peer, filename = %file.filename, error = %err, "send failed");
        self.events.notify(format!("Send failed: {err}"));
        self.events
            .log(Severity::Error, format!("✗ error while sending: {err}"));
        self.events.emit(Event::HistoryChanged);
        err
    }
}
