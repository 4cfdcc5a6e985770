//! Inbound transfers.
//!
//! One activation binds the transfer port, accepts exactly one connection,
//! reads the metadata frame, and streams the payload into
//! `<storage>/<prefix><filename>`. Then the socket is released. Serving
//! another transfer takes another activation.
//!
//! Idle → Listening → Connected → Transferring → Completed | Failed

use std::net::{IpAddr, Ipv4Addr, SocketAddr};
use std::path::{Path, PathBuf};

use tokio::io::{AsyncRead, AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpListener;
use tokio::sync::broadcast;

use lansend_core::config::{LansendConfig, TransferConfig};
use lansend_core::format::format_size;
use lansend_core::wire::{self, TransferMetadata, CHUNK_SIZE};
use lansend_services::{
    Direction, Event, EventBus, Severity, TransferLedger, TransferRecord, TransferStatus,
};

use super::{sanitize_filename, ProgressMeter, TransferError, UNKNOWN_FILENAME};

pub struct Receiver {
    port: u16,
    storage_path: PathBuf,
    received_prefix: String,
    ledger: TransferLedger,
    events: EventBus,
    shutdown: broadcast::Receiver<()>,
}

impl Receiver {
    pub fn new(
        config: &LansendConfig,
        ledger: TransferLedger,
        events: EventBus,
        shutdown: broadcast::Receiver<()>,
    ) -> Self {
        let TransferConfig {
            storage_path,
            received_prefix,
            ..
        } = config.transfer.clone();
        Self {
            port: config.network.transfer_port,
            storage_path,
            received_prefix,
            ledger,
            events,
            shutdown,
        }
    }

    /// Serve one inbound transfer.
    ///
    /// Every failure is also reported on the event bus, so spawned callers
    /// may ignore the returned error.
    pub async fn run_once(mut self) -> Result<TransferRecord, TransferError> {
        let bind_addr = SocketAddr::from((Ipv4Addr::UNSPECIFIED, self.port));
        let listener = match TcpListener::bind(bind_addr).await {
            Ok(l) => l,
            Err(source) => {
                let err = TransferError::Bind {
                    port: self.port,
                    source,
                };
                tracing::error!(error = %err, "receiver bind failed");
                self.events
                    .log(Severity::Error, format!("[recv] cannot listen: {err}"));
                return Err(err);
            }
        };

        tracing::info!(port = self.port, "receiver waiting for a connection");
        self.events.log(
            Severity::Info,
            format!("[recv] waiting for a connection on port {}...", self.port),
        );

        let accepted = tokio::select! {
            _ = self.shutdown.recv() => {
                tracing::info!("receiver shutting down before any connection");
                return Err(TransferError::Cancelled);
            }
            r = listener.accept() => r,
        };

        let (stream, peer_addr) = match accepted {
            Ok(a) => a,
            Err(e) => {
                let err = TransferError::Accept(e);
                tracing::error!(error = %err, "receiver accept failed");
                self.events
                    .log(Severity::Error, format!("✗ receive failed: {err}"));
                return Err(err);
            }
        };

        tracing::info!(peer = %peer_addr, "receiver accepted connection");
        self.events.log(
            Severity::Info,
            format!("[recv] connection from {}", peer_addr.ip()),
        );

        // The listener stays open until the transfer ends, then both go.
        let result = self.receive_from(stream, peer_addr.ip()).await;
        drop(listener);
        result
    }

    /// Run the protocol over an already-connected stream.
    pub async fn receive_from<S>(
        &self,
        mut stream: S,
        peer: IpAddr,
    ) -> Result<TransferRecord, TransferError>
    where
        S: AsyncRead + Unpin,
    {
        let meta = match wire::read_metadata(&mut stream).await {
            Ok(m) => m,
            Err(e) => return Err(self.fail(peer, UNKNOWN_FILENAME, 0, e.into())),
        };

        let save_name = format!("{}{}", self.received_prefix, sanitize_filename(&meta.filename));
        let path = self.storage_path.join(&save_name);

        tracing::info!(
            peer = %peer,
            filename = %meta.filename,
            filesize = meta.filesize,
            path = %path.display(),
            "receiving file"
        );
        self.events.emit(Event::TransferStarted {
            direction: Direction::Received,
            filename: save_name.clone(),
            filesize: meta.filesize,
        });

        match self.write_payload(&mut stream, &path, &meta).await {
            Ok(()) => Ok(self.complete(peer, save_name, meta.filesize)),
            Err(e) => Err(self.fail(peer, &save_name, meta.filesize, e)),
        }
    }

    /// Copy exactly `meta.filesize` bytes from the stream into `path`.
    ///
    /// An early EOF leaves whatever arrived on disk.
    async fn write_payload<S>(
        &self,
        stream: &mut S,
        path: &Path,
        meta: &TransferMetadata,
    ) -> Result<(), TransferError>
    where
        S: AsyncRead + Unpin,
    {
        let mut file = tokio::fs::File::create(path).await?;
        let mut meter = ProgressMeter::start(Direction::Received, &meta.filename, meta.filesize);
        let mut buf = vec![0u8; CHUNK_SIZE];

        while meter.moved() < meta.filesize {
            let remaining = meta.filesize - meter.moved();
            let want = remaining.min(CHUNK_SIZE as u64) as usize;
            let n = stream.read(&mut buf[..want]).await?;
            if n == 0 {
                file.flush().await?;
                return Err(TransferError::Incomplete {
                    moved: meter.moved(),
                    expected: meta.filesize,
                });
            }
            file.write_all(&buf[..n]).await?;
            meter.advance(n, &self.events);
        }

        file.flush().await?;
        Ok(())
    }

    fn complete(&self, peer: IpAddr, save_name: String, filesize: u64) -> TransferRecord {
        let record = TransferRecord::new(
            Direction::Received,
            save_name.clone(),
            filesize,
            peer,
            TransferStatus::Completed,
        );
        self.ledger.append(record.clone());

        tracing::info!(peer = %peer, filename = %save_name, bytes = filesize, "file received");
        self.events.log(
            Severity::Success,
            format!("✓ file received: {save_name} ({})", format_size(filesize)),
        );
        self.events.notify(format!("File received: {save_name}"));
        self.events.emit(Event::StatsChanged);
        self.events.emit(Event::HistoryChanged);
        record
    }

    fn fail(&self, peer: IpAddr, filename: &str, size: u64, err: TransferError) -> TransferError {
        self.ledger.append(TransferRecord::new(
            Direction::Received,
            filename,
            size,
            peer,
            TransferStatus::Failed,
        ));

        tracing::warn!(peer = %peer, filename, error = %err, "receive failed");
        self.events
            .log(Severity::Error, format!("✗ receive failed: {err}"));
        self.events.emit(Event::HistoryChanged);
        err
    }
}
