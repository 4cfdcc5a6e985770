//! lansendd — lansend peer-to-peer daemon and command line front end.

use std::future::Future;
use std::net::IpAddr;
use std::path::PathBuf;
use std::time::Duration;

use anyhow::{Context, Result};
use tokio::time;

use lansend_core::format::{format_size, format_speed};
use lansend_core::LansendConfig;
use lansend_services::{Event, EventReceiver, Severity};
use lansendd::{Node, TransferError, TransferTask};

const DEFAULT_PEER_WAIT_SECS: u64 = 5;

// ── Event consumer ────────────────────────────────────────────────────────────

fn render(event: &Event) {
    match event {
        Event::Log { message, severity } => match severity {
            Severity::Error => tracing::error!("{message}"),
            Severity::Warning => tracing::warn!("{message}"),
            Severity::Info | Severity::Success => tracing::info!("{message}"),
        },
        Event::PeerDiscovered { address } => println!("+ peer {address}"),
        Event::Notify { message } => println!("» {message}"),
        Event::TransferStarted {
            direction,
            filename,
            filesize,
        } => tracing::info!(
            ?direction,
            filename = %filename,
            size = %format_size(*filesize),
            "transfer started"
        ),
        Event::TransferProgress {
            direction,
            bytes_moved,
            filesize,
            filename,
            speed,
        } => {
            let percent = if *filesize == 0 {
                100.0
            } else {
                *bytes_moved as f64 * 100.0 / *filesize as f64
            };
            tracing::debug!(
                ?direction,
                filename = %filename,
                percent = %format!("{percent:.1}"),
                speed = %format_speed(*speed),
                "progress"
            );
        }
        Event::StatsChanged | Event::HistoryChanged => {}
    }
}

fn drain(rx: &mut EventReceiver) {
    for event in rx.drain() {
        render(&event);
    }
}

/// Drive `fut` to completion, draining the bus every `poll` meanwhile.
async fn pump_until<F: Future>(rx: &mut EventReceiver, poll: Duration, fut: F) -> F::Output {
    let mut interval = time::interval(poll);
    tokio::pin!(fut);
    loop {
        tokio::select! {
            out = &mut fut => {
                drain(rx);
                return out;
            }
            _ = interval.tick() => drain(rx),
        }
    }
}

fn print_summary(node: &Node) {
    let stats = node.get_stats();
    println!("═══════════════════════════════════════");
    println!("  Sent     : {} files, {}", stats.files_sent, format_size(stats.bytes_sent));
    println!("  Received : {} files, {}", stats.files_received, format_size(stats.bytes_received));
    println!("═══════════════════════════════════════");
}

// ── Subcommand handlers ───────────────────────────────────────────────────────

/// Discover peers and keep accepting transfers until Ctrl-C.
async fn cmd_run(node: &Node, rx: &mut EventReceiver, poll: Duration) -> Result<()> {
    let _discovery = node.start_discovery();
    let mut receiving: Option<TransferTask> = Some(node.start_receiving());
    let mut interval = time::interval(poll);

    let ctrl_c = tokio::signal::ctrl_c();
    tokio::pin!(ctrl_c);

    loop {
        tokio::select! {
            _ = &mut ctrl_c => {
                tracing::info!("shutdown signal received");
                break;
            }
            joined = async {
                match receiving.as_mut() {
                    Some(task) => task.await,
                    None => std::future::pending().await,
                }
            } => {
                // One connection per activation; re-arm unless the port
                // itself is unusable.
                receiving = match joined {
                    Ok(Err(TransferError::Bind { .. })) => None,
                    Err(e) => {
                        tracing::error!(error = %e, "receiver task failed");
                        Some(node.start_receiving())
                    }
                    Ok(_) => Some(node.start_receiving()),
                };
            }
            _ = interval.tick() => drain(rx),
        }
    }

    node.shutdown();
    drain(rx);
    print_summary(node);
    Ok(())
}

async fn cmd_receive(node: &Node, rx: &mut EventReceiver, poll: Duration) -> Result<()> {
    let record = pump_until(rx, poll, node.start_receiving())
        .await
        .context("receiver task failed")??;
    println!("Saved {} ({})", record.filename, format_size(record.size));
    Ok(())
}

async fn cmd_send(
    node: &Node,
    rx: &mut EventReceiver,
    poll: Duration,
    peer: IpAddr,
    files: Vec<PathBuf>,
) -> Result<()> {
    let total = files.len();
    let results = pump_until(rx, poll, node.send_files(peer, files))
        .await
        .context("send task failed")?;

    let failed = results.iter().filter(|r| r.is_err()).count();
    print_summary(node);
    if failed > 0 {
        anyhow::bail!("{failed} of {total} files failed");
    }
    Ok(())
}

async fn cmd_peers(node: &Node, rx: &mut EventReceiver, poll: Duration, wait: u64) -> Result<()> {
    let _discovery = node.start_discovery();
    pump_until(rx, poll, time::sleep(Duration::from_secs(wait))).await;
    node.shutdown();

    let peers = node.list_peers();
    if peers.is_empty() {
        println!("No peers discovered yet.");
        return Ok(());
    }

    println!("═══════════════════════════════════════");
    println!("  Discovered Peers ({})", peers.len());
    println!("═══════════════════════════════════════");
    for peer in peers {
        println!("  {peer}");
    }
    Ok(())
}

fn print_usage() {
    println!("Usage: lansendd <command>");
    println!();
    println!("Commands:");
    println!("  run                      Announce, discover, and accept transfers (default)");
    println!("  receive                  Accept a single transfer, then exit");
    println!("  send <peer> <file>...    Send files to a peer, one after another");
    println!("  peers [seconds]          Listen for peers (default {DEFAULT_PEER_WAIT_SECS}s) and list them");
    println!();
    println!("Configuration: {}", LansendConfig::file_path().display());
}

// ── Entry point ───────────────────────────────────────────────────────────────

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .init();

    if let Err(e) = LansendConfig::write_default_if_missing() {
        tracing::warn!(error = %e, "failed to write default config");
    }
    let config = LansendConfig::load().unwrap_or_else(|e| {
        tracing::warn!(error = %e, "failed to load config, using defaults");
        LansendConfig::default()
    });
    let poll = Duration::from_millis(config.events.poll_interval_ms);

    let args: Vec<String> = std::env::args().skip(1).collect();
    let args: Vec<&str> = args.iter().map(String::as_str).collect();

    let (node, mut rx) = Node::new(config);
    tracing::info!(local = %node.local_addr(), "lansendd starting");

    match args.as_slice() {
        ["run"] | [] => cmd_run(&node, &mut rx, poll).await,
        ["receive"] => cmd_receive(&node, &mut rx, poll).await,
        ["send", peer, files @ ..] if !files.is_empty() => {
            let peer: IpAddr = peer
                .parse()
                .with_context(|| format!("invalid peer address: {peer}"))?;
            let files = files.iter().map(PathBuf::from).collect();
            cmd_send(&node, &mut rx, poll, peer, files).await
        }
        ["peers"] => cmd_peers(&node, &mut rx, poll, DEFAULT_PEER_WAIT_SECS).await,
        ["peers", secs] => {
            let wait = secs.parse().context("peers wait must be a number of seconds")?;
            cmd_peers(&node, &mut rx, poll, wait).await
        }
        ["help"] | ["--help"] | ["-h"] => {
            print_usage();
            Ok(())
        }
        other => {
            eprintln!("Unknown command: {}", other.join(" "));
            eprintln!();
            print_usage();
            std::process::exit(1);
        }
    }
}
