use crate::*;

use std::sync::Arc;

use lansend_core::wire::{encode_metadata, TransferMetadata};
use lansend_services::{Direction, Severity, TransferStatus};
use lansendd::{Node, TransferError};
use tokio::io::AsyncWriteExt;

/// Send one file of `len` bytes from A to B and check B's copy.
async fn round_trip(tag: &str, len: usize) {
    let port = free_tcp_port();
    let src_dir = scratch_dir(&format!("{tag}-src"));
    let dst_dir = scratch_dir(&format!("{tag}-dst"));

    let payload = pattern(len);
    let src = src_dir.join("payload.bin");
    std::fs::write(&src, &payload).unwrap();

    let (node_a, _rx_a) = Node::new(loopback_config(port, &src_dir));
    let (node_b, mut rx_b) = Node::new(loopback_config(port, &dst_dir));

    let receiving = node_b.start_receiving();
    settle().await;
    let sending = node_a.send_file(LOOPBACK, &src).unwrap();

    let sent = sending.await.unwrap().expect("send failed");
    let received = tokio::time::timeout(Duration::from_secs(60), receiving)
        .await
        .expect("receiver hung")
        .unwrap()
        .expect("receive failed");

    assert_eq!(sent.size, len as u64);
    assert_eq!(received.filename, "RECU_payload.bin");
    let copy = std::fs::read(dst_dir.join("RECU_payload.bin")).unwrap();
    assert!(copy == payload, "{tag}: received bytes differ from source");

    assert_eq!(node_a.get_stats().bytes_sent, len as u64);
    assert_eq!(node_b.get_stats().bytes_received, len as u64);

    let moved: Vec<u64> = rx_b
        .drain()
        .into_iter()
        .filter_map(|e| match e {
            Event::TransferProgress {
                direction: Direction::Received,
                bytes_moved,
                filesize,
                ..
            } => {
                assert!(bytes_moved <= filesize);
                Some(bytes_moved)
            }
            _ => None,
        })
        .collect();
    assert!(moved.windows(2).all(|w| w[0] <= w[1]));
    if len > 0 {
        assert_eq!(moved.last(), Some(&(len as u64)));
    }

    let _ = std::fs::remove_dir_all(&src_dir);
    let _ = std::fs::remove_dir_all(&dst_dir);
}

#[tokio::test]
async fn test_transfer_empty_file() {
    round_trip("size0", 0).await;
}

#[tokio::test]
async fn test_transfer_one_byte() {
    round_trip("size1", 1).await;
}

#[tokio::test]
async fn test_transfer_exactly_one_chunk() {
    round_trip("size8192", 8192).await;
}

#[tokio::test]
async fn test_transfer_one_chunk_plus_one() {
    round_trip("size8193", 8193).await;
}

#[tokio::test]
async fn test_transfer_ten_megabytes() {
    round_trip("size10m", 10_000_000).await;
}

/// Three files, sent back to back; the receiver is re-armed for each.
#[tokio::test]
async fn test_multi_file_send_is_sequential_and_counted() {
    let port = free_tcp_port();
    let src_dir = scratch_dir("multi-src");
    let dst_dir = scratch_dir("multi-dst");

    let sizes = [10usize, 20_000, 3];
    let paths: Vec<PathBuf> = sizes
        .iter()
        .enumerate()
        .map(|(i, len)| {
            let path = src_dir.join(format!("file{i}.dat"));
            std::fs::write(&path, pattern(*len)).unwrap();
            path
        })
        .collect();

    let (node_a, _rx_a) = Node::new(loopback_config(port, &src_dir));
    let (node_b, _rx_b) = Node::new(loopback_config(port, &dst_dir));
    let node_b = Arc::new(node_b);

    let rearm = {
        let node_b = node_b.clone();
        tokio::spawn(async move {
            let mut records = Vec::new();
            for _ in 0..3 {
                records.push(node_b.start_receiving().await.unwrap());
            }
            records
        })
    };
    settle().await;

    let results = node_a.send_files(LOOPBACK, paths).await.unwrap();
    assert!(results.iter().all(|r| r.is_ok()));
    let received = tokio::time::timeout(Duration::from_secs(30), rearm)
        .await
        .unwrap()
        .unwrap();
    assert!(received.iter().all(|r| r.is_ok()));

    for (i, len) in sizes.iter().enumerate() {
        let copy = std::fs::read(dst_dir.join(format!("RECU_file{i}.dat"))).unwrap();
        assert_eq!(copy, pattern(*len));
    }

    let total: u64 = sizes.iter().map(|s| *s as u64).sum();
    let a = node_a.get_stats();
    let b = node_b.get_stats();
    assert_eq!(a.files_sent + b.files_received, 6);
    assert_eq!(a.bytes_sent, total);
    assert_eq!(b.bytes_received, total);

    let history = node_a.get_history(20);
    assert_eq!(history.len(), 3);
    assert_eq!(history[0].filename, "file2.dat", "newest first");
    assert!(history.iter().all(|r| r.status == TransferStatus::Completed));

    let _ = std::fs::remove_dir_all(&src_dir);
    let _ = std::fs::remove_dir_all(&dst_dir);
}

/// A peer that hangs up mid-payload must not produce a completed record.
#[tokio::test]
async fn test_early_close_fails_receive() {
    let port = free_tcp_port();
    let dst_dir = scratch_dir("early-close");
    let (node_b, mut rx_b) = Node::new(loopback_config(port, &dst_dir));

    let receiving = node_b.start_receiving();
    settle().await;

    let mut conn = tokio::net::TcpStream::connect((LOOPBACK, port)).await.unwrap();
    let frame = encode_metadata(&TransferMetadata {
        filename: "cut.bin".into(),
        filesize: 1000,
    })
    .unwrap();
    conn.write_all(&frame).await.unwrap();
    conn.write_all(&pattern(300)).await.unwrap();
    drop(conn);

    let result = tokio::time::timeout(Duration::from_secs(10), receiving)
        .await
        .unwrap()
        .unwrap();
    assert!(matches!(
        result,
        Err(TransferError::Incomplete {
            moved: 300,
            expected: 1000
        })
    ));

    assert_eq!(node_b.get_stats().files_received, 0);
    assert!(node_b
        .get_history(20)
        .iter()
        .all(|r| r.status == TransferStatus::Failed));
    assert_eq!(
        std::fs::read(dst_dir.join("RECU_cut.bin")).unwrap().len(),
        300,
        "partial file stays on disk"
    );

    let events = collect_until(&mut rx_b, Duration::from_secs(1), |_| false).await;
    assert!(events.iter().any(|e| matches!(
        e,
        Event::Log {
            severity: Severity::Error,
            ..
        }
    )));

    let _ = std::fs::remove_dir_all(&dst_dir);
}

/// Nothing listening: the send fails with a notification and no record.
#[tokio::test]
async fn test_send_to_absent_peer() {
    let port = free_tcp_port();
    let src_dir = scratch_dir("absent");
    let src = src_dir.join("x.txt");
    std::fs::write(&src, b"hello").unwrap();

    let (node_a, mut rx_a) = Node::new(loopback_config(port, &src_dir));
    let result = node_a.send_file(LOOPBACK, &src).unwrap().await.unwrap();
    assert!(matches!(
        result,
        Err(TransferError::Connect { .. }) | Err(TransferError::ConnectTimeout { .. })
    ));
    assert!(node_a.get_history(20).is_empty());

    let events = rx_a.drain();
    assert!(events.iter().any(|e| matches!(e, Event::Notify { .. })));

    let _ = std::fs::remove_dir_all(&src_dir);
}

/// The receiver port is already taken: the receiver reports and exits.
#[tokio::test]
async fn test_receiver_bind_failure_is_reported() {
    let blocker = std::net::TcpListener::bind("0.0.0.0:0").unwrap();
    let port = blocker.local_addr().unwrap().port();
    let (node, mut rx) = Node::new(loopback_config(port, &scratch_dir("bind-fail")));

    let result = node.start_receiving().await.unwrap();
    assert!(matches!(result, Err(TransferError::Bind { .. })));
    assert!(rx.drain().iter().any(|e| matches!(
        e,
        Event::Log {
            severity: Severity::Error,
            ..
        }
    )));
}
