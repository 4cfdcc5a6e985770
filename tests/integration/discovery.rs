use crate::*;

use lansendd::Node;

#[tokio::test]
async fn test_peer_discovered_once_over_loopback() {
    let mut config = loopback_config(free_tcp_port(), &scratch_dir("disc-once"));
    config.network.discovery_port = free_udp_port();
    let (node, mut rx) = Node::with_local_addr(config, ELSEWHERE);

    let _tasks = node.start_discovery();
    // Three broadcast intervals: the same peer announces several times.
    tokio::time::sleep(Duration::from_millis(3200)).await;
    node.shutdown();

    assert_eq!(node.list_peers(), vec![LOOPBACK]);
    let discovered = rx
        .drain()
        .into_iter()
        .filter(|e| matches!(e, Event::PeerDiscovered { .. }))
        .count();
    assert_eq!(discovered, 1);
}

#[tokio::test]
async fn test_own_announcements_never_listed() {
    let mut config = loopback_config(free_tcp_port(), &scratch_dir("disc-self"));
    config.network.discovery_port = free_udp_port();
    let (node, mut rx) = Node::with_local_addr(config, LOOPBACK);

    let _tasks = node.start_discovery();
    tokio::time::sleep(Duration::from_millis(2200)).await;
    node.shutdown();

    assert!(node.list_peers().is_empty());
    assert!(!rx
        .drain()
        .iter()
        .any(|e| matches!(e, Event::PeerDiscovered { .. })));
}

#[tokio::test]
async fn test_discovery_tasks_stop_on_shutdown() {
    let mut config = loopback_config(free_tcp_port(), &scratch_dir("disc-stop"));
    config.network.discovery_port = free_udp_port();
    let (node, _rx) = Node::with_local_addr(config, ELSEWHERE);

    let tasks = node.start_discovery();
    settle().await;
    node.shutdown();

    tokio::time::timeout(Duration::from_secs(5), tasks.beacon)
        .await
        .expect("beacon did not stop")
        .unwrap();
    tokio::time::timeout(Duration::from_secs(5), tasks.listener)
        .await
        .expect("listener did not stop")
        .unwrap();
}
