//! Socket-level gossip tests.
//!
//! Spins up real listeners on localhost and checks that a freshly connected
//! node adopts a longer chain via the handshake chain request, and that a
//! raw client speaking the line protocol gets sane replies to garbage and
//! unknown commands without losing the connection.

use emberchain::ledger::Ledger;
use emberchain::network::{Message, NetworkNode};
use parking_lot::RwLock;
use std::sync::Arc;
use std::time::Duration;
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::net::TcpStream;
use tokio::sync::watch;

const TEST_DIFFICULTY: u32 = 1;

fn ledger_with_blocks(mined: usize) -> Arc<RwLock<Ledger>> {
    let ledger = Arc::new(RwLock::new(Ledger::new(TEST_DIFFICULTY)));
    {
        let mut guard = ledger.write();
        for _ in 0..mined {
            guard.mine_next("miner");
        }
    }
    ledger
}

async fn start_node(
    ledger: Arc<RwLock<Ledger>>,
    port: u16,
    shutdown: watch::Receiver<bool>,
) -> Arc<NetworkNode> {
    let node = Arc::new(NetworkNode::new(ledger, port, "127.0.0.1", shutdown));
    tokio::spawn(node.clone().run());
    // Give the accept loop a moment to bind.
    tokio::time::sleep(Duration::from_millis(200)).await;
    node
}

#[tokio::test]
async fn test_new_node_adopts_longer_chain() {
    tokio::time::timeout(Duration::from_secs(20), async {
        let (shutdown_tx, shutdown_rx) = watch::channel(false);

        let ledger_a = ledger_with_blocks(3);
        let _node_a = start_node(ledger_a.clone(), 29411, shutdown_rx.clone()).await;

        let ledger_b = ledger_with_blocks(0);
        let node_b = Arc::new(NetworkNode::new(
            ledger_b.clone(),
            29412,
            "127.0.0.1",
            shutdown_rx,
        ));
        node_b.connect_peer("127.0.0.1", 29411).await.unwrap();

        // The outbound handshake asks for the peer's chain; poll for adoption.
        let mut adopted = false;
        for _ in 0..100 {
            if ledger_b.read().chain().len() == 4 {
                adopted = true;
                break;
            }
            tokio::time::sleep(Duration::from_millis(100)).await;
        }
        assert!(adopted, "node never adopted the longer chain");
        assert_eq!(ledger_b.read().chain(), ledger_a.read().chain());

        let _ = shutdown_tx.send(true);
    })
    .await
    .expect("test timed out");
}

#[tokio::test]
async fn test_handshake_records_announced_address() {
    tokio::time::timeout(Duration::from_secs(20), async {
        let (shutdown_tx, shutdown_rx) = watch::channel(false);

        let node_a = start_node(ledger_with_blocks(0), 29413, shutdown_rx.clone()).await;
        let node_b = Arc::new(NetworkNode::new(
            ledger_with_blocks(0),
            29414,
            "127.0.0.1",
            shutdown_rx,
        ));
        node_b.connect_peer("127.0.0.1", 29413).await.unwrap();

        let mut recorded = false;
        for _ in 0..100 {
            if node_a
                .known_peers()
                .contains(&"127.0.0.1:29414".to_string())
            {
                recorded = true;
                break;
            }
            tokio::time::sleep(Duration::from_millis(100)).await;
        }
        assert!(recorded, "the announced listen address was never recorded");
        assert_eq!(node_b.peer_count(), 1);

        let _ = shutdown_tx.send(true);
    })
    .await
    .expect("test timed out");
}

#[tokio::test]
async fn test_raw_client_protocol_handling() {
    tokio::time::timeout(Duration::from_secs(20), async {
        let (shutdown_tx, shutdown_rx) = watch::channel(false);
        let ledger = ledger_with_blocks(2);
        let _node = start_node(ledger, 29415, shutdown_rx).await;

        let stream = TcpStream::connect("127.0.0.1:29415").await.unwrap();
        let (read_half, mut write_half) = stream.into_split();
        let mut lines = BufReader::new(read_half).lines();

        // Garbage is swallowed, unknown commands get an error reply, and the
        // connection stays up for the chain request that follows.
        write_half.write_all(b"not json at all\n").await.unwrap();
        write_half
            .write_all(b"{\"type\":\"warp_drive\"}\n")
            .await
            .unwrap();
        write_half
            .write_all(b"{\"type\":\"request_blockchain\"}\n")
            .await
            .unwrap();

        let mut saw_error = false;
        let mut chain_len = 0;
        while let Ok(Ok(Some(line))) =
            tokio::time::timeout(Duration::from_secs(10), lines.next_line()).await
        {
            match Message::decode(&line) {
                Ok(Message::Error { detail }) => {
                    assert!(detail.contains("warp_drive"), "unexpected error: {}", detail);
                    saw_error = true;
                }
                Ok(Message::ResponseChain { blocks }) => {
                    chain_len = blocks.len();
                    break;
                }
                // Keepalive probes may interleave.
                Ok(_) => {}
                Err(e) => panic!("undecodable reply {}: {:?}", line, e),
            }
        }
        assert!(saw_error, "no error reply for the unknown command");
        assert_eq!(chain_len, 3);

        let _ = shutdown_tx.send(true);
    })
    .await
    .expect("test timed out");
}
