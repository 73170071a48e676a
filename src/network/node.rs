//! Connection lifecycle and peer registry.
//!
//! One task per connection reads line-delimited messages and feeds them to
//! the dispatcher; a per-connection writer task serializes outbound messages
//! so replies and keepalive probes never interleave mid-line. A single sweep
//! task pings every registered peer at a fixed interval. A node-wide watch
//! signal stops the accept loop, the sweep and every live handler.

use crate::error::ChainError;
use crate::ledger::Ledger;
use crate::network::dispatch::Dispatcher;
use crate::network::message::Message;
use parking_lot::RwLock;
use std::collections::{BTreeSet, HashMap};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::net::tcp::{OwnedReadHalf, OwnedWriteHalf};
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::{mpsc, watch};
use tracing::{debug, info, warn};

/// Idle window after which a connection handler probes the peer.
pub const IDLE_PROBE_TIMEOUT: Duration = Duration::from_secs(5);
/// Interval of the node-wide keepalive sweep.
pub const KEEPALIVE_SWEEP_INTERVAL: Duration = Duration::from_secs(10);
/// Quiet time after which the sweep gives up on a peer. Responsive peers
/// refresh `last_seen` on every message, including pong replies to the idle
/// probe, so only truly unresponsive connections age past this.
pub const STALE_PEER_TIMEOUT: Duration = Duration::from_secs(30);

/// Reachability bookkeeping for one live connection. Owns no ledger data.
pub struct PeerHandle {
    pub sender: mpsc::UnboundedSender<Message>,
    pub last_seen: Instant,
    pub node_id: Option<String>,
}

pub type PeerRegistry = Arc<RwLock<HashMap<String, PeerHandle>>>;
/// Gossip-advertised peer addresses, connected or not.
pub type KnownPeers = Arc<RwLock<BTreeSet<String>>>;

pub struct NetworkNode {
    node_id: String,
    listen_port: u16,
    peers: PeerRegistry,
    known_peers: KnownPeers,
    dispatcher: Dispatcher,
    shutdown: watch::Receiver<bool>,
}

impl NetworkNode {
    pub fn new(
        ledger: Arc<RwLock<Ledger>>,
        listen_port: u16,
        advertised_host: &str,
        shutdown: watch::Receiver<bool>,
    ) -> Self {
        let node_id = uuid::Uuid::new_v4().simple().to_string()[..8].to_string();
        let peers: PeerRegistry = Arc::new(RwLock::new(HashMap::new()));
        let known_peers: KnownPeers = Arc::new(RwLock::new(BTreeSet::new()));
        let dispatcher = Dispatcher::new(
            node_id.clone(),
            listen_port,
            format!("{}:{}", advertised_host, listen_port),
            ledger,
            peers.clone(),
            known_peers.clone(),
        );
        NetworkNode {
            node_id,
            listen_port,
            peers,
            known_peers,
            dispatcher,
            shutdown,
        }
    }

    pub fn node_id(&self) -> &str {
        &self.node_id
    }

    pub fn listen_port(&self) -> u16 {
        self.listen_port
    }

    pub fn peer_count(&self) -> usize {
        self.peers.read().len()
    }

    pub fn connected_peers(&self) -> Vec<String> {
        self.peers.read().keys().cloned().collect()
    }

    pub fn known_peers(&self) -> Vec<String> {
        self.known_peers.read().iter().cloned().collect()
    }

    /// Fire-and-forget send to every connected peer. Used for locally mined
    /// blocks; received gossip is not rebroadcast.
    pub fn broadcast(&self, message: Message) {
        for (remote, handle) in self.peers.read().iter() {
            if handle.sender.send(message.clone()).is_err() {
                debug!(%remote, "skipping peer with closed connection");
            }
        }
    }

    /// Binds the listener and serves inbound connections until shutdown.
    /// The keepalive sweep runs alongside the accept loop. A bind failure is
    /// reported to the caller; the process is expected to keep running
    /// without a reachable p2p port.
    pub async fn run(self: Arc<Self>) -> Result<(), ChainError> {
        let bind_addr = format!("0.0.0.0:{}", self.listen_port);
        let listener = TcpListener::bind(&bind_addr).await.map_err(|e| {
            ChainError::NetworkError(format!("failed to bind p2p port {}: {}", bind_addr, e))
        })?;
        info!(node_id = %self.node_id, %bind_addr, "p2p node listening");

        tokio::spawn(self.clone().keepalive_sweep());

        let mut shutdown = self.shutdown.clone();
        loop {
            tokio::select! {
                _ = shutdown.changed() => {
                    info!("p2p accept loop stopping");
                    break;
                }
                accepted = listener.accept() => match accepted {
                    Ok((stream, addr)) => {
                        let remote = addr.to_string();
                        if self.peers.read().contains_key(&remote) {
                            debug!(%remote, "duplicate connection ignored");
                            continue;
                        }
                        info!(%remote, "accepted inbound connection");
                        self.clone().register_connection(stream, remote, false);
                    }
                    Err(e) => {
                        warn!(error = %e, "accept failed");
                        tokio::time::sleep(Duration::from_secs(1)).await;
                    }
                }
            }
        }
        Ok(())
    }

    /// Opens an outbound connection, sends the handshake announcing this
    /// node's identifier and listening port, and asks for the peer's chain.
    pub async fn connect_peer(self: &Arc<Self>, host: &str, port: u16) -> Result<(), ChainError> {
        let target = format!("{}:{}", host, port);
        if self.peers.read().contains_key(&target) {
            debug!(%target, "already connected");
            return Ok(());
        }
        let stream = TcpStream::connect(&target)
            .await
            .map_err(|e| ChainError::NetworkError(format!("connect {}: {}", target, e)))?;
        info!(%target, "connected to peer");
        self.known_peers.write().insert(target.clone());
        self.clone().register_connection(stream, target, true);
        Ok(())
    }

    fn register_connection(self: Arc<Self>, stream: TcpStream, remote: String, outbound: bool) {
        let (read_half, write_half) = stream.into_split();
        let (sender, receiver) = mpsc::unbounded_channel();

        self.peers.write().insert(
            remote.clone(),
            PeerHandle {
                sender: sender.clone(),
                last_seen: Instant::now(),
                node_id: None,
            },
        );

        tokio::spawn(write_loop(write_half, receiver, remote.clone()));

        if outbound {
            let _ = sender.send(Message::Hello {
                node_id: self.node_id.clone(),
                port: self.listen_port,
            });
            let _ = sender.send(Message::RequestChain);
        }

        tokio::spawn(self.read_loop(read_half, remote, sender));
    }

    async fn read_loop(
        self: Arc<Self>,
        read_half: OwnedReadHalf,
        remote: String,
        sender: mpsc::UnboundedSender<Message>,
    ) {
        let mut lines = BufReader::new(read_half).lines();
        let mut shutdown = self.shutdown.clone();

        loop {
            tokio::select! {
                _ = shutdown.changed() => break,
                read = tokio::time::timeout(IDLE_PROBE_TIMEOUT, lines.next_line()) => match read {
                    // Idle is not a failure: probe and keep waiting.
                    Err(_) => {
                        if sender.send(Message::Ping).is_err() {
                            break;
                        }
                    }
                    Ok(Ok(Some(line))) => {
                        if line.trim().is_empty() {
                            continue;
                        }
                        if let Some(reply) = self.dispatcher.handle_line(&line, &remote) {
                            if sender.send(reply).is_err() {
                                break;
                            }
                        }
                    }
                    Ok(Ok(None)) => {
                        debug!(%remote, "peer closed connection");
                        break;
                    }
                    Ok(Err(e)) => {
                        warn!(%remote, error = %e, "connection error");
                        break;
                    }
                }
            }
        }

        self.peers.write().remove(&remote);
        info!(%remote, "connection closed");
    }

    async fn keepalive_sweep(self: Arc<Self>) {
        let mut shutdown = self.shutdown.clone();
        let mut interval = tokio::time::interval(KEEPALIVE_SWEEP_INTERVAL);
        interval.tick().await; // the first tick fires immediately

        loop {
            tokio::select! {
                _ = shutdown.changed() => break,
                _ = interval.tick() => self.sweep_peers(STALE_PEER_TIMEOUT),
            }
        }
    }

    /// One keepalive pass: drops peers that have been quiet for longer than
    /// `stale_after` or whose connection task is gone, and pings the rest.
    fn sweep_peers(&self, stale_after: Duration) {
        self.peers.write().retain(|remote, handle| {
            if handle.last_seen.elapsed() > stale_after {
                debug!(%remote, "dropping stale peer");
                return false;
            }
            let alive = handle.sender.send(Message::Ping).is_ok();
            if !alive {
                debug!(%remote, "dropping peer with closed connection");
            }
            alive
        });
    }
}

async fn write_loop(
    mut write_half: OwnedWriteHalf,
    mut receiver: mpsc::UnboundedReceiver<Message>,
    remote: String,
) {
    while let Some(message) = receiver.recv().await {
        let mut line = message.encode();
        line.push('\n');
        if let Err(e) = write_half.write_all(line.as_bytes()).await {
            debug!(%remote, error = %e, "write failed");
            break;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const REMOTE: &str = "127.0.0.1:55002";

    fn node() -> (NetworkNode, watch::Sender<bool>) {
        let ledger = Arc::new(RwLock::new(Ledger::new(1)));
        let (shutdown_tx, shutdown_rx) = watch::channel(false);
        (NetworkNode::new(ledger, 0, "127.0.0.1", shutdown_rx), shutdown_tx)
    }

    fn register(node: &NetworkNode) -> mpsc::UnboundedReceiver<Message> {
        let (sender, receiver) = mpsc::unbounded_channel();
        node.peers.write().insert(
            REMOTE.to_string(),
            PeerHandle {
                sender,
                last_seen: Instant::now(),
                node_id: None,
            },
        );
        receiver
    }

    #[test]
    fn test_sweep_pings_fresh_peers() {
        let (node, _shutdown) = node();
        let mut receiver = register(&node);

        node.sweep_peers(STALE_PEER_TIMEOUT);
        assert_eq!(node.peer_count(), 1);
        assert_eq!(receiver.try_recv().unwrap(), Message::Ping);
    }

    #[test]
    fn test_sweep_drops_quiet_peers() {
        let (node, _shutdown) = node();
        let _receiver = register(&node);

        // With no staleness budget any peer counts as overdue.
        node.sweep_peers(Duration::ZERO);
        assert_eq!(node.peer_count(), 0);
    }

    #[test]
    fn test_sweep_drops_peers_with_closed_connections() {
        let (node, _shutdown) = node();
        drop(register(&node));

        node.sweep_peers(STALE_PEER_TIMEOUT);
        assert_eq!(node.peer_count(), 0);
    }
}
