//! Gossip dispatcher: routes decoded peer messages into ledger mutations,
//! peer bookkeeping, or a reply on the same connection.
//!
//! The dispatcher never touches a socket itself; connection handlers feed it
//! lines and write back whatever reply it returns. All ledger access goes
//! through the shared lock, so messages from concurrent peers serialize at
//! the engine boundary.

use crate::ledger::Ledger;
use crate::network::message::{DecodeError, Message};
use crate::network::node::{KnownPeers, PeerRegistry};
use crate::transaction::Transaction;
use parking_lot::RwLock;
use std::sync::Arc;
use std::time::Instant;
use tracing::{debug, info, warn};

#[derive(Clone)]
pub struct Dispatcher {
    node_id: String,
    listen_port: u16,
    /// This node's own gossip address, excluded from peer-list merges.
    advertised_addr: String,
    ledger: Arc<RwLock<Ledger>>,
    peers: PeerRegistry,
    known_peers: KnownPeers,
}

impl Dispatcher {
    pub fn new(
        node_id: String,
        listen_port: u16,
        advertised_addr: String,
        ledger: Arc<RwLock<Ledger>>,
        peers: PeerRegistry,
        known_peers: KnownPeers,
    ) -> Self {
        Dispatcher {
            node_id,
            listen_port,
            advertised_addr,
            ledger,
            peers,
            known_peers,
        }
    }

    /// Decodes one wire line and dispatches it. Malformed framing is logged
    /// and swallowed; unknown commands earn an error acknowledgment naming
    /// the command. Neither ever tears down the connection.
    pub fn handle_line(&self, line: &str, remote: &str) -> Option<Message> {
        match Message::decode(line) {
            Ok(message) => self.dispatch(message, remote),
            Err(DecodeError::UnknownCommand(command)) => {
                warn!(%remote, %command, "unknown gossip command");
                Some(Message::Error {
                    detail: format!("Unknown command: {}", command),
                })
            }
            Err(DecodeError::Malformed(reason)) => {
                warn!(%remote, %reason, "malformed gossip message");
                None
            }
        }
    }

    pub fn dispatch(&self, message: Message, remote: &str) -> Option<Message> {
        self.touch(remote);

        match message {
            Message::Ping => Some(Message::Pong),
            Message::Pong => {
                debug!(%remote, "peer alive");
                None
            }
            Message::Hello { node_id, port } => {
                self.record_handshake(remote, &node_id, port);
                Some(Message::HelloAck {
                    node_id: self.node_id.clone(),
                    port: self.listen_port,
                })
            }
            Message::HelloAck { node_id, .. } => {
                info!(%remote, peer = %node_id, "handshake completed");
                None
            }
            Message::Error { detail } => {
                warn!(%remote, %detail, "peer reported error");
                None
            }
            Message::NewTransaction { transaction } => {
                self.accept_gossiped_transaction(transaction, remote);
                None
            }
            Message::NewBlock { block } => {
                let accepted = self.ledger.write().append_block(block);
                if accepted {
                    debug!(%remote, "appended gossiped block");
                }
                None
            }
            Message::RequestPeers => Some(Message::ResponsePeers {
                peers: self.known_peers.read().iter().cloned().collect(),
            }),
            Message::ResponsePeers { peers } => {
                self.merge_peers(peers);
                None
            }
            Message::RequestChain => Some(Message::ResponseChain {
                blocks: self.ledger.read().chain().to_vec(),
            }),
            Message::ResponseChain { blocks } => {
                if self.ledger.write().replace_chain(blocks) {
                    info!(%remote, "adopted longer chain from peer");
                }
                None
            }
        }
    }

    fn touch(&self, remote: &str) {
        if let Some(handle) = self.peers.write().get_mut(remote) {
            handle.last_seen = Instant::now();
        }
    }

    fn record_handshake(&self, remote: &str, node_id: &str, port: u16) {
        if let Some(handle) = self.peers.write().get_mut(remote) {
            handle.node_id = Some(node_id.to_string());
        }
        // The announced port is the peer's listening port, which differs from
        // the ephemeral port of an inbound socket.
        let host = remote.rsplit_once(':').map_or(remote, |(host, _)| host);
        self.known_peers.write().insert(format!("{}:{}", host, port));
        info!(%remote, peer = %node_id, port, "registered peer from handshake");
    }

    /// System-minted transactions are a local trust boundary: a reward
    /// arriving over gossip is refused outright, everything else goes through
    /// normal validation.
    fn accept_gossiped_transaction(&self, transaction: Transaction, remote: &str) {
        if transaction.is_system() {
            warn!(%remote, id = %transaction.id, "dropping system transaction from peer");
            return;
        }
        self.ledger.write().accept_pending_transaction(transaction);
    }

    fn merge_peers(&self, peers: Vec<String>) {
        let mut known = self.known_peers.write();
        for peer in peers {
            if peer != self.advertised_addr && known.insert(peer.clone()) {
                debug!(%peer, "learned peer from gossip");
            }
        }
    }
}
