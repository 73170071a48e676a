//! The wire envelope.
//!
//! One line-delimited JSON message per line, every kind carrying a `type`
//! discriminator. Control traffic (handshake, keepalive) and gossip traffic
//! (transactions, blocks, peer/chain sync) share the same envelope so a
//! single decoder serves the whole protocol.

use crate::ledger::Block;
use crate::transaction::Transaction;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Message {
    /// Keepalive probe.
    Ping,
    /// Keepalive acknowledgment.
    Pong,
    /// Handshake announcing the sender's identifier and listening port.
    Hello { node_id: String, port: u16 },
    HelloAck { node_id: String, port: u16 },
    Error { detail: String },
    NewTransaction { transaction: Transaction },
    NewBlock { block: Block },
    RequestPeers,
    ResponsePeers { peers: Vec<String> },
    #[serde(rename = "request_blockchain")]
    RequestChain,
    #[serde(rename = "response_blockchain")]
    ResponseChain { blocks: Vec<Block> },
}

/// Why a received line could not be turned into a [`Message`]. Unknown
/// commands get a distinct variant because the dispatcher answers them with
/// an error acknowledgment naming the command, while malformed framing is
/// only logged.
#[derive(Debug)]
pub enum DecodeError {
    Malformed(String),
    UnknownCommand(String),
}

const KNOWN_COMMANDS: &[&str] = &[
    "ping",
    "pong",
    "hello",
    "hello_ack",
    "error",
    "new_transaction",
    "new_block",
    "request_peers",
    "response_peers",
    "request_blockchain",
    "response_blockchain",
];

impl Message {
    pub fn encode(&self) -> String {
        serde_json::to_string(self).expect("in-memory message encoding cannot fail")
    }

    pub fn decode(line: &str) -> Result<Message, DecodeError> {
        let value: serde_json::Value = serde_json::from_str(line)
            .map_err(|e| DecodeError::Malformed(e.to_string()))?;
        let command = value
            .get("type")
            .and_then(|t| t.as_str())
            .ok_or_else(|| DecodeError::Malformed("missing type field".to_string()))?
            .to_string();
        if !KNOWN_COMMANDS.contains(&command.as_str()) {
            return Err(DecodeError::UnknownCommand(command));
        }
        serde_json::from_value(value).map_err(|e| DecodeError::Malformed(e.to_string()))
    }
}
