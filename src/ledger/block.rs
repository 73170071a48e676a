use crate::transaction::Transaction;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Block {
    pub index: u64,
    pub timestamp: DateTime<Utc>,
    pub transactions: Vec<Transaction>,
    pub previous_hash: String,
    pub proof: u64,
    pub nonce: u64,
    /// Derived field. Never trusted as sent; every consumer recomputes it
    /// via [`Block::compute_hash`].
    pub hash: String,
}

/// Digest view of a block. The field order here fixes the canonical JSON
/// encoding, so it must match on every node for chains to interoperate.
#[derive(Serialize)]
struct DigestPayload<'a> {
    index: u64,
    timestamp: &'a DateTime<Utc>,
    transactions: &'a [Transaction],
    previous_hash: &'a str,
    proof: u64,
    nonce: u64,
}

impl Block {
    /// Assembles a block with nonce 0 and a provisional hash. The hash only
    /// becomes final once the mining search in [`crate::ledger::pow`] settles
    /// on a qualifying nonce.
    pub fn new(
        index: u64,
        timestamp: DateTime<Utc>,
        transactions: Vec<Transaction>,
        previous_hash: String,
        proof: u64,
    ) -> Self {
        let mut block = Block {
            index,
            timestamp,
            transactions,
            previous_hash,
            proof,
            nonce: 0,
            hash: String::new(),
        };
        block.hash = block.compute_hash();
        block
    }

    /// SHA-256 over the canonical JSON encoding of
    /// (index, timestamp, transactions, previous_hash, proof, nonce),
    /// returned as lowercase hex.
    pub fn compute_hash(&self) -> String {
        let payload = DigestPayload {
            index: self.index,
            timestamp: &self.timestamp,
            transactions: &self.transactions,
            previous_hash: &self.previous_hash,
            proof: self.proof,
            nonce: self.nonce,
        };
        let encoded =
            serde_json::to_vec(&payload).expect("in-memory block encoding cannot fail");
        hex::encode(Sha256::digest(&encoded))
    }
}
