//! Chain state machine: the block chain plus the pending transaction pool.
//!
//! The `Ledger` owns both and is the only component allowed to mutate them.
//! It never performs network I/O; the gossip dispatcher and the wallet API
//! drive it and decide what to tell their own callers. Expected-invalid input
//! is reported by returning `false` / `Err`, never by panicking.

use crate::error::ChainError;
use crate::ledger::block::Block;
use crate::ledger::pow;
use crate::transaction::Transaction;
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use tracing::{debug, warn};

/// Previous-hash sentinel of the genesis block.
pub const GENESIS_PREVIOUS_HASH: &str = "0";
/// Fixed proof carried by the genesis block.
pub const GENESIS_PROOF: u64 = 100;

pub struct Ledger {
    chain: Vec<Block>,
    pending: Vec<Transaction>,
    difficulty: u32,
}

impl Ledger {
    /// Creates a ledger initialized to `[genesis]`.
    pub fn new(difficulty: u32) -> Self {
        let mut ledger = Ledger {
            chain: Vec::new(),
            pending: Vec::new(),
            difficulty,
        };
        let genesis = ledger.genesis_block();
        ledger.chain.push(genesis);
        ledger
    }

    /// Genesis block: index 0, no transactions, fixed sentinel fields and a
    /// fixed timestamp so independently started nodes agree on block 0.
    fn genesis_block(&self) -> Block {
        Block::new(
            0,
            DateTime::<Utc>::UNIX_EPOCH,
            Vec::new(),
            GENESIS_PREVIOUS_HASH.to_string(),
            GENESIS_PROOF,
        )
    }

    pub fn difficulty(&self) -> u32 {
        self.difficulty
    }

    pub fn chain(&self) -> &[Block] {
        &self.chain
    }

    pub fn pending(&self) -> &[Transaction] {
        &self.pending
    }

    /// The chain is never empty: it always contains at least genesis.
    pub fn last_block(&self) -> &Block {
        self.chain.last().expect("chain always contains genesis")
    }

    /// Assembles a block from a snapshot of the pending pool, mines it, then
    /// clears the pool and appends. CPU-bound through the nonce search; run
    /// it on a blocking worker.
    pub fn create_block(&mut self, proof: u64, previous_hash: Option<String>) -> Block {
        let previous_hash =
            previous_hash.unwrap_or_else(|| self.last_block().hash.clone());
        let mut block = Block::new(
            self.chain.len() as u64,
            Utc::now(),
            self.pending.clone(),
            previous_hash,
            proof,
        );
        pow::mine(&mut block, self.difficulty);

        self.pending.clear();
        self.chain.push(block.clone());
        block
    }

    /// Mining convenience flow: queue the miner's reward, solve the proof
    /// puzzle against the previous block's proof, then create the block.
    pub fn mine_next(&mut self, miner_address: &str) -> Block {
        self.pending.push(Transaction::reward(miner_address));
        let proof = pow::find_proof(self.last_block().proof, self.difficulty);
        self.create_block(proof, None)
    }

    /// Structural checks shared by both admission paths: positive amount and
    /// distinct non-empty endpoints.
    fn well_formed(tx: &Transaction) -> bool {
        tx.amount > Decimal::ZERO
            && !tx.sender.is_empty()
            && !tx.recipient.is_empty()
            && tx.sender != tx.recipient
    }

    /// Gossip admission rules: structural checks, then either the
    /// system-sender bypass or a verified signature plus sufficient confirmed
    /// balance. Transactions arriving from peers always need a signature.
    pub fn validate_transaction(&self, tx: &Transaction) -> bool {
        if !Self::well_formed(tx) {
            return false;
        }
        if tx.is_system() {
            return true;
        }
        if !tx.verify() {
            return false;
        }
        self.balance_of(&tx.sender) >= tx.amount
    }

    /// Local-submission admission rules: the same structural and balance
    /// checks, without requiring a signature. The wallet API verifies a
    /// signature only when one is attached, so an unsigned submission from a
    /// funded sender is accepted.
    pub fn validate_submission(&self, tx: &Transaction) -> bool {
        if !Self::well_formed(tx) {
            return false;
        }
        if tx.is_system() {
            return true;
        }
        self.balance_of(&tx.sender) >= tx.amount
    }

    /// Validates then appends to the pending pool; invalid transactions are
    /// dropped without signaling.
    pub fn accept_pending_transaction(&mut self, tx: Transaction) {
        if self.validate_transaction(&tx) {
            self.pending.push(tx);
        } else {
            debug!(id = %tx.id, "rejected pending transaction");
        }
    }

    /// Validating enqueue for local submissions: returns the index of the
    /// block the transaction is expected to land in. Uses the submission rule
    /// set, so no signature is demanded here.
    pub fn create_transaction(&mut self, tx: Transaction) -> Result<u64, ChainError> {
        if !self.validate_submission(&tx) {
            return Err(ChainError::InvalidTransaction(format!(
                "transaction {} failed validation",
                tx.id
            )));
        }
        self.pending.push(tx);
        Ok(self.last_block().index + 1)
    }

    /// Confirmed balance: signed sum over every transaction in the chain.
    /// Pending transactions are not counted.
    pub fn balance_of(&self, address: &str) -> Decimal {
        let mut balance = Decimal::ZERO;
        for block in &self.chain {
            for tx in &block.transactions {
                if tx.recipient == address {
                    balance += tx.amount;
                }
                if tx.sender == address {
                    balance -= tx.amount;
                }
            }
        }
        balance
    }

    /// All confirmed transactions touching the address, newest first.
    pub fn history_of(&self, address: &str) -> Vec<Transaction> {
        let mut history: Vec<Transaction> = self
            .chain
            .iter()
            .flat_map(|block| block.transactions.iter())
            .filter(|tx| tx.sender == address || tx.recipient == address)
            .cloned()
            .collect();
        history.sort_by(|a, b| b.timestamp.cmp(&a.timestamp));
        history
    }

    /// Linkage check over an arbitrary candidate chain: every non-genesis
    /// block must re-digest to its stored hash and reference its
    /// predecessor's hash. Neither proof-of-work puzzle is re-verified here.
    pub fn validate_chain_linkage(chain: &[Block]) -> bool {
        for window in chain.windows(2) {
            let (previous, current) = (&window[0], &window[1]);
            if current.hash != current.compute_hash() {
                return false;
            }
            if current.previous_hash != previous.hash {
                return false;
            }
        }
        true
    }

    /// Admission check for a single gossiped block: must extend the current
    /// tip by exactly one, reference the tip's hash, re-digest to its stored
    /// hash, and carry a proof solving the puzzle against the tip's proof.
    pub fn validate_incoming_block(&self, candidate: &Block) -> bool {
        let last = self.last_block();
        if candidate.index != last.index + 1 {
            return false;
        }
        if candidate.previous_hash != last.hash {
            return false;
        }
        if candidate.hash != candidate.compute_hash() {
            return false;
        }
        pow::valid_proof(last.proof, candidate.proof, self.difficulty)
    }

    /// Appends a validated gossiped block and drops its transactions from the
    /// pending pool. Returns whether the block was accepted; rejected blocks
    /// leave the ledger untouched.
    pub fn append_block(&mut self, candidate: Block) -> bool {
        if !self.validate_incoming_block(&candidate) {
            warn!(index = candidate.index, "ignoring invalid gossiped block");
            return false;
        }
        self.pending
            .retain(|pending| !candidate.transactions.iter().any(|tx| tx.id == pending.id));
        self.chain.push(candidate);
        true
    }

    /// Longest-chain rule: adopt the candidate only when it is strictly
    /// longer and passes linkage validation. Equal length is never adopted.
    /// On adoption the pool drops every transaction the new chain confirmed.
    pub fn replace_chain(&mut self, candidate: Vec<Block>) -> bool {
        if candidate.len() <= self.chain.len() {
            return false;
        }
        if !Self::validate_chain_linkage(&candidate) {
            warn!("rejecting longer chain that fails linkage validation");
            return false;
        }
        self.pending.retain(|pending| {
            !candidate
                .iter()
                .flat_map(|block| block.transactions.iter())
                .any(|tx| tx.id == pending.id)
        });
        self.chain = candidate;
        debug!(length = self.chain.len(), "adopted longer chain");
        true
    }
}
