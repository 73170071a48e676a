//! Both proof-of-work puzzles.
//!
//! The ledger deliberately layers two independent brute-force searches on
//! each block: the nonce search over the block digest ([`mine`]) and the
//! proof search chained off the previous block's proof ([`find_proof`]).
//! They do not interact and are kept separate on purpose.

use crate::ledger::block::Block;
use sha2::{Digest, Sha256};

/// Required count of leading hexadecimal zero characters in a qualifying hash.
pub const DEFAULT_DIFFICULTY: u32 = 4;

fn target(difficulty: u32) -> String {
    "0".repeat(difficulty as usize)
}

/// Nonce search: increments the block's nonce, recomputing the hash each
/// step, until the hash carries `difficulty` leading hex zeros. Unbounded by
/// design; runs to completion on the calling thread, so schedule it on a
/// blocking worker.
pub fn mine(block: &mut Block, difficulty: u32) {
    let target = target(difficulty);
    while !block.hash.starts_with(&target) {
        block.nonce += 1;
        block.hash = block.compute_hash();
    }
}

/// Proof search: smallest `proof >= 0` satisfying [`valid_proof`] against the
/// previous block's proof. Depends only on the two proof integers, never on
/// block contents.
pub fn find_proof(last_proof: u64, difficulty: u32) -> u64 {
    let mut proof = 0u64;
    while !valid_proof(last_proof, proof, difficulty) {
        proof += 1;
    }
    proof
}

/// The predicate behind [`find_proof`]: SHA-256 of the decimal digit strings
/// `"{last_proof}{proof}"` must have `difficulty` leading hex zeros.
pub fn valid_proof(last_proof: u64, proof: u64, difficulty: u32) -> bool {
    let guess = format!("{}{}", last_proof, proof);
    let digest = hex::encode(Sha256::digest(guess.as_bytes()));
    digest.starts_with(&target(difficulty))
}
