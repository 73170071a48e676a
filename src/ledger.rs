//! Ledger engine: block model, proof-of-work and chain state machine

pub mod block;
pub mod chain;
pub mod pow;

pub use block::Block;
pub use chain::Ledger;
pub use pow::DEFAULT_DIFFICULTY;
