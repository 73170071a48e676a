//! Emberchain - a minimal proof-of-work ledger with peer-to-peer gossip
//!
//! # Architecture
//!
//! ## Ledger Engine
//! - [`ledger`] - Block model, both proof-of-work puzzles, chain state machine
//! - [`transaction`] - Transaction model and canonical signing payload
//!
//! ## Cryptography
//! - [`crypto`] - RSA keypairs and signature verification
//!
//! ## Networking
//! - [`network`] - Wire envelope, gossip dispatch, connection lifecycle
//!
//! ## Integration
//! - [`api`] - REST wallet API
//! - [`node`] - Orchestrator wiring everything together
//!
//! ## Configuration & Utilities
//! - [`config`] - Configuration management
//! - [`error`] - Error types

#![forbid(unsafe_code)]

// ============================================================================
// Ledger Engine
// ============================================================================
pub mod ledger;
pub mod transaction;

// ============================================================================
// Cryptography
// ============================================================================
pub mod crypto;

// ============================================================================
// Networking
// ============================================================================
pub mod network;

// ============================================================================
// Integration
// ============================================================================
pub mod api;
pub mod node;

// ============================================================================
// Configuration & Utilities
// ============================================================================
pub mod config;
pub mod error;
