//! Transaction model and integrity checks
//!
//! A transaction's signing payload is the UTF-8 concatenation of sender,
//! recipient, amount and timestamp in a fixed, locale-independent encoding.
//! Any two nodes must produce byte-identical payloads for the same
//! transaction or signatures would not survive gossip.

use crate::crypto::{self, KeyPair};
use crate::error::ChainError;
use chrono::{DateTime, SecondsFormat, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Sender address reserved for system-minted reward transactions.
/// These carry no signature; the gossip layer refuses them from peers.
pub const SYSTEM_SENDER: &str = "0";

/// Fixed block reward credited to the miner.
pub const REWARD_AMOUNT: Decimal = Decimal::ONE;

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Transaction {
    pub id: Uuid,
    pub sender: String,
    pub recipient: String,
    pub amount: Decimal,
    pub timestamp: DateTime<Utc>,
    #[serde(default)]
    pub signature: Option<String>,
    #[serde(default)]
    pub public_key: Option<String>,
}

impl Transaction {
    pub fn new(sender: String, recipient: String, amount: Decimal) -> Self {
        Transaction {
            id: Uuid::new_v4(),
            sender,
            recipient,
            amount,
            timestamp: Utc::now(),
            signature: None,
            public_key: None,
        }
    }

    /// Reward transaction minted by the mining routine.
    pub fn reward(miner_address: &str) -> Self {
        Transaction::new(SYSTEM_SENDER.to_string(), miner_address.to_string(), REWARD_AMOUNT)
    }

    pub fn is_system(&self) -> bool {
        self.sender == SYSTEM_SENDER
    }

    /// Canonical byte payload covered by the signature: sender, recipient,
    /// amount (plain decimal digits) and timestamp (RFC 3339, microsecond
    /// precision, `Z` suffix), concatenated without separators.
    pub fn signing_payload(&self) -> Vec<u8> {
        format!(
            "{}{}{}{}",
            self.sender,
            self.recipient,
            self.amount,
            self.timestamp.to_rfc3339_opts(SecondsFormat::Micros, true)
        )
        .into_bytes()
    }

    /// Signs the payload and attaches signature + public key.
    pub fn sign_with(&mut self, keypair: &KeyPair) -> Result<(), ChainError> {
        let payload = self.signing_payload();
        self.signature = Some(keypair.sign(&payload)?);
        self.public_key = Some(keypair.public_key_b64()?);
        Ok(())
    }

    /// Checks the attached signature against the attached public key.
    /// Absent signature or key, and any decode or crypto failure, all count
    /// as verification failure rather than a fatal error.
    pub fn verify(&self) -> bool {
        let (Some(signature), Some(public_key)) = (&self.signature, &self.public_key) else {
            return false;
        };
        crypto::verify_signature(public_key, &self.signing_payload(), signature).is_ok()
    }
}
