//! Cryptographic primitives for emberchain
//!
//! Transactions are signed with RSA over a SHA-256 digest using PKCS#1 v1.5
//! padding. Public keys travel on the wire as base64-encoded PKCS#1 DER so a
//! signature produced on one node verifies on any other.

use crate::error::ChainError;
use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine;
use rand::rngs::OsRng;
use rsa::pkcs1::{DecodeRsaPrivateKey, DecodeRsaPublicKey, EncodeRsaPrivateKey, EncodeRsaPublicKey};
use rsa::pkcs1v15::{Signature, SigningKey, VerifyingKey};
use rsa::signature::{SignatureEncoding, Signer, Verifier};
use rsa::{RsaPrivateKey, RsaPublicKey};
use sha2::{Digest, Sha256};

/// RSA modulus size for generated keys.
pub const KEY_BITS: usize = 2048;

#[derive(Debug, Clone)]
pub struct KeyPair {
    private_key: RsaPrivateKey,
    public_key: RsaPublicKey,
}

impl KeyPair {
    /// Generates a new random keypair using the OS random number generator.
    /// RSA key generation is slow; call this off the async runtime.
    pub fn generate() -> Result<Self, ChainError> {
        let private_key = RsaPrivateKey::new(&mut OsRng, KEY_BITS)
            .map_err(|e| ChainError::CryptoError(format!("Key generation failed: {}", e)))?;
        let public_key = RsaPublicKey::from(&private_key);
        Ok(KeyPair {
            private_key,
            public_key,
        })
    }

    /// Restores a keypair from a PKCS#1 PEM-encoded private key.
    pub fn from_private_pem(pem: &str) -> Result<Self, ChainError> {
        let private_key = RsaPrivateKey::from_pkcs1_pem(pem)
            .map_err(|e| ChainError::CryptoError(format!("Invalid private key PEM: {}", e)))?;
        let public_key = RsaPublicKey::from(&private_key);
        Ok(KeyPair {
            private_key,
            public_key,
        })
    }

    /// Exports the private key as PKCS#1 PEM.
    pub fn private_pem(&self) -> Result<String, ChainError> {
        self.private_key
            .to_pkcs1_pem(rsa::pkcs1::LineEnding::LF)
            .map(|pem| pem.to_string())
            .map_err(|e| ChainError::CryptoError(format!("Failed to encode private key: {}", e)))
    }

    /// Public key as base64-encoded PKCS#1 DER, the form carried in
    /// `Transaction::public_key`.
    pub fn public_key_b64(&self) -> Result<String, ChainError> {
        let der = self
            .public_key
            .to_pkcs1_der()
            .map_err(|e| ChainError::CryptoError(format!("Failed to encode public key: {}", e)))?;
        Ok(BASE64.encode(der.as_bytes()))
    }

    /// Wallet address: lowercase hex SHA-256 of the DER public key.
    pub fn address(&self) -> Result<String, ChainError> {
        let der = self
            .public_key
            .to_pkcs1_der()
            .map_err(|e| ChainError::CryptoError(format!("Failed to encode public key: {}", e)))?;
        Ok(hex::encode(Sha256::digest(der.as_bytes())))
    }

    /// Signs a message and returns the base64-encoded signature.
    pub fn sign(&self, message: &[u8]) -> Result<String, ChainError> {
        let signing_key = SigningKey::<Sha256>::new(self.private_key.clone());
        let signature = signing_key
            .try_sign(message)
            .map_err(|e| ChainError::CryptoError(format!("Signing failed: {}", e)))?;
        Ok(BASE64.encode(signature.to_vec()))
    }
}

/// Verifies an RSA PKCS#1 v1.5 signature given the base64 public key and
/// signature as they appear on the wire.
pub fn verify_signature(
    public_key_b64: &str,
    message: &[u8],
    signature_b64: &str,
) -> Result<(), ChainError> {
    let key_der = BASE64
        .decode(public_key_b64)
        .map_err(|e| ChainError::CryptoError(format!("Invalid public key base64: {}", e)))?;
    let public_key = RsaPublicKey::from_pkcs1_der(&key_der)
        .map_err(|e| ChainError::CryptoError(format!("Invalid public key: {}", e)))?;

    let sig_bytes = BASE64
        .decode(signature_b64)
        .map_err(|e| ChainError::CryptoError(format!("Invalid signature base64: {}", e)))?;
    let signature = Signature::try_from(sig_bytes.as_slice())
        .map_err(|e| ChainError::CryptoError(format!("Invalid signature: {}", e)))?;

    let verifying_key = VerifyingKey::<Sha256>::new(public_key);
    verifying_key
        .verify(message, &signature)
        .map_err(|_| ChainError::CryptoError("Signature verification failed".to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_signing_and_verification() {
        let keypair = KeyPair::generate().unwrap();
        let message = b"Hello, emberchain!";

        let signature = keypair.sign(message).unwrap();
        let pubkey = keypair.public_key_b64().unwrap();

        assert!(verify_signature(&pubkey, message, &signature).is_ok());
    }

    #[test]
    fn test_tampered_message() {
        let keypair = KeyPair::generate().unwrap();
        let signature = keypair.sign(b"Original message").unwrap();
        let pubkey = keypair.public_key_b64().unwrap();

        let result = verify_signature(&pubkey, b"Tampered message", &signature);
        assert!(result.is_err());
        assert_eq!(
            result.unwrap_err().to_string(),
            "Cryptographic error: Signature verification failed"
        );
    }

    #[test]
    fn test_wrong_key() {
        let keypair1 = KeyPair::generate().unwrap();
        let keypair2 = KeyPair::generate().unwrap();

        let message = b"Test message";
        let signature = keypair1.sign(message).unwrap();
        let pubkey2 = keypair2.public_key_b64().unwrap();

        assert!(verify_signature(&pubkey2, message, &signature).is_err());
    }

    #[test]
    fn test_garbage_key_material_is_an_error_not_a_panic() {
        let keypair = KeyPair::generate().unwrap();
        let signature = keypair.sign(b"msg").unwrap();

        assert!(verify_signature("not base64!!!", b"msg", &signature).is_err());

        let pubkey = keypair.public_key_b64().unwrap();
        assert!(verify_signature(&pubkey, b"msg", "also not base64!!!").is_err());
    }

    #[test]
    fn test_private_pem_round_trip() {
        let keypair = KeyPair::generate().unwrap();
        let pem = keypair.private_pem().unwrap();
        let restored = KeyPair::from_private_pem(&pem).unwrap();
        assert_eq!(keypair.address().unwrap(), restored.address().unwrap());
    }
}
