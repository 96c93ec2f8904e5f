use crate::error::LedgerError;
use rand::rngs::OsRng;
use secp256k1::{ecdsa::Signature, Message, PublicKey, Secp256k1, SecretKey};
use sha2::{Digest, Sha256};

/// Hex-encoded secp256k1 key pair
#[derive(Debug, Clone)]
pub struct DocumentKeypair {
    pub secret_key: SecretKey,
    pub public_key: PublicKey,
}

impl DocumentKeypair {
    pub fn public_key_hex(&self) -> String {
        hex::encode(self.public_key.serialize())
    }
}

/// ECDSA signing of documents, for callers that need non-repudiation
pub struct SignatureManager {
    secp: Secp256k1<secp256k1::All>,
}

impl SignatureManager {
    pub fn new() -> Self {
        Self {
            secp: Secp256k1::new(),
        }
    }

    fn message_for(data: &[u8]) -> Result<Message, LedgerError> {
        let data_hash = Sha256::digest(data);
        Message::from_digest_slice(&data_hash)
            .map_err(|e| LedgerError::Crypto(format!("Invalid message hash: {}", e)))
    }

    pub fn create_signature(&self, data: &[u8], secret_key: &SecretKey) -> Result<Signature, LedgerError> {
        let message = Self::message_for(data)?;
        Ok(self.secp.sign_ecdsa(&message, secret_key))
    }

    pub fn verify_signature(
        &self,
        data: &[u8],
        signature: &Signature,
        public_key: &PublicKey,
    ) -> Result<bool, LedgerError> {
        let message = Self::message_for(data)?;
        match self.secp.verify_ecdsa(&message, signature, public_key) {
            Ok(_) => Ok(true),
            Err(_) => Ok(false),
        }
    }

    /// Sign and return the compact signature as hex
    pub fn sign_hex(&self, data: &[u8], secret_key: &SecretKey) -> Result<String, LedgerError> {
        let signature = self.create_signature(data, secret_key)?;
        Ok(hex::encode(signature.serialize_compact()))
    }

    /// Verify a hex compact signature against a hex compressed public key
    pub fn verify_hex(&self, data: &[u8], signature: &str, public_key: &str) -> Result<bool, LedgerError> {
        let signature_bytes = hex::decode(signature)
            .map_err(|e| LedgerError::Crypto(format!("Invalid signature hex: {}", e)))?;
        let signature = Signature::from_compact(&signature_bytes)
            .map_err(|e| LedgerError::Crypto(format!("Invalid signature format: {}", e)))?;

        let public_key_bytes = hex::decode(public_key)
            .map_err(|e| LedgerError::Crypto(format!("Invalid public key hex: {}", e)))?;
        let public_key = PublicKey::from_slice(&public_key_bytes)
            .map_err(|e| LedgerError::Crypto(format!("Invalid public key format: {}", e)))?;

        self.verify_signature(data, &signature, &public_key)
    }

    pub fn public_key_from_secret(&self, secret_key: &SecretKey) -> PublicKey {
        PublicKey::from_secret_key(&self.secp, secret_key)
    }

    /// Generate a new keypair
    pub fn generate_keypair(&self) -> DocumentKeypair {
        let secret_key = SecretKey::new(&mut OsRng);
        let public_key = PublicKey::from_secret_key(&self.secp, &secret_key);
        DocumentKeypair {
            secret_key,
            public_key,
        }
    }
}

impl Default for SignatureManager {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_signature_creation_and_verification() {
        let manager = SignatureManager::new();
        let keypair = manager.generate_keypair();

        let signature = manager.create_signature(b"award letter", &keypair.secret_key).unwrap();
        assert!(manager
            .verify_signature(b"award letter", &signature, &keypair.public_key)
            .unwrap());
        assert!(!manager
            .verify_signature(b"forged letter", &signature, &keypair.public_key)
            .unwrap());
    }

    #[test]
    fn test_hex_round_trip() {
        let manager = SignatureManager::new();
        let keypair = manager.generate_keypair();
        let other = manager.generate_keypair();

        let signature = manager.sign_hex(b"contract", &keypair.secret_key).unwrap();
        assert!(manager
            .verify_hex(b"contract", &signature, &keypair.public_key_hex())
            .unwrap());
        assert!(!manager
            .verify_hex(b"contract", &signature, &other.public_key_hex())
            .unwrap());
    }

    #[test]
    fn test_malformed_inputs() {
        let manager = SignatureManager::new();
        let keypair = manager.generate_keypair();
        assert!(manager.verify_hex(b"x", "zz", &keypair.public_key_hex()).is_err());
        assert!(manager.verify_hex(b"x", &"00".repeat(64), "abcd").is_err());
    }
}
