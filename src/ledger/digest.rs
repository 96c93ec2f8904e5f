//! Digest
//!
//! SHA-256 hashing helpers producing 64-character lowercase hex strings,
//! plus the canonical field layout used to seal blocks.

use chrono::{DateTime, SecondsFormat, Utc};
use serde::Serialize;
use sha2::{Digest, Sha256};

use crate::error::Result;

/// Length of every hex digest produced by this module
pub const DIGEST_HEX_LEN: usize = 64;

/// `previous_digest` of the genesis block
pub const SENTINEL_DIGEST: &str =
    "0000000000000000000000000000000000000000000000000000000000000000";

/// Hash raw bytes
pub fn digest_bytes(data: &[u8]) -> String {
    let mut hasher = Sha256::new();
    hasher.update(data);
    hex::encode(hasher.finalize())
}

/// Hash the JSON encoding of a serializable value
pub fn digest_json<T: Serialize + ?Sized>(value: &T) -> Result<String> {
    let bytes = serde_json::to_vec(value)?;
    Ok(digest_bytes(&bytes))
}

/// Whether `value` looks like a digest produced here
pub fn is_hex_digest(value: &str) -> bool {
    value.len() == DIGEST_HEX_LEN && value.bytes().all(|b| matches!(b, b'0'..=b'9' | b'a'..=b'f'))
}

/// Timestamps are always rendered with nanosecond precision and a `Z` suffix
pub fn canonical_timestamp(timestamp: &DateTime<Utc>) -> String {
    timestamp.to_rfc3339_opts(SecondsFormat::Nanos, true)
}

/// Block fields in their fixed hashing order.
///
/// Layout:
/// `index:{}|timestamp:{}|previous_digest:{}|entity_id:{}|payload:{}|nonce:{}|merkle_root:{}`
///
/// The nonce sits between a fixed prefix and suffix so the miner can seed a
/// hasher with the prefix once and only feed the nonce and suffix per attempt.
#[derive(Debug, Clone)]
pub struct BlockPreimage {
    prefix: String,
    suffix: String,
}

impl BlockPreimage {
    pub fn new(
        index: u64,
        timestamp: &DateTime<Utc>,
        previous_digest: &str,
        entity_id: &str,
        payload_json: &str,
        merkle_root: &str,
    ) -> Self {
        Self {
            prefix: format!(
                "index:{}|timestamp:{}|previous_digest:{}|entity_id:{}|payload:{}|nonce:",
                index,
                canonical_timestamp(timestamp),
                previous_digest,
                entity_id,
                payload_json
            ),
            suffix: format!("|merkle_root:{}", merkle_root),
        }
    }

    /// Hasher already fed with everything before the nonce
    pub fn seeded_hasher(&self) -> Sha256 {
        let mut hasher = Sha256::new();
        hasher.update(self.prefix.as_bytes());
        hasher
    }

    /// Finish a seeded hasher for one nonce
    pub fn finish(&self, mut seeded: Sha256, nonce: u64) -> String {
        seeded.update(nonce.to_string().as_bytes());
        seeded.update(self.suffix.as_bytes());
        hex::encode(seeded.finalize())
    }

    pub fn digest_with_nonce(&self, nonce: u64) -> String {
        self.finish(self.seeded_hasher(), nonce)
    }

    /// Full canonical string for a nonce
    pub fn canonical_string(&self, nonce: u64) -> String {
        format!("{}{}{}", self.prefix, nonce, self.suffix)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn test_digest_bytes_known_vector() {
        assert_eq!(
            digest_bytes(b"abc"),
            "ba7816bf8f01cfea414140de5dae2223b00361a396177a9cb410ff61f20015ad"
        );
    }

    #[test]
    fn test_digest_json_is_deterministic() {
        let value = serde_json::json!({"b": 2, "a": [1, 2, 3]});
        let first = digest_json(&value).unwrap();
        let second = digest_json(&value).unwrap();
        assert_eq!(first, second);
        assert!(is_hex_digest(&first));
    }

    #[test]
    fn test_sentinel_is_a_digest() {
        assert!(is_hex_digest(SENTINEL_DIGEST));
        assert!(!is_hex_digest("sha256:abc"));
        assert!(!is_hex_digest(&"A".repeat(64)));
    }

    #[test]
    fn test_preimage_matches_canonical_string() {
        let ts = Utc.with_ymd_and_hms(2025, 1, 2, 3, 4, 5).unwrap();
        let preimage = BlockPreimage::new(3, &ts, SENTINEL_DIGEST, "42", "{\"x\":1}", "ab");

        let canonical = preimage.canonical_string(17);
        assert_eq!(
            canonical,
            format!(
                "index:3|timestamp:2025-01-02T03:04:05.000000000Z|previous_digest:{}|entity_id:42|payload:{{\"x\":1}}|nonce:17|merkle_root:ab",
                SENTINEL_DIGEST
            )
        );
        assert_eq!(preimage.digest_with_nonce(17), digest_bytes(canonical.as_bytes()));
    }
}
