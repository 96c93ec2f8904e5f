//! Keyed document digests
//!
//! A shared-secret message authentication code: `Digest(Digest(data) ++ key)`.
//! Anyone holding the key can produce a valid tag, so this authenticates
//! documents between parties sharing the key and offers no non-repudiation.
//! Use [`crate::crypto::SignatureManager`] when a signer must be provable.

use crate::ledger::digest::digest_bytes;

/// Compute the authentication tag of `data` under `key`
pub fn sign(data: &[u8], key: &[u8]) -> String {
    let mut inner = digest_bytes(data).into_bytes();
    inner.extend_from_slice(key);
    digest_bytes(&inner)
}

/// Check a tag produced by [`sign`]
pub fn verify(data: &[u8], tag: &str, key: &[u8]) -> bool {
    constant_time_eq(sign(data, key).as_bytes(), tag.as_bytes())
}

fn constant_time_eq(a: &[u8], b: &[u8]) -> bool {
    if a.len() != b.len() {
        return false;
    }
    a.iter().zip(b).fold(0u8, |acc, (x, y)| acc | (x ^ y)) == 0
}
