//! Merkle Roots for Block Transactions
//!
//! Folds a non-empty transaction set into a single root digest by pairwise
//! hashing, and produces inclusion proofs against that root.

use serde::{Deserialize, Serialize};
use std::collections::VecDeque;
use tracing::debug;

use crate::error::{LedgerError, Result};
use crate::ledger::digest::{digest_bytes, digest_json};

/// Hash two sibling digests into their parent
fn combine(left: &str, right: &str) -> String {
    digest_bytes(format!("{}{}", left, right).as_bytes())
}

fn leaf_digests<T: Serialize>(transactions: &[T]) -> Result<Vec<String>> {
    if transactions.is_empty() {
        return Err(LedgerError::InvalidPayload(
            "Cannot build Merkle root from empty transaction set".to_string(),
        ));
    }
    transactions.iter().map(|tx| digest_json(tx)).collect()
}

/// Fold one level into the next; an odd last digest is paired with itself
fn next_level(level: &[String]) -> Vec<String> {
    let mut nodes: VecDeque<&String> = level.iter().collect();
    let mut next = Vec::with_capacity((level.len() + 1) / 2);

    while let Some(left) = nodes.pop_front() {
        match nodes.pop_front() {
            Some(right) => next.push(combine(left, right)),
            None => next.push(combine(left, left)),
        }
    }

    next
}

/// Build the Merkle root of a transaction set
pub fn build_root<T: Serialize>(transactions: &[T]) -> Result<String> {
    let mut level = leaf_digests(transactions)?;

    while level.len() > 1 {
        level = next_level(&level);
    }

    let root = level
        .pop()
        .ok_or_else(|| LedgerError::InvalidPayload("Merkle level collapsed to nothing".to_string()))?;
    debug!("Merkle root over {} transactions: {}", transactions.len(), root);
    Ok(root)
}

/// Verify a claimed root against transactions
pub fn verify_root<T: Serialize>(transactions: &[T], claimed_root: &str) -> Result<bool> {
    Ok(build_root(transactions)? == claimed_root)
}

/// Which side of the running hash a sibling sits on
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SiblingSide {
    Left,
    Right,
}

/// Merkle inclusion proof
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MerkleProof {
    pub leaf: String,
    pub siblings: Vec<(SiblingSide, String)>,
    pub root: String,
}

impl MerkleProof {
    /// Recompute the root from the leaf and siblings
    pub fn verify(&self) -> bool {
        let computed = self.siblings.iter().fold(self.leaf.clone(), |acc, (side, sibling)| match side {
            SiblingSide::Left => combine(sibling, &acc),
            SiblingSide::Right => combine(&acc, sibling),
        });
        computed == self.root
    }

    pub fn size(&self) -> usize {
        self.siblings.len()
    }
}

/// Generate an inclusion proof for the transaction at `position`
pub fn build_proof<T: Serialize>(transactions: &[T], position: usize) -> Result<MerkleProof> {
    let mut level = leaf_digests(transactions)?;
    if position >= level.len() {
        return Err(LedgerError::InvalidPayload(format!(
            "Merkle proof position {} out of range for {} transactions",
            position,
            level.len()
        )));
    }

    let leaf = level[position].clone();
    let mut siblings = Vec::new();
    let mut index = position;

    while level.len() > 1 {
        let sibling = if index % 2 == 0 {
            let right = level.get(index + 1).unwrap_or(&level[index]);
            (SiblingSide::Right, right.clone())
        } else {
            (SiblingSide::Left, level[index - 1].clone())
        };
        siblings.push(sibling);
        level = next_level(&level);
        index /= 2;
    }

    Ok(MerkleProof {
        leaf,
        siblings,
        root: level.swap_remove(0),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn transactions(count: usize) -> Vec<serde_json::Value> {
        (0..count).map(|i| json!({ "tx": i })).collect()
    }

    #[test]
    fn test_single_transaction_root_is_its_digest() {
        let tx = json!({ "kind": "submission", "bidder": "ACME" });
        assert_eq!(build_root(&[tx.clone()]).unwrap(), digest_json(&tx).unwrap());
    }

    #[test]
    fn test_pair_root() {
        let x = json!("x");
        let y = json!("y");
        let expected = digest_bytes(
            format!("{}{}", digest_json(&x).unwrap(), digest_json(&y).unwrap()).as_bytes(),
        );
        assert_eq!(build_root(&[x, y]).unwrap(), expected);
    }

    #[test]
    fn test_odd_level_duplicates_last_leaf() {
        let txs = transactions(3);
        let leaves: Vec<String> = txs.iter().map(|t| digest_json(t).unwrap()).collect();
        let left = combine(&leaves[0], &leaves[1]);
        let right = combine(&leaves[2], &leaves[2]);
        assert_eq!(build_root(&txs).unwrap(), combine(&left, &right));
    }

    #[test]
    fn test_empty_set_rejected() {
        let empty: Vec<serde_json::Value> = Vec::new();
        assert!(matches!(build_root(&empty), Err(LedgerError::InvalidPayload(_))));
    }

    #[test]
    fn test_root_verification() {
        let txs = transactions(8);
        let root = build_root(&txs).unwrap();
        assert!(verify_root(&txs, &root).unwrap());
        assert!(!verify_root(&txs[..7], &root).unwrap());
    }

    #[test]
    fn test_proofs_verify_for_every_position() {
        for count in [1, 2, 5, 8] {
            let txs = transactions(count);
            let root = build_root(&txs).unwrap();
            for position in 0..count {
                let proof = build_proof(&txs, position).unwrap();
                assert_eq!(proof.root, root);
                assert!(proof.verify(), "proof for {} of {} failed", position, count);
            }
        }
    }

    #[test]
    fn test_tampered_proof_fails() {
        let txs = transactions(4);
        let mut proof = build_proof(&txs, 1).unwrap();
        proof.leaf = digest_json(&json!({ "tx": 99 })).unwrap();
        assert!(!proof.verify());
        assert!(build_proof(&txs, 4).is_err());
    }
}
