//! Chain Verification
//!
//! Recomputes block digests and checks linkage across a ledger. Corruption
//! is reported as data: a failing chain is still a successful read.

use chrono::{DateTime, Utc};
use serde::Serialize;
use std::fmt;
use tracing::{debug, info, warn};

use crate::ledger::block::{short_digest, ActionKind, Block};
use crate::ledger::chain::Ledger;
use crate::ledger::digest::SENTINEL_DIGEST;
use crate::ledger::merkle;
use crate::ledger::miner::meets_difficulty;

/// Why a block failed verification
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "fault", rename_all = "snake_case")]
pub enum BlockFault {
    /// Stored fields no longer hash to the stored digest
    ContentMismatch { stored: String, computed: String },
    /// `previous_digest` does not match the predecessor's digest
    LinkageMismatch { expected: String, found: String },
    /// Stored index differs from the block's position
    IndexMismatch { expected: u64, found: u64 },
    /// First block is not a well-formed genesis block
    MalformedGenesis,
    TimestampRegression {
        previous: DateTime<Utc>,
        found: DateTime<Utc>,
    },
    /// Digest lacks the required leading zeros
    InsufficientWork { difficulty: usize },
    /// `merkle_root` is not the root of the block's payload
    MerkleMismatch { stored: String, computed: String },
}

impl fmt::Display for BlockFault {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            BlockFault::ContentMismatch { stored, computed } => write!(
                f,
                "content mismatch: stored {} but fields hash to {}",
                short_digest(stored),
                short_digest(computed)
            ),
            BlockFault::LinkageMismatch { expected, found } => write!(
                f,
                "linkage mismatch: expected previous digest {}, found {}",
                short_digest(expected),
                short_digest(found)
            ),
            BlockFault::IndexMismatch { expected, found } => {
                write!(f, "index mismatch: expected {}, found {}", expected, found)
            }
            BlockFault::MalformedGenesis => write!(f, "malformed genesis block"),
            BlockFault::TimestampRegression { previous, found } => {
                write!(f, "timestamp regression: {} < {}", found, previous)
            }
            BlockFault::InsufficientWork { difficulty } => {
                write!(f, "digest does not meet difficulty {}", difficulty)
            }
            BlockFault::MerkleMismatch { stored, computed } => write!(
                f,
                "merkle root mismatch: stored {} but payload yields {}",
                short_digest(stored),
                short_digest(computed)
            ),
        }
    }
}

/// Verification outcome for one block
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct BlockCheck {
    /// Position in the ledger
    pub index: usize,
    pub ok: bool,
    pub faults: Vec<BlockFault>,
}

/// Whole-chain verification result
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ChainReport {
    pub is_valid: bool,
    pub blocks: Vec<BlockCheck>,
    /// Journal lines that could not be read back as blocks
    pub unreadable_journal_lines: Vec<usize>,
}

impl ChainReport {
    pub fn failures(&self) -> impl Iterator<Item = &BlockCheck> {
        self.blocks.iter().filter(|check| !check.ok)
    }

    /// Position of the first failing block
    pub fn first_failure(&self) -> Option<usize> {
        self.failures().next().map(|check| check.index)
    }

    /// Fold journal read failures into the verdict
    pub fn with_unreadable_journal_lines(mut self, lines: &[usize]) -> Self {
        if !lines.is_empty() {
            self.is_valid = false;
            self.unreadable_journal_lines = lines.to_vec();
        }
        self
    }

    pub fn summary(&self) -> String {
        if !self.unreadable_journal_lines.is_empty() {
            let lines: Vec<String> = self
                .unreadable_journal_lines
                .iter()
                .map(ToString::to_string)
                .collect();
            let failing: Vec<String> = self.failures().map(|c| c.index.to_string()).collect();
            format!(
                "Ledger is invalid ({} blocks): unreadable journal lines {}; failing blocks {}",
                self.blocks.len(),
                lines.join(", "),
                if failing.is_empty() { "none".to_string() } else { failing.join(", ") }
            )
        } else if self.is_valid {
            format!("Ledger is valid ({} blocks)", self.blocks.len())
        } else {
            let failing: Vec<String> = self.failures().map(|c| c.index.to_string()).collect();
            format!(
                "Ledger is invalid ({} blocks): failing blocks {}",
                self.blocks.len(),
                failing.join(", ")
            )
        }
    }
}

/// Per-entity verification result
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct EntityVerification {
    pub entity_id: String,
    pub is_valid: bool,
    pub records: Vec<Block>,
    pub audit_trail: Vec<String>,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ChainValidator {
    required_difficulty: Option<usize>,
}

impl ChainValidator {
    pub fn new() -> Self {
        Self::default()
    }

    /// Also require every non-genesis digest to meet `difficulty`
    pub fn with_required_difficulty(difficulty: usize) -> Self {
        Self {
            required_difficulty: Some(difficulty),
        }
    }

    /// Faults of the block at `position`, judged against its predecessor
    pub fn check_block(&self, position: usize, block: &Block, previous: Option<&Block>) -> Vec<BlockFault> {
        let mut faults = Vec::new();

        match block.calculate_digest() {
            Ok(computed) if computed == block.digest => {}
            Ok(computed) => faults.push(BlockFault::ContentMismatch {
                stored: block.digest.clone(),
                computed,
            }),
            Err(_) => faults.push(BlockFault::ContentMismatch {
                stored: block.digest.clone(),
                computed: String::new(),
            }),
        }

        match merkle::build_root(std::slice::from_ref(&block.payload)) {
            Ok(computed) if computed == block.merkle_root => {}
            Ok(computed) => faults.push(BlockFault::MerkleMismatch {
                stored: block.merkle_root.clone(),
                computed,
            }),
            Err(_) => faults.push(BlockFault::MerkleMismatch {
                stored: block.merkle_root.clone(),
                computed: String::new(),
            }),
        }

        if block.index != position as u64 {
            faults.push(BlockFault::IndexMismatch {
                expected: position as u64,
                found: block.index,
            });
        }

        match previous {
            None => {
                if block.previous_digest != SENTINEL_DIGEST
                    || block.payload.kind() != ActionKind::Genesis
                {
                    faults.push(BlockFault::MalformedGenesis);
                }
            }
            Some(previous) => {
                if block.previous_digest != previous.digest {
                    faults.push(BlockFault::LinkageMismatch {
                        expected: previous.digest.clone(),
                        found: block.previous_digest.clone(),
                    });
                }
                if block.timestamp < previous.timestamp {
                    faults.push(BlockFault::TimestampRegression {
                        previous: previous.timestamp,
                        found: block.timestamp,
                    });
                }
                if let Some(difficulty) = self.required_difficulty {
                    if !meets_difficulty(&block.digest, difficulty) {
                        faults.push(BlockFault::InsufficientWork { difficulty });
                    }
                }
            }
        }

        faults
    }

    /// Verify every block in sequence
    pub fn validate(&self, blocks: &[Block]) -> ChainReport {
        let checks: Vec<BlockCheck> = blocks
            .iter()
            .enumerate()
            .map(|(position, block)| {
                let previous = position.checked_sub(1).map(|p| &blocks[p]);
                let faults = self.check_block(position, block, previous);
                for fault in &faults {
                    warn!("Block {} failed verification: {}", position, fault);
                }
                BlockCheck {
                    index: position,
                    ok: faults.is_empty(),
                    faults,
                }
            })
            .collect();

        let is_valid = !checks.is_empty() && checks.iter().all(|check| check.ok);
        if is_valid {
            debug!("Ledger verification successful: {} blocks", checks.len());
        }

        ChainReport {
            is_valid,
            blocks: checks,
            unreadable_journal_lines: Vec::new(),
        }
    }

    pub fn validate_ledger(&self, ledger: &Ledger) -> ChainReport {
        self.validate(ledger.all())
    }

    /// Verify only the blocks of one entity, each against its actual predecessor
    pub fn validate_entity(&self, ledger: &Ledger, entity_id: &str) -> EntityVerification {
        let blocks = ledger.all();
        let mut records = Vec::new();
        let mut audit_trail = Vec::new();
        let mut is_valid = true;

        for (position, block) in blocks.iter().enumerate() {
            if block.entity_id != entity_id {
                continue;
            }
            let previous = position.checked_sub(1).map(|p| &blocks[p]);
            let faults = self.check_block(position, block, previous);

            let line = format!(
                "[{}] #{} {} by {} digest={}",
                block.timestamp.to_rfc3339(),
                block.index,
                block.payload.kind(),
                block.payload.actor,
                short_digest(&block.digest)
            );
            if faults.is_empty() {
                audit_trail.push(format!("{} verified", line));
            } else {
                is_valid = false;
                let reasons: Vec<String> = faults.iter().map(ToString::to_string).collect();
                audit_trail.push(format!("{} FAILED: {}", line, reasons.join("; ")));
            }
            records.push(block.clone());
        }

        if records.is_empty() {
            is_valid = false;
            audit_trail.push(format!("no records found for entity {}", entity_id));
        }

        info!(
            "Verified {} records for entity {}: {}",
            records.len(),
            entity_id,
            if is_valid { "valid" } else { "invalid" }
        );

        EntityVerification {
            entity_id: entity_id.to_string(),
            is_valid,
            records,
            audit_trail,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ledger::block::{BlockFactory, EventPayload, LedgerEvent, SubmissionDetails};
    use crate::ledger::miner::{CancelFlag, ProofOfWorkMiner};

    fn build_ledger(entities: &[&str]) -> Ledger {
        let mut ledger = Ledger::new().unwrap();
        let miner = ProofOfWorkMiner::new(1, 100_000).unwrap();
        for (i, entity) in entities.iter().enumerate() {
            let payload = EventPayload::new(
                LedgerEvent::Submission(SubmissionDetails {
                    bidder: format!("bidder-{}", i),
                    amount_minor: Some(i as u64 * 100),
                    currency: None,
                    notes: None,
                }),
                "clerk",
            );
            let candidate =
                BlockFactory::create_candidate(ledger.latest(), entity, payload, Utc::now()).unwrap();
            let block = miner.mine(candidate, &CancelFlag::new()).unwrap();
            ledger.append(block).unwrap();
        }
        ledger
    }

    #[test]
    fn test_valid_chain() {
        let ledger = build_ledger(&["7", "7", "7"]);
        let report = ChainValidator::new().validate_ledger(&ledger);
        assert!(report.is_valid);
        assert_eq!(report.blocks.len(), 4);
        assert_eq!(report.first_failure(), None);
    }

    #[test]
    fn test_content_tamper_detected_at_block() {
        let ledger = build_ledger(&["7", "7", "7"]);
        let mut blocks = ledger.all().to_vec();
        blocks[2].payload.actor = "mallory".to_string();

        let report = ChainValidator::new().validate(&blocks);
        assert!(!report.is_valid);
        assert_eq!(report.first_failure(), Some(2));
        assert!(matches!(
            report.blocks[2].faults[0],
            BlockFault::ContentMismatch { .. }
        ));
        assert!(report.blocks[3].ok);
    }

    #[test]
    fn test_deleted_block_breaks_linkage() {
        let ledger = build_ledger(&["1", "2", "3"]);
        let mut blocks = ledger.all().to_vec();
        blocks.remove(2);

        let report = ChainValidator::new().validate(&blocks);
        assert_eq!(report.first_failure(), Some(2));
        assert!(report.blocks[2]
            .faults
            .iter()
            .any(|f| matches!(f, BlockFault::LinkageMismatch { .. })));
    }

    #[test]
    fn test_difficulty_requirement() {
        let ledger = build_ledger(&["1"]);
        assert!(ChainValidator::with_required_difficulty(1).validate_ledger(&ledger).is_valid);

        let strict = ChainValidator::with_required_difficulty(64).validate_ledger(&ledger);
        assert_eq!(strict.first_failure(), Some(1));
    }

    #[test]
    fn test_empty_block_list_is_invalid() {
        assert!(!ChainValidator::new().validate(&[]).is_valid);
    }

    #[test]
    fn test_entity_verification() {
        let ledger = build_ledger(&["1", "2", "1"]);
        let verification = ChainValidator::new().validate_entity(&ledger, "1");
        assert!(verification.is_valid);
        assert_eq!(verification.records.len(), 2);
        assert_eq!(verification.audit_trail.len(), 2);
        assert!(verification.audit_trail[0].contains("submission"));

        let mut blocks = ledger.all().to_vec();
        blocks[3].nonce += 1;
        let tampered = Ledger::from_blocks(blocks).unwrap();
        let verification = ChainValidator::new().validate_entity(&tampered, "1");
        assert!(!verification.is_valid);
        assert!(verification.audit_trail[1].contains("FAILED"));
        assert!(ChainValidator::new().validate_entity(&tampered, "2").is_valid);
    }

    #[test]
    fn test_moved_entity_id_detected() {
        let ledger = build_ledger(&["7", "7", "7"]);
        let mut blocks = ledger.all().to_vec();
        blocks[2].entity_id = "99".to_string();
        let tampered = Ledger::from_blocks(blocks).unwrap();

        let report = ChainValidator::new().validate_ledger(&tampered);
        assert_eq!(report.first_failure(), Some(2));
        assert!(matches!(
            report.blocks[2].faults[0],
            BlockFault::ContentMismatch { .. }
        ));
        assert!(!ChainValidator::new().validate_entity(&tampered, "99").is_valid);
    }

    #[test]
    fn test_merkle_root_mismatch_detected() {
        let ledger = build_ledger(&["7"]);
        let mut blocks = ledger.all().to_vec();
        blocks[1].merkle_root = crate::ledger::digest::digest_bytes(b"other");

        let faults = ChainValidator::new().check_block(1, &blocks[1], Some(&blocks[0]));
        assert!(faults
            .iter()
            .any(|f| matches!(f, BlockFault::MerkleMismatch { .. })));
    }

    #[test]
    fn test_unknown_entity_is_reported() {
        let ledger = build_ledger(&["7"]);
        let verification = ChainValidator::new().validate_entity(&ledger, "404");
        assert!(!verification.is_valid);
        assert!(verification.records.is_empty());
        assert_eq!(verification.audit_trail, vec!["no records found for entity 404"]);
    }

    #[test]
    fn test_unreadable_journal_lines_invalidate_report() {
        let ledger = build_ledger(&["7"]);
        let report = ChainValidator::new()
            .validate_ledger(&ledger)
            .with_unreadable_journal_lines(&[3]);
        assert!(!report.is_valid);
        assert_eq!(report.first_failure(), None);
        assert!(report.summary().contains("unreadable journal lines 3"));

        let clean = ChainValidator::new()
            .validate_ledger(&ledger)
            .with_unreadable_journal_lines(&[]);
        assert!(clean.is_valid);
    }
}
