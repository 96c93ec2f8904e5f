//! Tender Ledger
//!
//! Append-only, hash-linked record of tender events with Merkle-rooted
//! payloads, proof-of-work admission and chain verification.

pub mod audit;
pub mod block;
pub mod chain;
pub mod contracts;
pub mod digest;
pub mod journal;
pub mod merkle;
pub mod miner;
pub mod validator;

pub use audit::{AuditQueryEngine, Timeline, TimelineEntry};
pub use block::{
    ActionKind, AwardDetails, Block, BlockFactory, CandidateBlock, ContractRules, ContractStatus,
    DocumentDetails, EventPayload, LedgerEvent, SubmissionDetails,
};
pub use chain::Ledger;
pub use contracts::{ContractRecord, ContractRegistry};
pub use digest::{digest_bytes, digest_json, SENTINEL_DIGEST};
pub use journal::LedgerJournal;
pub use merkle::{build_proof, build_root, verify_root, MerkleProof};
pub use miner::{CancelFlag, ProofOfWorkMiner};
pub use validator::{BlockFault, ChainReport, ChainValidator, EntityVerification};
