#![allow(dead_code)]

use tender_ledger::ledger::{
    digest_bytes, AwardDetails, DocumentDetails, ProofOfWorkMiner, SubmissionDetails,
};
use tender_ledger::TenderLedger;

/// In-memory ledger with cheap proof of work
pub fn test_ledger(difficulty: usize) -> TenderLedger {
    let miner = ProofOfWorkMiner::new(difficulty, 10_000_000).expect("valid miner settings");
    TenderLedger::in_memory(miner).expect("ledger with genesis")
}

pub fn submission(bidder: &str, amount_minor: u64) -> SubmissionDetails {
    SubmissionDetails {
        bidder: bidder.to_string(),
        amount_minor: Some(amount_minor),
        currency: Some("EUR".to_string()),
        notes: Some("sealed envelope".to_string()),
    }
}

pub fn document(file_name: &str) -> DocumentDetails {
    DocumentDetails {
        file_name: file_name.to_string(),
        content_type: Some("application/pdf".to_string()),
        size_bytes: 48_213,
        sha256: digest_bytes(file_name.as_bytes()),
    }
}

pub fn award(winner: &str) -> AwardDetails {
    AwardDetails {
        winner: winner.to_string(),
        amount_minor: Some(1_250_000),
        currency: Some("EUR".to_string()),
        justification: Some("lowest compliant bid".to_string()),
    }
}
