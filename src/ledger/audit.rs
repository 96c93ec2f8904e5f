//! Audit timelines for a single entity.

use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::ledger::block::ActionKind;
use crate::ledger::chain::Ledger;
use crate::ledger::validator::ChainValidator;

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TimelineEntry {
    pub index: u64,
    pub timestamp: DateTime<Utc>,
    pub action_kind: ActionKind,
    pub details: serde_json::Value,
    pub actor: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub content_reference: Option<String>,
    pub digest: String,
    /// Entry digest and linkage recomputed successfully
    pub verified: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Timeline {
    pub entity_id: String,
    pub total_blocks: usize,
    /// Whole-chain integrity at the time of the query
    pub integrity: bool,
    pub entries: Vec<TimelineEntry>,
}

#[derive(Debug, Clone, Copy, Default)]
pub struct AuditQueryEngine {
    validator: ChainValidator,
}

impl AuditQueryEngine {
    pub fn new(validator: ChainValidator) -> Self {
        Self { validator }
    }

    pub fn timeline(&self, ledger: &Ledger, entity_id: &str) -> Timeline {
        let report = self.validator.validate_ledger(ledger);

        let entries: Vec<TimelineEntry> = ledger
            .all()
            .iter()
            .enumerate()
            .filter(|(_, block)| block.entity_id == entity_id)
            .map(|(position, block)| TimelineEntry {
                index: block.index,
                timestamp: block.timestamp,
                action_kind: block.payload.kind(),
                details: block.payload.action.details(),
                actor: block.payload.actor.clone(),
                content_reference: block.payload.content_reference.clone(),
                digest: block.digest.clone(),
                verified: report.blocks.get(position).map_or(false, |check| check.ok),
            })
            .collect();

        Timeline {
            entity_id: entity_id.to_string(),
            total_blocks: entries.len(),
            integrity: report.is_valid,
            entries,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ledger::block::{BlockFactory, DocumentDetails, EventPayload, LedgerEvent};
    use crate::ledger::digest::digest_bytes;
    use crate::ledger::miner::{CancelFlag, ProofOfWorkMiner};

    fn upload(ledger: &mut Ledger, entity_id: &str, file_name: &str) {
        let payload = EventPayload::new(
            LedgerEvent::DocumentUpload(DocumentDetails {
                file_name: file_name.to_string(),
                content_type: Some("application/pdf".to_string()),
                size_bytes: 2048,
                sha256: digest_bytes(file_name.as_bytes()),
            }),
            "uploader",
        )
        .with_content_reference(format!("s3://tenders/{}", file_name));
        let candidate =
            BlockFactory::create_candidate(ledger.latest(), entity_id, payload, Utc::now()).unwrap();
        let block = ProofOfWorkMiner::new(1, 100_000)
            .unwrap()
            .mine(candidate, &CancelFlag::new())
            .unwrap();
        ledger.append(block).unwrap();
    }

    #[test]
    fn test_timeline_filters_and_orders() {
        let mut ledger = Ledger::new().unwrap();
        for i in 0..3 {
            upload(&mut ledger, "1", &format!("a{}.pdf", i));
            upload(&mut ledger, "2", &format!("b{}.pdf", i));
        }

        let timeline = AuditQueryEngine::default().timeline(&ledger, "1");
        assert_eq!(timeline.total_blocks, 3);
        assert!(timeline.integrity);
        let names: Vec<&str> = timeline
            .entries
            .iter()
            .map(|e| e.details["file_name"].as_str().unwrap())
            .collect();
        assert_eq!(names, vec!["a0.pdf", "a1.pdf", "a2.pdf"]);
        assert!(timeline.entries.iter().all(|e| e.verified));
        assert_eq!(
            timeline.entries[0].content_reference.as_deref(),
            Some("s3://tenders/a0.pdf")
        );
    }

    #[test]
    fn test_timeline_flags_tampered_entry() {
        let mut ledger = Ledger::new().unwrap();
        upload(&mut ledger, "1", "a.pdf");
        upload(&mut ledger, "2", "b.pdf");

        let mut blocks = ledger.all().to_vec();
        blocks[2].payload.actor = "mallory".to_string();
        let tampered = Ledger::from_blocks(blocks).unwrap();

        let engine = AuditQueryEngine::default();
        let untouched = engine.timeline(&tampered, "1");
        assert!(!untouched.integrity);
        assert!(untouched.entries[0].verified);

        let touched = engine.timeline(&tampered, "2");
        assert!(!touched.entries[0].verified);
    }

    #[test]
    fn test_unknown_entity_has_empty_timeline() {
        let ledger = Ledger::new().unwrap();
        let timeline = AuditQueryEngine::default().timeline(&ledger, "nope");
        assert_eq!(timeline.total_blocks, 0);
        assert!(timeline.integrity);
    }
}
