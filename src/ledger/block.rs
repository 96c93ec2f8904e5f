//! Ledger Blocks
//!
//! Typed tender events, the blocks that seal them, and the factory that
//! turns a new event into a candidate block chained to its predecessor.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::error::{LedgerError, Result};
use crate::ledger::digest::{is_hex_digest, BlockPreimage, SENTINEL_DIGEST};
use crate::ledger::merkle;

/// Entity id carried by the genesis block
pub const GENESIS_ENTITY_ID: &str = "genesis";

/// Closed set of event kinds the ledger accepts
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ActionKind {
    Genesis,
    Submission,
    DocumentUpload,
    Award,
    ContractCreated,
    ContractStatusChanged,
}

impl ActionKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            ActionKind::Genesis => "genesis",
            ActionKind::Submission => "submission",
            ActionKind::DocumentUpload => "document_upload",
            ActionKind::Award => "award",
            ActionKind::ContractCreated => "contract_created",
            ActionKind::ContractStatusChanged => "contract_status_changed",
        }
    }
}

impl fmt::Display for ActionKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ActionKind {
    type Err = LedgerError;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "genesis" => Ok(ActionKind::Genesis),
            "submission" => Ok(ActionKind::Submission),
            "document_upload" | "documentUpload" => Ok(ActionKind::DocumentUpload),
            "award" => Ok(ActionKind::Award),
            "contract_created" | "contractCreated" => Ok(ActionKind::ContractCreated),
            "contract_status_changed" | "contractStatusChanged" => {
                Ok(ActionKind::ContractStatusChanged)
            }
            other => Err(LedgerError::unknown_action(other)),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct SubmissionDetails {
    pub bidder: String,
    /// Bid amount in minor currency units
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub amount_minor: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub currency: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub notes: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct DocumentDetails {
    pub file_name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub content_type: Option<String>,
    pub size_bytes: u64,
    /// SHA-256 of the document content, lowercase hex
    pub sha256: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct AwardDetails {
    pub winner: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub amount_minor: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub currency: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub justification: Option<String>,
}

/// Terms a contract is bound by
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ContractRules {
    #[serde(default)]
    pub eligibility: Vec<String>,
    #[serde(default)]
    pub required_documents: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub deadline: Option<DateTime<Utc>>,
    #[serde(default)]
    pub compliance: Vec<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ContractStatus {
    Draft,
    Active,
    Suspended,
    Completed,
    Terminated,
}

impl ContractStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            ContractStatus::Draft => "draft",
            ContractStatus::Active => "active",
            ContractStatus::Suspended => "suspended",
            ContractStatus::Completed => "completed",
            ContractStatus::Terminated => "terminated",
        }
    }

    /// Completed and terminated contracts accept no further transitions
    pub fn is_final(&self) -> bool {
        matches!(self, ContractStatus::Completed | ContractStatus::Terminated)
    }
}

impl FromStr for ContractStatus {
    type Err = LedgerError;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "draft" => Ok(ContractStatus::Draft),
            "active" => Ok(ContractStatus::Active),
            "suspended" => Ok(ContractStatus::Suspended),
            "completed" => Ok(ContractStatus::Completed),
            "terminated" => Ok(ContractStatus::Terminated),
            other => Err(LedgerError::InvalidPayload(format!("unknown contract status: {}", other))),
        }
    }
}

/// One recorded tender event, tagged by kind
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", content = "details", rename_all = "snake_case")]
pub enum LedgerEvent {
    Genesis { note: String },
    Submission(SubmissionDetails),
    DocumentUpload(DocumentDetails),
    Award(AwardDetails),
    ContractCreated { contract_id: String, rules: ContractRules },
    ContractStatusChanged {
        contract_id: String,
        status: ContractStatus,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        reason: Option<String>,
    },
}

impl LedgerEvent {
    pub fn kind(&self) -> ActionKind {
        match self {
            LedgerEvent::Genesis { .. } => ActionKind::Genesis,
            LedgerEvent::Submission(_) => ActionKind::Submission,
            LedgerEvent::DocumentUpload(_) => ActionKind::DocumentUpload,
            LedgerEvent::Award(_) => ActionKind::Award,
            LedgerEvent::ContractCreated { .. } => ActionKind::ContractCreated,
            LedgerEvent::ContractStatusChanged { .. } => ActionKind::ContractStatusChanged,
        }
    }

    /// Build a typed event from an untyped kind/details pair supplied by a collaborator
    pub fn from_parts(kind: ActionKind, details: serde_json::Value) -> Result<Self> {
        let tagged = serde_json::json!({ "kind": kind.as_str(), "details": details });
        let event: LedgerEvent = serde_json::from_value(tagged)
            .map_err(|e| LedgerError::InvalidPayload(format!("invalid {} details: {}", kind, e)))?;
        event.validate()?;
        Ok(event)
    }

    /// The `details` half of the serialized event
    pub fn details(&self) -> serde_json::Value {
        match serde_json::to_value(self) {
            Ok(serde_json::Value::Object(mut map)) => {
                map.remove("details").unwrap_or(serde_json::Value::Null)
            }
            _ => serde_json::Value::Null,
        }
    }

    /// Reject events missing required content
    pub fn validate(&self) -> Result<()> {
        fn required(value: &str, field: &str) -> Result<()> {
            if value.trim().is_empty() {
                return Err(LedgerError::missing_field(field));
            }
            Ok(())
        }

        match self {
            LedgerEvent::Genesis { .. } => Ok(()),
            LedgerEvent::Submission(details) => required(&details.bidder, "bidder"),
            LedgerEvent::DocumentUpload(details) => {
                required(&details.file_name, "file_name")?;
                if !is_hex_digest(&details.sha256) {
                    return Err(LedgerError::InvalidPayload(
                        "sha256 must be 64 lowercase hex characters".to_string(),
                    ));
                }
                Ok(())
            }
            LedgerEvent::Award(details) => required(&details.winner, "winner"),
            LedgerEvent::ContractCreated { contract_id, .. } => required(contract_id, "contract_id"),
            LedgerEvent::ContractStatusChanged { contract_id, .. } => {
                required(contract_id, "contract_id")
            }
        }
    }
}

/// Event plus who caused it
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EventPayload {
    pub action: LedgerEvent,
    pub actor: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub content_reference: Option<String>,
}

impl EventPayload {
    pub fn new(action: LedgerEvent, actor: impl Into<String>) -> Self {
        Self {
            action,
            actor: actor.into(),
            content_reference: None,
        }
    }

    pub fn with_content_reference(mut self, reference: impl Into<String>) -> Self {
        self.content_reference = Some(reference.into());
        self
    }

    pub fn kind(&self) -> ActionKind {
        self.action.kind()
    }

    /// Validation applied before a payload may enter a candidate block
    pub fn validate(&self) -> Result<()> {
        if self.actor.trim().is_empty() {
            return Err(LedgerError::missing_field("actor"));
        }
        if self.kind() == ActionKind::Genesis {
            return Err(LedgerError::InvalidPayload(
                "genesis events cannot be recorded".to_string(),
            ));
        }
        self.action.validate()
    }
}

/// A sealed, appended ledger record
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Block {
    pub index: u64,
    pub timestamp: DateTime<Utc>,
    pub entity_id: String,
    pub payload: EventPayload,
    pub digest: String,
    pub previous_digest: String,
    pub nonce: u64,
    pub merkle_root: String,
}

impl Block {
    /// Preimage of this block's stored fields
    pub fn preimage(&self) -> Result<BlockPreimage> {
        let payload_json = serde_json::to_string(&self.payload)?;
        Ok(BlockPreimage::new(
            self.index,
            &self.timestamp,
            &self.previous_digest,
            &self.entity_id,
            &payload_json,
            &self.merkle_root,
        ))
    }

    /// Recompute the digest from the stored fields
    pub fn calculate_digest(&self) -> Result<String> {
        Ok(self.preimage()?.digest_with_nonce(self.nonce))
    }

    pub fn verify_digest(&self) -> bool {
        matches!(self.calculate_digest(), Ok(digest) if digest == self.digest)
    }

    pub fn is_genesis(&self) -> bool {
        self.index == 0
    }

    pub fn summary(&self) -> String {
        format!(
            "#{} {} {} by {} ({})",
            self.index,
            self.entity_id,
            self.payload.kind(),
            self.payload.actor,
            short_digest(&self.digest)
        )
    }
}

/// First twelve characters of a digest, for log lines
pub fn short_digest(digest: &str) -> &str {
    digest.get(..12).unwrap_or(digest)
}

/// A block awaiting proof of work; it has no digest yet
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CandidateBlock {
    pub index: u64,
    pub timestamp: DateTime<Utc>,
    pub entity_id: String,
    pub payload: EventPayload,
    pub previous_digest: String,
    pub nonce: u64,
    pub merkle_root: String,
}

impl CandidateBlock {
    pub fn preimage(&self) -> Result<BlockPreimage> {
        let payload_json = serde_json::to_string(&self.payload)?;
        Ok(BlockPreimage::new(
            self.index,
            &self.timestamp,
            &self.previous_digest,
            &self.entity_id,
            &payload_json,
            &self.merkle_root,
        ))
    }

    /// Attach the winning nonce and digest
    pub fn seal(self, nonce: u64, digest: String) -> Block {
        Block {
            index: self.index,
            timestamp: self.timestamp,
            entity_id: self.entity_id,
            payload: self.payload,
            digest,
            previous_digest: self.previous_digest,
            nonce,
            merkle_root: self.merkle_root,
        }
    }
}

/// Assembles candidate blocks
pub struct BlockFactory;

impl BlockFactory {
    /// Chain a new event onto `previous`.
    ///
    /// The timestamp never goes backwards: a clock reading earlier than the
    /// previous block's timestamp is clamped to it.
    pub fn create_candidate(
        previous: &Block,
        entity_id: &str,
        payload: EventPayload,
        now: DateTime<Utc>,
    ) -> Result<CandidateBlock> {
        if entity_id.trim().is_empty() {
            return Err(LedgerError::missing_field("entity_id"));
        }
        if entity_id == GENESIS_ENTITY_ID {
            return Err(LedgerError::InvalidPayload(format!(
                "entity id '{}' is reserved",
                GENESIS_ENTITY_ID
            )));
        }
        payload.validate()?;

        let merkle_root = merkle::build_root(std::slice::from_ref(&payload))?;

        Ok(CandidateBlock {
            index: previous.index + 1,
            timestamp: now.max(previous.timestamp),
            entity_id: entity_id.to_string(),
            payload,
            previous_digest: previous.digest.clone(),
            nonce: 0,
            merkle_root,
        })
    }

    /// Genesis block; sealed with nonce 0 and not mined
    pub fn genesis(timestamp: DateTime<Utc>) -> Result<Block> {
        let payload = EventPayload::new(
            LedgerEvent::Genesis {
                note: "Tender ledger genesis".to_string(),
            },
            "system",
        );
        let merkle_root = merkle::build_root(std::slice::from_ref(&payload))?;
        let candidate = CandidateBlock {
            index: 0,
            timestamp,
            entity_id: GENESIS_ENTITY_ID.to_string(),
            payload,
            previous_digest: SENTINEL_DIGEST.to_string(),
            nonce: 0,
            merkle_root,
        };
        let digest = candidate.preimage()?.digest_with_nonce(0);
        Ok(candidate.seal(0, digest))
    }
}
