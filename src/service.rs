//! Tender Ledger Service
//!
//! Owns one ledger and serializes every write through a single
//! read-latest, mine, append pipeline. Readers work on immutable
//! snapshots, so they never observe a partially appended block.

use chrono::{DateTime, Utc};
use serde::Serialize;
use std::path::Path;
use std::sync::Arc;
use tokio::sync::{Mutex, RwLock};
use tracing::{debug, info, warn};

use crate::config::LedgerSettings;
use crate::error::{LedgerError, Result};
use crate::ledger::contracts::{self, ContractRecord, ContractRegistry};
use crate::ledger::miner::{CancelFlag, CancelOnDrop};
use crate::ledger::{
    ActionKind, AuditQueryEngine, AwardDetails, Block, BlockFactory, CandidateBlock, ChainReport,
    ChainValidator, ContractRules, ContractStatus, DocumentDetails, EntityVerification,
    EventPayload, Ledger, LedgerEvent, LedgerJournal, ProofOfWorkMiner, SubmissionDetails,
    Timeline,
};

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct BlockSummary {
    pub index: u64,
    pub entity_id: String,
    pub action_kind: ActionKind,
    pub timestamp: DateTime<Utc>,
    pub digest: String,
}

impl From<&Block> for BlockSummary {
    fn from(block: &Block) -> Self {
        Self {
            index: block.index,
            entity_id: block.entity_id.clone(),
            action_kind: block.payload.kind(),
            timestamp: block.timestamp,
            digest: block.digest.clone(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct LedgerStats {
    pub total_blocks: usize,
    pub total_entities: usize,
    pub latest_block: BlockSummary,
    pub chain_integrity: bool,
    pub unreadable_journal_lines: usize,
    pub difficulty: usize,
}

pub struct TenderLedger {
    chain: RwLock<Arc<Ledger>>,
    /// Held for the whole write pipeline; carries the optional journal
    writer: Mutex<Option<LedgerJournal>>,
    /// Journal lines skipped at startup; they stay a fault for this process
    unreadable_journal_lines: Vec<usize>,
    miner: ProofOfWorkMiner,
    validator: ChainValidator,
    audit: AuditQueryEngine,
    contracts: ContractRegistry,
}

impl TenderLedger {
    fn assemble(
        ledger: Ledger,
        journal: Option<LedgerJournal>,
        unreadable_journal_lines: Vec<usize>,
        miner: ProofOfWorkMiner,
    ) -> Self {
        let validator = ChainValidator::new();
        Self {
            chain: RwLock::new(Arc::new(ledger)),
            writer: Mutex::new(journal),
            unreadable_journal_lines,
            miner,
            validator,
            audit: AuditQueryEngine::new(validator),
            contracts: ContractRegistry,
        }
    }

    /// Ledger kept only in memory
    pub fn in_memory(miner: ProofOfWorkMiner) -> Result<Self> {
        Ok(Self::assemble(Ledger::new()?, None, Vec::new(), miner))
    }

    /// Ledger backed by a JSONL journal, restored from it when present.
    ///
    /// A damaged journal still opens: unreadable lines are skipped and the
    /// ledger reports itself as compromised.
    pub fn with_journal(miner: ProofOfWorkMiner, path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let mut journal = LedgerJournal::open(path)?;
        let contents = LedgerJournal::load(path)?;

        let ledger = if contents.is_empty() {
            let ledger = Ledger::new()?;
            journal.append(ledger.genesis())?;
            info!("Started new ledger journal at {}", path.display());
            ledger
        } else if contents.blocks.is_empty() {
            return Err(LedgerError::Storage(format!(
                "ledger journal {} has no readable blocks",
                path.display()
            )));
        } else {
            let ledger = Ledger::from_blocks(contents.blocks)?;
            let report = ChainValidator::new()
                .validate_ledger(&ledger)
                .with_unreadable_journal_lines(&contents.unreadable_lines);
            if report.is_valid {
                info!("Restored {} blocks from {}", ledger.len(), path.display());
            } else {
                warn!(
                    "Restored ledger from {} fails verification: {}",
                    path.display(),
                    report.summary()
                );
            }
            ledger
        };

        Ok(Self::assemble(
            ledger,
            Some(journal),
            contents.unreadable_lines,
            miner,
        ))
    }

    pub fn from_settings(settings: &LedgerSettings) -> Result<Self> {
        settings.validate()?;
        let miner = ProofOfWorkMiner::new(settings.difficulty, settings.max_mining_iterations)?;
        match &settings.journal_path {
            Some(path) => Self::with_journal(miner, path),
            None => Self::in_memory(miner),
        }
    }

    pub fn miner(&self) -> &ProofOfWorkMiner {
        &self.miner
    }

    /// Immutable view of the ledger as of now
    pub async fn snapshot(&self) -> Arc<Ledger> {
        Arc::clone(&*self.chain.read().await)
    }

    /// Run the proof-of-work search on the blocking pool.
    ///
    /// Dropping the returned future cancels the search.
    async fn mine(&self, candidate: CandidateBlock) -> Result<Block> {
        let flag = CancelFlag::new();
        let guard = CancelOnDrop::new(flag.clone());
        let miner = self.miner;

        let mined = tokio::task::spawn_blocking(move || miner.mine(candidate, &flag))
            .await
            .map_err(|e| LedgerError::Worker(format!("mining task failed: {}", e)))?;
        guard.disarm();
        mined
    }

    /// Build, mine and append one block. `build` sees the ledger state the
    /// block will extend and the timestamp the block will carry, so checks
    /// made there cannot race other writers.
    async fn record_with<F>(&self, entity_id: &str, build: F) -> Result<Block>
    where
        F: FnOnce(&Ledger, DateTime<Utc>) -> Result<EventPayload>,
    {
        let mut journal = self.writer.lock().await;

        let candidate = {
            let snapshot = self.snapshot().await;
            let now = Utc::now().max(snapshot.latest().timestamp);
            let payload = build(&snapshot, now)?;
            BlockFactory::create_candidate(snapshot.latest(), entity_id, payload, now)?
        };
        debug!("Mining block #{} for entity {}", candidate.index, entity_id);

        let block = self.mine(candidate).await?;

        // No await between the journal write and the in-memory append.
        let mut chain = self.chain.write().await;
        chain.check_extends(&block)?;
        if let Some(journal) = journal.as_mut() {
            journal.append(&block)?;
        }
        Arc::make_mut(&mut *chain).append(block.clone())?;

        info!("Appended block {}", block.summary());
        Ok(block)
    }

    async fn record(&self, entity_id: &str, payload: EventPayload) -> Result<Block> {
        self.record_with(entity_id, move |_, _| Ok(payload)).await
    }

    fn payload(action: LedgerEvent, actor: &str, content_reference: Option<String>) -> EventPayload {
        EventPayload {
            action,
            actor: actor.to_string(),
            content_reference,
        }
    }

    pub async fn record_submission(
        &self,
        entity_id: &str,
        details: SubmissionDetails,
        actor: &str,
        content_reference: Option<String>,
    ) -> Result<String> {
        let payload = Self::payload(LedgerEvent::Submission(details), actor, content_reference);
        Ok(self.record(entity_id, payload).await?.digest)
    }

    pub async fn record_document_upload(
        &self,
        entity_id: &str,
        details: DocumentDetails,
        actor: &str,
        content_reference: Option<String>,
    ) -> Result<String> {
        let payload = Self::payload(LedgerEvent::DocumentUpload(details), actor, content_reference);
        Ok(self.record(entity_id, payload).await?.digest)
    }

    pub async fn record_award(
        &self,
        entity_id: &str,
        details: AwardDetails,
        actor: &str,
        content_reference: Option<String>,
    ) -> Result<String> {
        let payload = Self::payload(LedgerEvent::Award(details), actor, content_reference);
        Ok(self.record(entity_id, payload).await?.digest)
    }

    /// Record an event from untyped collaborator input.
    ///
    /// Only submission, document upload and award events are accepted here;
    /// contract events go through the contract operations.
    pub async fn record_event(
        &self,
        entity_id: &str,
        kind: ActionKind,
        details: serde_json::Value,
        actor: &str,
        content_reference: Option<String>,
    ) -> Result<Block> {
        match kind {
            ActionKind::Submission | ActionKind::DocumentUpload | ActionKind::Award => {}
            other => {
                return Err(LedgerError::InvalidPayload(format!(
                    "{} events cannot be recorded directly",
                    other
                )))
            }
        }
        let action = LedgerEvent::from_parts(kind, details)?;
        self.record(entity_id, Self::payload(action, actor, content_reference))
            .await
    }

    pub async fn create_contract(
        &self,
        entity_id: &str,
        rules: ContractRules,
        actor: &str,
    ) -> Result<ContractRecord> {
        // The id hashes the creating block's own timestamp
        let mut contract_id = String::new();
        self.record_with(entity_id, |_, created_at| {
            contract_id = contracts::contract_id_for(entity_id, &created_at);
            Ok(contracts::creation_payload(contract_id.clone(), rules, actor))
        })
        .await?;

        let snapshot = self.snapshot().await;
        self.contracts
            .find(&snapshot, entity_id, &contract_id)
            .ok_or_else(|| LedgerError::Storage(format!("contract {} missing after append", contract_id)))
    }

    /// Move a contract to a new status by appending a status event
    pub async fn change_contract_status(
        &self,
        entity_id: &str,
        contract_id: &str,
        status: ContractStatus,
        reason: Option<String>,
        actor: &str,
    ) -> Result<ContractRecord> {
        let registry = self.contracts;
        self.record_with(entity_id, |ledger, _| {
            registry.check_transition(ledger, entity_id, contract_id, status)?;
            Ok(contracts::status_payload(contract_id.to_string(), status, reason, actor))
        })
        .await?;

        let snapshot = self.snapshot().await;
        self.contracts
            .find(&snapshot, entity_id, contract_id)
            .ok_or_else(|| LedgerError::Storage(format!("contract {} missing after append", contract_id)))
    }

    pub async fn contracts(&self, entity_id: &str) -> Vec<ContractRecord> {
        let snapshot = self.snapshot().await;
        self.contracts.contracts_for(&snapshot, entity_id)
    }

    pub async fn verify(&self, entity_id: &str) -> EntityVerification {
        let snapshot = self.snapshot().await;
        self.validator.validate_entity(&snapshot, entity_id)
    }

    pub async fn timeline(&self, entity_id: &str) -> Timeline {
        let snapshot = self.snapshot().await;
        let mut timeline = self.audit.timeline(&snapshot, entity_id);
        if !self.unreadable_journal_lines.is_empty() {
            timeline.integrity = false;
        }
        timeline
    }

    pub async fn validate_chain(&self) -> ChainReport {
        let snapshot = self.snapshot().await;
        self.validator
            .validate_ledger(&snapshot)
            .with_unreadable_journal_lines(&self.unreadable_journal_lines)
    }

    pub async fn stats(&self) -> LedgerStats {
        let snapshot = self.snapshot().await;
        let report = self
            .validator
            .validate_ledger(&snapshot)
            .with_unreadable_journal_lines(&self.unreadable_journal_lines);
        LedgerStats {
            total_blocks: snapshot.len(),
            total_entities: snapshot.entity_ids().len(),
            latest_block: BlockSummary::from(snapshot.latest()),
            chain_integrity: report.is_valid,
            unreadable_journal_lines: self.unreadable_journal_lines.len(),
            difficulty: self.miner.difficulty(),
        }
    }
}
