//! Contract Registry
//!
//! Contracts are created by a `contract_created` event and change status only
//! through later `contract_status_changed` events. The current record is
//! derived by folding those events in append order.

use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::error::{LedgerError, Result};
use crate::ledger::block::{Block, ContractRules, ContractStatus, EventPayload, LedgerEvent};
use crate::ledger::chain::Ledger;
use crate::ledger::digest::digest_bytes;

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ContractRecord {
    pub contract_id: String,
    pub entity_id: String,
    pub rules: ContractRules,
    pub status: ContractStatus,
    pub created_at: DateTime<Utc>,
    /// Digest of the creating block
    pub digest: String,
    /// Digest of the block that set the current status
    pub status_digest: String,
}

/// `CTR-` plus the first 16 hex chars of the hashed entity id and creation time
pub fn contract_id_for(entity_id: &str, created_at: &DateTime<Utc>) -> String {
    let digest = digest_bytes(format!("{}|{}", entity_id, created_at.to_rfc3339()).as_bytes());
    format!("CTR-{}", &digest[..16])
}

pub fn creation_payload(contract_id: String, rules: ContractRules, actor: &str) -> EventPayload {
    EventPayload::new(LedgerEvent::ContractCreated { contract_id, rules }, actor)
}

pub fn status_payload(
    contract_id: String,
    status: ContractStatus,
    reason: Option<String>,
    actor: &str,
) -> EventPayload {
    EventPayload::new(
        LedgerEvent::ContractStatusChanged {
            contract_id,
            status,
            reason,
        },
        actor,
    )
}

#[derive(Debug, Clone, Copy, Default)]
pub struct ContractRegistry;

impl ContractRegistry {
    /// Fold a block into the contracts seen so far
    fn apply(contracts: &mut Vec<ContractRecord>, block: &Block) {
        match &block.payload.action {
            LedgerEvent::ContractCreated { contract_id, rules } => {
                contracts.push(ContractRecord {
                    contract_id: contract_id.clone(),
                    entity_id: block.entity_id.clone(),
                    rules: rules.clone(),
                    status: ContractStatus::Active,
                    created_at: block.timestamp,
                    digest: block.digest.clone(),
                    status_digest: block.digest.clone(),
                });
            }
            LedgerEvent::ContractStatusChanged {
                contract_id, status, ..
            } => {
                if let Some(record) = contracts
                    .iter_mut()
                    .find(|c| &c.contract_id == contract_id && c.entity_id == block.entity_id)
                {
                    record.status = *status;
                    record.status_digest = block.digest.clone();
                }
            }
            _ => {}
        }
    }

    /// Contracts of one entity in creation order, with their current status
    pub fn contracts_for(&self, ledger: &Ledger, entity_id: &str) -> Vec<ContractRecord> {
        let mut contracts = Vec::new();
        for block in ledger.by_entity(entity_id) {
            Self::apply(&mut contracts, block);
        }
        contracts
    }

    pub fn find(&self, ledger: &Ledger, entity_id: &str, contract_id: &str) -> Option<ContractRecord> {
        self.contracts_for(ledger, entity_id)
            .into_iter()
            .find(|c| c.contract_id == contract_id)
    }

    /// Check that `contract_id` exists and may move to `next`
    pub fn check_transition(
        &self,
        ledger: &Ledger,
        entity_id: &str,
        contract_id: &str,
        next: ContractStatus,
    ) -> Result<ContractRecord> {
        let record = self.find(ledger, entity_id, contract_id).ok_or_else(|| {
            LedgerError::InvalidPayload(format!(
                "unknown contract {} for entity {}",
                contract_id, entity_id
            ))
        })?;

        if record.status.is_final() {
            return Err(LedgerError::InvalidPayload(format!(
                "contract {} is {} and cannot change status",
                contract_id,
                record.status.as_str()
            )));
        }
        if record.status == next {
            return Err(LedgerError::InvalidPayload(format!(
                "contract {} is already {}",
                contract_id,
                next.as_str()
            )));
        }

        Ok(record)
    }
}
