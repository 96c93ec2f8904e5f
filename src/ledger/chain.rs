//! Append-only block store
//!
//! The ledger owns its blocks and only grows through [`Ledger::append`],
//! which is reserved for the recording pipeline.

use chrono::{DateTime, Utc};
use std::collections::BTreeSet;

use crate::error::{LedgerError, Result};
use crate::ledger::block::{Block, BlockFactory, GENESIS_ENTITY_ID};

#[derive(Debug, Clone)]
pub struct Ledger {
    blocks: Vec<Block>,
}

impl Ledger {
    /// New ledger seeded with a genesis block stamped now
    pub fn new() -> Result<Self> {
        Self::with_genesis_at(Utc::now())
    }

    pub fn with_genesis_at(timestamp: DateTime<Utc>) -> Result<Self> {
        Ok(Self {
            blocks: vec![BlockFactory::genesis(timestamp)?],
        })
    }

    /// Restore previously persisted blocks as-is.
    ///
    /// No integrity judgement happens here; run the validator over the
    /// result. Only an empty block list is refused.
    pub fn from_blocks(blocks: Vec<Block>) -> Result<Self> {
        if blocks.is_empty() {
            return Err(LedgerError::Storage(
                "cannot restore a ledger without a genesis block".to_string(),
            ));
        }
        Ok(Self { blocks })
    }

    /// Append a mined block that extends the current head
    pub(crate) fn append(&mut self, block: Block) -> Result<()> {
        self.check_extends(&block)?;
        self.blocks.push(block);
        Ok(())
    }

    /// Whether `block` would be accepted by [`Ledger::append`]
    pub fn check_extends(&self, block: &Block) -> Result<()> {
        let latest = self.latest();
        let expected_index = latest.index + 1;
        if block.index != expected_index || block.previous_digest != latest.digest {
            return Err(LedgerError::ConcurrentAppendConflict {
                expected_index,
                found_index: block.index,
            });
        }
        Ok(())
    }

    pub fn latest(&self) -> &Block {
        // Never empty: constructors guarantee a genesis block.
        &self.blocks[self.blocks.len() - 1]
    }

    pub fn genesis(&self) -> &Block {
        &self.blocks[0]
    }

    pub fn all(&self) -> &[Block] {
        &self.blocks
    }

    pub fn get(&self, position: usize) -> Option<&Block> {
        self.blocks.get(position)
    }

    /// Blocks for one entity, in append order
    pub fn by_entity<'a>(&'a self, entity_id: &'a str) -> impl Iterator<Item = &'a Block> + 'a {
        self.blocks.iter().filter(move |block| block.entity_id == entity_id)
    }

    /// Distinct entity ids, genesis excluded
    pub fn entity_ids(&self) -> BTreeSet<&str> {
        self.blocks
            .iter()
            .filter(|block| block.entity_id != GENESIS_ENTITY_ID)
            .map(|block| block.entity_id.as_str())
            .collect()
    }

    pub fn len(&self) -> usize {
        self.blocks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.blocks.is_empty()
    }
}
