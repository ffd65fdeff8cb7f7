//! Append Service
//!
//! Serializes every write to the ledger, genesis bootstrap included. Each
//! attempt reads the head, drafts the next block, seals it off the async
//! runtime, and commits it with a conditional insert keyed on that head.

use serde::{Deserialize, Serialize};
use serde_json::Value;
use tokio::sync::Mutex;
use tracing::{debug, info, warn};

use crate::config::LedgerConfig;
use crate::database::models::InsertOutcome;
use crate::database::Database;
use crate::error::LedgerError;
use crate::ledger::block::{Block, BlockFields, EntryKind, LedgerEntry};

/// What an appender learns about the block it committed
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AppendReceipt {
    pub block_number: u64,
    pub hash: String,
}

impl From<&Block> for AppendReceipt {
    fn from(block: &Block) -> Self {
        Self {
            block_number: block.block_number,
            hash: block.hash.clone(),
        }
    }
}

pub struct AppendService {
    database: Database,
    config: LedgerConfig,
    // Single append slot: only one candidate is mined and committed at a time
    append_slot: Mutex<()>,
}

impl AppendService {
    pub fn new(database: Database, config: LedgerConfig) -> Self {
        Self {
            database,
            config,
            append_slot: Mutex::new(()),
        }
    }

    /// Create block 0 if the ledger is empty, otherwise return the existing one.
    pub async fn initialize_ledger(&self) -> Result<Block, LedgerError> {
        let _slot = self.append_slot.lock().await;

        for attempt in 1..=self.config.max_append_retries {
            if self.database.head_ref().await?.is_some() {
                return self.database.block_by_number(0).await?.ok_or_else(|| {
                    LedgerError::DatabaseError("Ledger has blocks but no block 0".to_string())
                });
            }

            let draft = BlockFields::next_after(None, vec![LedgerEntry::genesis()]);
            let genesis = self.seal(draft).await?;

            match self.database.insert_block(&genesis, None).await? {
                InsertOutcome::Committed => {
                    info!("Initialized ledger with genesis {}", genesis.hash);
                    return Ok(genesis);
                }
                InsertOutcome::Conflict => {
                    warn!("Genesis bootstrap raced another writer (attempt {})", attempt);
                }
            }
        }

        Err(LedgerError::ConcurrentAppend {
            attempts: self.config.max_append_retries,
        })
    }

    /// Seal `entries` into the next block and persist it.
    pub async fn append_entries(&self, entries: Vec<LedgerEntry>) -> Result<Block, LedgerError> {
        if entries.is_empty() {
            return Err(LedgerError::empty_entries());
        }

        let _slot = self.append_slot.lock().await;

        for attempt in 1..=self.config.max_append_retries {
            let head = self
                .database
                .head_ref()
                .await?
                .ok_or(LedgerError::Uninitialized)?;

            let draft = BlockFields::next_after(Some(&head), entries.clone());
            let block = self.seal(draft).await?;

            match self.database.insert_block(&block, Some(&head)).await? {
                InsertOutcome::Committed => return Ok(block),
                InsertOutcome::Conflict => {
                    warn!(
                        "Append of block {} conflicted with another writer (attempt {}/{})",
                        block.block_number, attempt, self.config.max_append_retries
                    );
                }
            }
        }

        Err(LedgerError::ConcurrentAppend {
            attempts: self.config.max_append_retries,
        })
    }

    /// Record a single event in its own block.
    pub async fn append(
        &self,
        kind: EntryKind,
        payload: Value,
        reference_id: Option<String>,
    ) -> Result<AppendReceipt, LedgerError> {
        let block = self
            .append_entries(vec![LedgerEntry::new(kind, reference_id, payload)])
            .await?;
        Ok(AppendReceipt::from(&block))
    }

    /// Mining is CPU-bound, so it runs on the blocking pool.
    async fn seal(&self, draft: BlockFields) -> Result<Block, LedgerError> {
        let difficulty = self.config.difficulty;
        let max_attempts = self.config.max_nonce_attempts;
        let block_number = draft.block_number;

        let block = tokio::task::spawn_blocking(move || draft.seal(difficulty, max_attempts)).await??;
        debug!("Mined block {} at nonce {}", block_number, block.nonce);
        Ok(block)
    }

    pub fn config(&self) -> &LedgerConfig {
        &self.config
    }
}
