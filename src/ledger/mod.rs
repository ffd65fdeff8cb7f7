//! Audit Ledger
//!
//! Tamper-evident, append-only record of public-fund transaction
//! lifecycles, built from hash-chained, proof-of-work sealed blocks
//! with per-block Merkle roots.

pub mod append;
pub mod block;
pub mod history;
pub mod merkle;
pub mod miner;
pub mod verify;

pub use append::{AppendReceipt, AppendService};
pub use block::{Block, BlockFields, EntryKind, HeadRef, LedgerEntry, GENESIS_PREVIOUS_HASH};
pub use history::{ChainStats, HistoryRecord, IntegrityStatus};
pub use merkle::{fingerprint, merkle_root};
pub use miner::{mine, Seal};
pub use verify::{ChainViolation, ValidationReport};

use serde_json::Value;

use crate::config::LedgerConfig;
use crate::database::Database;
use crate::error::LedgerError;

/// The ledger's external interface: appends go through the [`AppendService`],
/// reads go straight to the store and only ever see sealed blocks.
pub struct Ledger {
    database: Database,
    appender: AppendService,
}

impl Ledger {
    pub fn new(database: Database, config: LedgerConfig) -> Result<Self, LedgerError> {
        config.validate()?;
        Ok(Self {
            appender: AppendService::new(database.clone(), config),
            database,
        })
    }

    pub fn database(&self) -> &Database {
        &self.database
    }

    pub fn config(&self) -> &LedgerConfig {
        self.appender.config()
    }

    pub async fn initialize_ledger(&self) -> Result<Block, LedgerError> {
        self.appender.initialize_ledger().await
    }

    pub async fn append_entries(&self, entries: Vec<LedgerEntry>) -> Result<Block, LedgerError> {
        self.appender.append_entries(entries).await
    }

    pub async fn append(
        &self,
        kind: EntryKind,
        payload: Value,
        reference_id: Option<String>,
    ) -> Result<AppendReceipt, LedgerError> {
        self.appender.append(kind, payload, reference_id).await
    }

    pub async fn get_history(&self, reference_id: &str) -> Result<Vec<HistoryRecord>, LedgerError> {
        history::find_entries_by_reference(&self.database, reference_id).await
    }

    pub async fn verify_entry_integrity(
        &self,
        reference_id: &str,
        expected_payload: &Value,
    ) -> Result<IntegrityStatus, LedgerError> {
        history::verify_entry_integrity(&self.database, reference_id, expected_payload).await
    }

    pub async fn validate_chain(&self) -> Result<ValidationReport, LedgerError> {
        verify::validate_chain(&self.database, self.config().difficulty).await
    }

    pub async fn get_chain_stats(&self) -> Result<ChainStats, LedgerError> {
        history::chain_stats(&self.database, self.config().difficulty).await
    }

    pub async fn head(&self) -> Result<Option<Block>, LedgerError> {
        self.database.head().await
    }

    pub async fn block(&self, block_number: u64) -> Result<Option<Block>, LedgerError> {
        self.database.block_by_number(block_number).await
    }
}
