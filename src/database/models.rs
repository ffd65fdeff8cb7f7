use chrono::{TimeZone, Utc};
use sqlx::sqlite::SqliteRow;
use sqlx::Row;

use crate::error::LedgerError;
pub use crate::ledger::block::HeadRef;
use crate::ledger::block::{Block, LedgerEntry};

/// Raw `ledger_blocks` row, before entries are decoded.
#[derive(Debug, Clone)]
pub struct BlockRow {
    pub block_number: i64,
    pub previous_hash: String,
    pub timestamp_ms: i64,
    pub entries: String,
    pub nonce: i64,
    pub merkle_root: String,
    pub hash: String,
}

impl BlockRow {
    pub fn from_row(row: &SqliteRow) -> Result<Self, sqlx::Error> {
        Ok(Self {
            block_number: row.try_get("block_number")?,
            previous_hash: row.try_get("previous_hash")?,
            timestamp_ms: row.try_get("timestamp_ms")?,
            entries: row.try_get("entries")?,
            nonce: row.try_get("nonce")?,
            merkle_root: row.try_get("merkle_root")?,
            hash: row.try_get("hash")?,
        })
    }

    pub fn from_block(block: &Block) -> Result<Self, LedgerError> {
        let block_number = i64::try_from(block.block_number).map_err(|_| {
            LedgerError::ValidationError(format!(
                "Block number {} exceeds storage range",
                block.block_number
            ))
        })?;
        let nonce = i64::try_from(block.nonce).map_err(|_| {
            LedgerError::ValidationError(format!("Nonce {} exceeds storage range", block.nonce))
        })?;

        Ok(Self {
            block_number,
            previous_hash: block.previous_hash.clone(),
            timestamp_ms: block.timestamp.timestamp_millis(),
            entries: serde_json::to_string(&block.entries)?,
            nonce,
            merkle_root: block.merkle_root.clone(),
            hash: block.hash.clone(),
        })
    }

    /// Head identity straight from the columns, without decoding entries.
    pub fn head_ref(&self) -> HeadRef {
        HeadRef {
            block_number: u64::try_from(self.block_number).unwrap_or_default(),
            hash: self.hash.clone(),
        }
    }

    pub fn into_block(self) -> Result<Block, LedgerError> {
        let block_number = u64::try_from(self.block_number)
            .map_err(|_| LedgerError::corrupt_row(self.block_number, "negative block number"))?;
        let nonce = u64::try_from(self.nonce)
            .map_err(|_| LedgerError::corrupt_row(self.block_number, "negative nonce"))?;
        let timestamp = Utc
            .timestamp_millis_opt(self.timestamp_ms)
            .single()
            .ok_or_else(|| LedgerError::corrupt_row(self.block_number, "timestamp out of range"))?;
        let entries: Vec<LedgerEntry> = serde_json::from_str(&self.entries)
            .map_err(|e| LedgerError::corrupt_row(self.block_number, e))?;

        Ok(Block {
            block_number,
            previous_hash: self.previous_hash,
            timestamp,
            entries,
            nonce,
            merkle_root: self.merkle_root,
            hash: self.hash,
        })
    }
}

/// Result of a conditional insert
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InsertOutcome {
    Committed,
    /// The head moved, or another writer already claimed this block number.
    Conflict,
}
