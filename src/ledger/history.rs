//! History and Verification Queries
//!
//! Read-only views over sealed blocks: an external reference's lifecycle,
//! payload integrity checks, and chain-wide statistics.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;
use tracing::{debug, warn};

use crate::database::models::BlockRow;
use crate::database::Database;
use crate::error::LedgerError;
use crate::ledger::block::{Block, EntryKind};
use crate::ledger::merkle::payload_digest;
use crate::ledger::verify::validate_rows;

/// One ledger entry located by reference id
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HistoryRecord {
    pub block_number: u64,
    pub block_hash: String,
    pub timestamp: DateTime<Utc>,
    pub kind: EntryKind,
    pub payload: Value,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum IntegrityStatus {
    Verified,
    Mismatch,
    NotFound,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChainStats {
    pub block_count: u64,
    pub entry_count: u64,
    pub head_block_number: Option<u64>,
    pub head_hash: Option<String>,
    pub is_valid: bool,
    pub entry_kind_counts: BTreeMap<EntryKind, u64>,
}

/// Entries of `blocks` that reference `reference_id`, in block then entry order.
pub fn entries_for_reference(blocks: &[Block], reference_id: &str) -> Vec<HistoryRecord> {
    blocks
        .iter()
        .flat_map(|block| {
            block
                .entries
                .iter()
                .filter(|entry| entry.reference_id.as_deref() == Some(reference_id))
                .map(move |entry| HistoryRecord {
                    block_number: block.block_number,
                    block_hash: block.hash.clone(),
                    timestamp: block.timestamp,
                    kind: entry.kind,
                    payload: entry.payload.clone(),
                })
        })
        .collect()
}

/// Decode referencing rows, dropping any that no longer decode.
fn decodable_blocks(rows: Vec<BlockRow>) -> Vec<Block> {
    rows.into_iter()
        .filter_map(|row| {
            let block_number = row.block_number;
            match row.into_block() {
                Ok(block) => Some(block),
                Err(e) => {
                    warn!("Skipping block {} in history: {}", block_number, e);
                    None
                }
            }
        })
        .collect()
}

/// Lifecycle of an external transaction or budget. Unknown ids yield an empty list.
///
/// Blocks that no longer decode are left out; `validate_chain` reports them.
pub async fn find_entries_by_reference(
    database: &Database,
    reference_id: &str,
) -> Result<Vec<HistoryRecord>, LedgerError> {
    let rows = database.rows_referencing(reference_id).await?;
    let records = entries_for_reference(&decodable_blocks(rows), reference_id);
    debug!("Found {} entries for reference {}", records.len(), reference_id);
    Ok(records)
}

/// Compare `expected_payload` with the most recent entry recorded for `reference_id`.
///
/// A most recent block that no longer decodes cannot confirm anything and counts as a mismatch.
pub async fn verify_entry_integrity(
    database: &Database,
    reference_id: &str,
    expected_payload: &Value,
) -> Result<IntegrityStatus, LedgerError> {
    let mut rows = database.rows_referencing(reference_id).await?;

    let Some(last_row) = rows.pop() else {
        return Ok(IntegrityStatus::NotFound);
    };
    let last_number = last_row.block_number;
    let last_block = match last_row.into_block() {
        Ok(block) => block,
        Err(e) => {
            warn!("Block {} for reference {} is unreadable: {}", last_number, reference_id, e);
            return Ok(IntegrityStatus::Mismatch);
        }
    };

    let records = entries_for_reference(std::slice::from_ref(&last_block), reference_id);
    let Some(latest) = records.last() else {
        return Ok(IntegrityStatus::NotFound);
    };

    if payload_digest(&latest.payload) == payload_digest(expected_payload) {
        Ok(IntegrityStatus::Verified)
    } else {
        debug!(
            "Payload mismatch for reference {} in block {}",
            reference_id, latest.block_number
        );
        Ok(IntegrityStatus::Mismatch)
    }
}

fn tally(blocks: &[Block]) -> (u64, BTreeMap<EntryKind, u64>) {
    let mut entry_kind_counts = BTreeMap::new();
    let mut entry_count = 0u64;
    for entry in blocks.iter().flat_map(|block| block.entries.iter()) {
        *entry_kind_counts.entry(entry.kind).or_insert(0) += 1;
        entry_count += 1;
    }
    (entry_count, entry_kind_counts)
}

/// Stats over stored rows. Entries of undecodable rows are not counted.
pub fn stats_for_rows(rows: &[BlockRow], difficulty: u32) -> ChainStats {
    let is_valid = validate_rows(rows, difficulty).valid;
    let head = rows.last().map(BlockRow::head_ref);
    let blocks: Vec<Block> = rows
        .iter()
        .filter_map(|row| row.clone().into_block().ok())
        .collect();
    let (entry_count, entry_kind_counts) = tally(&blocks);

    ChainStats {
        block_count: rows.len() as u64,
        entry_count,
        head_block_number: head.as_ref().map(|h| h.block_number),
        head_hash: head.map(|h| h.hash),
        is_valid,
        entry_kind_counts,
    }
}

pub async fn chain_stats(database: &Database, difficulty: u32) -> Result<ChainStats, LedgerError> {
    let rows = database.all_rows().await?;
    Ok(stats_for_rows(&rows, difficulty))
}
