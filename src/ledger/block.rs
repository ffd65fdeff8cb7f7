//! Ledger Blocks
//!
//! A block starts as a [`BlockFields`] draft and becomes an immutable
//! [`Block`] once [`BlockFields::seal`] has computed its Merkle root and
//! mined a hash meeting the difficulty.

use chrono::{DateTime, TimeZone, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fmt;
use std::str::FromStr;
use tracing::debug;

use crate::error::LedgerError;
use crate::ledger::merkle::{fingerprint, meets_difficulty, merkle_root};
use crate::ledger::miner::{mine, Seal};

/// `previous_hash` of block 0.
pub const GENESIS_PREVIOUS_HASH: &str =
    "0000000000000000000000000000000000000000000000000000000000000000";

/// Lifecycle event recorded by an entry
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EntryKind {
    Genesis,
    BudgetCreation,
    BudgetAllocation,
    ExpenseSubmission,
    ExpenseApproval,
    ExpenseRejection,
    TransactionCompletion,
}

impl EntryKind {
    pub const ALL: [EntryKind; 7] = [
        EntryKind::Genesis,
        EntryKind::BudgetCreation,
        EntryKind::BudgetAllocation,
        EntryKind::ExpenseSubmission,
        EntryKind::ExpenseApproval,
        EntryKind::ExpenseRejection,
        EntryKind::TransactionCompletion,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            EntryKind::Genesis => "genesis",
            EntryKind::BudgetCreation => "budget_creation",
            EntryKind::BudgetAllocation => "budget_allocation",
            EntryKind::ExpenseSubmission => "expense_submission",
            EntryKind::ExpenseApproval => "expense_approval",
            EntryKind::ExpenseRejection => "expense_rejection",
            EntryKind::TransactionCompletion => "transaction_completion",
        }
    }
}

impl fmt::Display for EntryKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for EntryKind {
    type Err = LedgerError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        EntryKind::ALL
            .iter()
            .copied()
            .find(|kind| kind.as_str() == s)
            .ok_or_else(|| LedgerError::ValidationError(format!("Unknown entry kind: {}", s)))
    }
}

/// One recorded event. The payload is opaque to the ledger.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LedgerEntry {
    pub kind: EntryKind,
    pub reference_id: Option<String>,
    pub payload: Value,
}

impl LedgerEntry {
    pub fn new(kind: EntryKind, reference_id: Option<String>, payload: Value) -> Self {
        Self {
            kind,
            reference_id,
            payload,
        }
    }

    pub fn genesis() -> Self {
        Self::new(
            EntryKind::Genesis,
            None,
            serde_json::json!({ "description": "Genesis block" }),
        )
    }
}

/// Identity of the ledger head: the most recently sealed block.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HeadRef {
    pub block_number: u64,
    pub hash: String,
}

impl From<&Block> for HeadRef {
    fn from(block: &Block) -> Self {
        Self {
            block_number: block.block_number,
            hash: block.hash.clone(),
        }
    }
}

/// Fingerprinted fields of a block that has not been sealed yet.
#[derive(Debug, Clone, PartialEq)]
pub struct BlockFields {
    pub block_number: u64,
    pub previous_hash: String,
    pub timestamp: DateTime<Utc>,
    pub entries: Vec<LedgerEntry>,
    pub nonce: u64,
}

impl BlockFields {
    /// Draft the block that follows `head`, or block 0 when `head` is `None`.
    pub fn next_after(head: Option<&HeadRef>, entries: Vec<LedgerEntry>) -> Self {
        let (block_number, previous_hash) = match head {
            Some(head) => (head.block_number + 1, head.hash.clone()),
            None => (0, GENESIS_PREVIOUS_HASH.to_string()),
        };

        Self {
            block_number,
            previous_hash,
            timestamp: now_millis(),
            entries,
            nonce: 0,
        }
    }

    /// Compute the Merkle root and mine a hash, producing a sealed block.
    pub fn seal(self, difficulty: u32, max_attempts: u64) -> Result<Block, LedgerError> {
        if self.entries.is_empty() {
            return Err(LedgerError::empty_entries());
        }

        let merkle_root = merkle_root(&self.entries);
        let Seal { nonce, hash } = mine(&self, difficulty, max_attempts)?;
        debug!(
            "Sealed block {} with nonce {} -> {}",
            self.block_number, nonce, hash
        );

        Ok(Block {
            block_number: self.block_number,
            previous_hash: self.previous_hash,
            timestamp: self.timestamp,
            entries: self.entries,
            nonce,
            merkle_root,
            hash,
        })
    }
}

/// Sealed, immutable ledger block
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Block {
    pub block_number: u64,
    pub previous_hash: String,
    pub timestamp: DateTime<Utc>,
    pub entries: Vec<LedgerEntry>,
    pub nonce: u64,
    pub merkle_root: String,
    pub hash: String,
}

impl Block {
    pub fn head_ref(&self) -> HeadRef {
        HeadRef::from(self)
    }

    pub fn fields(&self) -> BlockFields {
        BlockFields {
            block_number: self.block_number,
            previous_hash: self.previous_hash.clone(),
            timestamp: self.timestamp,
            entries: self.entries.clone(),
            nonce: self.nonce,
        }
    }

    pub fn calculate_hash(&self) -> String {
        fingerprint(&self.fields())
    }

    pub fn calculate_merkle_root(&self) -> String {
        merkle_root(&self.entries)
    }

    pub fn verify_hash(&self) -> bool {
        self.hash == self.calculate_hash()
    }

    pub fn verify_merkle_root(&self) -> bool {
        self.merkle_root == self.calculate_merkle_root()
    }

    pub fn meets_difficulty(&self, difficulty: u32) -> bool {
        meets_difficulty(&self.hash, difficulty)
    }

    pub fn is_genesis(&self) -> bool {
        self.block_number == 0
    }

    pub fn summary(&self) -> String {
        format!(
            "block #{} ({} entries, hash {})",
            self.block_number,
            self.entries.len(),
            self.hash
        )
    }
}

/// Current time truncated to the millisecond precision that gets hashed and stored.
pub fn now_millis() -> DateTime<Utc> {
    let now = Utc::now();
    Utc.timestamp_millis_opt(now.timestamp_millis())
        .single()
        .unwrap_or(now)
}
