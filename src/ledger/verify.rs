//! Ledger Verification
//!
//! Walks sealed blocks in ascending order and reports the first integrity
//! break. Findings are returned as data; nothing here mutates the store.

use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use crate::database::models::BlockRow;
use crate::database::Database;
use crate::error::LedgerError;
use crate::ledger::block::{Block, GENESIS_PREVIOUS_HASH};

/// First integrity break found in a block
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ChainViolation {
    /// Block numbers skip or repeat.
    NumberGap { expected: u64, found: u64 },
    /// `previous_hash` does not match the predecessor (or the sentinel for block 0).
    BrokenLink { expected: String, found: String },
    /// Recomputed fingerprint differs from the stored hash.
    HashMismatch { stored: String, computed: String },
    MerkleRootMismatch { stored: String, computed: String },
    /// Stored hash lacks the required leading zeros.
    InsufficientWork { difficulty: u32 },
    /// The stored row no longer decodes into a block.
    UndecodableBlock { detail: String },
}

impl ChainViolation {
    pub fn description(&self) -> String {
        match self {
            ChainViolation::NumberGap { expected, found } => {
                format!("expected block number {}, found {}", expected, found)
            }
            ChainViolation::BrokenLink { expected, found } => {
                format!("previous hash {} does not match {}", found, expected)
            }
            ChainViolation::HashMismatch { stored, computed } => {
                format!("stored hash {} but fields hash to {}", stored, computed)
            }
            ChainViolation::MerkleRootMismatch { stored, computed } => {
                format!("stored merkle root {} but entries hash to {}", stored, computed)
            }
            ChainViolation::InsufficientWork { difficulty } => {
                format!("hash has fewer than {} leading zeros", difficulty)
            }
            ChainViolation::UndecodableBlock { detail } => {
                format!("stored block cannot be decoded: {}", detail)
            }
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ValidationReport {
    pub valid: bool,
    pub first_invalid_block_number: Option<u64>,
    pub violation: Option<ChainViolation>,
    pub blocks_checked: u64,
}

impl ValidationReport {
    fn valid(blocks_checked: u64) -> Self {
        Self {
            valid: true,
            first_invalid_block_number: None,
            violation: None,
            blocks_checked,
        }
    }

    fn invalid(block_number: u64, violation: ChainViolation, blocks_checked: u64) -> Self {
        Self {
            valid: false,
            first_invalid_block_number: Some(block_number),
            violation: Some(violation),
            blocks_checked,
        }
    }

    pub fn summary(&self) -> String {
        match (&self.first_invalid_block_number, &self.violation) {
            (Some(number), Some(violation)) => format!(
                "Ledger is invalid at block {}: {}",
                number,
                violation.description()
            ),
            _ => format!("Ledger is valid ({} blocks)", self.blocks_checked),
        }
    }
}

/// Check one block against the hash it must link to. `position` is its index in the walk.
fn check_block(
    block: &Block,
    expected_previous: &str,
    position: u64,
    difficulty: u32,
) -> Option<ChainViolation> {
    if block.block_number != position {
        return Some(ChainViolation::NumberGap {
            expected: position,
            found: block.block_number,
        });
    }

    if block.previous_hash != expected_previous {
        return Some(ChainViolation::BrokenLink {
            expected: expected_previous.to_string(),
            found: block.previous_hash.clone(),
        });
    }

    let computed = block.calculate_hash();
    if computed != block.hash {
        return Some(ChainViolation::HashMismatch {
            stored: block.hash.clone(),
            computed,
        });
    }

    let computed = block.calculate_merkle_root();
    if computed != block.merkle_root {
        return Some(ChainViolation::MerkleRootMismatch {
            stored: block.merkle_root.clone(),
            computed,
        });
    }

    if !block.meets_difficulty(difficulty) {
        return Some(ChainViolation::InsufficientWork { difficulty });
    }

    None
}

/// Ascending walk state: how many blocks passed and what the next must link to.
struct ChainWalk {
    difficulty: u32,
    position: u64,
    expected_previous: String,
}

impl ChainWalk {
    fn new(difficulty: u32) -> Self {
        Self {
            difficulty,
            position: 0,
            expected_previous: GENESIS_PREVIOUS_HASH.to_string(),
        }
    }

    fn step(&mut self, block: &Block) -> Option<ValidationReport> {
        if let Some(violation) =
            check_block(block, &self.expected_previous, self.position, self.difficulty)
        {
            return Some(self.fail(block.block_number, violation));
        }
        self.expected_previous = block.hash.clone();
        self.position += 1;
        None
    }

    fn fail(&self, block_number: u64, violation: ChainViolation) -> ValidationReport {
        warn!(
            "Integrity break at block {}: {}",
            block_number,
            violation.description()
        );
        ValidationReport::invalid(block_number, violation, self.position + 1)
    }

    fn finish(self) -> ValidationReport {
        ValidationReport::valid(self.position)
    }
}

/// Validate `blocks`, which must be in ascending storage order.
pub fn validate_blocks(blocks: &[Block], difficulty: u32) -> ValidationReport {
    let mut walk = ChainWalk::new(difficulty);
    for block in blocks {
        if let Some(report) = walk.step(block) {
            return report;
        }
    }
    walk.finish()
}

/// Validate stored rows in ascending order. A row that no longer decodes is
/// reported as a violation at its block number.
pub fn validate_rows(rows: &[BlockRow], difficulty: u32) -> ValidationReport {
    let mut walk = ChainWalk::new(difficulty);
    for row in rows {
        let block_number = row.head_ref().block_number;
        if block_number != walk.position {
            let violation = ChainViolation::NumberGap {
                expected: walk.position,
                found: block_number,
            };
            return walk.fail(block_number, violation);
        }

        let block = match row.clone().into_block() {
            Ok(block) => block,
            Err(e) => {
                let violation = ChainViolation::UndecodableBlock {
                    detail: e.to_string(),
                };
                return walk.fail(block_number, violation);
            }
        };

        if let Some(report) = walk.step(&block) {
            return report;
        }
    }
    walk.finish()
}

/// Validate the persisted chain.
pub async fn validate_chain(
    database: &Database,
    difficulty: u32,
) -> Result<ValidationReport, LedgerError> {
    let rows = database.all_rows().await?;
    let report = validate_rows(&rows, difficulty);
    if report.valid {
        info!("Ledger verification successful: {} blocks", report.blocks_checked);
    }
    Ok(report)
}
