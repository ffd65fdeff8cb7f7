//! Proof-of-work nonce search. A computation-cost gate, not a security primitive.

use crate::error::LedgerError;
use crate::ledger::block::BlockFields;
use crate::ledger::merkle::{fingerprint, meets_difficulty};

/// Winning nonce and the hash it produces
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Seal {
    pub nonce: u64,
    pub hash: String,
}

/// Search nonces `0..max_attempts` for a fingerprint with `difficulty` leading zero hex digits.
///
/// The candidate's own nonce is ignored. The search is deterministic: identical
/// fields always yield the same seal.
pub fn mine(
    candidate: &BlockFields,
    difficulty: u32,
    max_attempts: u64,
) -> Result<Seal, LedgerError> {
    let mut fields = candidate.clone();

    for nonce in 0..max_attempts {
        fields.nonce = nonce;
        let hash = fingerprint(&fields);
        if meets_difficulty(&hash, difficulty) {
            return Ok(Seal { nonce, hash });
        }
    }

    Err(LedgerError::MiningExhausted {
        attempts: max_attempts,
    })
}
