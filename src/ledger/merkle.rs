//! Block Fingerprints and Merkle Roots
//!
//! Pure functions that turn block fields or entry lists into deterministic
//! SHA-256 hex digests. Every digest goes through one canonical encoding:
//!
//! - entry: canonical JSON object `{"kind","payload","reference_id"}`
//! - block: `block_number:<n>|previous_hash:<hex>|timestamp:<ms>|entries:<json array>|nonce:<n>`
//!
//! Canonical JSON sorts object keys by byte order and emits no whitespace,
//! independent of how `serde_json` happens to order maps.

use serde_json::Value;
use sha2::{Digest, Sha256};

use crate::ledger::block::{BlockFields, LedgerEntry};

/// SHA-256 of `data`, lowercase hex.
pub fn digest_hex(data: &[u8]) -> String {
    let mut hasher = Sha256::new();
    hasher.update(data);
    hex::encode(hasher.finalize())
}

/// Encode a JSON value with sorted keys and no whitespace.
pub fn canonical_json(value: &Value) -> String {
    let mut out = String::new();
    write_canonical(value, &mut out);
    out
}

fn write_canonical(value: &Value, out: &mut String) {
    match value {
        Value::Object(map) => {
            let mut keys: Vec<&String> = map.keys().collect();
            keys.sort();
            out.push('{');
            for (i, key) in keys.iter().enumerate() {
                if i > 0 {
                    out.push(',');
                }
                write_string(key, out);
                out.push(':');
                write_canonical(&map[key.as_str()], out);
            }
            out.push('}');
        }
        Value::Array(items) => {
            out.push('[');
            for (i, item) in items.iter().enumerate() {
                if i > 0 {
                    out.push(',');
                }
                write_canonical(item, out);
            }
            out.push(']');
        }
        Value::String(s) => write_string(s, out),
        // null, bool and numbers have a single serde_json rendering
        other => out.push_str(&other.to_string()),
    }
}

fn write_string(s: &str, out: &mut String) {
    out.push_str(&Value::String(s.to_string()).to_string());
}

/// Canonical encoding of one ledger entry.
pub fn canonical_entry(entry: &LedgerEntry) -> String {
    let mut out = String::from("{\"kind\":");
    write_string(entry.kind.as_str(), &mut out);
    out.push_str(",\"payload\":");
    write_canonical(&entry.payload, &mut out);
    out.push_str(",\"reference_id\":");
    match &entry.reference_id {
        Some(reference_id) => write_string(reference_id, &mut out),
        None => out.push_str("null"),
    }
    out.push('}');
    out
}

/// Canonical string over every fingerprinted block field, in fixed order.
pub fn canonical_block_string(fields: &BlockFields) -> String {
    let entries: Vec<String> = fields.entries.iter().map(canonical_entry).collect();
    format!(
        "block_number:{}|previous_hash:{}|timestamp:{}|entries:[{}]|nonce:{}",
        fields.block_number,
        fields.previous_hash,
        fields.timestamp.timestamp_millis(),
        entries.join(","),
        fields.nonce
    )
}

/// Block hash over `{block_number, previous_hash, timestamp, entries, nonce}`.
pub fn fingerprint(fields: &BlockFields) -> String {
    digest_hex(canonical_block_string(fields).as_bytes())
}

/// Digest of a single entry, used as a Merkle leaf.
pub fn entry_leaf_hash(entry: &LedgerEntry) -> String {
    digest_hex(canonical_entry(entry).as_bytes())
}

/// Digest of a payload alone, used for integrity comparisons.
pub fn payload_digest(payload: &Value) -> String {
    digest_hex(canonical_json(payload).as_bytes())
}

/// Merkle root of `entries`. Odd levels duplicate their last node.
pub fn merkle_root(entries: &[LedgerEntry]) -> String {
    if entries.is_empty() {
        return digest_hex(&[]);
    }

    let mut level: Vec<String> = entries.iter().map(entry_leaf_hash).collect();

    while level.len() > 1 {
        level = level
            .chunks(2)
            .map(|pair| {
                let left = &pair[0];
                let right = pair.get(1).unwrap_or(left);
                digest_hex(format!("{}{}", left, right).as_bytes())
            })
            .collect();
    }

    level.swap_remove(0)
}

/// Whether `hash` starts with at least `difficulty` zero hex digits.
pub fn meets_difficulty(hash: &str, difficulty: u32) -> bool {
    let difficulty = difficulty as usize;
    hash.len() >= difficulty && hash.bytes().take(difficulty).all(|b| b == b'0')
}
