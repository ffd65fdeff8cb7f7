//! Tamper detection against rows edited behind the ledger's back

mod common;

use common::{append_allocations, setup_test_ledger};
use fund_ledger::ledger::{ChainViolation, EntryKind, IntegrityStatus};
use serde_json::json;

#[tokio::test]
async fn test_rewritten_previous_hash_is_broken_link() {
    let ledger = setup_test_ledger().await;
    append_allocations(&ledger, 4).await;

    sqlx::query("UPDATE ledger_blocks SET previous_hash = ? WHERE block_number = 2")
        .bind("f".repeat(64))
        .execute(ledger.database().pool())
        .await
        .unwrap();

    let report = ledger.validate_chain().await.unwrap();
    assert!(!report.valid);
    assert_eq!(report.first_invalid_block_number, Some(2));
    assert!(matches!(
        report.violation,
        Some(ChainViolation::BrokenLink { .. })
    ));
    assert_eq!(report.blocks_checked, 3);
}

#[tokio::test]
async fn test_rewritten_payload_is_hash_mismatch() {
    let ledger = setup_test_ledger().await;
    let original = json!({"amount": 500, "actor": "auditor"});
    ledger
        .append(EntryKind::ExpenseApproval, original.clone(), Some("T1".to_string()))
        .await
        .unwrap();
    append_allocations(&ledger, 2).await;

    sqlx::query(
        "UPDATE ledger_blocks SET entries = json_set(entries, '$[0].payload.amount', 999999) \
         WHERE block_number = 1",
    )
    .execute(ledger.database().pool())
    .await
    .unwrap();

    let report = ledger.validate_chain().await.unwrap();
    assert_eq!(report.first_invalid_block_number, Some(1));
    assert!(matches!(
        report.violation,
        Some(ChainViolation::HashMismatch { .. })
    ));

    // The caller's copy no longer matches what is stored
    assert_eq!(
        ledger.verify_entry_integrity("T1", &original).await.unwrap(),
        IntegrityStatus::Mismatch
    );
    assert!(!ledger.get_chain_stats().await.unwrap().is_valid);
}

#[tokio::test]
async fn test_rewritten_merkle_root_is_reported() {
    let ledger = setup_test_ledger().await;
    append_allocations(&ledger, 2).await;

    sqlx::query("UPDATE ledger_blocks SET merkle_root = ? WHERE block_number = 1")
        .bind("a".repeat(64))
        .execute(ledger.database().pool())
        .await
        .unwrap();

    let report = ledger.validate_chain().await.unwrap();
    assert_eq!(report.first_invalid_block_number, Some(1));
    assert!(matches!(
        report.violation,
        Some(ChainViolation::MerkleRootMismatch { .. })
    ));
}

#[tokio::test]
async fn test_rewritten_timestamp_is_hash_mismatch() {
    let ledger = setup_test_ledger().await;
    append_allocations(&ledger, 3).await;

    sqlx::query("UPDATE ledger_blocks SET timestamp_ms = timestamp_ms - 86400000 WHERE block_number = 3")
        .execute(ledger.database().pool())
        .await
        .unwrap();

    let report = ledger.validate_chain().await.unwrap();
    assert_eq!(report.first_invalid_block_number, Some(3));
    assert!(matches!(
        report.violation,
        Some(ChainViolation::HashMismatch { .. })
    ));
}

#[tokio::test]
async fn test_deleted_block_is_number_gap() {
    let ledger = setup_test_ledger().await;
    append_allocations(&ledger, 4).await;

    sqlx::query("DELETE FROM ledger_blocks WHERE block_number = 2")
        .execute(ledger.database().pool())
        .await
        .unwrap();

    let report = ledger.validate_chain().await.unwrap();
    assert_eq!(report.first_invalid_block_number, Some(3));
    assert_eq!(
        report.violation,
        Some(ChainViolation::NumberGap {
            expected: 2,
            found: 3
        })
    );
}

#[tokio::test]
async fn test_earliest_break_wins() {
    let ledger = setup_test_ledger().await;
    append_allocations(&ledger, 5).await;

    for block_number in [4, 2] {
        sqlx::query("UPDATE ledger_blocks SET nonce = nonce + 1 WHERE block_number = ?")
            .bind(block_number)
            .execute(ledger.database().pool())
            .await
            .unwrap();
    }

    let report = ledger.validate_chain().await.unwrap();
    assert_eq!(report.first_invalid_block_number, Some(2));
}

#[tokio::test]
async fn test_renamed_entry_kind_is_reported_not_raised() {
    let ledger = setup_test_ledger().await;
    append_allocations(&ledger, 3).await;

    sqlx::query(
        "UPDATE ledger_blocks SET entries = json_set(entries, '$[0].kind', 'budget_deleted') \
         WHERE block_number = 2",
    )
    .execute(ledger.database().pool())
    .await
    .unwrap();

    let report = ledger.validate_chain().await.unwrap();
    assert!(!report.valid);
    assert_eq!(report.first_invalid_block_number, Some(2));
    assert!(matches!(
        report.violation,
        Some(ChainViolation::UndecodableBlock { .. })
    ));

    let stats = ledger.get_chain_stats().await.unwrap();
    assert_eq!(stats.block_count, 4);
    assert!(!stats.is_valid);

    // Block 2 held B1's only entry; the rest of the ledger stays readable
    assert!(ledger.get_history("B1").await.unwrap().is_empty());
    assert_eq!(ledger.get_history("B2").await.unwrap().len(), 1);
    assert_eq!(
        ledger
            .verify_entry_integrity("B1", &json!({"amount": 2000, "department": "parks"}))
            .await
            .unwrap(),
        IntegrityStatus::Mismatch
    );
}

#[tokio::test]
async fn test_garbled_entries_json_is_reported() {
    let ledger = setup_test_ledger().await;
    append_allocations(&ledger, 2).await;

    sqlx::query("UPDATE ledger_blocks SET entries = 'not json' WHERE block_number = 1")
        .execute(ledger.database().pool())
        .await
        .unwrap();

    let report = ledger.validate_chain().await.unwrap();
    assert_eq!(report.first_invalid_block_number, Some(1));
    assert!(matches!(
        report.violation,
        Some(ChainViolation::UndecodableBlock { .. })
    ));
}
