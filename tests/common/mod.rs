#![allow(dead_code)]

use fund_ledger::config::LedgerConfig;
use fund_ledger::database::Database;
use fund_ledger::ledger::EntryKind;
use fund_ledger::Ledger;
use serde_json::{json, Value};

/// Initialized ledger over a private in-memory database, difficulty 2.
pub async fn setup_test_ledger() -> Ledger {
    setup_test_ledger_with(LedgerConfig::default()).await
}

pub async fn setup_test_ledger_with(config: LedgerConfig) -> Ledger {
    let database = Database::new_in_memory()
        .await
        .expect("Failed to create test database");
    let ledger = Ledger::new(database, config).expect("Invalid test config");
    ledger
        .initialize_ledger()
        .await
        .expect("Failed to initialize ledger");
    ledger
}

/// Lifecycle of one expense: submission, approval, completion.
pub fn expense_lifecycle(amount: u64) -> Vec<(EntryKind, Value)> {
    vec![
        (
            EntryKind::ExpenseSubmission,
            json!({"amount": amount, "actor": "clerk", "purpose": "road repair"}),
        ),
        (
            EntryKind::ExpenseApproval,
            json!({"amount": amount, "actor": "auditor", "approved": true}),
        ),
        (
            EntryKind::TransactionCompletion,
            json!({"amount": amount, "actor": "treasury", "settled": true}),
        ),
    ]
}

/// Append `count` single-entry blocks, each with its own reference id.
pub async fn append_allocations(ledger: &Ledger, count: usize) {
    for i in 0..count {
        ledger
            .append(
                EntryKind::BudgetAllocation,
                json!({"amount": (i + 1) * 1000, "department": "parks"}),
                Some(format!("B{}", i)),
            )
            .await
            .expect("Failed to append allocation");
    }
}
