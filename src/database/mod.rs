pub mod models;
pub mod queries;
pub mod schema;

use sqlx::error::DatabaseError;
use sqlx::sqlite::{SqliteConnectOptions, SqlitePool, SqlitePoolOptions};
use std::str::FromStr;
use tracing::{debug, info};

use crate::error::LedgerError;
use crate::ledger::block::Block;
use models::{BlockRow, HeadRef, InsertOutcome};
use queries::Queries;

/// Block store backed by SQLite. Sealed rows are only ever inserted.
#[derive(Clone)]
pub struct Database {
    pool: SqlitePool,
}

impl Database {
    pub async fn new(database_url: &str) -> Result<Self, LedgerError> {
        // Every connection to a memory URL opens its own empty database
        if is_memory_url(database_url) {
            return Self::connect_single(database_url).await;
        }

        let options = SqliteConnectOptions::from_str(database_url)?.create_if_missing(true);
        let pool = SqlitePoolOptions::new()
            .max_connections(5)
            .connect_with(options)
            .await?;
        Ok(Database { pool })
    }

    /// Private in-memory store. A single long-lived connection keeps the data alive.
    pub async fn new_in_memory() -> Result<Self, LedgerError> {
        let database = Self::connect_single("sqlite::memory:").await?;
        database.run_migrations().await?;
        Ok(database)
    }

    async fn connect_single(database_url: &str) -> Result<Self, LedgerError> {
        let pool = SqlitePoolOptions::new()
            .max_connections(1)
            .min_connections(1)
            .idle_timeout(None)
            .max_lifetime(None)
            .connect(database_url)
            .await?;
        Ok(Database { pool })
    }

    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }

    pub async fn run_migrations(&self) -> Result<(), LedgerError> {
        for (name, sql) in schema::MIGRATIONS {
            sqlx::raw_sql(sql).execute(&self.pool).await?;
            debug!("Applied migration {}", name);
        }
        Ok(())
    }

    /// Insert `block` only if the stored head still equals `expected_head`.
    ///
    /// The head check and the insert run in one transaction, so the row is
    /// either fully committed or not visible at all. Losing a lock race at
    /// any step counts as a conflict.
    pub async fn insert_block(
        &self,
        block: &Block,
        expected_head: Option<&HeadRef>,
    ) -> Result<InsertOutcome, LedgerError> {
        let row = BlockRow::from_block(block)?;

        match self.try_insert(&row, expected_head).await {
            Ok(InsertOutcome::Committed) => {
                info!("Committed {}", block.summary());
                Ok(InsertOutcome::Committed)
            }
            Ok(InsertOutcome::Conflict) => Ok(InsertOutcome::Conflict),
            Err(sqlx::Error::Database(e)) if is_write_conflict(&*e) => {
                debug!("Block {} lost the write race: {}", block.block_number, e);
                Ok(InsertOutcome::Conflict)
            }
            Err(e) => Err(e.into()),
        }
    }

    async fn try_insert(
        &self,
        row: &BlockRow,
        expected_head: Option<&HeadRef>,
    ) -> Result<InsertOutcome, sqlx::Error> {
        let mut tx = self.pool.begin().await?;

        // Compare raw columns so a damaged head row cannot block appends
        let current_ref = Queries::select_head(&mut *tx)
            .await?
            .map(|head| head.head_ref());
        if current_ref.as_ref() != expected_head {
            debug!(
                "Head moved before block {} could commit (expected {:?}, found {:?})",
                row.block_number, expected_head, current_ref
            );
            tx.rollback().await?;
            return Ok(InsertOutcome::Conflict);
        }

        Queries::insert_block(&mut *tx, row).await?;
        tx.commit().await?;
        Ok(InsertOutcome::Committed)
    }

    /// Head identity read from raw columns, without decoding entries.
    pub async fn head_ref(&self) -> Result<Option<HeadRef>, LedgerError> {
        Ok(Queries::select_head(&self.pool)
            .await?
            .map(|head| head.head_ref()))
    }

    pub async fn head(&self) -> Result<Option<Block>, LedgerError> {
        Queries::select_head(&self.pool)
            .await?
            .map(BlockRow::into_block)
            .transpose()
    }

    pub async fn block_by_number(&self, block_number: u64) -> Result<Option<Block>, LedgerError> {
        let Ok(block_number) = i64::try_from(block_number) else {
            return Ok(None);
        };
        Queries::select_block(&self.pool, block_number)
            .await?
            .map(BlockRow::into_block)
            .transpose()
    }

    /// Every stored row in ascending block number order, undecoded.
    ///
    /// Rows are returned raw so that callers walking the chain can report a
    /// row that no longer decodes instead of failing the whole read.
    pub async fn all_rows(&self) -> Result<Vec<BlockRow>, LedgerError> {
        Ok(Queries::select_all(&self.pool).await?)
    }

    /// Rows holding at least one entry for `reference_id`, undecoded.
    pub async fn rows_referencing(&self, reference_id: &str) -> Result<Vec<BlockRow>, LedgerError> {
        Ok(Queries::select_referencing(&self.pool, reference_id).await?)
    }

    pub async fn block_count(&self) -> Result<u64, LedgerError> {
        let count = Queries::count_blocks(&self.pool).await?;
        Ok(count.max(0) as u64)
    }
}

fn is_memory_url(database_url: &str) -> bool {
    database_url.contains(":memory:") || database_url.contains("mode=memory")
}

/// Unique-key violations and SQLite busy/locked codes mean another writer got there first.
fn is_write_conflict(err: &dyn DatabaseError) -> bool {
    err.is_unique_violation() || matches!(err.code().as_deref(), Some("5" | "6" | "517"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ledger::block::{BlockFields, EntryKind, LedgerEntry};
    use serde_json::json;

    fn sealed_genesis() -> Block {
        BlockFields::next_after(None, vec![LedgerEntry::genesis()])
            .seal(1, 1_000_000)
            .unwrap()
    }

    fn entry(reference_id: &str, kind: EntryKind) -> LedgerEntry {
        LedgerEntry::new(kind, Some(reference_id.to_string()), json!({"amount": 10}))
    }

    #[tokio::test]
    async fn test_database_creation_and_migration() {
        let db = Database::new_in_memory().await.unwrap();
        assert!(!db.pool().is_closed());
        assert_eq!(db.block_count().await.unwrap(), 0);
        assert!(db.head().await.unwrap().is_none());

        // Migrations are idempotent
        db.run_migrations().await.unwrap();
    }

    #[tokio::test]
    async fn test_insert_and_load_block() {
        let db = Database::new_in_memory().await.unwrap();
        let genesis = sealed_genesis();

        let outcome = db.insert_block(&genesis, None).await.unwrap();
        assert_eq!(outcome, InsertOutcome::Committed);

        let head = db.head().await.unwrap().unwrap();
        assert_eq!(head, genesis);
        assert_eq!(db.block_by_number(0).await.unwrap(), Some(genesis));
        assert!(db.block_by_number(1).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_insert_conflicts_on_stale_head() {
        let db = Database::new_in_memory().await.unwrap();
        let genesis = sealed_genesis();
        db.insert_block(&genesis, None).await.unwrap();
        let head_ref = HeadRef::from(&genesis);

        let first = BlockFields::next_after(Some(&genesis.head_ref()), vec![entry("T1", EntryKind::ExpenseSubmission)])
            .seal(1, 1_000_000)
            .unwrap();
        let second = BlockFields::next_after(Some(&genesis.head_ref()), vec![entry("T2", EntryKind::ExpenseSubmission)])
            .seal(1, 1_000_000)
            .unwrap();

        assert_eq!(
            db.insert_block(&first, Some(&head_ref)).await.unwrap(),
            InsertOutcome::Committed
        );
        assert_eq!(
            db.insert_block(&second, Some(&head_ref)).await.unwrap(),
            InsertOutcome::Conflict
        );
        assert_eq!(db.block_count().await.unwrap(), 2);
        assert_eq!(db.head().await.unwrap().unwrap(), first);
    }

    #[tokio::test]
    async fn test_second_genesis_conflicts() {
        let db = Database::new_in_memory().await.unwrap();
        let genesis = sealed_genesis();
        let other = sealed_genesis();

        assert_eq!(db.insert_block(&genesis, None).await.unwrap(), InsertOutcome::Committed);
        assert_eq!(db.insert_block(&other, None).await.unwrap(), InsertOutcome::Conflict);
        assert_eq!(db.block_count().await.unwrap(), 1);
    }

    #[tokio::test]
    async fn test_rows_referencing_filters_by_reference_id() {
        let db = Database::new_in_memory().await.unwrap();
        let genesis = sealed_genesis();
        db.insert_block(&genesis, None).await.unwrap();

        let b1 = BlockFields::next_after(Some(&genesis.head_ref()), vec![entry("T1", EntryKind::ExpenseSubmission)])
            .seal(1, 1_000_000)
            .unwrap();
        db.insert_block(&b1, Some(&HeadRef::from(&genesis))).await.unwrap();

        let b2 = BlockFields::next_after(Some(&b1.head_ref()), vec![entry("T2", EntryKind::ExpenseSubmission)])
            .seal(1, 1_000_000)
            .unwrap();
        db.insert_block(&b2, Some(&HeadRef::from(&b1))).await.unwrap();

        let t1 = db.rows_referencing("T1").await.unwrap();
        assert_eq!(t1.len(), 1);
        assert_eq!(t1[0].block_number, 1);

        assert!(db.rows_referencing("missing").await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_file_backed_database_persists_blocks() {
        let temp_dir = tempfile::tempdir().unwrap();
        let path = temp_dir.path().join("ledger.db");
        let url = format!("sqlite://{}", path.display());

        let genesis = sealed_genesis();
        {
            let db = Database::new(&url).await.unwrap();
            db.run_migrations().await.unwrap();
            db.insert_block(&genesis, None).await.unwrap();
            db.pool().close().await;
        }

        let reopened = Database::new(&url).await.unwrap();
        reopened.run_migrations().await.unwrap();
        assert_eq!(reopened.head().await.unwrap(), Some(genesis));
    }

    #[tokio::test]
    async fn test_memory_url_shares_one_database() {
        let db = Database::new("sqlite::memory:").await.unwrap();
        db.run_migrations().await.unwrap();
        db.insert_block(&sealed_genesis(), None).await.unwrap();

        // Every query must see the migrated table and the inserted row
        for _ in 0..8 {
            assert_eq!(db.block_count().await.unwrap(), 1);
        }
        assert_eq!(db.all_rows().await.unwrap().len(), 1);
    }

    #[test]
    fn test_is_memory_url() {
        assert!(is_memory_url("sqlite::memory:"));
        assert!(is_memory_url("sqlite://file:ledger?mode=memory&cache=shared"));
        assert!(!is_memory_url("sqlite://fund-ledger.db?mode=rwc"));
    }
}
