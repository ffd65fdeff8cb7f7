use sqlx::{Executor, Sqlite};

use crate::database::models::BlockRow;

const BLOCK_COLUMNS: &str =
    "block_number, previous_hash, timestamp_ms, entries, nonce, merkle_root, hash";

pub struct Queries;

impl Queries {
    pub async fn select_head<'e, E>(executor: E) -> Result<Option<BlockRow>, sqlx::Error>
    where
        E: Executor<'e, Database = Sqlite>,
    {
        let sql = format!(
            "SELECT {} FROM ledger_blocks ORDER BY block_number DESC LIMIT 1",
            BLOCK_COLUMNS
        );
        let row = sqlx::query(&sql).fetch_optional(executor).await?;
        row.as_ref().map(BlockRow::from_row).transpose()
    }

    pub async fn select_block<'e, E>(
        executor: E,
        block_number: i64,
    ) -> Result<Option<BlockRow>, sqlx::Error>
    where
        E: Executor<'e, Database = Sqlite>,
    {
        let sql = format!(
            "SELECT {} FROM ledger_blocks WHERE block_number = ?",
            BLOCK_COLUMNS
        );
        let row = sqlx::query(&sql)
            .bind(block_number)
            .fetch_optional(executor)
            .await?;
        row.as_ref().map(BlockRow::from_row).transpose()
    }

    pub async fn select_all<'e, E>(executor: E) -> Result<Vec<BlockRow>, sqlx::Error>
    where
        E: Executor<'e, Database = Sqlite>,
    {
        let sql = format!(
            "SELECT {} FROM ledger_blocks ORDER BY block_number ASC",
            BLOCK_COLUMNS
        );
        let rows = sqlx::query(&sql).fetch_all(executor).await?;
        rows.iter().map(BlockRow::from_row).collect()
    }

    /// Blocks holding at least one entry whose `reference_id` matches.
    pub async fn select_referencing<'e, E>(
        executor: E,
        reference_id: &str,
    ) -> Result<Vec<BlockRow>, sqlx::Error>
    where
        E: Executor<'e, Database = Sqlite>,
    {
        let sql = format!(
            r#"
            SELECT {} FROM ledger_blocks
            WHERE EXISTS (
                SELECT 1 FROM json_each(ledger_blocks.entries) AS entry
                WHERE json_extract(entry.value, '$.reference_id') = ?
            )
            ORDER BY block_number ASC
            "#,
            BLOCK_COLUMNS
        );
        let rows = sqlx::query(&sql)
            .bind(reference_id)
            .fetch_all(executor)
            .await?;
        rows.iter().map(BlockRow::from_row).collect()
    }

    pub async fn count_blocks<'e, E>(executor: E) -> Result<i64, sqlx::Error>
    where
        E: Executor<'e, Database = Sqlite>,
    {
        sqlx::query_scalar("SELECT COUNT(*) FROM ledger_blocks")
            .fetch_one(executor)
            .await
    }

    pub async fn insert_block<'e, E>(executor: E, row: &BlockRow) -> Result<(), sqlx::Error>
    where
        E: Executor<'e, Database = Sqlite>,
    {
        sqlx::query(
            r#"
            INSERT INTO ledger_blocks
            (block_number, previous_hash, timestamp_ms, entries, nonce, merkle_root, hash)
            VALUES (?, ?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(row.block_number)
        .bind(&row.previous_hash)
        .bind(row.timestamp_ms)
        .bind(&row.entries)
        .bind(row.nonce)
        .bind(&row.merkle_root)
        .bind(&row.hash)
        .execute(executor)
        .await?;

        Ok(())
    }
}
