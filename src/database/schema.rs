// Database schema definitions and migrations

pub const LEDGER_BLOCKS_SCHEMA: &str = include_str!("../../migrations/001_ledger_blocks.sql");

/// Ordered migrations applied by `Database::run_migrations`.
pub const MIGRATIONS: &[(&str, &str)] = &[("001_ledger_blocks", LEDGER_BLOCKS_SCHEMA)];
