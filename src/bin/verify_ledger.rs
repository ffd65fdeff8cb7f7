//! Ledger Verification CLI
//!
//! Opens a ledger database, walks the whole chain and reports the first
//! integrity break. Exits non-zero when the chain is invalid.

use anyhow::{anyhow, Result};
use clap::Parser;
use tracing::{error, info};

use fund_ledger::config::{AppConfig, LedgerConfig};
use fund_ledger::database::Database;
use fund_ledger::Ledger;

#[derive(Parser)]
#[command(name = "verify-ledger")]
#[command(version, about = "Verify fund ledger chain integrity")]
struct Cli {
    /// Database URL (defaults to DATABASE_URL)
    #[arg(short, long)]
    database_url: Option<String>,

    /// Leading zero hex digits required of every block hash (defaults to LEDGER_DIFFICULTY)
    #[arg(long)]
    difficulty: Option<u32>,

    /// Also print the recorded history of this reference id
    #[arg(short, long)]
    reference: Option<String>,

    /// Enable verbose output
    #[arg(short, long)]
    verbose: bool,

    /// Suppress output except errors
    #[arg(short, long, conflicts_with = "verbose")]
    quiet: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let level = if cli.quiet {
        tracing::Level::ERROR
    } else if cli.verbose {
        tracing::Level::DEBUG
    } else {
        tracing::Level::INFO
    };
    tracing_subscriber::fmt().with_max_level(level).init();

    match verify_ledger(&cli).await {
        Ok(true) => {
            if !cli.quiet {
                println!("✓ Ledger verification completed successfully");
            }
            Ok(())
        }
        Ok(false) => std::process::exit(1),
        Err(e) => {
            error!("Ledger verification failed: {}", e);
            std::process::exit(2);
        }
    }
}

fn resolve_config(cli: &Cli) -> Result<(String, LedgerConfig)> {
    let config = AppConfig::load()?;
    let database_url = cli.database_url.clone().unwrap_or(config.database_url);
    let ledger = LedgerConfig {
        difficulty: cli.difficulty.unwrap_or(config.ledger.difficulty),
        ..config.ledger
    };
    Ok((database_url, ledger))
}

/// Returns whether the chain verified.
async fn verify_ledger(cli: &Cli) -> Result<bool> {
    let (database_url, config) = resolve_config(cli)?;
    info!("Verifying ledger: {}", database_url);

    let database = Database::new(&database_url).await?;
    database.run_migrations().await?;
    let ledger = Ledger::new(database, config)?;

    if ledger.database().head_ref().await?.is_none() {
        return Err(anyhow!("Ledger is empty: {}", database_url));
    }

    let report = ledger.validate_chain().await?;
    let stats = ledger.get_chain_stats().await?;

    if !cli.quiet {
        println!("Ledger Summary:");
        println!("  Blocks: {}", stats.block_count);
        println!("  Entries: {}", stats.entry_count);
        if let Some(hash) = &stats.head_hash {
            println!("  Head hash: {}", hash);
        }
        println!("  Difficulty: {}", ledger.config().difficulty);
    }

    if cli.verbose {
        println!("\nEntry kind distribution:");
        for (kind, count) in &stats.entry_kind_counts {
            println!("  {}: {}", kind, count);
        }
    }

    if let Some(reference_id) = &cli.reference {
        let records = ledger.get_history(reference_id).await?;
        println!("\nHistory of {} ({} entries):", reference_id, records.len());
        for record in records {
            println!(
                "  block #{} {} {} {}",
                record.block_number, record.timestamp, record.kind, record.payload
            );
        }
    }

    if report.valid {
        Ok(true)
    } else {
        error!("{}", report.summary());
        if !cli.quiet {
            println!("✗ {}", report.summary());
        }
        Ok(false)
    }
}
