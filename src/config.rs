use serde::{Deserialize, Serialize};
use std::env;

use crate::error::LedgerError;

/// Highest difficulty accepted; each step multiplies expected mining work by 16.
pub const MAX_DIFFICULTY: u32 = 16;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AppConfig {
    pub database_url: String,
    pub server_host: String,
    pub server_port: u16,
    pub ledger: LedgerConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct LedgerConfig {
    /// Required count of leading zero hex digits in a sealed block hash.
    pub difficulty: u32,
    /// Head reloads allowed before an append gives up.
    pub max_append_retries: u32,
    /// Nonces tried per candidate before mining gives up.
    pub max_nonce_attempts: u64,
}

impl Default for LedgerConfig {
    fn default() -> Self {
        Self {
            difficulty: 2,
            max_append_retries: 5,
            max_nonce_attempts: 100_000_000,
        }
    }
}

impl LedgerConfig {
    pub fn validate(&self) -> Result<(), LedgerError> {
        if self.difficulty == 0 || self.difficulty > MAX_DIFFICULTY {
            return Err(LedgerError::ConfigError(format!(
                "difficulty ({}) must be between 1 and {}",
                self.difficulty, MAX_DIFFICULTY
            )));
        }

        if self.max_append_retries == 0 {
            return Err(LedgerError::ConfigError(
                "max_append_retries must be at least 1".to_string(),
            ));
        }

        if self.max_nonce_attempts == 0 {
            return Err(LedgerError::ConfigError(
                "max_nonce_attempts must be at least 1".to_string(),
            ));
        }

        Ok(())
    }
}

impl AppConfig {
    pub fn load() -> Result<Self, LedgerError> {
        let database_url = env::var("DATABASE_URL")
            .unwrap_or_else(|_| "sqlite://fund-ledger.db?mode=rwc".to_string());

        let server_host = env::var("SERVER_HOST").unwrap_or_else(|_| "0.0.0.0".to_string());

        let server_port = parse_var("SERVER_PORT", 3000)?;

        let defaults = LedgerConfig::default();
        let ledger = LedgerConfig {
            difficulty: parse_var("LEDGER_DIFFICULTY", defaults.difficulty)?,
            max_append_retries: parse_var("LEDGER_MAX_APPEND_RETRIES", defaults.max_append_retries)?,
            max_nonce_attempts: parse_var("LEDGER_MAX_NONCE_ATTEMPTS", defaults.max_nonce_attempts)?,
        };
        ledger.validate()?;

        Ok(AppConfig {
            database_url,
            server_host,
            server_port,
            ledger,
        })
    }
}

fn parse_var<T>(name: &str, default: T) -> Result<T, LedgerError>
where
    T: std::str::FromStr,
    T::Err: std::fmt::Display,
{
    match env::var(name) {
        Ok(raw) => raw.trim().parse().map_err(|e| {
            LedgerError::ConfigError(format!("{} has invalid value {:?}: {}", name, raw, e))
        }),
        Err(_) => Ok(default),
    }
}
