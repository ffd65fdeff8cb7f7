use thiserror::Error;

impl From<serde_json::Error> for LedgerError {
    fn from(err: serde_json::Error) -> Self {
        Self::SerializationError(format!("JSON serialization error: {}", err))
    }
}

impl From<sqlx::Error> for LedgerError {
    fn from(err: sqlx::Error) -> Self {
        Self::DatabaseError(err.to_string())
    }
}

impl From<tokio::task::JoinError> for LedgerError {
    fn from(err: tokio::task::JoinError) -> Self {
        Self::TaskError(format!("Background task failed: {}", err))
    }
}

#[derive(Error, Debug)]
pub enum LedgerError {
    #[error("Configuration error: {0}")]
    ConfigError(String),

    #[error("Database error: {0}")]
    DatabaseError(String),

    #[error("Validation error: {0}")]
    ValidationError(String),

    #[error("Serialization error: {0}")]
    SerializationError(String),

    #[error("Concurrent append: head kept moving after {attempts} attempts")]
    ConcurrentAppend { attempts: u32 },

    #[error("Mining exhausted: no nonce found within {attempts} attempts")]
    MiningExhausted { attempts: u64 },

    #[error("Ledger is not initialized")]
    Uninitialized,

    #[error("Task error: {0}")]
    TaskError(String),
}

impl LedgerError {
    pub fn empty_entries() -> Self {
        Self::ValidationError("A block requires at least one ledger entry".to_string())
    }

    pub fn corrupt_row(block_number: i64, detail: impl std::fmt::Display) -> Self {
        Self::DatabaseError(format!(
            "Stored block {} could not be decoded: {}",
            block_number, detail
        ))
    }

    /// Whether a caller may retry the whole operation later.
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::ConcurrentAppend { .. })
    }
}

pub type Result<T> = std::result::Result<T, LedgerError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_concurrent_append_is_retryable() {
        assert!(LedgerError::ConcurrentAppend { attempts: 5 }.is_retryable());
        assert!(!LedgerError::Uninitialized.is_retryable());
        assert!(!LedgerError::empty_entries().is_retryable());
    }

    #[test]
    fn test_error_messages() {
        let err = LedgerError::ConcurrentAppend { attempts: 3 };
        assert_eq!(
            err.to_string(),
            "Concurrent append: head kept moving after 3 attempts"
        );

        let err = LedgerError::corrupt_row(7, "bad json");
        assert!(err.to_string().contains("Stored block 7"));
    }

    #[test]
    fn test_from_serde_json() {
        let parse: std::result::Result<serde_json::Value, _> = serde_json::from_str("{not json");
        let err: LedgerError = parse.unwrap_err().into();
        assert!(matches!(err, LedgerError::SerializationError(_)));
    }

    #[test]
    fn test_from_sqlx_is_prefixed_once() {
        let err: LedgerError = sqlx::Error::RowNotFound.into();
        let message = err.to_string();
        assert!(message.starts_with("Database error: "));
        assert_eq!(message.matches("Database error").count(), 1);
    }
}
