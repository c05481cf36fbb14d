//! Ledger error types.

use thiserror::Error;

use super::models::GameId;

/// Ledger errors
#[derive(Debug, Error)]
pub enum LedgerError {
    /// Database error
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    /// Insufficient balance
    #[error("Insufficient balance for user {user_id}: available {available}, required {required}")]
    InsufficientBalance {
        user_id: i64,
        available: i64,
        required: i64,
    },

    /// Account not found
    #[error("Account not found for user {0}")]
    AccountNotFound(i64),

    /// Game record not found
    #[error("Game record {0} not found")]
    GameNotFound(GameId),

    /// Duplicate transaction (idempotency key already used)
    #[error("Duplicate transaction: {0}")]
    DuplicateTransaction(String),

    /// Invalid amount (must be positive)
    #[error("Invalid amount: {0}")]
    InvalidAmount(i64),

    /// Balance overflow
    #[error("Balance overflow")]
    BalanceOverflow,
}

impl LedgerError {
    /// Client-safe message that does not leak internal identifiers or
    /// SQL details.
    pub fn client_message(&self) -> String {
        match self {
            LedgerError::Database(_) => "Internal server error".to_string(),
            LedgerError::AccountNotFound(_) => "Account not found".to_string(),
            LedgerError::GameNotFound(_) => "Game record not found".to_string(),
            LedgerError::InsufficientBalance { .. } => "Insufficient balance".to_string(),
            _ => self.to_string(),
        }
    }
}

/// Result type for ledger operations
pub type LedgerResult<T> = Result<T, LedgerError>;
