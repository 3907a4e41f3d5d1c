//! Error types for TetherWave Core

use thiserror::Error;

/// Core domain errors
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum CoreError {
    #[error("Invalid address: {0}")]
    InvalidAddress(String),

    #[error("Invalid amount: {0}")]
    InvalidAmount(String),

    #[error("Unknown income type code: {0}")]
    UnknownIncomeType(u8),

    #[error("Invalid level: {0}")]
    InvalidLevel(u8),

    #[error("Tier index out of range: {index} (tier count {count})")]
    TierOutOfRange { index: usize, count: usize },

    /// Parallel ledger columns disagree on length
    #[error("Column length mismatch for {field}: expected {expected}, got {actual}")]
    LengthMismatch {
        field: &'static str,
        expected: usize,
        actual: usize,
    },
}

/// Result type alias for core operations
pub type CoreResult<T> = Result<T, CoreError>;
