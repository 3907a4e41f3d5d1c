//! Engine Error Types
//!
//! One enum for every failure the engine can surface. The variants follow the
//! read / validation / write / configuration split: read failures are usually
//! swallowed by the component that issued them, write failures always reach
//! the caller.

use thiserror::Error;
use tw_core::{ClassifiedFailure, CoreError, FailureCause};

/// Engine Error
#[derive(Error, Debug)]
pub enum EngineError {
    /// Transient read failure
    #[error("Ledger read failed: {0}")]
    Read(String),

    /// Precondition not met before a write was submitted
    #[error("Validation failed: {0}")]
    Validation(String),

    /// Submitted write reverted or was rejected
    #[error("Write failed ({cause}): {message}")]
    Write { cause: FailureCause, message: String },

    /// Transaction mined with a non-success status
    #[error("Transaction {tx_hash} failed on chain")]
    ReceiptFailed { tx_hash: String },

    /// Missing or invalid configuration for an operation
    #[error("Configuration error: {0}")]
    Configuration(String),

    /// Transport error
    #[error("Network error: {0}")]
    Network(String),

    /// JSON-RPC error object returned by the gateway
    #[error("RPC error {code}: {message}")]
    Rpc { code: i64, message: String },

    /// Response did not have the expected shape
    #[error("Decode error: {0}")]
    Decode(String),

    /// Cooldown store failure
    #[error("Storage error: {0}")]
    Storage(String),

    /// Backend profile service error
    #[error("Backend error (HTTP {status}): {message}")]
    Backend { status: u16, message: String },

    /// Domain error from tw-core
    #[error(transparent)]
    Core(#[from] CoreError),
}

/// Engine Result type
pub type EngineResult<T> = Result<T, EngineError>;

impl EngineError {
    /// Build a write error from raw failure text
    pub fn write(raw: impl AsRef<str>) -> Self {
        tw_core::classify_failure(raw.as_ref()).into()
    }

    /// Cause of a failed write, `None` for every other variant
    pub fn failure_cause(&self) -> Option<FailureCause> {
        match self {
            EngineError::Write { cause, .. } => Some(*cause),
            _ => None,
        }
    }

    /// Message suitable for showing to the participant
    pub fn user_message(&self) -> String {
        match self {
            EngineError::Write { cause, message } => ClassifiedFailure {
                cause: *cause,
                raw: message.clone(),
            }
            .user_message(),
            EngineError::ReceiptFailed { .. } => "Transaction failed on chain".to_string(),
            other => other.to_string(),
        }
    }

    pub fn is_configuration(&self) -> bool {
        matches!(self, EngineError::Configuration(_))
    }
}

impl From<ClassifiedFailure> for EngineError {
    fn from(f: ClassifiedFailure) -> Self {
        EngineError::Write {
            cause: f.cause,
            message: f.raw,
        }
    }
}

impl From<reqwest::Error> for EngineError {
    fn from(e: reqwest::Error) -> Self {
        EngineError::Network(e.to_string())
    }
}

impl From<serde_json::Error> for EngineError {
    fn from(e: serde_json::Error) -> Self {
        EngineError::Decode(e.to_string())
    }
}

impl From<sled::Error> for EngineError {
    fn from(e: sled::Error) -> Self {
        EngineError::Storage(e.to_string())
    }
}

impl From<hex::FromHexError> for EngineError {
    fn from(e: hex::FromHexError) -> Self {
        EngineError::Decode(format!("Hex decode error: {}", e))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_write_is_classified() {
        let err = EngineError::write("execution reverted: 0xfb8f41b2");
        assert_eq!(err.failure_cause(), Some(FailureCause::InsufficientAllowance));
        assert!(err.user_message().contains("allowance"));

        let err = EngineError::write("out of gas");
        assert_eq!(err.failure_cause(), Some(FailureCause::Generic));
        assert_eq!(err.user_message(), "out of gas");
    }

    #[test]
    fn test_configuration_is_distinct() {
        let err = EngineError::Configuration("signer token missing".into());
        assert!(err.is_configuration());
        assert_eq!(err.failure_cause(), None);
        assert!(!EngineError::Validation("x".into()).is_configuration());
    }
}
