//! CLI Error Types

use thiserror::Error;
use tw_engine::EngineError;

/// CLI-specific errors
#[derive(Error, Debug)]
pub enum CliError {
    /// Configuration error
    #[error("Configuration error: {message}")]
    ConfigError { message: String },

    /// Invalid argument
    #[error("Invalid argument: {message}")]
    InvalidArgument { message: String },

    /// File I/O error
    #[error("File I/O error: {0}")]
    IoError(#[from] std::io::Error),

    /// JSON formatting error
    #[error("JSON error: {0}")]
    JsonError(#[from] serde_json::Error),

    /// Engine error
    #[error("{}", .0.user_message())]
    EngineError(#[from] EngineError),

    /// Core error
    #[error("Core error: {0}")]
    CoreError(#[from] tw_core::CoreError),
}

/// CLI result type
pub type CliResult<T> = Result<T, CliError>;

impl CliError {
    /// Create a configuration error
    pub fn config(message: impl Into<String>) -> Self {
        CliError::ConfigError {
            message: message.into(),
        }
    }

    /// Create an invalid argument error
    pub fn invalid_arg(message: impl Into<String>) -> Self {
        CliError::InvalidArgument {
            message: message.into(),
        }
    }

    /// Get exit code for this error
    pub fn exit_code(&self) -> i32 {
        match self {
            CliError::ConfigError { .. } => 1,
            CliError::InvalidArgument { .. } => 2,
            CliError::IoError(_) => 5,
            CliError::JsonError(_) => 6,
            CliError::EngineError(e) => match e {
                EngineError::Configuration(_) => 1,
                EngineError::Validation(_) => 2,
                EngineError::Network(_) | EngineError::Read(_) => 3,
                EngineError::Write { .. } | EngineError::ReceiptFailed { .. } => 4,
                _ => 10,
            },
            CliError::CoreError(_) => 12,
        }
    }
}
