//! Error types for CLI operations.

use contracts::ContractError;
use thiserror::Error;

/// CLI-specific error types
#[derive(Error, Debug)]
pub enum CliError {
    /// Configuration file not found
    #[error("Configuration file not found: {path}")]
    ConfigNotFound { path: String },

    /// Configuration could not be read, parsed or resolved
    #[error("Invalid configuration: {0}")]
    Config(#[from] ContractError),

    /// A command line value could not be parsed
    #[error("Invalid value '{value}' for --{arg}: {message}")]
    InvalidArgument {
        arg: String,
        value: String,
        message: String,
    },

    /// Timeslice source could not be opened
    #[error("Failed to open input: {0}")]
    Source(#[from] ingestion::IngestionError),

    /// Request channel could not be bound
    #[error("Failed to bind request channel '{channel}': {message}")]
    Bind { channel: String, message: String },
}

impl CliError {
    pub fn config_not_found(path: impl Into<String>) -> Self {
        Self::ConfigNotFound { path: path.into() }
    }

    pub fn invalid_argument(
        arg: impl Into<String>,
        value: impl Into<String>,
        message: impl Into<String>,
    ) -> Self {
        Self::InvalidArgument {
            arg: arg.into(),
            value: value.into(),
            message: message.into(),
        }
    }

    pub fn bind(channel: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Bind {
            channel: channel.into(),
            message: message.into(),
        }
    }
}

/// Result type alias for CLI operations
pub type Result<T> = std::result::Result<T, CliError>;
