//! Dispatcher error types

use contracts::ContractError;
use ingestion::IngestionError;
use split_engine::SplitError;
use thiserror::Error;

/// Request handling errors
#[derive(Debug, Error)]
pub enum DispatchError {
    /// Nothing left to serve; benign
    #[error("timeslice stream exhausted")]
    Exhausted,

    /// Request payload names no known system or block
    #[error("unknown request target '{request}'")]
    UnknownTarget { request: String },

    /// Combiner error other than exhaustion
    #[error("split error: {0}")]
    Split(SplitError),

    /// Ingestion error (failed gap report)
    #[error("ingestion error: {0}")]
    Ingestion(#[from] IngestionError),

    /// Encoding or channel error
    #[error("channel error: {0}")]
    Channel(#[from] ContractError),
}

impl DispatchError {
    pub fn unknown_target(request: impl Into<String>) -> Self {
        Self::UnknownTarget {
            request: request.into(),
        }
    }

    pub fn is_exhausted(&self) -> bool {
        matches!(self, Self::Exhausted)
    }
}

impl From<SplitError> for DispatchError {
    fn from(err: SplitError) -> Self {
        match err {
            SplitError::Exhausted => Self::Exhausted,
            SplitError::Ingestion(e) => Self::Ingestion(e),
            other => Self::Split(other),
        }
    }
}
