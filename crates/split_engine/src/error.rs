//! Split Engine 错误类型

use ingestion::IngestionError;
use thiserror::Error;

/// Combiner errors
#[derive(Debug, Error)]
pub enum SplitError {
    /// No unserved timeslice left and the source is exhausted
    #[error("timeslice stream exhausted")]
    Exhausted,

    /// Target index outside the table of the selected mode
    #[error("unknown split target {target} ({count} targets)")]
    UnknownTarget { target: usize, count: usize },

    /// Ingestion failed (not exhaustion)
    #[error("ingestion error: {0}")]
    Ingestion(#[from] IngestionError),
}

impl SplitError {
    pub fn is_exhausted(&self) -> bool {
        matches!(self, Self::Exhausted)
    }
}
