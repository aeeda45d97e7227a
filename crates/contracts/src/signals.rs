//! ControlSignals trait - side effects of ingestion and dispatch
//!
//! Implemented by the dispatcher's command channel; ingestion only sees this
//! trait.

use crate::ContractError;

/// Gap reports and lifecycle commands
#[trait_variant::make(ControlSignals: Send)]
pub trait LocalControlSignals {
    /// Report skipped timeslice indices (ascending)
    ///
    /// # Errors
    /// A failed send must be escalated by the caller
    async fn report_missed(&mut self, indices: &[u64]) -> Result<(), ContractError>;

    /// Announce end of stream after the EOF grace delay (fire-and-forget)
    async fn announce_eof(&mut self, last_index: u64, count: u64);

    /// Ask downstream to stop after the STOP grace delay (fire-and-forget)
    async fn announce_stop(&mut self);
}
