//! TimesliceSource trait - Ingestion input interface
//!
//! Pull interface over any upstream producer of timeslices.

use crate::{ContractError, Timeslice};

/// Upstream timeslice producer
///
/// `connect` is called once, lazily, before the first `next_timeslice`.
/// `Ok(None)` means the stream is exhausted.
#[trait_variant::make(TimesliceSource: Send)]
pub trait LocalTimesliceSource {
    /// Source name (used for logging)
    fn name(&self) -> &str;

    /// Open files or connect to the publisher
    async fn connect(&mut self) -> Result<(), ContractError>;

    /// Next timeslice in stream order
    async fn next_timeslice(&mut self) -> Result<Option<Timeslice>, ContractError>;
}
