//! # Ingestion
//!
//! Timeslice ingestion module.
//!
//! Responsibilities:
//! - Open the configured source (archive file, file set, live subscriber)
//! - Pull timeslices on demand, one at a time
//! - Maintain run counters, detect index gaps, enforce the timeslice limit
//! - Announce end-of-stream through the control signals
//!
//! ## Usage Example
//!
//! ```ignore
//! use ingestion::{Ingestor, SourceAdapter};
//!
//! let source = SourceAdapter::from_input(&settings.input)?;
//! let mut ingestor = Ingestor::new(source, settings.max_timeslices);
//!
//! while let Some(ts) = ingestor.fetch_next(&mut signals).await? {
//!     // Serve timeslice
//! }
//! ```
//!
//! ## Mock Testing
//!
//! ```ignore
//! use ingestion::{MockTimesliceSource, RecordingSignals};
//!
//! let source = MockTimesliceSource::from_indices(&[0, 1, 2, 5], &[0x10, 0x60]);
//! let mut signals = RecordingSignals::new();
//! ```

mod adapters;
mod error;
mod ingestor;
mod mock;

// Re-exports
pub use adapters::{
    resolve_file_set, split_host_string, write_archive, ArchiveSource, MergedStreams,
    SourceAdapter, SubscriberSource,
};
pub use error::{IngestionError, Result};
pub use ingestor::{compute_missed, Ingestor};
pub use mock::{make_timeslice, MockTimesliceSource, RecordingSignals};
