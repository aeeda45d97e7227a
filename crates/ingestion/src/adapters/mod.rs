//! Timeslice source adapters

mod archive;
mod merge;
mod subscriber;

pub use archive::{resolve_file_set, write_archive, ArchiveSource};
pub use merge::MergedStreams;
pub use subscriber::{split_host_string, SubscriberSource};

use contracts::{ContractError, InputSpec, Timeslice, TimesliceSource};

use crate::error::{IngestionError, Result};

/// Any supported source, selected from the resolved input
pub enum SourceAdapter {
    Archive(ArchiveSource),
    ArchiveSet(MergedStreams<ArchiveSource>),
    Subscriber(SubscriberSource),
    SubscriberSet(MergedStreams<SubscriberSource>),
}

impl SourceAdapter {
    /// Build the adapter for an input; nothing is opened yet
    ///
    /// File sets are resolved here, so a pattern matching no file fails early.
    pub fn from_input(input: &InputSpec) -> Result<Self> {
        match input {
            InputSpec::File { path } => Ok(Self::Archive(ArchiveSource::new(path))),
            InputSpec::FileSet { dir, pattern } => {
                let files = resolve_file_set(dir, pattern)
                    .map_err(|e| IngestionError::open_failed(input.describe(), e.to_string()))?;
                let sources = files.into_iter().map(ArchiveSource::new).collect();
                Ok(Self::ArchiveSet(MergedStreams::new(input.describe(), sources)))
            }
            InputSpec::Endpoint { host, port } => Ok(Self::Subscriber(SubscriberSource::new(
                &format!("{host}:{port}"),
            ))),
            InputSpec::HostString { hosts } => {
                let mut addresses = split_host_string(hosts);
                match addresses.len() {
                    0 => Err(IngestionError::open_failed(
                        input.describe(),
                        "host string contains no address",
                    )),
                    1 => Ok(Self::Subscriber(SubscriberSource::new(&addresses.remove(0)))),
                    _ => {
                        let sources = addresses.iter().map(|a| SubscriberSource::new(a)).collect();
                        Ok(Self::SubscriberSet(MergedStreams::new(input.describe(), sources)))
                    }
                }
            }
        }
    }
}

impl TimesliceSource for SourceAdapter {
    fn name(&self) -> &str {
        match self {
            Self::Archive(s) => s.name(),
            Self::ArchiveSet(s) => s.name(),
            Self::Subscriber(s) => s.name(),
            Self::SubscriberSet(s) => s.name(),
        }
    }

    async fn connect(&mut self) -> std::result::Result<(), ContractError> {
        match self {
            Self::Archive(s) => s.connect().await,
            Self::ArchiveSet(s) => s.connect().await,
            Self::Subscriber(s) => s.connect().await,
            Self::SubscriberSet(s) => s.connect().await,
        }
    }

    async fn next_timeslice(&mut self) -> std::result::Result<Option<Timeslice>, ContractError> {
        match self {
            Self::Archive(s) => s.next_timeslice().await,
            Self::ArchiveSet(s) => s.next_timeslice().await,
            Self::Subscriber(s) => s.next_timeslice().await,
            Self::SubscriberSet(s) => s.next_timeslice().await,
        }
    }
}
