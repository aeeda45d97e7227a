//! # Contracts
//!
//! Frozen interface contracts shared by every crate of the sampler workspace.
//! Business crates depend on this crate only, never on each other's internals
//! for data definitions.
//!
//! ## Index model
//! - A timeslice is identified by its monotonically non-decreasing `index`
//! - Gaps in the index sequence are meaningful and reported downstream
//! - Microslice descriptors carry the start time (`idx`, nanoseconds)

mod channel;
mod config;
mod error;
mod settings;
mod signals;
mod source;
mod system;
mod timeslice;
pub mod wire;

pub use channel::{LocalMessageChannel, LocalRequestChannel, MessageChannel, RequestChannel};
pub use config::*;
pub use error::*;
pub use settings::*;
pub use signals::{ControlSignals, LocalControlSignals};
pub use source::{LocalTimesliceSource, TimesliceSource};
pub use system::{SystemId, SystemInfo, SYSTEMS};
pub use timeslice::*;
