//! Server orchestration module.

mod orchestrator;
mod stats;

pub use orchestrator::{Server, ServerConfig};
pub use stats::RunStats;
