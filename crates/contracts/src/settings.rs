//! ServerSettings - Config Loader output
//!
//! Fully resolved, validated settings. Every other crate consumes this,
//! never the raw [`crate::SamplerConfig`].

use std::collections::BTreeSet;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::ChannelKind;

/// Resolved input source
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum InputSpec {
    /// Single archive file
    File { path: String },
    /// Files in `dir` whose names match the wildcard `pattern`
    FileSet { dir: String, pattern: String },
    /// Live publisher at `host:port`
    Endpoint { host: String, port: u16 },
    /// Live publisher(s) given as one `;`-separated `host:port` list
    HostString { hosts: String },
}

impl InputSpec {
    /// Short human-readable description
    pub fn describe(&self) -> String {
        match self {
            Self::File { path } => format!("file {}", path),
            Self::FileSet { dir, pattern } => format!("files {}/{}", dir, pattern),
            Self::Endpoint { host, port } => format!("subscriber {}:{}", host, port),
            Self::HostString { hosts } => format!("subscriber {}", hosts),
        }
    }
}

/// How requests are answered
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SplitMode {
    /// Full timeslices, one per request, bypassing the buffer
    #[default]
    NoSplit,
    /// One target per known system
    PerSystem,
    /// One target per configured block
    PerBlock,
}

impl SplitMode {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::NoSplit => "no_split",
            Self::PerSystem => "per_system",
            Self::PerBlock => "per_block",
        }
    }
}

/// Named group of systems served together
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Block {
    pub name: String,
    /// Member system ids, ascending
    pub systems: BTreeSet<u16>,
}

/// One named channel bound to a transport
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChannelBinding {
    pub name: String,
    pub kind: ChannelKind,
    pub address: String,
}

/// Resolved channel bindings; `None` = disabled
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChannelSettings {
    pub request: ChannelBinding,
    pub missed_indices: Option<ChannelBinding>,
    pub commands: Option<ChannelBinding>,
    pub metrics: Option<ChannelBinding>,
}

/// Monitoring publication settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MonitoringSettings {
    pub publish_every: u32,
    pub min_interval: Duration,
    pub max_interval: Duration,
    pub histogram_suffix: String,
}

impl MonitoringSettings {
    /// Monitoring is active only with a metrics channel and a non-zero period
    pub fn enabled(&self, channels: &ChannelSettings) -> bool {
        channels.metrics.is_some() && self.publish_every > 0
    }
}

/// Fully resolved server settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ServerSettings {
    pub input: InputSpec,

    /// Buffer capacity (>= 1)
    pub high_water_mark: usize,

    /// Ingestion limit, `None` = unbounded
    pub max_timeslices: Option<u64>,

    pub mode: SplitMode,

    /// Blocks in order of first appearance
    pub blocks: Vec<Block>,

    pub channels: ChannelSettings,

    pub monitoring: MonitoringSettings,

    pub stop_grace: Duration,

    pub eof_grace: Duration,

    /// Non-fatal findings of the resolution (e.g. conflicting mode flags)
    #[serde(default)]
    pub warnings: Vec<String>,
}

impl ServerSettings {
    /// Number of split targets in the selected mode
    pub fn target_count(&self) -> usize {
        match self.mode {
            SplitMode::NoSplit => 0,
            SplitMode::PerSystem => crate::SYSTEMS.len(),
            SplitMode::PerBlock => self.blocks.len(),
        }
    }

    /// Whether the monitoring publisher is active
    pub fn monitoring_enabled(&self) -> bool {
        self.monitoring.enabled(&self.channels)
    }
}
