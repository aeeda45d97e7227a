//! SamplerConfig - Config Loader input
//!
//! Raw, user-facing configuration as read from TOML/JSON and CLI flags.
//! Resolved into [`crate::ServerSettings`] by the config loader.

use serde::{Deserialize, Serialize};
use validator::Validate;

/// Complete sampler configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize, Validate)]
pub struct SamplerConfig {
    /// Timeslice input
    #[serde(default)]
    pub input: InputConfig,

    /// Sliding window settings
    #[serde(default)]
    #[validate(nested)]
    pub buffer: BufferConfig,

    /// Split mode flags and block definitions
    #[serde(default)]
    pub split: SplitConfig,

    /// Channel names and their transports
    #[serde(default)]
    pub channels: ChannelsConfig,

    /// Monitoring publication
    #[serde(default)]
    #[validate(nested)]
    pub monitoring: MonitoringConfig,

    /// Grace delays before lifecycle commands
    #[serde(default)]
    pub shutdown: ShutdownConfig,
}

/// Input source selection
///
/// Valid combinations: file only, file pattern + directory,
/// host + port, host string only.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct InputConfig {
    /// Archive file, or wildcard pattern when `dirname` is set
    #[serde(default)]
    pub filename: String,

    /// Directory searched with the `filename` pattern
    #[serde(default)]
    pub dirname: String,

    /// Publisher host (or full host string when `port` is 0)
    #[serde(default)]
    pub host: String,

    /// Publisher port
    #[serde(default)]
    pub port: u16,
}

/// Buffer settings
#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
pub struct BufferConfig {
    /// Maximum number of buffered timeslices
    #[serde(default = "default_high_water_mark")]
    #[validate(range(min = 1))]
    pub high_water_mark: u64,

    /// Stop after this many timeslices (0 = unbounded)
    #[serde(default)]
    pub max_timeslices: u64,
}

fn default_high_water_mark() -> u64 {
    1
}

impl Default for BufferConfig {
    fn default() -> Self {
        Self {
            high_water_mark: default_high_water_mark(),
            max_timeslices: 0,
        }
    }
}

/// Split mode flags
///
/// Several flags may be set; precedence is resolved by the config loader.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SplitConfig {
    #[serde(default)]
    pub no_split: bool,

    #[serde(default)]
    pub per_system: bool,

    #[serde(default)]
    pub per_block: bool,

    /// `name:systemId` pairs, system id in decimal or `0x` hex
    #[serde(default)]
    pub blocks: Vec<String>,
}

/// Channel names
///
/// An empty name disables the corresponding side channel.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChannelsConfig {
    #[serde(default = "default_request_channel")]
    pub request: String,

    #[serde(default)]
    pub missed_indices: String,

    #[serde(default)]
    pub commands: String,

    #[serde(default)]
    pub metrics: String,

    /// Transport bound to each channel name
    #[serde(default)]
    pub endpoints: Vec<ChannelEndpoint>,
}

fn default_request_channel() -> String {
    "ts-request".to_string()
}

impl Default for ChannelsConfig {
    fn default() -> Self {
        Self {
            request: default_request_channel(),
            missed_indices: String::new(),
            commands: String::new(),
            metrics: String::new(),
            endpoints: Vec::new(),
        }
    }
}

/// Transport of one named channel
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChannelEndpoint {
    pub name: String,

    #[serde(default)]
    pub kind: ChannelKind,

    /// `host:port`; bind address for the request channel, peer otherwise
    #[serde(default)]
    pub address: String,
}

/// Channel transport kind
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ChannelKind {
    /// Length-prefixed frames over TCP
    #[default]
    Tcp,
    /// Log a summary of each message, never fails
    Log,
}

/// Monitoring publication settings
#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
pub struct MonitoringConfig {
    /// Publish every N sent messages (0 = monitoring off)
    #[serde(default = "default_publish_every")]
    pub publish_every: u32,

    /// Minimal interval between two publications (s)
    #[serde(default = "default_min_interval")]
    #[validate(range(min = 0.0))]
    pub min_interval_s: f64,

    /// Maximal interval between two publications (s)
    #[serde(default = "default_max_interval")]
    #[validate(range(min = 0.0))]
    pub max_interval_s: f64,

    /// Suffix appended to histogram, canvas and folder names
    #[serde(default)]
    pub histogram_suffix: String,
}

fn default_publish_every() -> u32 {
    100
}

fn default_min_interval() -> f64 {
    1.0
}

fn default_max_interval() -> f64 {
    10.0
}

impl Default for MonitoringConfig {
    fn default() -> Self {
        Self {
            publish_every: default_publish_every(),
            min_interval_s: default_min_interval(),
            max_interval_s: default_max_interval(),
            histogram_suffix: String::new(),
        }
    }
}

/// Grace delays
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ShutdownConfig {
    /// Delay before STOP (ms)
    #[serde(default = "default_stop_grace_ms")]
    pub stop_grace_ms: u64,

    /// Delay before EOF (ms)
    #[serde(default = "default_eof_grace_ms")]
    pub eof_grace_ms: u64,
}

fn default_stop_grace_ms() -> u64 {
    1_000
}

fn default_eof_grace_ms() -> u64 {
    10_000
}

impl Default for ShutdownConfig {
    fn default() -> Self {
        Self {
            stop_grace_ms: default_stop_grace_ms(),
            eof_grace_ms: default_eof_grace_ms(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_from_empty_json() {
        let config: SamplerConfig = serde_json::from_str("{}").unwrap();
        assert_eq!(config.buffer.high_water_mark, 1);
        assert_eq!(config.channels.request, "ts-request");
        assert_eq!(config.monitoring.publish_every, 100);
        assert_eq!(config.shutdown.eof_grace_ms, 10_000);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_zero_high_water_mark_rejected() {
        let config: SamplerConfig =
            serde_json::from_str(r#"{ "buffer": { "high_water_mark": 0 } }"#).unwrap();
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_channel_kind_snake_case() {
        let endpoint: ChannelEndpoint =
            serde_json::from_str(r#"{ "name": "cmd", "kind": "log" }"#).unwrap();
        assert_eq!(endpoint.kind, ChannelKind::Log);
        assert!(endpoint.address.is_empty());
    }
}
