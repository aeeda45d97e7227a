//! CLI argument definitions using clap.

use clap::{Args, Parser, Subcommand, ValueEnum};
use contracts::{ChannelEndpoint, ChannelKind, SamplerConfig};
use std::path::PathBuf;
use tracing::info;

use crate::error::{CliError, Result};

/// TS Sampler - timeslice sampling and distribution server
#[derive(Parser, Debug)]
#[command(
    name = "ts-sampler",
    author,
    version,
    about = "Timeslice sampling and distribution server",
    long_about = "Reads timeslices from archive files or a live publisher and hands them\n\
                  out to consumers on request, either whole or split per system or per\n\
                  block of systems. Missed indices, lifecycle commands and monitoring\n\
                  histograms go out on optional side channels."
)]
pub struct Cli {
    /// Increase logging verbosity (-v for debug, -vv for trace)
    #[arg(short, long, action = clap::ArgAction::Count, global = true, env = "TS_SAMPLER_VERBOSE")]
    pub verbose: u8,

    /// Suppress all output except warnings and errors
    #[arg(short, long, global = true, conflicts_with = "verbose")]
    pub quiet: bool,

    /// Log output format
    #[arg(
        long,
        value_enum,
        default_value = "pretty",
        global = true,
        env = "TS_SAMPLER_LOG_FORMAT"
    )]
    pub log_format: LogFormat,

    #[command(subcommand)]
    pub command: Commands,
}

/// Available CLI commands
#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Serve timeslices until the request transport closes or a signal arrives
    Run(RunArgs),

    /// Validate configuration without serving
    Validate(ValidateArgs),

    /// Display the resolved settings
    Info(InfoArgs),
}

/// Arguments for the `run` command
#[derive(Parser, Debug, Clone)]
pub struct RunArgs {
    #[command(flatten)]
    pub config: ConfigArgs,

    /// Resolve the configuration, print it and exit
    #[arg(long)]
    pub dry_run: bool,

    /// Prometheus exporter port (0 = disabled)
    #[arg(long, default_value = "0", env = "TS_SAMPLER_METRICS_PORT")]
    pub metrics_port: u16,
}

/// Arguments for the `validate` command
#[derive(Parser, Debug)]
pub struct ValidateArgs {
    #[command(flatten)]
    pub config: ConfigArgs,

    /// Output validation result as JSON
    #[arg(long)]
    pub json: bool,
}

/// Arguments for the `info` command
#[derive(Parser, Debug)]
pub struct InfoArgs {
    #[command(flatten)]
    pub config: ConfigArgs,

    /// Output as JSON
    #[arg(long)]
    pub json: bool,

    /// Show the monitoring histogram layout
    #[arg(long)]
    pub histograms: bool,
}

/// Configuration file plus flag overrides, shared by every command
#[derive(Args, Debug, Clone, Default)]
pub struct ConfigArgs {
    /// Path to configuration file (TOML or JSON)
    #[arg(short, long, env = "TS_SAMPLER_CONFIG")]
    pub config: Option<PathBuf>,

    /// Archive file, or wildcard pattern with --dirname
    #[arg(long, env = "TS_SAMPLER_FILENAME")]
    pub filename: Option<String>,

    /// Directory searched with the --filename pattern
    #[arg(long, env = "TS_SAMPLER_DIRNAME")]
    pub dirname: Option<String>,

    /// Publisher host, or a `;`-separated host:port list without --port
    #[arg(long, env = "TS_SAMPLER_HOST")]
    pub host: Option<String>,

    /// Publisher port
    #[arg(long, env = "TS_SAMPLER_PORT")]
    pub port: Option<u16>,

    /// Maximum number of buffered timeslices
    #[arg(long)]
    pub high_water_mark: Option<u64>,

    /// Stop after this many timeslices (0 = unbounded)
    #[arg(long)]
    pub max_timeslices: Option<u64>,

    /// Answer every request with a full timeslice
    #[arg(long)]
    pub no_split: bool,

    /// One target per known system
    #[arg(long)]
    pub per_system: bool,

    /// One target per configured block
    #[arg(long)]
    pub per_block: bool,

    /// Block definition `name:systemId`, repeatable
    #[arg(long = "block", value_name = "NAME:SYSID")]
    pub blocks: Vec<String>,

    /// Request channel name
    #[arg(long)]
    pub request_channel: Option<String>,

    /// Missed-indices channel name (empty = disabled)
    #[arg(long)]
    pub missed_channel: Option<String>,

    /// Command channel name (empty = disabled)
    #[arg(long)]
    pub command_channel: Option<String>,

    /// Metrics channel name (empty = disabled)
    #[arg(long)]
    pub metrics_channel: Option<String>,

    /// Channel transport `name=host:port`, or `name=log`, repeatable
    #[arg(long = "endpoint", value_name = "NAME=ADDRESS")]
    pub endpoints: Vec<String>,

    /// Publish histograms every N messages (0 = off)
    #[arg(long)]
    pub publish_every: Option<u32>,

    /// Minimal interval between two publications (s)
    #[arg(long)]
    pub publish_min_interval: Option<f64>,

    /// Maximal interval between two publications (s)
    #[arg(long)]
    pub publish_max_interval: Option<f64>,

    /// Suffix of histogram, canvas and folder names
    #[arg(long)]
    pub histogram_suffix: Option<String>,

    /// Delay before STOP (ms)
    #[arg(long)]
    pub stop_grace_ms: Option<u64>,

    /// Delay before EOF (ms)
    #[arg(long)]
    pub eof_grace_ms: Option<u64>,
}

impl ConfigArgs {
    /// Apply the flag overrides on top of a file configuration
    ///
    /// Input flags replace the whole input section so that a file input can
    /// be swapped for a live one from the command line.
    pub fn apply(&self, config: &mut SamplerConfig) -> Result<()> {
        if self.filename.is_some()
            || self.dirname.is_some()
            || self.host.is_some()
            || self.port.is_some()
        {
            info!("Overriding input from CLI");
            config.input = Default::default();
            config.input.filename = self.filename.clone().unwrap_or_default();
            config.input.dirname = self.dirname.clone().unwrap_or_default();
            config.input.host = self.host.clone().unwrap_or_default();
            config.input.port = self.port.unwrap_or_default();
        }

        if let Some(hwm) = self.high_water_mark {
            config.buffer.high_water_mark = hwm;
        }
        if let Some(max) = self.max_timeslices {
            config.buffer.max_timeslices = max;
        }

        config.split.no_split |= self.no_split;
        config.split.per_system |= self.per_system;
        config.split.per_block |= self.per_block;
        config.split.blocks.extend(self.blocks.iter().cloned());

        let channels = &mut config.channels;
        for (flag, target) in [
            (&self.request_channel, &mut channels.request),
            (&self.missed_channel, &mut channels.missed_indices),
            (&self.command_channel, &mut channels.commands),
            (&self.metrics_channel, &mut channels.metrics),
        ] {
            if let Some(name) = flag {
                *target = name.clone();
            }
        }

        for raw in &self.endpoints {
            let endpoint = parse_endpoint(raw)?;
            channels.endpoints.retain(|e| e.name != endpoint.name);
            channels.endpoints.push(endpoint);
        }

        let monitoring = &mut config.monitoring;
        if let Some(every) = self.publish_every {
            monitoring.publish_every = every;
        }
        if let Some(min) = self.publish_min_interval {
            monitoring.min_interval_s = min;
        }
        if let Some(max) = self.publish_max_interval {
            monitoring.max_interval_s = max;
        }
        if let Some(ref suffix) = self.histogram_suffix {
            monitoring.histogram_suffix = suffix.clone();
        }

        if let Some(ms) = self.stop_grace_ms {
            config.shutdown.stop_grace_ms = ms;
        }
        if let Some(ms) = self.eof_grace_ms {
            config.shutdown.eof_grace_ms = ms;
        }

        Ok(())
    }
}

/// Parse `name=host:port` or `name=log`
pub fn parse_endpoint(raw: &str) -> Result<ChannelEndpoint> {
    let (name, address) = raw
        .split_once('=')
        .ok_or_else(|| CliError::invalid_argument("endpoint", raw, "expected NAME=ADDRESS"))?;
    let name = name.trim();
    let address = address.trim();

    if name.is_empty() || address.is_empty() {
        return Err(CliError::invalid_argument(
            "endpoint",
            raw,
            "name and address must not be empty",
        ));
    }

    let endpoint = if address.eq_ignore_ascii_case("log") {
        ChannelEndpoint {
            name: name.to_string(),
            kind: ChannelKind::Log,
            address: String::new(),
        }
    } else {
        ChannelEndpoint {
            name: name.to_string(),
            kind: ChannelKind::Tcp,
            address: address.to_string(),
        }
    };
    Ok(endpoint)
}

/// Log output format
#[derive(ValueEnum, Clone, Copy, Debug, Default)]
pub enum LogFormat {
    /// JSON structured logging
    Json,
    /// Human-readable pretty format
    #[default]
    Pretty,
    /// Compact single-line format
    Compact,
}

impl From<LogFormat> for observability::LogFormat {
    fn from(format: LogFormat) -> Self {
        match format {
            LogFormat::Json => Self::Json,
            LogFormat::Pretty => Self::Pretty,
            LogFormat::Compact => Self::Compact,
        }
    }
}
