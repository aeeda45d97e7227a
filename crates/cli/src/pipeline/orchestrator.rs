//! Server orchestrator - wires source, request channel and dispatcher.

use std::future::Future;
use std::time::Instant;

use anyhow::{Context, Result};
use contracts::{ServerSettings, TimesliceSource};
use dispatcher::{serve, Dispatcher, TcpRequestChannel};
use ingestion::SourceAdapter;
use tracing::{info, warn};

use super::RunStats;
use crate::error::CliError;

/// Server configuration
#[derive(Debug, Clone)]
pub struct ServerConfig {
    /// Resolved settings
    pub settings: ServerSettings,

    /// Prometheus exporter port (None = disabled)
    pub metrics_port: Option<u16>,
}

/// Main server orchestrator
pub struct Server {
    config: ServerConfig,
}

impl Server {
    pub fn new(config: ServerConfig) -> Self {
        Self { config }
    }

    /// Open the configured input and serve until `shutdown` resolves or the
    /// run ends on its own
    pub async fn run<F>(self, shutdown: F) -> Result<RunStats>
    where
        F: Future<Output = ()>,
    {
        let input = &self.config.settings.input;
        info!(input = %input.describe(), "Opening timeslice source");

        let source = SourceAdapter::from_input(input)
            .map_err(CliError::from)
            .with_context(|| format!("Failed to open {}", input.describe()))?;

        self.run_with_source(source, shutdown).await
    }

    /// Serve timeslices from an already opened source
    pub async fn run_with_source<S, F>(self, source: S, shutdown: F) -> Result<RunStats>
    where
        S: TimesliceSource,
        F: Future<Output = ()>,
    {
        let start_time = Instant::now();
        let settings = &self.config.settings;

        if let Some(port) = self.config.metrics_port {
            observability::init_metrics_only(port)?;
            info!("Metrics endpoint available on port {}", port);
        }

        let request = &settings.channels.request;
        let mut channel = TcpRequestChannel::bind(request.name.clone(), &request.address)
            .await
            .map_err(|e| CliError::bind(&request.name, e.to_string()))?;

        info!(
            channel = %request.name,
            address = %channel.local_addr(),
            mode = settings.mode.as_str(),
            targets = settings.target_count(),
            high_water_mark = settings.high_water_mark,
            monitoring = settings.monitoring_enabled(),
            "Request channel ready"
        );

        let mut dispatcher = Dispatcher::from_settings(source, settings);
        let outcome = serve(&mut dispatcher, &mut channel, shutdown).await;

        if !outcome.is_clean() {
            warn!(outcome = ?outcome, "Serve loop ended abnormally");
        }

        let ingestor = dispatcher.ingestor();
        let stats = RunStats {
            outcome,
            mode: dispatcher.mode(),
            duration: start_time.elapsed(),
            messages: dispatcher.message_counter(),
            timeslices: ingestor.ts_counter(),
            first_index: ingestor.first_ts_index(),
            last_index: (ingestor.ts_counter() > 0).then(|| ingestor.prev_ts_index()),
            eof_found: ingestor.eof_found(),
            evicted: dispatcher.engine().buffer().evicted_count(),
            publishes: dispatcher.publisher().map(|p| p.published()),
            metrics: dispatcher.summary(),
        };

        info!(
            messages = stats.messages,
            timeslices = stats.timeslices,
            duration_secs = stats.duration.as_secs_f64(),
            "Server shutdown complete"
        );

        Ok(stats)
    }
}
