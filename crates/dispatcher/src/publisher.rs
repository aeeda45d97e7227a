//! MonitorPublisher - periodic histogram publication
//!
//! The first successful publish of a run carries the structural description
//! (histogram names and folders, canvas configurations) ahead of the data in
//! one multi-part message. Later publishes carry the data part only.

use std::time::Instant;

use bytes::Bytes;
use contracts::{wire, ContractError, MessageChannel, MonitoringSettings};
use observability::{metrics, PublishSchedule, SamplerHistograms};
use tracing::{debug, info, instrument, warn};

use crate::channels::OutputChannel;

pub struct MonitorPublisher {
    channel: OutputChannel,
    schedule: PublishSchedule,
    config_sent: bool,
    published: u64,
}

impl MonitorPublisher {
    pub fn new(channel: OutputChannel, settings: &MonitoringSettings) -> Self {
        info!(
            every = settings.publish_every,
            min_interval_s = settings.min_interval.as_secs_f64(),
            max_interval_s = settings.max_interval.as_secs_f64(),
            suffix = %settings.histogram_suffix,
            "histogram publication enabled"
        );
        Self::with_schedule(
            channel,
            PublishSchedule::new(
                settings.publish_every,
                settings.min_interval,
                settings.max_interval,
            ),
        )
    }

    pub fn with_schedule(channel: OutputChannel, schedule: PublishSchedule) -> Self {
        Self {
            channel,
            schedule,
            config_sent: false,
            published: 0,
        }
    }

    pub fn config_sent(&self) -> bool {
        self.config_sent
    }

    /// Number of successful publishes
    pub fn published(&self) -> u64 {
        self.published
    }

    /// Publish when the hybrid trigger is due
    ///
    /// Returns whether a publish happened. The publish time is stamped after
    /// every attempt, successful or not.
    pub async fn maybe_publish(
        &mut self,
        message_counter: u64,
        histograms: &mut SamplerHistograms,
    ) -> Result<bool, ContractError> {
        if !self.schedule.is_due(Instant::now(), message_counter) {
            return Ok(false);
        }

        let result = self.publish(histograms).await;
        self.schedule.mark_published(Instant::now());
        result.map(|()| true)
    }

    /// Send the accumulated histograms and reset them
    #[instrument(name = "monitor_publish", skip_all, fields(config_sent = self.config_sent))]
    pub async fn publish(&mut self, histograms: &mut SamplerHistograms) -> Result<(), ContractError> {
        let parts = if self.config_sent {
            vec![data_part(histograms)?]
        } else {
            config_parts(histograms)?
        };
        let part_count = parts.len();

        if let Err(e) = self.channel.send_parts(parts).await {
            warn!(channel = %self.channel.name(), error = %e, "histograms could not be published");
            metrics::record_publish(false);
            return Err(e);
        }

        self.config_sent = true;
        self.published += 1;
        histograms.reset();
        metrics::record_publish(true);
        debug!(parts = part_count, published = self.published, "histograms published");
        Ok(())
    }
}

fn data_part(histograms: &SamplerHistograms) -> Result<Bytes, ContractError> {
    wire::encode(&histograms.snapshots())
}

/// Header, one part per histogram descriptor, one per canvas, then data
///
/// An empty descriptor or canvas list still occupies one empty part.
pub fn config_parts(histograms: &SamplerHistograms) -> Result<Vec<Bytes>, ContractError> {
    let descriptors = histograms.descriptors();
    let canvases = histograms.canvases();

    let header = (descriptors.len() as u32, canvases.len() as u32);
    let mut parts = vec![wire::encode(&header)?];

    for group in [&descriptors, &canvases] {
        if group.is_empty() {
            parts.push(Bytes::new());
        }
        for pair in group {
            parts.push(wire::encode(pair)?);
        }
    }

    parts.push(data_part(histograms)?);
    Ok(parts)
}
