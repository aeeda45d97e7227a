//! Ingestor - pulls timeslices and keeps the run statistics
//!
//! Owns the source, the ingestion counters and the monitoring accumulators.
//! Detects index gaps and announces end-of-stream exactly once.

use std::time::Instant;

use contracts::{ControlSignals, Timeslice, TimesliceSource};
use observability::{metrics, SamplerHistograms, SamplerMetricsAggregator};
use tracing::{debug, info, instrument, warn};

use crate::error::{IngestionError, Result};

/// Progress log period (timeslices)
const PROGRESS_LOG_PERIOD: u64 = 10_000;

/// Indices missing between `prev` and `index`
///
/// `counter` is the number of timeslices ingested so far. The first timeslice
/// of a run may legitimately have index 0; when the run starts later, a
/// synthetic `0` is reported before the skipped range.
pub fn compute_missed(prev: u64, index: u64, counter: u64) -> Vec<u64> {
    let first = prev == 0 && counter == 0;
    if index == prev.wrapping_add(1) || (first && index == 0) {
        return Vec::new();
    }

    let mut missed = Vec::new();
    if first {
        missed.push(0);
    }
    missed.extend(prev.saturating_add(1)..index);
    missed
}

/// Pull side of the sampler
pub struct Ingestor<S> {
    source: S,
    connected: bool,
    max_timeslices: Option<u64>,

    ts_counter: u64,
    prev_ts_index: u64,
    first_ts_index: Option<u64>,
    eof_found: bool,

    histograms: Option<SamplerHistograms>,
    stats: SamplerMetricsAggregator,
    started: Instant,
}

impl<S> Ingestor<S>
where
    S: TimesliceSource,
{
    pub fn new(source: S, max_timeslices: Option<u64>) -> Self {
        Self {
            source,
            connected: false,
            max_timeslices,
            ts_counter: 0,
            prev_ts_index: 0,
            first_ts_index: None,
            eof_found: false,
            histograms: None,
            stats: SamplerMetricsAggregator::new(),
            started: Instant::now(),
        }
    }

    /// Enable the monitoring accumulators
    pub fn with_monitoring(mut self, histogram_suffix: &str) -> Self {
        self.histograms = Some(SamplerHistograms::new(histogram_suffix));
        self
    }

    /// Pull the next timeslice
    ///
    /// Returns `Ok(None)` once the stream is exhausted (end of data, source
    /// error or limit reached). `EOF` is announced on the first exhaustion only.
    ///
    /// # Errors
    /// A failed missed-index report; the timeslice is dropped and counters are
    /// left untouched.
    #[instrument(name = "ingestor_fetch", skip(self, signals), fields(counter = self.ts_counter))]
    pub async fn fetch_next<C>(&mut self, signals: &mut C) -> Result<Option<Timeslice>>
    where
        C: ControlSignals,
    {
        if self.eof_found {
            return Ok(None);
        }

        if let Some(max) = self.max_timeslices {
            if self.ts_counter >= max {
                info!(max, "maximum number of timeslices reached");
                return self.exhaust(signals).await;
            }
        }

        if !self.connected {
            if let Err(e) = self.source.connect().await {
                warn!(source = %self.source.name(), error = %e, "cannot connect to source");
                return self.exhaust(signals).await;
            }
            self.connected = true;
        }

        let ts = match self.source.next_timeslice().await {
            Ok(Some(ts)) => ts,
            Ok(None) => {
                debug!(source = %self.source.name(), "source exhausted");
                return self.exhaust(signals).await;
            }
            Err(e) => {
                warn!(source = %self.source.name(), error = %e, "source error, treated as end of stream");
                return self.exhaust(signals).await;
            }
        };

        self.first_ts_index.get_or_insert(ts.index);

        let missed = compute_missed(self.prev_ts_index, ts.index, self.ts_counter);
        let gap = if ts.index != self.prev_ts_index.wrapping_add(1) {
            ts.index.saturating_sub(self.prev_ts_index.saturating_add(1))
        } else {
            0
        };

        if !missed.is_empty() {
            debug!(
                prev = self.prev_ts_index,
                index = ts.index,
                missing = missed.len(),
                "missed timeslices"
            );
            signals
                .report_missed(&missed)
                .await
                .map_err(|source| IngestionError::Signal { source })?;
        }

        let size_bytes = ts.size_bytes();
        if let Some(histograms) = self.histograms.as_mut() {
            let size_mb =
                SamplerHistograms::size_mb(ts.components.iter().map(|c| c.size_bytes()));
            histograms.fill_timeslice(ts.start_time_ns(), size_mb, gap);
        }
        self.stats.record_timeslice(size_bytes, missed.len() as u64);
        metrics::record_timeslice_ingested(ts.index, size_bytes);
        metrics::record_missed_timeslices(missed.len() as u64);

        self.ts_counter += 1;
        self.prev_ts_index = ts.index;

        if self.ts_counter % PROGRESS_LOG_PERIOD == 0 {
            info!(
                counter = self.ts_counter,
                index = ts.index,
                elapsed_s = self.started.elapsed().as_secs_f64(),
                "timeslices ingested"
            );
        }

        Ok(Some(ts))
    }

    async fn exhaust<C>(&mut self, signals: &mut C) -> Result<Option<Timeslice>>
    where
        C: ControlSignals,
    {
        if !self.eof_found {
            self.eof_found = true;
            info!(
                timeslices = self.ts_counter,
                last_index = self.prev_ts_index,
                run_time_s = self.started.elapsed().as_secs_f64(),
                "no more timeslices, end of stream"
            );
            signals
                .announce_eof(self.prev_ts_index, self.ts_counter)
                .await;
        }
        Ok(None)
    }

    /// Number of timeslices ingested
    pub fn ts_counter(&self) -> u64 {
        self.ts_counter
    }

    pub fn prev_ts_index(&self) -> u64 {
        self.prev_ts_index
    }

    /// Index of the first ingested timeslice
    pub fn first_ts_index(&self) -> Option<u64> {
        self.first_ts_index
    }

    pub fn eof_found(&self) -> bool {
        self.eof_found
    }

    pub fn source_name(&self) -> &str {
        self.source.name()
    }

    /// Monitoring accumulators, `None` when monitoring is off
    pub fn histograms_mut(&mut self) -> Option<&mut SamplerHistograms> {
        self.histograms.as_mut()
    }

    /// Run statistics
    pub fn stats(&self) -> &SamplerMetricsAggregator {
        &self.stats
    }

    pub fn stats_mut(&mut self) -> &mut SamplerMetricsAggregator {
        &mut self.stats
    }
}
