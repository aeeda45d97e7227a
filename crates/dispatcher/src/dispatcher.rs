//! Dispatcher - request protocol state machine
//!
//! Handles one request at a time: ingest on demand, combine, reply, then
//! maybe publish the monitoring histograms. Any failed send other than a
//! command escalates to `STOP`.

use std::fmt;

use bytes::Bytes;
use contracts::{
    wire, ControlSignals, RequestChannel, ServerSettings, SplitMode, Timeslice, TimesliceSource,
};
use ingestion::Ingestor;
use observability::{metrics, MetricsSummary};
use split_engine::SplitEngine;
use tracing::{debug, error, info, instrument};

use crate::channels::OutputChannel;
use crate::commands::CommandChannel;
use crate::error::DispatchError;
use crate::publisher::MonitorPublisher;

/// Lifecycle of a run
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DispatchState {
    /// Serving requests
    Active,
    /// End of stream reached; every further request is ignored
    StreamExhausted,
}

/// Request dispatcher owning the whole processing state of a run
pub struct Dispatcher<S> {
    mode: SplitMode,
    ingestor: Ingestor<S>,
    engine: SplitEngine,
    signals: CommandChannel,
    publisher: Option<MonitorPublisher>,
    state: DispatchState,
    message_counter: u64,
    /// Timeslice fetched for a first-index request in no-split mode
    pending_full: Option<Timeslice>,
}

impl<S> Dispatcher<S>
where
    S: TimesliceSource,
{
    pub fn new(
        ingestor: Ingestor<S>,
        engine: SplitEngine,
        signals: CommandChannel,
        publisher: Option<MonitorPublisher>,
    ) -> Self {
        Self {
            mode: engine.mode(),
            ingestor,
            engine,
            signals,
            publisher,
            state: DispatchState::Active,
            message_counter: 0,
            pending_full: None,
        }
    }

    /// Wire every component from the resolved settings
    pub fn from_settings(source: S, settings: &ServerSettings) -> Self {
        let mut ingestor = Ingestor::new(source, settings.max_timeslices);
        let publisher = match (&settings.channels.metrics, settings.monitoring_enabled()) {
            (Some(binding), true) => {
                ingestor = ingestor.with_monitoring(&settings.monitoring.histogram_suffix);
                Some(MonitorPublisher::new(
                    OutputChannel::from_binding(binding),
                    &settings.monitoring,
                ))
            }
            _ => None,
        };

        Self::new(
            ingestor,
            SplitEngine::from_settings(settings),
            CommandChannel::from_settings(settings),
            publisher,
        )
    }

    /// Handle one request
    ///
    /// Returns `false` when the run must stop (a send failed and `STOP` was
    /// issued), `true` otherwise.
    #[instrument(
        name = "dispatcher_handle",
        skip_all,
        fields(mode = self.mode.as_str(), counter = self.message_counter)
    )]
    pub async fn handle<R>(&mut self, request: &[u8], channel: &mut R) -> bool
    where
        R: RequestChannel,
    {
        if self.state == DispatchState::StreamExhausted {
            debug!("stream exhausted, request ignored");
            self.ingestor.stats_mut().record_ignored();
            return true;
        }

        let text = String::from_utf8_lossy(request);
        let text = text.trim_matches(|c: char| c.is_whitespace() || c == '\0');

        if text == wire::FIRST_INDEX_REQUEST {
            let keep_running = self.send_first_index(channel).await;
            self.update_state();
            return keep_running;
        }

        let result = match self.mode {
            SplitMode::NoSplit => self.send_full(channel).await,
            SplitMode::PerSystem => match SplitEngine::system_position(text) {
                Some(target) => {
                    debug!(request = %text, target, "system request");
                    self.send_combined(target, channel).await
                }
                None => Err(DispatchError::unknown_target(text)),
            },
            SplitMode::PerBlock => match self.engine.block_position(text) {
                Some(target) => {
                    debug!(request = %text, target, "block request");
                    self.send_combined(target, channel).await
                }
                None => Err(DispatchError::unknown_target(text)),
            },
        };
        self.update_state();

        match result {
            Ok(()) => {}
            Err(e) if e.is_exhausted() || self.ingestor.eof_found() => {
                debug!(reason = %e, "request not served");
                self.ingestor.stats_mut().record_ignored();
            }
            Err(e) => {
                metrics::record_reply(self.mode.as_str(), false);
                self.ingestor.stats_mut().record_reply(false);
                return self.escalate(&e).await;
            }
        }

        if let Err(e) = self.maybe_publish().await {
            return self.escalate(&e).await;
        }
        true
    }

    async fn send_first_index<R>(&mut self, channel: &mut R) -> bool
    where
        R: RequestChannel,
    {
        if self.ingestor.first_ts_index().is_none() && !self.ingestor.eof_found() {
            if let Err(e) = self.fetch_first().await {
                if !e.is_exhausted() && !self.ingestor.eof_found() {
                    return self.escalate(&e).await;
                }
            }
        }

        let index = self.ingestor.first_ts_index().unwrap_or(0);
        match self.reply(channel, wire::encode_string(&index.to_string())).await {
            Ok(()) => {
                info!(first_index = index, "first timeslice index sent");
                true
            }
            Err(_) if self.ingestor.eof_found() => true,
            Err(e) => self.escalate(&e).await,
        }
    }

    /// Fetch the first timeslice without consuming it
    async fn fetch_first(&mut self) -> Result<(), DispatchError> {
        match self.mode {
            SplitMode::NoSplit => {
                self.pending_full = self.ingestor.fetch_next(&mut self.signals).await?;
            }
            SplitMode::PerSystem | SplitMode::PerBlock => {
                self.engine
                    .prefetch(&mut self.ingestor, &mut self.signals)
                    .await?;
            }
        }
        Ok(())
    }

    async fn send_full<R>(&mut self, channel: &mut R) -> Result<(), DispatchError>
    where
        R: RequestChannel,
    {
        let ts = match self.pending_full.take() {
            Some(ts) => ts,
            None => self
                .ingestor
                .fetch_next(&mut self.signals)
                .await?
                .ok_or(DispatchError::Exhausted)?,
        };
        self.send_timeslice(&ts, channel).await
    }

    async fn send_combined<R>(&mut self, target: usize, channel: &mut R) -> Result<(), DispatchError>
    where
        R: RequestChannel,
    {
        let ts = self
            .engine
            .combine(target, &mut self.ingestor, &mut self.signals)
            .await?;
        self.send_timeslice(&ts, channel).await
    }

    async fn send_timeslice<R>(&mut self, ts: &Timeslice, channel: &mut R) -> Result<(), DispatchError>
    where
        R: RequestChannel,
    {
        let payload = wire::encode_timeslice(ts);
        self.reply(channel, payload).await?;
        metrics::record_reply(self.mode.as_str(), true);
        self.ingestor.stats_mut().record_reply(true);
        debug!(
            index = ts.index,
            components = ts.num_components(),
            message = self.message_counter,
            "timeslice sent"
        );
        Ok(())
    }

    async fn reply<R>(
        &mut self,
        channel: &mut R,
        payload: Result<Bytes, contracts::ContractError>,
    ) -> Result<(), DispatchError>
    where
        R: RequestChannel,
    {
        channel.reply(payload?).await?;
        self.message_counter += 1;
        Ok(())
    }

    async fn maybe_publish(&mut self) -> Result<bool, DispatchError> {
        let (Some(publisher), Some(histograms)) =
            (self.publisher.as_mut(), self.ingestor.histograms_mut())
        else {
            return Ok(false);
        };
        Ok(publisher
            .maybe_publish(self.message_counter, histograms)
            .await?)
    }

    async fn escalate(&mut self, err: &DispatchError) -> bool {
        error!(error = %err, "request failed, stopping");
        self.signals.announce_stop().await;
        false
    }

    fn update_state(&mut self) {
        if self.state == DispatchState::Active && self.ingestor.eof_found() {
            info!(
                timeslices = self.ingestor.ts_counter(),
                messages = self.message_counter,
                "stream exhausted, ignoring further requests"
            );
            self.state = DispatchState::StreamExhausted;
        }
    }

    pub fn state(&self) -> DispatchState {
        self.state
    }

    pub fn mode(&self) -> SplitMode {
        self.mode
    }

    /// Successful replies so far
    pub fn message_counter(&self) -> u64 {
        self.message_counter
    }

    pub fn ingestor(&self) -> &Ingestor<S> {
        &self.ingestor
    }

    pub fn engine(&self) -> &SplitEngine {
        &self.engine
    }

    pub fn publisher(&self) -> Option<&MonitorPublisher> {
        self.publisher.as_ref()
    }

    /// Run summary
    pub fn summary(&self) -> MetricsSummary {
        self.ingestor.stats().summary()
    }
}

impl<S> fmt::Debug for Dispatcher<S> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Dispatcher")
            .field("mode", &self.mode)
            .field("state", &self.state)
            .field("message_counter", &self.message_counter)
            .field("monitoring", &self.publisher.is_some())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::channels::{MemoryChannel, MemoryRequestChannel};
    use contracts::Block;
    use ingestion::MockTimesliceSource;
    use std::collections::BTreeSet;
    use std::sync::atomic::Ordering;
    use std::time::Duration;

    struct Harness {
        dispatcher: Dispatcher<MockTimesliceSource>,
        missed: MemoryChannel,
        commands: MemoryChannel,
    }

    fn harness(source: MockTimesliceSource, engine: SplitEngine) -> Harness {
        let missed = MemoryChannel::new("missed");
        let commands = MemoryChannel::new("commands");
        let signals = CommandChannel::new(
            Some(missed.clone().into()),
            Some(commands.clone().into()),
            Duration::ZERO,
            Duration::ZERO,
        );
        Harness {
            dispatcher: Dispatcher::new(Ingestor::new(source, None), engine, signals, None),
            missed,
            commands,
        }
    }

    fn no_split(indices: &[u64]) -> Harness {
        harness(
            MockTimesliceSource::from_indices(indices, &[0x10, 0x60]),
            SplitEngine::new(SplitMode::NoSplit, Vec::new(), 1),
        )
    }

    async fn ask(h: &mut Harness, channel: &mut MemoryRequestChannel, request: &str) -> bool {
        channel.push_request(request.to_string());
        let payload = channel.next_request().await.unwrap().unwrap();
        h.dispatcher.handle(&payload, channel).await
    }

    fn reply_index(channel: &MemoryRequestChannel) -> u64 {
        let reply = channel.last_reply().unwrap();
        wire::decode_timeslice(reply).unwrap().index
    }

    fn commands(h: &Harness) -> Vec<String> {
        h.commands
            .messages()
            .iter()
            .map(|parts| wire::decode_string(&parts[0]).unwrap())
            .collect()
    }

    #[tokio::test]
    async fn test_no_split_serves_in_order() {
        let mut h = no_split(&[0, 1, 2]);
        let mut channel = MemoryRequestChannel::default();

        for expected in 0..3 {
            assert!(ask(&mut h, &mut channel, "any").await);
            assert_eq!(reply_index(&channel), expected);
        }
        assert_eq!(h.dispatcher.message_counter(), 3);

        // exhaustion: no reply, EOF sent once, further requests ignored
        assert!(ask(&mut h, &mut channel, "any").await);
        assert_eq!(channel.last_reply(), None);
        assert_eq!(h.dispatcher.state(), DispatchState::StreamExhausted);
        assert!(ask(&mut h, &mut channel, "any").await);
        assert_eq!(commands(&h), vec!["EOF 2 3"]);
        assert_eq!(h.dispatcher.summary().requests_ignored, 2);
    }

    #[tokio::test]
    async fn test_first_index_idempotent() {
        let source = MockTimesliceSource::from_indices(&[0, 1], &[0x10]);
        let fetches = source.fetch_counter();
        let mut h = harness(source, SplitEngine::new(SplitMode::NoSplit, Vec::new(), 1));
        let mut channel = MemoryRequestChannel::default();

        for _ in 0..3 {
            assert!(ask(&mut h, &mut channel, wire::FIRST_INDEX_REQUEST).await);
            let reply = wire::decode_string(channel.last_reply().unwrap()).unwrap();
            assert_eq!(reply, "0");
        }
        assert_eq!(fetches.load(Ordering::SeqCst), 1);

        // held timeslice is served first
        assert!(ask(&mut h, &mut channel, "full").await);
        assert_eq!(reply_index(&channel), 0);
        assert!(ask(&mut h, &mut channel, "full").await);
        assert_eq!(reply_index(&channel), 1);
    }

    #[tokio::test]
    async fn test_first_index_buffered_in_split_mode() {
        let source = MockTimesliceSource::from_indices(&[42, 43], &[0x10]);
        let fetches = source.fetch_counter();
        let mut h = harness(source, SplitEngine::new(SplitMode::PerSystem, Vec::new(), 4));
        let mut channel = MemoryRequestChannel::default();

        assert!(ask(&mut h, &mut channel, wire::FIRST_INDEX_REQUEST).await);
        assert_eq!(wire::decode_string(channel.last_reply().unwrap()).unwrap(), "42");

        assert!(ask(&mut h, &mut channel, "0x10").await);
        assert_eq!(reply_index(&channel), 42);
        assert_eq!(fetches.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_per_system_by_id_and_name() {
        let mut h = harness(
            MockTimesliceSource::from_indices(&[0, 1], &[0x10, 0x60]),
            SplitEngine::new(SplitMode::PerSystem, Vec::new(), 2),
        );
        let mut channel = MemoryRequestChannel::default();

        assert!(ask(&mut h, &mut channel, "16").await);
        let ts = wire::decode_timeslice(channel.last_reply().unwrap()).unwrap();
        assert_eq!(ts.components[0].system_id(), Some(0x10));

        assert!(ask(&mut h, &mut channel, "TOF").await);
        let ts = wire::decode_timeslice(channel.last_reply().unwrap()).unwrap();
        assert_eq!((ts.index, ts.components[0].system_id()), (0, Some(0x60)));
    }

    #[tokio::test]
    async fn test_unknown_target_stops() {
        let mut h = harness(
            MockTimesliceSource::from_indices(&[0], &[0x10]),
            SplitEngine::new(
                SplitMode::PerBlock,
                vec![Block {
                    name: "sts".into(),
                    systems: BTreeSet::from([0x10]),
                }],
                1,
            ),
        );
        let mut channel = MemoryRequestChannel::default();

        assert!(!ask(&mut h, &mut channel, "trd").await);
        assert_eq!(commands(&h), vec!["STOP"]);
    }

    #[tokio::test]
    async fn test_reply_failure_escalates() {
        let mut h = no_split(&[0, 1]);
        let mut channel = MemoryRequestChannel::default();
        channel.set_failing(true);

        assert!(!ask(&mut h, &mut channel, "any").await);
        assert_eq!(commands(&h), vec!["STOP"]);
        assert_eq!(h.dispatcher.summary().replies_failed, 1);
    }

    #[tokio::test]
    async fn test_missed_report_failure_escalates() {
        let mut h = no_split(&[0, 4]);
        let mut channel = MemoryRequestChannel::default();

        assert!(ask(&mut h, &mut channel, "any").await);
        h.missed.set_failing(true);
        assert!(!ask(&mut h, &mut channel, "any").await);
        assert_eq!(channel.last_reply(), None);
        assert_eq!(commands(&h), vec!["STOP"]);
    }

    #[tokio::test]
    async fn test_gap_reported_on_missed_channel() {
        let mut h = no_split(&[0, 1, 2, 5, 6]);
        let mut channel = MemoryRequestChannel::default();
        for _ in 0..5 {
            assert!(ask(&mut h, &mut channel, "any").await);
        }

        let reports: Vec<Vec<u64>> = h
            .missed
            .messages()
            .iter()
            .map(|parts| wire::decode_indices(&parts[0]).unwrap())
            .collect();
        assert_eq!(reports, vec![vec![3, 4]]);
    }

    #[tokio::test]
    async fn test_publish_after_reply() {
        let metrics = MemoryChannel::new("metrics");
        let schedule = observability::PublishSchedule::starting_at(
            1,
            Duration::ZERO,
            Duration::from_secs(10),
            std::time::Instant::now(),
        );
        let publisher = MonitorPublisher::with_schedule(metrics.clone().into(), schedule);
        let ingestor = Ingestor::new(MockTimesliceSource::from_indices(&[0, 1], &[0x10]), None)
            .with_monitoring("");
        let mut dispatcher = Dispatcher::new(
            ingestor,
            SplitEngine::new(SplitMode::NoSplit, Vec::new(), 1),
            CommandChannel::disabled(),
            Some(publisher),
        );
        let mut channel = MemoryRequestChannel::new("req", ["a", "b"]);

        while let Some(request) = channel.next_request().await.unwrap() {
            // elapsed must exceed the zero min interval
            tokio::time::sleep(Duration::from_millis(2)).await;
            assert!(dispatcher.handle(&request, &mut channel).await);
        }

        let messages = metrics.messages();
        assert_eq!(messages.len(), 2);
        assert_eq!(messages[0].len(), 9);
        assert_eq!(messages[1].len(), 1);
        assert!(dispatcher.publisher().is_some_and(|p| p.config_sent()));
    }

    #[tokio::test]
    async fn test_publish_failure_escalates() {
        let metrics = MemoryChannel::new("metrics");
        metrics.set_failing(true);
        let commands = MemoryChannel::new("commands");
        let schedule = observability::PublishSchedule::starting_at(
            1,
            Duration::ZERO,
            Duration::ZERO,
            std::time::Instant::now(),
        );
        tokio::time::sleep(Duration::from_millis(2)).await;

        let mut dispatcher = Dispatcher::new(
            Ingestor::new(MockTimesliceSource::from_indices(&[0], &[0x10]), None)
                .with_monitoring(""),
            SplitEngine::new(SplitMode::NoSplit, Vec::new(), 1),
            CommandChannel::new(None, Some(commands.clone().into()), Duration::ZERO, Duration::ZERO),
            Some(MonitorPublisher::with_schedule(metrics.into(), schedule)),
        );
        let mut channel = MemoryRequestChannel::new("req", ["a"]);
        let request = channel.next_request().await.unwrap().unwrap();

        assert!(!dispatcher.handle(&request, &mut channel).await);
        assert!(channel.last_reply().is_some());
        assert_eq!(commands.message_count(), 1);
    }
}
