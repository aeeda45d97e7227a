//! Merge of several sources into one index-ordered stream
//!
//! Each call yields the pending timeslice with the smallest index among all
//! streams. Used for file sets and multi-publisher host strings.
//!
//! A stream that fails is finished; its error is returned on the call after
//! the one yielding the timeslice already taken, so nothing read is dropped.

use contracts::{ContractError, Timeslice, TimesliceSource};
use tracing::{debug, warn};

/// Index-ordered merge of several sources
pub struct MergedStreams<S> {
    name: String,
    streams: Vec<S>,
    heads: Vec<Option<Timeslice>>,
    primed: bool,
    deferred: Option<ContractError>,
}

impl<S> MergedStreams<S>
where
    S: TimesliceSource + Send,
{
    pub fn new(name: impl Into<String>, streams: Vec<S>) -> Self {
        let heads = streams.iter().map(|_| None).collect();
        Self {
            name: name.into(),
            streams,
            heads,
            primed: false,
            deferred: None,
        }
    }

    pub fn len(&self) -> usize {
        self.streams.len()
    }

    pub fn is_empty(&self) -> bool {
        self.streams.is_empty()
    }

    async fn prime(&mut self) {
        for pos in 0..self.streams.len() {
            self.refill(pos).await;
        }
        self.primed = true;
    }

    async fn refill(&mut self, pos: usize) {
        match self.streams[pos].next_timeslice().await {
            Ok(head) => self.heads[pos] = head,
            Err(e) => {
                warn!(
                    merged = %self.name,
                    stream = %self.streams[pos].name(),
                    error = %e,
                    "stream failed"
                );
                self.heads[pos] = None;
                self.deferred.get_or_insert(e);
            }
        }
    }
}

impl<S> TimesliceSource for MergedStreams<S>
where
    S: TimesliceSource + Send,
{
    fn name(&self) -> &str {
        &self.name
    }

    async fn connect(&mut self) -> Result<(), ContractError> {
        for stream in &mut self.streams {
            stream.connect().await?;
            debug!(merged = %self.name, stream = %stream.name(), "stream connected");
        }
        Ok(())
    }

    async fn next_timeslice(&mut self) -> Result<Option<Timeslice>, ContractError> {
        if let Some(e) = self.deferred.take() {
            return Err(e);
        }
        if !self.primed {
            self.prime().await;
        }

        let next = self
            .heads
            .iter()
            .enumerate()
            .filter_map(|(pos, head)| head.as_ref().map(|ts| (pos, ts.index)))
            .min_by_key(|&(_, index)| index)
            .map(|(pos, _)| pos);

        let Some(pos) = next else {
            return self.deferred.take().map_or(Ok(None), Err);
        };

        let ts = self.heads[pos].take();
        self.refill(pos).await;
        Ok(ts)
    }
}
