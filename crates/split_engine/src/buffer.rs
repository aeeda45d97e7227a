//! Bounded FIFO of ingested timeslices with per-target served flags.
//!
//! Uses index-based separation:
//! - HeapRb stores lightweight metadata (index + served flags + slab key)
//! - Slab stores the actual Timeslice data
//!
//! Served flags are updated in place without moving timeslice payloads.

use std::fmt;

use contracts::{ControlSignals, Timeslice, TimesliceSource};
use ingestion::Ingestor;
use observability::metrics;
use ringbuf::{traits::*, HeapRb};
use slab::Slab;
use tracing::trace;

use crate::error::SplitError;

/// Metadata stored in the ring buffer
#[derive(Debug, Clone)]
struct EntryMeta {
    /// Key into the slab storage
    slab_key: usize,
    /// Timeslice index, for logging
    index: u64,
    /// One flag per split target
    served: Vec<bool>,
}

/// Sliding window of timeslices
pub struct TimesliceBuffer {
    /// Ring buffer of metadata, oldest first
    entries: HeapRb<EntryMeta>,
    /// Timeslice storage
    storage: Slab<Timeslice>,
    high_water_mark: usize,
    target_count: usize,
    evicted_count: u64,
}

impl fmt::Debug for TimesliceBuffer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TimesliceBuffer")
            .field("len", &self.entries.occupied_len())
            .field("high_water_mark", &self.high_water_mark)
            .field("targets", &self.target_count)
            .field("evicted", &self.evicted_count)
            .finish()
    }
}

impl TimesliceBuffer {
    /// Create an empty buffer
    ///
    /// `high_water_mark` is clamped to at least 1.
    pub fn new(high_water_mark: usize, target_count: usize) -> Self {
        let high_water_mark = high_water_mark.max(1);
        Self {
            entries: HeapRb::new(high_water_mark),
            storage: Slab::with_capacity(high_water_mark),
            high_water_mark,
            target_count,
            evicted_count: 0,
        }
    }

    /// Evict down to capacity, then fetch and append one timeslice
    ///
    /// Returns `false` without appending when the stream is exhausted.
    pub async fn push_new<S, C>(
        &mut self,
        ingestor: &mut Ingestor<S>,
        signals: &mut C,
    ) -> Result<bool, SplitError>
    where
        S: TimesliceSource,
        C: ControlSignals,
    {
        while self.entries.occupied_len() >= self.high_water_mark {
            self.evict_oldest();
        }

        let Some(ts) = ingestor.fetch_next(signals).await? else {
            return Ok(false);
        };

        self.append(ts);
        Ok(true)
    }

    /// Append a timeslice fetched elsewhere (evicting down to capacity first)
    pub fn append(&mut self, ts: Timeslice) {
        while self.entries.occupied_len() >= self.high_water_mark {
            self.evict_oldest();
        }

        let index = ts.index;
        let slab_key = self.storage.insert(ts);
        let meta = EntryMeta {
            slab_key,
            index,
            served: vec![false; self.target_count],
        };
        if let Err(rejected) = self.entries.try_push(meta) {
            self.storage.remove(rejected.slab_key);
        }
        metrics::record_buffer_depth(self.len());
    }

    fn evict_oldest(&mut self) {
        if let Some(old) = self.entries.try_pop() {
            trace!(index = old.index, "evicting timeslice");
            self.storage.remove(old.slab_key);
            self.evicted_count += 1;
        }
    }

    /// Position of the oldest entry not yet served to `target`
    pub fn first_unserved(&self, target: usize) -> Option<usize> {
        self.entries
            .iter()
            .position(|meta| !meta.served.get(target).copied().unwrap_or(true))
    }

    /// Timeslice at position `pos` (0 = oldest)
    pub fn timeslice(&self, pos: usize) -> Option<&Timeslice> {
        self.entries
            .iter()
            .nth(pos)
            .and_then(|meta| self.storage.get(meta.slab_key))
    }

    /// Oldest buffered timeslice
    pub fn front(&self) -> Option<&Timeslice> {
        self.timeslice(0)
    }

    /// Mark entry `pos` as served to `target`
    pub fn mark_served(&mut self, pos: usize, target: usize) {
        if let Some(flag) = self
            .entries
            .iter_mut()
            .nth(pos)
            .and_then(|meta| meta.served.get_mut(target))
        {
            *flag = true;
        }
    }

    pub fn is_served(&self, pos: usize, target: usize) -> bool {
        self.entries
            .iter()
            .nth(pos)
            .and_then(|meta| meta.served.get(target).copied())
            .unwrap_or(false)
    }

    /// Buffered indices, oldest first
    pub fn indices(&self) -> Vec<u64> {
        self.entries.iter().map(|meta| meta.index).collect()
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.entries.occupied_len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn high_water_mark(&self) -> usize {
        self.high_water_mark
    }

    /// Number of entries dropped by capacity eviction
    pub fn evicted_count(&self) -> u64 {
        self.evicted_count
    }
}
