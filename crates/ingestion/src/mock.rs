//! Mock 数据源
//!
//! 用于无上游发布者环境的测试。

use std::collections::VecDeque;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use bytes::Bytes;
use contracts::{
    Component, ContractError, ControlSignals, Microslice, MicrosliceDescriptor, Timeslice,
    TimesliceSource,
};
use tracing::trace;

/// Microslice start time step between consecutive indices (ns)
const MOCK_TS_DURATION_NS: u64 = 100_000_000;

/// Build a timeslice with one single-microslice component per system id
///
/// Payload is `"<sys_id>:<index>"`, start time is `index * 100 ms`.
pub fn make_timeslice(index: u64, systems: &[u16]) -> Timeslice {
    let mut ts = Timeslice::new(index, 1);
    for &sys_id in systems {
        let content = Bytes::from(format!("{sys_id:#x}:{index}"));
        ts.push_component(Component::new(vec![Microslice {
            descriptor: MicrosliceDescriptor {
                sys_id,
                idx: index * MOCK_TS_DURATION_NS,
                size: content.len() as u32,
                ..Default::default()
            },
            content,
        }]));
    }
    ts
}

/// Mock 数据源
///
/// Yields a fixed list of timeslices, then ends (or fails).
pub struct MockTimesliceSource {
    name: String,
    queue: VecDeque<Timeslice>,
    fail_at_end: bool,
    fail_connect: bool,
    connects: Arc<AtomicUsize>,
    fetches: Arc<AtomicUsize>,
}

impl MockTimesliceSource {
    pub fn new(timeslices: Vec<Timeslice>) -> Self {
        Self {
            name: "mock".to_string(),
            queue: timeslices.into(),
            fail_at_end: false,
            fail_connect: false,
            connects: Arc::new(AtomicUsize::new(0)),
            fetches: Arc::new(AtomicUsize::new(0)),
        }
    }

    /// One timeslice per index, each with one component per system id
    pub fn from_indices(indices: &[u64], systems: &[u16]) -> Self {
        Self::new(
            indices
                .iter()
                .map(|&index| make_timeslice(index, systems))
                .collect(),
        )
    }

    /// Return an error instead of end-of-stream once the list is drained
    pub fn failing_at_end(mut self) -> Self {
        self.fail_at_end = true;
        self
    }

    /// Fail the connection attempt
    pub fn failing_connect(mut self) -> Self {
        self.fail_connect = true;
        self
    }

    /// Shared counter of `next_timeslice` calls
    pub fn fetch_counter(&self) -> Arc<AtomicUsize> {
        self.fetches.clone()
    }

    /// Shared counter of `connect` calls
    pub fn connect_counter(&self) -> Arc<AtomicUsize> {
        self.connects.clone()
    }
}

impl TimesliceSource for MockTimesliceSource {
    fn name(&self) -> &str {
        &self.name
    }

    async fn connect(&mut self) -> Result<(), ContractError> {
        self.connects.fetch_add(1, Ordering::SeqCst);
        if self.fail_connect {
            return Err(ContractError::source(&self.name, "connection refused"));
        }
        Ok(())
    }

    async fn next_timeslice(&mut self) -> Result<Option<Timeslice>, ContractError> {
        self.fetches.fetch_add(1, Ordering::SeqCst);
        match self.queue.pop_front() {
            Some(ts) => {
                trace!(index = ts.index, "mock timeslice");
                Ok(Some(ts))
            }
            None if self.fail_at_end => Err(ContractError::source(&self.name, "stream broken")),
            None => Ok(None),
        }
    }
}

/// Control signals that record everything they are asked to send
#[derive(Debug, Default)]
pub struct RecordingSignals {
    pub missed: Vec<Vec<u64>>,
    pub eofs: Vec<(u64, u64)>,
    pub stops: usize,
    /// Make `report_missed` fail
    pub fail_missed: bool,
}

impl RecordingSignals {
    pub fn new() -> Self {
        Self::default()
    }

    /// All reported indices, flattened
    pub fn all_missed(&self) -> Vec<u64> {
        self.missed.iter().flatten().copied().collect()
    }
}

impl ControlSignals for RecordingSignals {
    async fn report_missed(&mut self, indices: &[u64]) -> Result<(), ContractError> {
        if self.fail_missed {
            return Err(ContractError::channel_send("missed", "peer gone"));
        }
        self.missed.push(indices.to_vec());
        Ok(())
    }

    async fn announce_eof(&mut self, last_index: u64, count: u64) {
        self.eofs.push((last_index, count));
    }

    async fn announce_stop(&mut self) {
        self.stops += 1;
    }
}
