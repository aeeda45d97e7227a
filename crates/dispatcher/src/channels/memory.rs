//! In-memory channels for tests and embedding
//!
//! `MemoryChannel` records every sent message behind a shared handle;
//! `MemoryRequestChannel` replays a fixed list of requests and records replies.

use std::collections::VecDeque;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, PoisonError};

use bytes::Bytes;
use contracts::{ContractError, MessageChannel, RequestChannel};

/// Push channel that keeps sent messages in memory
///
/// Clones share the same storage and failure switch.
#[derive(Debug, Clone, Default)]
pub struct MemoryChannel {
    name: String,
    sent: Arc<Mutex<Vec<Vec<Bytes>>>>,
    failing: Arc<AtomicBool>,
}

impl MemoryChannel {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ..Default::default()
        }
    }

    /// Make every following send fail (or succeed again)
    pub fn set_failing(&self, failing: bool) {
        self.failing.store(failing, Ordering::SeqCst);
    }

    /// All messages sent so far
    pub fn messages(&self) -> Vec<Vec<Bytes>> {
        self.sent
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    pub fn message_count(&self) -> usize {
        self.sent.lock().unwrap_or_else(PoisonError::into_inner).len()
    }
}

impl MessageChannel for MemoryChannel {
    fn name(&self) -> &str {
        &self.name
    }

    async fn send_parts(&mut self, parts: Vec<Bytes>) -> Result<(), ContractError> {
        if self.failing.load(Ordering::SeqCst) {
            return Err(ContractError::channel_send(&self.name, "peer unavailable"));
        }
        self.sent
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(parts);
        Ok(())
    }
}

/// Request channel fed from a queue
///
/// Each request gets one outcome slot: `Some(reply)` or `None` when the
/// dispatcher did not reply.
#[derive(Debug, Default)]
pub struct MemoryRequestChannel {
    name: String,
    requests: VecDeque<Bytes>,
    outcomes: Vec<Option<Bytes>>,
    fail_replies: bool,
}

impl MemoryRequestChannel {
    pub fn new<I, T>(name: impl Into<String>, requests: I) -> Self
    where
        I: IntoIterator<Item = T>,
        T: Into<Bytes>,
    {
        Self {
            name: name.into(),
            requests: requests.into_iter().map(Into::into).collect(),
            ..Default::default()
        }
    }

    /// Queue one more request
    pub fn push_request(&mut self, request: impl Into<Bytes>) {
        self.requests.push_back(request.into());
    }

    /// Make every following reply fail
    pub fn set_failing(&mut self, failing: bool) {
        self.fail_replies = failing;
    }

    /// Outcome per request taken so far
    pub fn outcomes(&self) -> &[Option<Bytes>] {
        &self.outcomes
    }

    /// Reply to the most recent request, if any
    pub fn last_reply(&self) -> Option<&Bytes> {
        self.outcomes.last().and_then(Option::as_ref)
    }
}

impl RequestChannel for MemoryRequestChannel {
    fn name(&self) -> &str {
        &self.name
    }

    async fn next_request(&mut self) -> Result<Option<Bytes>, ContractError> {
        let request = self.requests.pop_front();
        if request.is_some() {
            self.outcomes.push(None);
        }
        Ok(request)
    }

    async fn reply(&mut self, payload: Bytes) -> Result<(), ContractError> {
        if self.fail_replies {
            return Err(ContractError::channel_send(&self.name, "consumer gone"));
        }
        match self.outcomes.last_mut() {
            Some(slot @ None) => {
                *slot = Some(payload);
                Ok(())
            }
            _ => Err(ContractError::channel_send(&self.name, "no pending request")),
        }
    }
}
