//! Channel traits - Dispatcher transport interface
//!
//! Named channels carry opaque byte payloads; encoding lives in [`crate::wire`].

use bytes::Bytes;

use crate::ContractError;

/// Outgoing, push-style channel (missed indices, commands, metrics)
#[trait_variant::make(MessageChannel: Send)]
pub trait LocalMessageChannel {
    /// Channel name (used for logging/metrics)
    fn name(&self) -> &str;

    /// Send one message made of one or more parts
    ///
    /// # Errors
    /// Returns a send or connection error with the channel name
    async fn send_parts(&mut self, parts: Vec<Bytes>) -> Result<(), ContractError>;
}

/// Request-reply channel served by the dispatcher
#[trait_variant::make(RequestChannel: Send)]
pub trait LocalRequestChannel {
    fn name(&self) -> &str;

    /// Wait for the next request; `Ok(None)` once the channel is closed
    async fn next_request(&mut self) -> Result<Option<Bytes>, ContractError>;

    /// Reply to the request last returned by `next_request`
    async fn reply(&mut self, payload: Bytes) -> Result<(), ContractError>;
}
