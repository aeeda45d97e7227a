//! Live subscriber source
//!
//! Connects to a timeslice publisher that streams length-prefixed bincode
//! timeslices over TCP. The connection is opened on first use.

use contracts::{wire, ContractError, Timeslice, TimesliceSource};
use tokio::io::BufReader;
use tokio::net::TcpStream;
use tracing::{info, instrument};

/// Subscription to one publisher
pub struct SubscriberSource {
    name: String,
    address: String,
    stream: Option<BufReader<TcpStream>>,
}

impl SubscriberSource {
    /// `address` is `host:port`, an optional `tcp://` prefix is accepted
    pub fn new(address: &str) -> Self {
        let address = address.trim();
        let address = address.strip_prefix("tcp://").unwrap_or(address).to_string();
        Self {
            name: format!("subscriber:{address}"),
            address,
            stream: None,
        }
    }

    pub fn address(&self) -> &str {
        &self.address
    }
}

/// Split a `;`-separated host string into publisher addresses
pub fn split_host_string(hosts: &str) -> Vec<String> {
    hosts
        .split(';')
        .map(str::trim)
        .filter(|h| !h.is_empty())
        .map(str::to_string)
        .collect()
}

impl TimesliceSource for SubscriberSource {
    fn name(&self) -> &str {
        &self.name
    }

    #[instrument(name = "subscriber_connect", skip(self), fields(address = %self.address))]
    async fn connect(&mut self) -> Result<(), ContractError> {
        let stream = TcpStream::connect(&self.address)
            .await
            .map_err(|e| ContractError::source(&self.name, format!("cannot connect: {e}")))?;
        self.stream = Some(BufReader::new(stream));
        info!(source = %self.name, "subscribed to timeslice publisher");
        Ok(())
    }

    async fn next_timeslice(&mut self) -> Result<Option<Timeslice>, ContractError> {
        let stream = self
            .stream
            .as_mut()
            .ok_or_else(|| ContractError::source(&self.name, "not connected"))?;

        match wire::read_frame(stream).await? {
            Some(frame) => Ok(Some(wire::decode_timeslice(&frame)?)),
            None => Ok(None),
        }
    }
}
