//! LogChannel - logs message summaries via tracing

use bytes::Bytes;
use contracts::{ContractError, MessageChannel};
use tracing::{info, instrument};

/// Channel that only logs what would have been sent
pub struct LogChannel {
    name: String,
    messages: u64,
}

impl LogChannel {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            messages: 0,
        }
    }

    /// Number of messages logged so far
    pub fn messages(&self) -> u64 {
        self.messages
    }
}

impl MessageChannel for LogChannel {
    fn name(&self) -> &str {
        &self.name
    }

    #[instrument(name = "log_channel_send", skip(self, parts), fields(channel = %self.name))]
    async fn send_parts(&mut self, parts: Vec<Bytes>) -> Result<(), ContractError> {
        self.messages += 1;
        let bytes: usize = parts.iter().map(Bytes::len).sum();
        info!(
            channel = %self.name,
            message = self.messages,
            parts = parts.len(),
            bytes,
            "message sent"
        );
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_log_channel_send() {
        let mut channel = LogChannel::new("commands");
        assert_eq!(channel.name(), "commands");

        channel
            .send_parts(vec![Bytes::from_static(b"STOP")])
            .await
            .unwrap();
        assert_eq!(channel.messages(), 1);
    }
}
