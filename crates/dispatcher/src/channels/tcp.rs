//! TcpPushChannel - multi-part messages over a TCP stream
//!
//! Connects on first send; a failed write drops the stream so the next send
//! reconnects.

use bytes::Bytes;
use contracts::{wire, ContractError, MessageChannel};
use tokio::net::TcpStream;
use tracing::{debug, instrument, warn};

/// Push channel to a TCP peer
pub struct TcpPushChannel {
    name: String,
    address: String,
    stream: Option<TcpStream>,
}

impl TcpPushChannel {
    /// `address` is `host:port`, optionally prefixed with `tcp://`
    pub fn new(name: impl Into<String>, address: &str) -> Self {
        Self {
            name: name.into(),
            address: address.trim_start_matches("tcp://").to_string(),
            stream: None,
        }
    }

    pub fn address(&self) -> &str {
        &self.address
    }

    pub fn is_connected(&self) -> bool {
        self.stream.is_some()
    }

    async fn connect(&mut self) -> Result<&mut TcpStream, ContractError> {
        if self.stream.is_none() {
            let stream = TcpStream::connect(&self.address)
                .await
                .map_err(|e| ContractError::channel_connection(&self.name, e.to_string()))?;
            stream.set_nodelay(true).ok();
            debug!(channel = %self.name, address = %self.address, "push channel connected");
            self.stream = Some(stream);
        }

        self.stream
            .as_mut()
            .ok_or_else(|| ContractError::channel_connection(&self.name, "not connected"))
    }
}

impl MessageChannel for TcpPushChannel {
    fn name(&self) -> &str {
        &self.name
    }

    #[instrument(
        name = "tcp_channel_send",
        skip(self, parts),
        fields(channel = %self.name, parts = parts.len())
    )]
    async fn send_parts(&mut self, parts: Vec<Bytes>) -> Result<(), ContractError> {
        let name = self.name.clone();
        let stream = self.connect().await?;

        if let Err(e) = wire::write_multipart(stream, &parts).await {
            warn!(channel = %name, error = %e, "send failed, dropping connection");
            self.stream = None;
            return Err(ContractError::channel_send(name, e.to_string()));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::net::TcpListener;

    #[tokio::test]
    async fn test_lazy_connect_and_send() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let address = format!("tcp://{}", listener.local_addr().unwrap());

        let mut channel = TcpPushChannel::new("missed", &address);
        assert!(!channel.is_connected());
        assert!(!channel.address().starts_with("tcp://"));

        let receiver = tokio::spawn(async move {
            let (mut stream, _) = listener.accept().await.unwrap();
            wire::read_multipart(&mut stream).await.unwrap()
        });

        channel
            .send_parts(vec![Bytes::from_static(b"a"), Bytes::from_static(b"bc")])
            .await
            .unwrap();
        assert!(channel.is_connected());

        let parts = receiver.await.unwrap().unwrap();
        assert_eq!(parts, vec![Bytes::from_static(b"a"), Bytes::from_static(b"bc")]);
    }

    #[tokio::test]
    async fn test_connect_failure() {
        // bind then drop to get a port nobody listens on
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let address = listener.local_addr().unwrap().to_string();
        drop(listener);

        let mut channel = TcpPushChannel::new("metrics", &address);
        let err = channel.send_parts(vec![Bytes::new()]).await.unwrap_err();
        assert!(matches!(err, ContractError::ChannelConnection { .. }));
        assert!(!channel.is_connected());
    }
}
