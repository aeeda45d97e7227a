//! TcpRequestChannel - request-reply over TCP
//!
//! Consumers connect to the listening address and exchange length-prefixed
//! frames: one request, then one reply. Connections are accepted and read on
//! background tasks which only enqueue requests; the dispatcher takes them one
//! at a time through [`RequestChannel::next_request`].
//!
//! A request that is never replied to (ignored after end of stream) closes
//! its consumer's connection.

use std::net::SocketAddr;

use bytes::Bytes;
use contracts::{wire, ContractError, RequestChannel};
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::{mpsc, oneshot};
use tokio::task::JoinHandle;
use tracing::{debug, info, instrument, warn};

/// Pending requests waiting for the dispatcher
const REQUEST_QUEUE_CAPACITY: usize = 64;

/// Reply handed to a connection task, with the write result sent back
struct Reply {
    payload: Bytes,
    done: oneshot::Sender<Result<(), ContractError>>,
}

struct PendingRequest {
    payload: Bytes,
    peer: SocketAddr,
    reply: oneshot::Sender<Reply>,
}

/// Listening request channel
pub struct TcpRequestChannel {
    name: String,
    local_addr: SocketAddr,
    rx: mpsc::Receiver<PendingRequest>,
    pending: Option<(SocketAddr, oneshot::Sender<Reply>)>,
    accept_task: JoinHandle<()>,
}

impl TcpRequestChannel {
    /// Bind `address` (`host:port`, optionally `tcp://`-prefixed) and start
    /// accepting consumers
    #[instrument(name = "request_channel_bind", skip(name), fields(channel))]
    pub async fn bind(name: impl Into<String>, address: &str) -> Result<Self, ContractError> {
        let name = name.into();
        tracing::Span::current().record("channel", name.as_str());

        let address = address.trim_start_matches("tcp://");
        let listener = TcpListener::bind(address)
            .await
            .map_err(|e| ContractError::channel_connection(&name, format!("bind {address}: {e}")))?;
        let local_addr = listener.local_addr()?;
        info!(channel = %name, address = %local_addr, "request channel listening");

        let (tx, rx) = mpsc::channel(REQUEST_QUEUE_CAPACITY);
        let accept_task = tokio::spawn(accept_loop(listener, tx, name.clone()));

        Ok(Self {
            name,
            local_addr,
            rx,
            pending: None,
            accept_task,
        })
    }

    /// Actual listening address (useful with port 0)
    pub fn local_addr(&self) -> SocketAddr {
        self.local_addr
    }
}

impl Drop for TcpRequestChannel {
    fn drop(&mut self) {
        self.accept_task.abort();
    }
}

impl RequestChannel for TcpRequestChannel {
    fn name(&self) -> &str {
        &self.name
    }

    async fn next_request(&mut self) -> Result<Option<Bytes>, ContractError> {
        if let Some((peer, _)) = self.pending.take() {
            debug!(channel = %self.name, %peer, "request left without reply");
        }

        match self.rx.recv().await {
            Some(request) => {
                self.pending = Some((request.peer, request.reply));
                Ok(Some(request.payload))
            }
            None => Ok(None),
        }
    }

    async fn reply(&mut self, payload: Bytes) -> Result<(), ContractError> {
        let (peer, reply) = self
            .pending
            .take()
            .ok_or_else(|| ContractError::channel_send(&self.name, "no pending request"))?;

        let (done_tx, done_rx) = oneshot::channel();
        reply
            .send(Reply {
                payload,
                done: done_tx,
            })
            .map_err(|_| ContractError::channel_send(&self.name, format!("consumer {peer} gone")))?;

        done_rx
            .await
            .map_err(|_| ContractError::channel_send(&self.name, format!("consumer {peer} gone")))?
            .map_err(|e| ContractError::channel_send(&self.name, e.to_string()))
    }
}

async fn accept_loop(listener: TcpListener, tx: mpsc::Sender<PendingRequest>, name: String) {
    loop {
        match listener.accept().await {
            Ok((stream, peer)) => {
                debug!(channel = %name, %peer, "consumer connected");
                stream.set_nodelay(true).ok();
                tokio::spawn(serve_connection(stream, peer, tx.clone(), name.clone()));
            }
            Err(e) => {
                warn!(channel = %name, error = %e, "accept failed");
            }
        }
    }
}

async fn serve_connection(
    stream: TcpStream,
    peer: SocketAddr,
    tx: mpsc::Sender<PendingRequest>,
    name: String,
) {
    let (mut reader, mut writer) = stream.into_split();

    loop {
        let payload = match wire::read_frame(&mut reader).await {
            Ok(Some(payload)) => payload,
            Ok(None) => break,
            Err(e) => {
                warn!(channel = %name, %peer, error = %e, "bad request frame");
                break;
            }
        };

        let (reply_tx, reply_rx) = oneshot::channel();
        let request = PendingRequest {
            payload,
            peer,
            reply: reply_tx,
        };
        if tx.send(request).await.is_err() {
            break;
        }

        let Ok(reply) = reply_rx.await else {
            debug!(channel = %name, %peer, "request ignored, closing connection");
            break;
        };

        let result = wire::write_frame(&mut writer, &reply.payload).await;
        let failed = result.is_err();
        // dispatcher may have stopped waiting
        let _ = reply.done.send(result);
        if failed {
            break;
        }
    }

    debug!(channel = %name, %peer, "consumer disconnected");
}

#[cfg(test)]
mod tests {
    use super::*;

    async fn request(stream: &mut TcpStream, payload: &[u8]) -> Option<Bytes> {
        wire::write_frame(stream, payload).await.unwrap();
        wire::read_frame(stream).await.unwrap()
    }

    #[tokio::test]
    async fn test_request_reply_round_trip() {
        let mut channel = TcpRequestChannel::bind("ts-request", "tcp://127.0.0.1:0")
            .await
            .unwrap();
        let addr = channel.local_addr();

        let client = tokio::spawn(async move {
            let mut stream = TcpStream::connect(addr).await.unwrap();
            let first = request(&mut stream, b"ping").await;
            let second = request(&mut stream, b"again").await;
            (first, second)
        });

        assert_eq!(channel.next_request().await.unwrap(), Some(Bytes::from("ping")));
        channel.reply(Bytes::from("pong")).await.unwrap();
        assert_eq!(channel.next_request().await.unwrap(), Some(Bytes::from("again")));
        // no reply: connection is closed
        drop(channel.pending.take());

        let (first, second) = client.await.unwrap();
        assert_eq!(first, Some(Bytes::from("pong")));
        assert_eq!(second, None);
    }

    #[tokio::test]
    async fn test_reply_without_request() {
        let mut channel = TcpRequestChannel::bind("ts-request", "127.0.0.1:0")
            .await
            .unwrap();
        assert!(channel.reply(Bytes::from("x")).await.is_err());
    }

    #[tokio::test]
    async fn test_several_consumers() {
        let mut channel = TcpRequestChannel::bind("ts-request", "127.0.0.1:0")
            .await
            .unwrap();
        let addr = channel.local_addr();

        let clients: Vec<_> = (0..3)
            .map(|i| {
                tokio::spawn(async move {
                    let mut stream = TcpStream::connect(addr).await.unwrap();
                    request(&mut stream, format!("c{i}").as_bytes()).await
                })
            })
            .collect();

        for _ in 0..3 {
            let req = channel.next_request().await.unwrap().unwrap();
            let mut reply = req.to_vec();
            reply.extend_from_slice(b"-ok");
            channel.reply(Bytes::from(reply)).await.unwrap();
        }

        for (i, client) in clients.into_iter().enumerate() {
            assert_eq!(
                client.await.unwrap(),
                Some(Bytes::from(format!("c{i}-ok")))
            );
        }
    }
}
