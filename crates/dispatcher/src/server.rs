//! Serve loop - feeds requests to the dispatcher until the run ends

use std::future::Future;

use contracts::{RequestChannel, TimesliceSource};
use tracing::{info, instrument, warn};

use crate::dispatcher::Dispatcher;

/// Why the serve loop returned
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ServeOutcome {
    /// The dispatcher asked to stop after a failed send
    Stopped,
    /// The request channel closed
    ChannelClosed,
    /// The request channel failed
    TransportError(String),
    /// The shutdown future completed
    Interrupted,
}

impl ServeOutcome {
    /// Whether the run ended without a failure
    pub fn is_clean(&self) -> bool {
        matches!(self, Self::ChannelClosed | Self::Interrupted)
    }
}

/// Take requests one at a time until the dispatcher stops, the channel
/// closes or `shutdown` resolves
#[instrument(name = "dispatcher_serve", skip_all, fields(channel = %channel.name()))]
pub async fn serve<S, R, F>(
    dispatcher: &mut Dispatcher<S>,
    channel: &mut R,
    shutdown: F,
) -> ServeOutcome
where
    S: TimesliceSource,
    R: RequestChannel,
    F: Future<Output = ()>,
{
    tokio::pin!(shutdown);
    info!(mode = dispatcher.mode().as_str(), "serving requests");

    loop {
        let request = tokio::select! {
            () = &mut shutdown => {
                info!("shutdown requested");
                return ServeOutcome::Interrupted;
            }
            request = channel.next_request() => request,
        };

        match request {
            Ok(Some(payload)) => {
                if !dispatcher.handle(&payload, channel).await {
                    warn!(messages = dispatcher.message_counter(), "dispatcher stopped");
                    return ServeOutcome::Stopped;
                }
            }
            Ok(None) => {
                info!("request channel closed");
                return ServeOutcome::ChannelClosed;
            }
            Err(e) => {
                warn!(error = %e, "request channel failed");
                return ServeOutcome::TransportError(e.to_string());
            }
        }
    }
}
