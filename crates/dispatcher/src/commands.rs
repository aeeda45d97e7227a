//! CommandChannel - missed-index reports and lifecycle commands
//!
//! Commands are fire-and-forget: a failed `STOP` or `EOF` is logged and
//! never escalated. Both are preceded by a grace sleep so consumers can
//! finish the data already in flight.

use std::time::Duration;

use contracts::{wire, ContractError, ControlSignals, MessageChannel, ServerSettings};
use observability::metrics;
use tracing::{debug, error, info, instrument};

use crate::channels::OutputChannel;

/// Implements [`ControlSignals`] on top of the optional side channels
pub struct CommandChannel {
    missed: Option<OutputChannel>,
    commands: Option<OutputChannel>,
    stop_grace: Duration,
    eof_grace: Duration,
}

impl CommandChannel {
    pub fn new(
        missed: Option<OutputChannel>,
        commands: Option<OutputChannel>,
        stop_grace: Duration,
        eof_grace: Duration,
    ) -> Self {
        Self {
            missed,
            commands,
            stop_grace,
            eof_grace,
        }
    }

    /// Side channels and grace delays from the resolved settings
    pub fn from_settings(settings: &ServerSettings) -> Self {
        Self::new(
            settings
                .channels
                .missed_indices
                .as_ref()
                .map(OutputChannel::from_binding),
            settings
                .channels
                .commands
                .as_ref()
                .map(OutputChannel::from_binding),
            settings.stop_grace,
            settings.eof_grace,
        )
    }

    /// No side channel at all
    pub fn disabled() -> Self {
        Self::new(None, None, Duration::ZERO, Duration::ZERO)
    }

    pub fn has_commands(&self) -> bool {
        self.commands.is_some()
    }

    #[instrument(name = "command_send", skip(self, grace), fields(command = %command))]
    async fn send_command(&mut self, command: String, grace: Duration) {
        let Some(channel) = self.commands.as_mut() else {
            debug!(%command, "no command channel, command not sent");
            return;
        };

        tokio::time::sleep(grace).await;

        let result = match wire::encode_string(&command) {
            Ok(payload) => channel.send_parts(vec![payload]).await,
            Err(e) => Err(e),
        };
        match result {
            Ok(()) => {
                info!(%command, "command sent");
                let kind = command.split_whitespace().next().unwrap_or_default();
                metrics::record_command(kind);
            }
            Err(e) => error!(%command, error = %e, "command could not be sent"),
        }
    }
}

impl ControlSignals for CommandChannel {
    async fn report_missed(&mut self, indices: &[u64]) -> Result<(), ContractError> {
        let Some(channel) = self.missed.as_mut() else {
            return Ok(());
        };

        let payload = wire::encode_indices(indices)?;
        channel.send_parts(vec![payload]).await.inspect_err(|e| {
            error!(count = indices.len(), error = %e, "missed indices could not be sent");
        })
    }

    async fn announce_eof(&mut self, last_index: u64, count: u64) {
        let grace = self.eof_grace;
        self.send_command(wire::eof_command(last_index, count), grace)
            .await;
    }

    async fn announce_stop(&mut self) {
        let grace = self.stop_grace;
        self.send_command(wire::STOP_COMMAND.to_string(), grace)
            .await;
    }
}
