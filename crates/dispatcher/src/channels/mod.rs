//! Transport channels
//!
//! Push channels (TCP, log, memory) behind [`OutputChannel`], and the TCP
//! request channel.

mod log;
mod memory;
mod request;
mod tcp;

pub use self::log::LogChannel;
pub use self::memory::{MemoryChannel, MemoryRequestChannel};
pub use self::request::TcpRequestChannel;
pub use self::tcp::TcpPushChannel;

use bytes::Bytes;
use contracts::{ChannelBinding, ChannelKind, ContractError, MessageChannel};

/// Any push channel
pub enum OutputChannel {
    Tcp(TcpPushChannel),
    Log(LogChannel),
    Memory(MemoryChannel),
}

impl OutputChannel {
    /// Channel for a configured binding; nothing is connected yet
    pub fn from_binding(binding: &ChannelBinding) -> Self {
        match binding.kind {
            ChannelKind::Tcp => Self::Tcp(TcpPushChannel::new(&binding.name, &binding.address)),
            ChannelKind::Log => Self::Log(LogChannel::new(&binding.name)),
        }
    }
}

impl From<MemoryChannel> for OutputChannel {
    fn from(channel: MemoryChannel) -> Self {
        Self::Memory(channel)
    }
}

impl MessageChannel for OutputChannel {
    fn name(&self) -> &str {
        match self {
            Self::Tcp(c) => c.name(),
            Self::Log(c) => c.name(),
            Self::Memory(c) => c.name(),
        }
    }

    async fn send_parts(&mut self, parts: Vec<Bytes>) -> Result<(), ContractError> {
        match self {
            Self::Tcp(c) => c.send_parts(parts).await,
            Self::Log(c) => c.send_parts(parts).await,
            Self::Memory(c) => c.send_parts(parts).await,
        }
    }
}
