//! 错误定义
//!
//! Config errors are fatal at startup. Source, codec and channel errors
//! surface while serving and are mapped to EOF or STOP by the dispatcher.

use thiserror::Error;

/// Unified error type
#[derive(Debug, Error)]
pub enum ContractError {
    /// Configuration parse error
    #[error("config parse error: {message}")]
    ConfigParse {
        message: String,
        #[source]
        source: Option<Box<dyn std::error::Error + Send + Sync>>,
    },

    /// Configuration validation error
    #[error("config validation error at '{field}': {message}")]
    ConfigValidation { field: String, message: String },

    /// Timeslice source could not be opened or read
    #[error("timeslice source '{source_name}' error: {message}")]
    Source {
        source_name: String,
        message: String,
    },

    /// Payload could not be encoded or decoded
    #[error("codec error: {message}")]
    Codec { message: String },

    /// Channel send error
    #[error("channel '{channel}' send error: {message}")]
    ChannelSend { channel: String, message: String },

    /// Channel connection error
    #[error("channel '{channel}' connection error: {message}")]
    ChannelConnection { channel: String, message: String },

    /// IO error
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}

impl ContractError {
    /// Create configuration parse error
    pub fn config_parse(message: impl Into<String>) -> Self {
        Self::ConfigParse {
            message: message.into(),
            source: None,
        }
    }

    /// Parse error that keeps the underlying parser error as its source
    pub fn config_parse_from<E>(message: impl Into<String>, source: E) -> Self
    where
        E: std::error::Error + Send + Sync + 'static,
    {
        Self::ConfigParse {
            message: message.into(),
            source: Some(Box::new(source)),
        }
    }

    /// Create configuration validation error
    pub fn config_validation(field: impl Into<String>, message: impl Into<String>) -> Self {
        Self::ConfigValidation {
            field: field.into(),
            message: message.into(),
        }
    }

    /// Create source error
    pub fn source(source_name: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Source {
            source_name: source_name.into(),
            message: message.into(),
        }
    }

    /// Create codec error
    pub fn codec(message: impl Into<String>) -> Self {
        Self::Codec {
            message: message.into(),
        }
    }

    /// Create channel send error
    pub fn channel_send(channel: impl Into<String>, message: impl Into<String>) -> Self {
        Self::ChannelSend {
            channel: channel.into(),
            message: message.into(),
        }
    }

    /// Create channel connection error
    pub fn channel_connection(channel: impl Into<String>, message: impl Into<String>) -> Self {
        Self::ChannelConnection {
            channel: channel.into(),
            message: message.into(),
        }
    }
}

impl From<bincode::Error> for ContractError {
    fn from(err: bincode::Error) -> Self {
        Self::codec(err.to_string())
    }
}
