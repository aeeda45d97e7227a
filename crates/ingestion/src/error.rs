//! Ingestion 错误类型

use contracts::ContractError;
use thiserror::Error;

/// Ingestion 错误
#[derive(Debug, Error)]
pub enum IngestionError {
    /// 数据源无法创建
    #[error("failed to open timeslice source '{source_name}': {message}")]
    OpenFailed {
        /// 数据源名称
        source_name: String,
        /// 错误消息
        message: String,
    },

    /// 缺失 timeslice 报告发送失败
    #[error("failed to report missed timeslices: {source}")]
    Signal {
        #[source]
        source: ContractError,
    },
}

impl IngestionError {
    pub fn open_failed(source_name: impl Into<String>, message: impl Into<String>) -> Self {
        Self::OpenFailed {
            source_name: source_name.into(),
            message: message.into(),
        }
    }
}

/// Ingestion Result 类型别名
pub type Result<T> = std::result::Result<T, IngestionError>;
