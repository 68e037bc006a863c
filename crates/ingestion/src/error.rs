//! Ingestion 错误类型

use contracts::{ContractError, StreamError};
use thiserror::Error;

/// Ingestion 错误
#[derive(Debug, Error)]
pub enum IngestionError {
    /// 订阅失败
    #[error("failed to subscribe to the firehose: {0}")]
    Subscribe(#[source] ContractError),

    /// 不可重试的流错误
    #[error(transparent)]
    Stream(#[from] StreamError),

    /// Transport 关闭了通道
    #[error("transport closed its {channel} channel")]
    TransportClosed {
        /// 被关闭的通道
        channel: &'static str,
    },
}

/// Ingestion Result 类型别名
pub type Result<T> = std::result::Result<T, IngestionError>;
