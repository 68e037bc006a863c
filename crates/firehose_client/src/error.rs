//! Transport 错误类型

use contracts::ContractError;
use thiserror::Error;

/// Websocket transport 错误
#[derive(Debug, Error)]
pub enum TransportError {
    /// 无效的 firehose URL
    #[error("invalid firehose url '{url}': {message}")]
    InvalidUrl { url: String, message: String },

    /// 无效的认证 token
    #[error("auth token is not a valid header value")]
    InvalidToken,

    /// TLS 初始化失败
    #[error("tls setup failed: {0}")]
    Tls(#[from] native_tls::Error),

    /// 已经订阅
    #[error("consumer is already subscribed")]
    AlreadySubscribed,

    /// Envelope 解码失败
    #[error("failed to decode envelope: {0}")]
    Decode(#[from] prost::DecodeError),
}

impl From<TransportError> for ContractError {
    fn from(err: TransportError) -> Self {
        ContractError::subscribe("firehose-websocket", err.to_string())
    }
}
