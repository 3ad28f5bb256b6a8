//! 翻译引擎统一错误处理
//!
//! 提供结构化错误类型和错误处理机制。引擎的设计原则是"页面永远处于
//! 一致状态"：这里的大多数错误都会在引擎内部被降级处理（回退重译、
//! 跳过节点、丢弃过期结果），只有配置和传输层的错误才会向调用方传播。

use thiserror::Error;

/// 翻译错误类型
#[derive(Error, Debug, Clone)]
pub enum TranslationError {
    /// 配置错误
    #[error("配置错误: {0}")]
    ConfigError(String),

    /// 翻译服务错误（外部服务返回失败）
    #[error("翻译服务错误: {0}")]
    ProviderError(String),

    /// 协议违规：解码时无法解析关键词标记索引
    ///
    /// 调用方应放弃受保护解码，对原文发起一次无保护的整段重译。
    #[error("关键词标记协议违规: 无法解析索引 {index}")]
    ProtocolViolation { index: u32 },

    /// 响应行数不足：某些节点没有对应的翻译结果
    #[error("翻译结果不完整: 请求 {requested} 行，仅返回 {returned} 行")]
    ShortResponse { requested: usize, returned: usize },

    /// RPC 请求超时
    #[error("RPC 请求超时: {0}")]
    RpcTimeout(String),

    /// RPC 通道已关闭（宿主端不再响应）
    #[error("RPC 通道已关闭: {0}")]
    ChannelClosed(String),

    /// 序列化错误
    #[error("序列化错误: {0}")]
    SerializationError(String),

    /// 解析错误
    #[error("解析错误: {0}")]
    ParseError(String),

    /// 内部错误
    #[error("内部错误: {0}")]
    InternalError(String),
}

impl TranslationError {
    /// 检查错误是否可重试
    pub fn is_retryable(&self) -> bool {
        match self {
            TranslationError::ProviderError(_) => true,
            TranslationError::RpcTimeout(_) => true,
            TranslationError::ShortResponse { .. } => false, // 按设计不重试
            TranslationError::ProtocolViolation { .. } => false, // 走无保护回退
            TranslationError::ChannelClosed(_) => false,
            TranslationError::ConfigError(_) => false,
            TranslationError::SerializationError(_) => false,
            TranslationError::ParseError(_) => false,
            TranslationError::InternalError(_) => false,
        }
    }

    /// 检查错误是否可以在引擎内部被降级处理而不中断整个翻译流程
    pub fn is_recoverable(&self) -> bool {
        matches!(
            self,
            TranslationError::ProtocolViolation { .. }
                | TranslationError::ShortResponse { .. }
                | TranslationError::ProviderError(_)
                | TranslationError::RpcTimeout(_)
        )
    }
}

impl From<serde_json::Error> for TranslationError {
    fn from(error: serde_json::Error) -> Self {
        TranslationError::SerializationError(format!("JSON序列化错误: {}", error))
    }
}

impl From<toml::de::Error> for TranslationError {
    fn from(error: toml::de::Error) -> Self {
        TranslationError::ParseError(format!("TOML解析错误: {}", error))
    }
}

/// 错误结果类型别名
pub type TranslationResult<T> = Result<T, TranslationError>;
