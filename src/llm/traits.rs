//! 补全服务抽象
//!
//! 后端实现 LlmClient::chat；supports_function_calling 决定生成器在构建时选择原生还是模拟函数调用。

use async_trait::async_trait;
use thiserror::Error;

use crate::llm::{CallOptions, ChatRequest, ChatResponse};

/// 后端调用失败
#[derive(Error, Debug, Clone, PartialEq)]
pub enum LlmError {
    #[error("Network error: {0}")]
    Network(String),

    #[error("Request timeout")]
    Timeout,

    #[error("Rate limited: {0}")]
    RateLimited(String),

    #[error("API error: {0}")]
    Api(String),
}

/// 补全服务 trait
#[async_trait]
pub trait LlmClient: Send + Sync {
    async fn chat(&self, request: ChatRequest, options: &CallOptions) -> Result<ChatResponse, LlmError>;

    /// 是否支持原生函数调用；默认不支持（使用 functionName / functionArguments 模拟）
    fn supports_function_calling(&self) -> bool {
        false
    }
}
