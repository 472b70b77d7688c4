//! LLM 层：补全服务抽象、请求/响应类型、Mock

pub mod mock;
pub mod traits;
pub mod types;

pub use mock::MockLlmClient;
pub use traits::{LlmClient, LlmError};
pub use types::{
    CallOptions, ChatRequest, ChatResponse, CompletionResult, FinishReason, FunctionCall,
    FunctionCallPolicy, FunctionSpec, ModelConfig, ResponseFormat,
};
