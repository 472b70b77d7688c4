//! 补全服务的请求 / 响应类型（与具体后端无关）

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::memory::Message;

/// 单轮补全的结束原因；Length 表示被截断，需要续写
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum FinishReason {
    #[default]
    Stop,
    Length,
    FunctionCall,
    ContentFilter,
    Error,
}

/// 模型请求的函数调用：原生读取或由 functionName / functionArguments 合成
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FunctionCall {
    pub id: Option<String>,
    pub name: String,
    #[serde(default)]
    pub arguments: Value,
}

impl FunctionCall {
    pub fn new(name: impl Into<String>, arguments: Value) -> Self {
        Self {
            id: None,
            name: name.into(),
            arguments,
        }
    }

    pub fn with_id(mut self, id: impl Into<String>) -> Self {
        self.id = Some(id.into());
        self
    }
}

/// 函数声明：名称、描述、参数 JSON Schema
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FunctionSpec {
    pub name: String,
    pub description: String,
    pub parameters: Value,
}

/// 原生函数调用策略
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FunctionCallPolicy {
    Auto,
    None,
    Required,
    Named(String),
}

/// 期望的回复格式
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ResponseFormat {
    Text,
    JsonObject,
}

/// 模型参数；调用级覆盖按字段合并
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ModelConfig {
    pub temperature: Option<f32>,
    pub max_tokens: Option<u32>,
    pub top_p: Option<f32>,
}

impl ModelConfig {
    /// other 中已设置的字段覆盖 self
    pub fn merged(&self, other: &ModelConfig) -> ModelConfig {
        ModelConfig {
            temperature: other.temperature.or(self.temperature),
            max_tokens: other.max_tokens.or(self.max_tokens),
            top_p: other.top_p.or(self.top_p),
        }
    }
}

/// 一次 chat 调用的请求
#[derive(Debug, Clone, Default)]
pub struct ChatRequest {
    pub history: Vec<Message>,
    pub functions: Option<Vec<FunctionSpec>>,
    pub function_call: Option<FunctionCallPolicy>,
    pub response_format: Option<ResponseFormat>,
    pub model_config: ModelConfig,
}

/// 会话 / 追踪标识，透传给后端与工具层（由其实现超时、取消）
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CallOptions {
    pub session_id: Option<String>,
    pub trace_id: Option<String>,
}

/// 单轮补全结果
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CompletionResult {
    pub content: Option<String>,
    pub finish_reason: FinishReason,
    pub function_calls: Option<Vec<FunctionCall>>,
}

impl CompletionResult {
    pub fn text(content: impl Into<String>) -> Self {
        Self {
            content: Some(content.into()),
            ..Default::default()
        }
    }

    /// 被截断的片段
    pub fn truncated(content: impl Into<String>) -> Self {
        Self {
            content: Some(content.into()),
            finish_reason: FinishReason::Length,
            function_calls: None,
        }
    }

    pub fn calls(function_calls: Vec<FunctionCall>) -> Self {
        Self {
            content: None,
            finish_reason: FinishReason::FunctionCall,
            function_calls: Some(function_calls),
        }
    }
}

/// chat 调用响应；results 为空表示后端未返回任何结果
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ChatResponse {
    pub results: Vec<CompletionResult>,
}

impl ChatResponse {
    pub fn single(result: CompletionResult) -> Self {
        Self { results: vec![result] }
    }
}
