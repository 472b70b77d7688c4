//! Mock LLM 客户端（用于测试，无需 API）
//!
//! 按顺序返回预设的 ChatResponse，并记录收到的每个请求，便于断言 prompt 与续写行为。

use std::collections::VecDeque;
use std::sync::Mutex;

use async_trait::async_trait;

use crate::llm::{CallOptions, ChatRequest, ChatResponse, CompletionResult, LlmClient, LlmError};

/// 脚本化 Mock：队列耗尽后返回 fallback（未设置则报错）
#[derive(Debug, Default)]
pub struct MockLlmClient {
    script: Mutex<VecDeque<ChatResponse>>,
    fallback: Option<ChatResponse>,
    requests: Mutex<Vec<ChatRequest>>,
    function_calling: bool,
}

impl MockLlmClient {
    pub fn new(responses: impl IntoIterator<Item = ChatResponse>) -> Self {
        Self {
            script: Mutex::new(responses.into_iter().collect()),
            ..Default::default()
        }
    }

    /// 每次调用返回单条结果的便捷构造
    pub fn from_results(results: impl IntoIterator<Item = CompletionResult>) -> Self {
        Self::new(results.into_iter().map(ChatResponse::single))
    }

    pub fn with_function_calling(mut self, enabled: bool) -> Self {
        self.function_calling = enabled;
        self
    }

    pub fn with_fallback(mut self, response: ChatResponse) -> Self {
        self.fallback = Some(response);
        self
    }

    /// 已收到的请求（按调用顺序）
    pub fn requests(&self) -> Vec<ChatRequest> {
        self.requests
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .clone()
    }

    pub fn call_count(&self) -> usize {
        self.requests.lock().unwrap_or_else(|e| e.into_inner()).len()
    }
}

#[async_trait]
impl LlmClient for MockLlmClient {
    async fn chat(&self, request: ChatRequest, _options: &CallOptions) -> Result<ChatResponse, LlmError> {
        self.requests
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .push(request);
        let next = self
            .script
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .pop_front();
        next.or_else(|| self.fallback.clone())
            .ok_or_else(|| LlmError::Api("mock script exhausted".to_string()))
    }

    fn supports_function_calling(&self) -> bool {
        self.function_calling
    }
}
