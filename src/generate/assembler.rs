//! 补全拼接器
//!
//! 同一逻辑轮次内多次调用补全服务：finish_reason 为 Length 时继续请求并拼接 content，
//! 直到正常结束或达到 max_completions（此时尽力返回已拼接结果）。不写对话历史，由调用方追加一次。

use crate::core::GenError;
use crate::generate::{EventSink, GenEvent};
use crate::llm::{
    CallOptions, ChatRequest, CompletionResult, FinishReason, FunctionCallPolicy, FunctionSpec,
    LlmClient, ModelConfig, ResponseFormat,
};
use crate::memory::Message;

/// 单次 forward 内复用的拼接器配置
pub struct CompletionAssembler<'a> {
    llm: &'a dyn LlmClient,
    functions: Option<&'a [FunctionSpec]>,
    function_call: Option<&'a FunctionCallPolicy>,
    model_config: ModelConfig,
    response_format: Option<ResponseFormat>,
    max_completions: usize,
}

impl<'a> CompletionAssembler<'a> {
    pub fn new(llm: &'a dyn LlmClient, max_completions: usize) -> Self {
        Self {
            llm,
            functions: None,
            function_call: None,
            model_config: ModelConfig::default(),
            response_format: None,
            max_completions: max_completions.max(1),
        }
    }

    /// 原生函数调用：随请求发送函数声明与调用策略
    pub fn with_functions(
        mut self,
        functions: &'a [FunctionSpec],
        function_call: Option<&'a FunctionCallPolicy>,
    ) -> Self {
        if !functions.is_empty() {
            self.functions = Some(functions);
            self.function_call = function_call;
        }
        self
    }

    pub fn with_model_config(mut self, model_config: ModelConfig) -> Self {
        self.model_config = model_config;
        self
    }

    /// 输出含 JSON / 数组字段时请求 JSON 形态的回复
    pub fn json_output(mut self, enabled: bool) -> Self {
        self.response_format = enabled.then_some(ResponseFormat::JsonObject);
        self
    }

    fn request(&self, history: Vec<Message>) -> ChatRequest {
        ChatRequest {
            history,
            functions: self.functions.map(<[FunctionSpec]>::to_vec),
            function_call: self.function_call.cloned(),
            response_format: self.response_format,
            model_config: self.model_config.clone(),
        }
    }

    /// 完成一个逻辑轮次；任何一次调用没有结果都视为致命错误
    pub async fn assemble(
        &self,
        history: Vec<Message>,
        options: &CallOptions,
        events: &EventSink,
    ) -> Result<CompletionResult, GenError> {
        let mut assembled: Option<CompletionResult> = None;

        for n in 0..self.max_completions {
            let mut turn_history = history.clone();
            if let Some(partial) = &assembled {
                // 续写：附带已生成部分（不写入存储）
                turn_history.push(Message::from_result(partial));
                events.emit(GenEvent::Continuation {
                    completion: n + 1,
                    max_completions: self.max_completions,
                });
                tracing::debug!(completion = n + 1, "continuing truncated completion");
            }

            let response = self.llm.chat(self.request(turn_history), options).await?;
            let result = response
                .results
                .into_iter()
                .next()
                .ok_or(GenError::NoResult)?;
            let truncated = result.finish_reason == FinishReason::Length;

            assembled = Some(match assembled {
                None => result,
                Some(acc) => merge(acc, result),
            });

            if !truncated {
                break;
            }
        }

        if matches!(&assembled, Some(r) if r.finish_reason == FinishReason::Length) {
            tracing::warn!(
                max_completions = self.max_completions,
                "completion still truncated after maximum continuations"
            );
        }
        assembled.ok_or(GenError::NoResult)
    }
}

/// 拼接 content，合并函数调用，结束原因取最后一次
fn merge(acc: CompletionResult, next: CompletionResult) -> CompletionResult {
    let content = match (acc.content, next.content) {
        (None, None) => None,
        (a, b) => Some(a.unwrap_or_default() + &b.unwrap_or_default()),
    };
    let function_calls = match (acc.function_calls, next.function_calls) {
        (None, None) => None,
        (a, b) => Some(a.into_iter().chain(b).flatten().collect()),
    };
    CompletionResult {
        content,
        finish_reason: next.finish_reason,
        function_calls,
    }
}
