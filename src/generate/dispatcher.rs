//! 工具调用分发
//!
//! 按顺序执行本轮请求的函数调用，结果以 function 消息写回对话历史；
//! 名称含终止标记（默认 task_done）的调用结束循环，其后的调用不再执行。

use crate::core::GenError;
use crate::generate::resolver::Resolved;
use crate::generate::{EventSink, GenEvent};
use crate::llm::CallOptions;
use crate::memory::{HistoryStore, Message};
use crate::signature::Retval;
use crate::tools::FunctionExecutor;

/// Observation 预览最大字符数
const RESULT_PREVIEW_CHARS: usize = 200;

pub struct ToolDispatcher<'a> {
    executor: Option<&'a dyn FunctionExecutor>,
    history: &'a dyn HistoryStore,
    terminal_function: &'a str,
}

impl<'a> ToolDispatcher<'a> {
    pub fn new(
        executor: Option<&'a dyn FunctionExecutor>,
        history: &'a dyn HistoryStore,
        terminal_function: &'a str,
    ) -> Self {
        Self {
            executor,
            history,
            terminal_function,
        }
    }

    /// Some(retval) 表示本轮结束；None 表示工具已执行，需要下一轮补全
    pub async fn dispatch(
        &self,
        resolved: Resolved,
        options: &CallOptions,
        events: &EventSink,
    ) -> Result<Option<Retval>, GenError> {
        let Resolved { values, functions } = resolved;
        let calls = match functions {
            None => return Ok(Some(values)),
            Some(calls) if calls.is_empty() => return Ok(Some(values)),
            Some(calls) => calls,
        };

        for call in &calls {
            if call.name.contains(self.terminal_function) {
                tracing::debug!(function = %call.name, "terminal function reached");
                return Ok(Some(values));
            }

            events.emit(GenEvent::FunctionCall {
                name: call.name.clone(),
                args: call.arguments.clone(),
            });
            let executor = self
                .executor
                .ok_or_else(|| GenError::UnknownFunction(call.name.clone()))?;
            let outcome = executor.execute(call, options).await?;

            let result = outcome.result.unwrap_or_default();
            events.emit(GenEvent::FunctionResult {
                name: call.name.clone(),
                preview: preview(&result),
            });
            if let Some(id) = outcome.id {
                self.history
                    .add(vec![Message::function(id, result)], options.session_id.as_deref());
            }
        }
        Ok(None)
    }
}

fn preview(text: &str) -> String {
    if text.chars().count() > RESULT_PREVIEW_CHARS {
        format!("{}...", text.chars().take(RESULT_PREVIEW_CHARS).collect::<String>())
    } else {
        text.to_string()
    }
}
