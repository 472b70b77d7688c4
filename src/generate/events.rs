//! 生成过程事件：用于流式/SSE 展示尝试、步数、续写、工具调用与重试

use serde::Serialize;
use tokio::sync::mpsc::UnboundedSender;

/// 单步过程事件（可序列化为 JSON 供前端展示）
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum GenEvent {
    /// 新一次尝试（重建 prompt）
    AttemptStarted { attempt: usize, max_retries: usize },
    /// 尝试内的步数更新
    StepUpdate { step: usize, max_steps: usize },
    /// 回复被截断，发起续写
    Continuation { completion: usize, max_completions: usize },
    FunctionCall {
        name: String,
        args: serde_json::Value,
    },
    /// 工具返回（预览，避免过长）
    FunctionResult { name: String, preview: String },
    /// 抽取或断言失败，带引导字段重试
    Retry { attempt: usize, message: String },
    Done { attempts: usize, degraded: bool },
    Error { text: String },
}

/// 可选事件通道；接收端关闭时静默丢弃
#[derive(Debug, Clone, Default)]
pub struct EventSink {
    tx: Option<UnboundedSender<GenEvent>>,
}

impl EventSink {
    pub fn new(tx: Option<UnboundedSender<GenEvent>>) -> Self {
        Self { tx }
    }

    pub fn emit(&self, event: GenEvent) {
        if let Some(tx) = &self.tx {
            let _ = tx.send(event);
        }
    }
}
