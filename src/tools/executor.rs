//! 工具执行器
//!
//! FunctionExecutor 是生成循环调用工具的唯一接口。ToolExecutor 持有 ToolRegistry 与全局超时，
//! 超时或失败时转为 GenError（ToolTimeout / ToolExecutionFailed）；每次调用输出结构化审计日志（JSON）。

use std::time::{Duration, Instant};

use async_trait::async_trait;
use tokio::time::timeout;

use crate::config::ForgeConfig;
use crate::core::GenError;
use crate::llm::{CallOptions, FunctionCall};
use crate::tools::ToolRegistry;

/// 一次函数执行的结果；id 为空时不写入对话历史
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FunctionOutcome {
    pub id: Option<String>,
    pub result: Option<String>,
}

/// 执行模型请求的函数调用
#[async_trait]
pub trait FunctionExecutor: Send + Sync {
    async fn execute(&self, call: &FunctionCall, options: &CallOptions) -> Result<FunctionOutcome, GenError>;
}

/// 基于注册表的执行器：对每次调用施加超时
pub struct ToolExecutor {
    registry: ToolRegistry,
    timeout: Duration,
}

impl ToolExecutor {
    pub fn new(registry: ToolRegistry, timeout_secs: u64) -> Self {
        Self {
            registry,
            timeout: Duration::from_secs(timeout_secs),
        }
    }

    /// 超时取自 [tools] tool_timeout_secs
    pub fn from_config(registry: ToolRegistry, config: &ForgeConfig) -> Self {
        Self::new(registry, config.tools.tool_timeout_secs)
    }

    pub fn registry(&self) -> &ToolRegistry {
        &self.registry
    }
}

#[async_trait]
impl FunctionExecutor for ToolExecutor {
    async fn execute(&self, call: &FunctionCall, options: &CallOptions) -> Result<FunctionOutcome, GenError> {
        let tool = self
            .registry
            .get(&call.name)
            .ok_or_else(|| GenError::UnknownFunction(call.name.clone()))?;

        let start = Instant::now();
        let result = timeout(self.timeout, tool.execute(call.arguments.clone())).await;

        let (ok, outcome): (bool, &str) = match &result {
            Ok(Ok(_)) => (true, "ok"),
            Ok(Err(_)) => (false, "error"),
            Err(_) => (false, "timeout"),
        };
        let audit = serde_json::json!({
            "event": "tool_audit",
            "tool": call.name,
            "call_id": call.id,
            "session_id": options.session_id,
            "trace_id": options.trace_id,
            "ok": ok,
            "outcome": outcome,
            "duration_ms": start.elapsed().as_millis() as u64,
            "args_preview": args_preview(&call.arguments),
        });
        tracing::info!(audit = %audit.to_string(), "tool");

        match result {
            Ok(Ok(content)) => Ok(FunctionOutcome {
                id: call.id.clone(),
                result: Some(content),
            }),
            Ok(Err(e)) => Err(GenError::ToolExecutionFailed(format!("{}: {}", call.name, e))),
            Err(_) => Err(GenError::ToolTimeout(call.name.clone())),
        }
    }
}

fn args_preview(args: &serde_json::Value) -> String {
    let s = args.to_string();
    if s.chars().count() > 200 {
        format!("{}...", s.chars().take(200).collect::<String>())
    } else {
        s
    }
}
