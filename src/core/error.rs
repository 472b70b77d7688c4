//! 生成错误类型与恢复动作
//!
//! 与 RecoveryEngine 配合：Validation / Assertion 失败转为下一次尝试的引导字段，其余错误直接终止。

use serde_json::Value;
use thiserror::Error;

use crate::llm::LlmError;
use crate::signature::{ExtraField, Retval};

/// 抽取失败：某个输出字段缺失或格式不符
#[derive(Debug, Clone, PartialEq)]
pub struct ValidationFailure {
    /// 出错字段名
    pub field: String,
    /// 出错字段标题（用于引导字段标题）
    pub title: String,
    /// 模型给出的原始值
    pub value: String,
    pub message: String,
}

/// 断言失败：携带失败时的完整 retval
#[derive(Debug, Clone, PartialEq)]
pub struct AssertionFailure {
    pub message: String,
    pub values: Retval,
    /// 可选断言在重试耗尽后降级为成功
    pub optional: bool,
}

/// 生成过程中可能出现的错误
#[derive(Error, Debug)]
pub enum GenError {
    #[error("Validation failed for `{}`: {}", .0.field, .0.message)]
    Validation(ValidationFailure),

    #[error("Assertion failed: {}", .0.message)]
    Assertion(AssertionFailure),

    #[error("No result found")]
    NoResult,

    #[error("Could not complete task within maximum allowed steps ({0})")]
    StepsExhausted(usize),

    #[error("Unable to fix validation error: {0}")]
    RetriesExhausted(String),

    #[error("LLM error: {0}")]
    Llm(#[from] LlmError),

    #[error("Tool execution failed: {0}")]
    ToolExecutionFailed(String),

    #[error("Tool timeout: {0}")]
    ToolTimeout(String),

    #[error("Unknown function: {0}")]
    UnknownFunction(String),

    #[error("Missing required input field: {0}")]
    MissingInput(String),

    #[error("Config error: {0}")]
    Config(String),
}

impl GenError {
    /// 抽取失败的便捷构造
    pub fn validation(
        field: impl Into<String>,
        title: impl Into<String>,
        value: impl Into<String>,
        message: impl Into<String>,
    ) -> Self {
        GenError::Validation(ValidationFailure {
            field: field.into(),
            title: title.into(),
            value: value.into(),
            message: message.into(),
        })
    }
}

/// 失败记录：创建后立即用于构建下一次尝试的引导字段
#[derive(Debug, Clone, PartialEq)]
pub enum Failure {
    Validation(ValidationFailure),
    Assertion(AssertionFailure),
}

impl Failure {
    pub fn message(&self) -> &str {
        match self {
            Failure::Validation(v) => &v.message,
            Failure::Assertion(a) => &a.message,
        }
    }

    /// 可选断言失败时返回其 retval（降级结果）
    pub fn degraded_values(&self) -> Option<&Retval> {
        match self {
            Failure::Assertion(a) if a.optional => Some(&a.values),
            _ => None,
        }
    }
}

/// 恢复引擎根据错误类型给出的动作
#[derive(Debug)]
pub enum RecoveryAction {
    /// 以新的引导字段重建 prompt 并重试
    RetryWithGuidance {
        fields: Vec<ExtraField>,
        failure: Failure,
    },
    /// 终止当前任务，原样向上传播
    Abort(GenError),
}

/// 序列化任意 JSON 值为引导字段描述；字符串按原文输出
pub(crate) fn describe_value(value: Option<&Value>) -> String {
    match value {
        Some(Value::String(s)) => s.clone(),
        Some(v) => v.to_string(),
        None => "null".to_string(),
    }
}
