//! 错误恢复引擎
//!
//! 根据 GenError 返回 RecoveryAction：Validation / Assertion 失败构建下一次尝试的引导字段，
//! 其他错误（步数耗尽、无结果、传输失败等）一律 Abort。纯函数，无 I/O。

use crate::core::error::describe_value;
use crate::core::{AssertionFailure, Failure, GenError, RecoveryAction, ValidationFailure};
use crate::signature::{ExtraField, Signature};

/// 引导字段中承载错误说明的字段名
pub const INSTRUCTIONS_FIELD: &str = "instructions";

/// 失败 -> 引导字段；每次重试整体替换，不跨尝试累积
#[derive(Debug, Default)]
pub struct RecoveryEngine;

impl RecoveryEngine {
    pub fn new() -> Self {
        Self
    }

    pub fn handle(&self, err: GenError, signature: &Signature) -> RecoveryAction {
        match err {
            GenError::Validation(v) => RecoveryAction::RetryWithGuidance {
                fields: Self::fields_from_validation(&v),
                failure: Failure::Validation(v),
            },
            GenError::Assertion(a) => RecoveryAction::RetryWithGuidance {
                fields: Self::fields_from_assertion(&a, signature),
                failure: Failure::Assertion(a),
            },
            other => RecoveryAction::Abort(other),
        }
    }

    /// 抽取失败只针对单个字段：past_<field> + instructions
    pub fn fields_from_validation(failure: &ValidationFailure) -> Vec<ExtraField> {
        vec![
            ExtraField::new(
                format!("past_{}", failure.field),
                format!("Past {}", failure.title),
                failure.value.clone(),
            ),
            instructions(&failure.message),
        ]
    }

    /// 断言针对整个 retval：每个输出字段一条 past_<field>，再加 instructions
    pub fn fields_from_assertion(failure: &AssertionFailure, signature: &Signature) -> Vec<ExtraField> {
        let mut fields: Vec<ExtraField> = signature
            .output_fields()
            .iter()
            .map(|f| {
                ExtraField::new(
                    format!("past_{}", f.name),
                    format!("Past {}", f.title),
                    describe_value(failure.values.get(&f.name)),
                )
            })
            .collect();
        fields.push(instructions(&failure.message));
        fields
    }
}

fn instructions(message: &str) -> ExtraField {
    ExtraField::new(INSTRUCTIONS_FIELD, "Instructions", message)
}
