//! 输出解析
//!
//! 补全结果 -> retval：抽取字段值、按顺序执行断言、读取函数调用。
//! 函数调用的读取方式在构建时按模型能力选定：原生读取 function_calls，或由 functionName / functionArguments 合成。

use serde_json::Value;

use crate::core::GenError;
use crate::generate::assertion::{check_assertions, Assertion};
use crate::llm::{CompletionResult, FunctionCall};
use crate::signature::{Extractor, Retval, Signature, FUNCTION_ARGUMENTS_FIELD, FUNCTION_NAME_FIELD};

/// 函数调用解析策略（每个生成器构建时选定一次）
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FunctionCallStrategy {
    /// 模型原生返回 function_calls
    Native,
    /// 通过两个伪输出字段模拟
    Simulated,
}

impl FunctionCallStrategy {
    pub fn select(supports_function_calling: bool) -> Self {
        if supports_function_calling {
            FunctionCallStrategy::Native
        } else {
            FunctionCallStrategy::Simulated
        }
    }

    fn take_calls(self, result_calls: Option<Vec<FunctionCall>>, values: &mut Retval) -> Option<Vec<FunctionCall>> {
        match self {
            FunctionCallStrategy::Native => result_calls,
            FunctionCallStrategy::Simulated => take_simulated_call(values).map(|call| vec![call]),
        }
    }
}

/// 解析结果：字段值 + 本轮请求的函数调用（None 表示没有函数调用字段）
#[derive(Debug, Clone, PartialEq)]
pub struct Resolved {
    pub values: Retval,
    pub functions: Option<Vec<FunctionCall>>,
}

pub struct OutputResolver<'a> {
    signature: &'a Signature,
    extractor: &'a dyn Extractor,
    assertions: &'a [Assertion],
    /// None：生成器未声明函数，不读取任何函数调用
    strategy: Option<FunctionCallStrategy>,
}

impl<'a> OutputResolver<'a> {
    pub fn new(
        signature: &'a Signature,
        extractor: &'a dyn Extractor,
        assertions: &'a [Assertion],
        strategy: Option<FunctionCallStrategy>,
    ) -> Self {
        Self {
            signature,
            extractor,
            assertions,
            strategy,
        }
    }

    /// 抽取失败返回 Validation，断言失败返回 Assertion；无 content 时 retval 为空
    pub fn resolve(&self, result: CompletionResult) -> Result<Resolved, GenError> {
        let mut values = match result.content.as_deref().map(str::trim) {
            Some(content) if !content.is_empty() => {
                let values = self.extractor.extract(self.signature, content)?;
                check_assertions(self.assertions, &values)?;
                values
            }
            _ => Retval::new(),
        };
        let functions = self
            .strategy
            .and_then(|strategy| strategy.take_calls(result.function_calls, &mut values));
        Ok(Resolved { values, functions })
    }
}

/// 取出 functionName / functionArguments 合成一个调用，并从 retval 中移除
fn take_simulated_call(values: &mut Retval) -> Option<FunctionCall> {
    let arguments = values.remove(FUNCTION_ARGUMENTS_FIELD);
    let name = match values.remove(FUNCTION_NAME_FIELD)? {
        Value::String(s) => s.trim().to_string(),
        other => other.to_string(),
    };
    if name.is_empty() {
        return None;
    }
    let arguments = match arguments {
        Some(Value::String(s)) => serde_json::from_str(&s).unwrap_or(Value::String(s)),
        Some(v) => v,
        None => Value::Object(Default::default()),
    };
    Some(FunctionCall::new(name, arguments).with_id(uuid::Uuid::new_v4().to_string()))
}
