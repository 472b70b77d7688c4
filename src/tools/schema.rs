//! 模拟函数调用的字段说明（schemars 生成调用格式 Schema）
//!
//! 模型不支持原生函数调用时，functionName / functionArguments 两个输出字段的描述
//! 列出可用函数及其参数 schema，减少格式错误。

use schemars::{schema_for, JsonSchema};
use serde_json::Value;

use crate::llm::FunctionSpec;

/// 模拟调用格式（仅用于 Schema 生成）
#[allow(dead_code)]
#[derive(JsonSchema)]
#[serde(rename_all = "camelCase")]
struct SimulatedCallFormat {
    /// 要调用的函数名
    pub function_name: String,
    /// 函数参数（JSON 对象，需符合该函数的参数 schema）
    pub function_arguments: Value,
}

/// 模拟调用格式的 JSON Schema 字符串
pub fn simulated_call_schema_json() -> String {
    let schema = schema_for!(SimulatedCallFormat);
    serde_json::to_string_pretty(&schema).unwrap_or_default()
}

/// functionName 字段描述：可选函数名列表
pub fn function_name_description(specs: &[FunctionSpec]) -> String {
    let lines: Vec<String> = specs
        .iter()
        .map(|s| format!("- {}: {}", s.name, s.description))
        .collect();
    format!(
        "Name of the function to call next, if any. Available functions:\n{}",
        lines.join("\n")
    )
}

/// functionArguments 字段描述：各函数参数 schema + 调用格式 schema
pub fn function_arguments_description(specs: &[FunctionSpec]) -> String {
    let lines: Vec<String> = specs
        .iter()
        .map(|s| format!("- {}: {}", s.name, s.parameters))
        .collect();
    format!(
        "JSON object with the arguments for the chosen function. Parameter schemas:\n{}\nCall format:\n{}",
        lines.join("\n"),
        simulated_call_schema_json()
    )
}
