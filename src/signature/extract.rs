//! 字段值抽取
//!
//! 从模型的原始文本中按「Field Title:」标签切分各输出字段，并按字段类型解析；
//! 必填字段缺失或格式不符时返回 GenError::Validation。

use regex::Regex;
use serde_json::{Number, Value};

use crate::core::GenError;
use crate::signature::{Field, FieldType, Retval, Signature};

/// 抽取器：signature + 原始文本 -> retval
pub trait Extractor: Send + Sync {
    fn extract(&self, signature: &Signature, content: &str) -> Result<Retval, GenError>;
}

/// 默认抽取器：按输出字段标题（行首，可带 ** 加粗）定位各字段
#[derive(Debug, Default, Clone)]
pub struct LabeledExtractor;

impl LabeledExtractor {
    pub fn new() -> Self {
        Self
    }

    /// 返回 (标签起点, 值起点, 字段)，按出现位置排序
    fn locate<'a>(signature: &'a Signature, content: &str) -> Vec<(usize, usize, &'a Field)> {
        let mut found: Vec<(usize, usize, &Field)> = signature
            .output_fields()
            .iter()
            .filter_map(|field| {
                let pattern = format!(
                    r"(?mi)^[ \t]*(?:\*\*)?{}(?:\*\*)?[ \t]*:(?:\*\*)?",
                    regex::escape(&field.title)
                );
                let re = Regex::new(&pattern).ok()?;
                re.find(content).map(|m| (m.start(), m.end(), field))
            })
            .collect();
        found.sort_by_key(|(start, _, _)| *start);
        // 标题相同（忽略大小写）的字段会命中同一标签，只保留签名中靠前的字段
        let mut located: Vec<(usize, usize, &Field)> = Vec::with_capacity(found.len());
        for entry in found {
            if located.last().map_or(true, |(_, value_start, _)| entry.0 >= *value_start) {
                located.push(entry);
            }
        }
        located
    }
}

impl Extractor for LabeledExtractor {
    fn extract(&self, signature: &Signature, content: &str) -> Result<Retval, GenError> {
        let located = Self::locate(signature, content);
        let mut raw: Vec<(&Field, &str)> = Vec::with_capacity(located.len());

        if located.is_empty() && signature.output_fields().len() == 1 {
            // 单输出字段且没有标签时，整段文本即字段值
            raw.push((&signature.output_fields()[0], content.trim()));
        } else {
            for (i, (_, value_start, field)) in located.iter().enumerate() {
                let end = located
                    .get(i + 1)
                    .map(|(next_start, _, _)| *next_start)
                    .unwrap_or(content.len());
                raw.push((field, content[*value_start..end].trim()));
            }
        }

        let mut values = Retval::new();
        for field in signature.output_fields() {
            let text = raw
                .iter()
                .find(|(f, _)| f.name == field.name)
                .map(|(_, t)| *t)
                .unwrap_or("");
            if text.is_empty() {
                if field.is_optional {
                    continue;
                }
                return Err(GenError::validation(
                    &field.name,
                    &field.title,
                    text,
                    format!("Missing required field: {}", field.title),
                ));
            }
            values.insert(field.name.clone(), parse_value(field, text)?);
        }
        Ok(values)
    }
}

/// 按字段类型解析单个值
fn parse_value(field: &Field, text: &str) -> Result<Value, GenError> {
    let invalid = |message: String| GenError::validation(&field.name, &field.title, text, message);

    if field.is_array {
        if let Ok(Value::Array(items)) = serde_json::from_str::<Value>(strip_code_fence(text)) {
            return Ok(Value::Array(items));
        }
        let items: Vec<Value> = text
            .lines()
            .filter_map(list_item)
            .map(|item| parse_scalar(field.field_type, item).unwrap_or_else(|| Value::String(item.to_string())))
            .collect();
        if items.is_empty() {
            return Err(invalid(format!("Expected a list for field: {}", field.title)));
        }
        return Ok(Value::Array(items));
    }

    match field.field_type {
        FieldType::String => Ok(Value::String(text.to_string())),
        FieldType::Json => serde_json::from_str(strip_code_fence(text))
            .map_err(|e| invalid(format!("Invalid JSON for field {}: {}", field.title, e))),
        other => parse_scalar(other, text)
            .ok_or_else(|| invalid(format!("Invalid {} value for field: {}", type_name(other), field.title))),
    }
}

fn parse_scalar(field_type: FieldType, text: &str) -> Option<Value> {
    match field_type {
        FieldType::String => Some(Value::String(text.to_string())),
        FieldType::Number => {
            if let Ok(i) = text.parse::<i64>() {
                return Some(Value::Number(i.into()));
            }
            text.parse::<f64>().ok().and_then(Number::from_f64).map(Value::Number)
        }
        FieldType::Boolean => match text.to_lowercase().as_str() {
            "true" | "yes" => Some(Value::Bool(true)),
            "false" | "no" => Some(Value::Bool(false)),
            _ => None,
        },
        FieldType::Json => serde_json::from_str(strip_code_fence(text)).ok(),
    }
}

fn type_name(field_type: FieldType) -> &'static str {
    match field_type {
        FieldType::String => "string",
        FieldType::Number => "number",
        FieldType::Boolean => "boolean",
        FieldType::Json => "JSON",
    }
}

/// Markdown 列表项：- x / * x / 1. x
fn list_item(line: &str) -> Option<&str> {
    let line = line.trim();
    if let Some(rest) = line.strip_prefix("- ").or_else(|| line.strip_prefix("* ")) {
        return Some(rest.trim());
    }
    let digits = line.chars().take_while(|c| c.is_ascii_digit()).count();
    if digits > 0 {
        if let Some(rest) = line[digits..].strip_prefix(". ") {
            return Some(rest.trim());
        }
    }
    None
}

/// 去掉 ```json ... ``` 包裹
fn strip_code_fence(text: &str) -> &str {
    let trimmed = text.trim();
    let Some(rest) = trimmed.strip_prefix("```") else {
        return trimmed;
    };
    let rest = rest.trim_start_matches(|c: char| c.is_ascii_alphabetic());
    rest.rfind("```").map(|end| rest[..end].trim()).unwrap_or(rest.trim())
}
