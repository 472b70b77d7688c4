//! Prompt 渲染
//!
//! 由 Signature 构造渲染器，render(输入值, {引导字段, examples, demos}) 输出 user 消息文本。
//! 生成器按签名哈希缓存渲染器实例，签名变化后通过 RendererFactory 重建。

use std::sync::Arc;

use serde_json::Value;

use crate::core::GenError;
use crate::signature::{ExtraField, Field, FieldType, Retval, Signature};

/// 渲染参数：引导字段（重试时）、examples、demos
#[derive(Debug, Clone, Copy, Default)]
pub struct RenderOptions<'a> {
    pub extra_fields: &'a [ExtraField],
    pub examples: &'a [Retval],
    pub demos: &'a [Retval],
}

/// Prompt 渲染器 trait
pub trait PromptRenderer: Send + Sync {
    fn render(&self, values: &Retval, options: &RenderOptions<'_>) -> Result<String, GenError>;
}

/// 由签名构造渲染器；可在构建生成器时覆盖
pub type RendererFactory = Arc<dyn Fn(&Signature) -> Box<dyn PromptRenderer> + Send + Sync>;

pub fn default_renderer_factory() -> RendererFactory {
    Arc::new(|signature: &Signature| -> Box<dyn PromptRenderer> {
        Box::new(DefaultPromptRenderer::new(signature.clone()))
    })
}

/// 默认渲染器：字段说明 + 示例 + 「Title: value」形式的输入与引导字段
pub struct DefaultPromptRenderer {
    signature: Signature,
    header: String,
}

impl DefaultPromptRenderer {
    pub fn new(signature: Signature) -> Self {
        let header = Self::build_header(&signature);
        Self { signature, header }
    }

    fn build_header(signature: &Signature) -> String {
        let mut out = String::new();
        if !signature.description.is_empty() {
            out.push_str(&signature.description);
            out.push_str("\n\n");
        }
        out.push_str("Input fields:\n");
        for f in signature.input_fields() {
            out.push_str(&describe_field(f));
        }
        out.push_str("\nOutput fields:\n");
        for f in signature.output_fields() {
            out.push_str(&describe_field(f));
        }
        out.push_str(
            "\nRespond with every output field on its own line in the form `Title: value`, \
             in the order listed above.",
        );
        out
    }

    fn render_record(&self, record: &Retval, out: &mut String) {
        let fields = self
            .signature
            .input_fields()
            .iter()
            .chain(self.signature.output_fields());
        for f in fields {
            if let Some(v) = record.get(&f.name) {
                out.push_str(&format!("{}: {}\n", f.title, display_value(v)));
            }
        }
    }
}

impl PromptRenderer for DefaultPromptRenderer {
    fn render(&self, values: &Retval, options: &RenderOptions<'_>) -> Result<String, GenError> {
        let mut out = self.header.clone();

        for record in options.examples.iter().chain(options.demos) {
            out.push_str("\n\n---\n\n");
            self.render_record(record, &mut out);
        }

        out.push_str("\n\n---\n\n");
        for f in self.signature.input_fields() {
            match values.get(&f.name) {
                Some(v) => out.push_str(&format!("{}: {}\n", f.title, display_value(v))),
                None if f.is_optional => {}
                None => return Err(GenError::MissingInput(f.name.clone())),
            }
        }
        for extra in options.extra_fields {
            out.push_str(&format!("{}: {}\n", extra.title, extra.description));
        }
        Ok(out.trim_end().to_string())
    }
}

fn describe_field(f: &Field) -> String {
    let mut kind = match f.field_type {
        FieldType::String => "text",
        FieldType::Number => "number",
        FieldType::Boolean => "boolean",
        FieldType::Json => "JSON",
    }
    .to_string();
    if f.is_array {
        kind = format!("list of {}", kind);
    }
    let optional = if f.is_optional { ", optional" } else { "" };
    match &f.description {
        Some(d) => format!("- {} ({}{}): {}\n", f.title, kind, optional, d),
        None => format!("- {} ({}{})\n", f.title, kind, optional),
    }
}

fn display_value(v: &Value) -> String {
    match v {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}
