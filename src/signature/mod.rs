//! 签名层：输入/输出字段契约、字段值抽取、prompt 渲染
//!
//! Signature 只描述字段；抽取（Extractor）与渲染（PromptRenderer）以 trait 暴露，可由调用方替换。

pub mod extract;
pub mod prompt;

use serde::Serialize;
use serde_json::{Map, Value};
use sha2::{Digest, Sha256};

pub use extract::{Extractor, LabeledExtractor};
pub use prompt::{default_renderer_factory, DefaultPromptRenderer, PromptRenderer, RenderOptions, RendererFactory};

/// 输出字段名 -> 抽取值
pub type Retval = Map<String, Value>;

/// 模拟函数调用时追加的输出字段
pub const FUNCTION_NAME_FIELD: &str = "functionName";
pub const FUNCTION_ARGUMENTS_FIELD: &str = "functionArguments";

/// 字段类型
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum FieldType {
    #[default]
    String,
    Number,
    Boolean,
    Json,
}

/// 单个字段：名称、标题、描述、类型、是否数组、是否可选
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Field {
    pub name: String,
    pub title: String,
    pub description: Option<String>,
    pub field_type: FieldType,
    pub is_array: bool,
    pub is_optional: bool,
}

impl Field {
    pub fn new(name: impl Into<String>) -> Self {
        let name = name.into();
        Self {
            title: to_title(&name),
            name,
            description: None,
            field_type: FieldType::String,
            is_array: false,
            is_optional: false,
        }
    }

    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }

    pub fn with_type(mut self, field_type: FieldType) -> Self {
        self.field_type = field_type;
        self
    }

    pub fn array(mut self) -> Self {
        self.is_array = true;
        self
    }

    pub fn optional(mut self) -> Self {
        self.is_optional = true;
        self
    }

    /// JSON 或数组类型的输出需要请求 JSON 形态的回复
    pub fn wants_json(&self) -> bool {
        self.is_array || self.field_type == FieldType::Json
    }
}

/// 生成任务的输入/输出契约
#[derive(Debug, Clone, PartialEq, Serialize, Default)]
pub struct Signature {
    pub description: String,
    inputs: Vec<Field>,
    outputs: Vec<Field>,
}

impl Signature {
    pub fn new(description: impl Into<String>) -> Self {
        Self {
            description: description.into(),
            inputs: Vec::new(),
            outputs: Vec::new(),
        }
    }

    pub fn with_input(mut self, field: Field) -> Self {
        self.inputs.push(field);
        self
    }

    pub fn with_output(mut self, field: Field) -> Self {
        self.outputs.push(field);
        self
    }

    pub fn input_fields(&self) -> &[Field] {
        &self.inputs
    }

    pub fn output_fields(&self) -> &[Field] {
        &self.outputs
    }

    /// 追加输出字段；同名字段已存在时不重复添加
    pub fn add_output_field(&mut self, field: Field) {
        if !self.has_output(&field.name) {
            self.outputs.push(field);
        }
    }

    pub fn has_output(&self, name: &str) -> bool {
        self.outputs.iter().any(|f| f.name == name)
    }

    pub fn wants_json_output(&self) -> bool {
        self.outputs.iter().any(Field::wants_json)
    }

    /// 字段增删或变更时变化的稳定哈希（SHA-256，十六进制）
    pub fn hash(&self) -> String {
        let canonical = serde_json::to_vec(self).unwrap_or_default();
        hex::encode(Sha256::digest(&canonical))
    }
}

/// 提示词中展示的字段引导信息（past_* / instructions）
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ExtraField {
    pub name: String,
    pub title: String,
    pub description: String,
}

impl ExtraField {
    pub fn new(name: impl Into<String>, title: impl Into<String>, description: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            title: title.into(),
            description: description.into(),
        }
    }
}

/// camelCase / snake_case 字段名转标题：functionName -> Function Name
pub fn to_title(name: &str) -> String {
    let mut words: Vec<String> = Vec::new();
    let mut current = String::new();
    for ch in name.chars() {
        if ch == '_' || ch == '-' || ch == ' ' {
            if !current.is_empty() {
                words.push(std::mem::take(&mut current));
            }
        } else if ch.is_uppercase() && !current.is_empty() {
            words.push(std::mem::take(&mut current));
            current.push(ch);
        } else {
            current.push(ch);
        }
    }
    if !current.is_empty() {
        words.push(current);
    }
    words
        .iter()
        .map(|w| {
            let mut chars = w.chars();
            match chars.next() {
                Some(first) => first.to_uppercase().chain(chars).collect(),
                None => String::new(),
            }
        })
        .collect::<Vec<String>>()
        .join(" ")
}
