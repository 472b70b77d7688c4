//! 应用配置：从 config/forge.toml 与环境变量加载
//!
//! 加载顺序：先读 TOML 文件，再用环境变量 `FORGE__*` 覆盖（双下划线表示嵌套，如 `FORGE__GENERATION__MAX_STEPS=5`）。

use std::path::PathBuf;

use serde::Deserialize;

use crate::generate::{DEFAULT_MAX_COMPLETIONS, DEFAULT_MAX_RETRIES, DEFAULT_MAX_STEPS, DEFAULT_TERMINAL_FUNCTION};
use crate::llm::ModelConfig;

/// 配置根（对应 config/forge.toml 的顶层）
#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
pub struct ForgeConfig {
    pub generation: GenerationSection,
    /// 默认模型参数，调用时可覆盖
    pub model: ModelConfig,
    pub tools: ToolsSection,
}

/// [generation] 段：重试、步数、续写上限与终止函数名
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct GenerationSection {
    pub max_retries: usize,
    pub max_steps: usize,
    pub max_completions: usize,
    pub terminal_function: String,
}

impl Default for GenerationSection {
    fn default() -> Self {
        Self {
            max_retries: DEFAULT_MAX_RETRIES,
            max_steps: DEFAULT_MAX_STEPS,
            max_completions: DEFAULT_MAX_COMPLETIONS,
            terminal_function: DEFAULT_TERMINAL_FUNCTION.to_string(),
        }
    }
}

/// [tools] 段
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ToolsSection {
    /// 单次工具调用超时（秒）
    pub tool_timeout_secs: u64,
}

impl Default for ToolsSection {
    fn default() -> Self {
        Self { tool_timeout_secs: 30 }
    }
}

/// 从 config 目录加载配置，环境变量 FORGE__* 可覆盖
///
/// 1. 按顺序查找 config/forge.toml、../config/forge.toml、forge.toml，找到则作为第一源
/// 2. 若传入 config_path 且文件存在，则追加该文件（可覆盖前面的键）
/// 3. 最后叠加环境变量 FORGE__*（双下划线表示嵌套键）
pub fn load_config(config_path: Option<PathBuf>) -> Result<ForgeConfig, config::ConfigError> {
    let mut builder = config::Config::builder();

    let default_names = ["config/forge", "../config/forge", "forge"];
    for name in default_names {
        let path = format!("{}.toml", name);
        if std::path::Path::new(&path).exists() {
            builder = builder.add_source(config::File::with_name(name).required(false));
            break;
        }
    }

    if let Some(ref path) = config_path {
        if path.exists() {
            builder = builder.add_source(config::File::from(path.clone()).required(false));
        }
    }

    builder = builder.add_source(
        config::Environment::with_prefix("FORGE")
            .separator("__")
            .try_parsing(true),
    );

    let c = builder.build()?;
    c.try_deserialize()
}
