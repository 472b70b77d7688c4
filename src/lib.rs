//! Forge - 自纠错的结构化生成与工具调用控制循环
//!
//! 模块划分：
//! - **config**: 配置加载（TOML + 环境变量）
//! - **core**: 错误分类、恢复引擎（失败 -> 引导字段）、生成器构建
//! - **generate**: 补全拼接、输出解析、工具分发、生成主循环
//! - **llm**: 补全服务抽象与 Mock
//! - **memory**: 对话消息与按会话的历史存储
//! - **observability**: tracing 初始化
//! - **signature**: 输入/输出契约、字段抽取、prompt 渲染
//! - **tools**: 工具注册表与执行器

pub mod config;
pub mod core;
pub mod generate;
pub mod llm;
pub mod memory;
pub mod observability;
pub mod signature;
pub mod tools;

pub use crate::core::{GenError, GeneratorBuilder};
pub use generate::{Assertion, ForwardOptions, GenEvent, GenOutput, Generator};
pub use signature::{Field, FieldType, Retval, Signature};
