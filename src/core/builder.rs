//! 生成器构建器：统一的 Generator 初始化逻辑
//!
//! 构建时根据补全服务能力选定函数调用策略；模拟策略下向签名追加 functionName / functionArguments，
//! 追加后在生成器生命周期内保持不变。

use std::sync::Arc;

use crate::config::ForgeConfig;
use crate::core::GenError;
use crate::generate::{Assertion, FunctionCallStrategy, Generator, DEFAULT_TERMINAL_FUNCTION};
use crate::llm::{FunctionCallPolicy, FunctionSpec, LlmClient, ModelConfig};
use crate::signature::{
    default_renderer_factory, Extractor, Field, FieldType, LabeledExtractor, RendererFactory, Signature,
    FUNCTION_ARGUMENTS_FIELD, FUNCTION_NAME_FIELD,
};
use crate::tools::{function_arguments_description, function_name_description, FunctionExecutor, ToolExecutor};

/// Generator 构建器
pub struct GeneratorBuilder {
    signature: Signature,
    llm: Arc<dyn LlmClient>,
    functions: Vec<FunctionSpec>,
    function_call: Option<FunctionCallPolicy>,
    executor: Option<Arc<dyn FunctionExecutor>>,
    extractor: Option<Arc<dyn Extractor>>,
    renderer_factory: Option<RendererFactory>,
    assertions: Vec<Assertion>,
    terminal_function: String,
    model_config: ModelConfig,
}

impl GeneratorBuilder {
    pub fn new(signature: Signature, llm: Arc<dyn LlmClient>) -> Self {
        Self {
            signature,
            llm,
            functions: Vec::new(),
            function_call: None,
            executor: None,
            extractor: None,
            renderer_factory: None,
            assertions: Vec::new(),
            terminal_function: DEFAULT_TERMINAL_FUNCTION.to_string(),
            model_config: ModelConfig::default(),
        }
    }

    /// 从配置读取终止函数名与默认模型参数
    pub fn from_config(signature: Signature, llm: Arc<dyn LlmClient>, config: &ForgeConfig) -> Self {
        Self::new(signature, llm)
            .with_terminal_function(config.generation.terminal_function.clone())
            .with_model_config(config.model.clone())
    }

    /// 使用注册表中的全部工具：函数声明 + 执行器
    pub fn with_tools(mut self, executor: ToolExecutor) -> Self {
        self.functions = executor.registry().specs();
        self.executor = Some(Arc::new(executor));
        self
    }

    pub fn with_functions(mut self, functions: Vec<FunctionSpec>) -> Self {
        self.functions = functions;
        self
    }

    pub fn with_executor(mut self, executor: Arc<dyn FunctionExecutor>) -> Self {
        self.executor = Some(executor);
        self
    }

    pub fn with_function_call(mut self, policy: FunctionCallPolicy) -> Self {
        self.function_call = Some(policy);
        self
    }

    pub fn with_extractor(mut self, extractor: Arc<dyn Extractor>) -> Self {
        self.extractor = Some(extractor);
        self
    }

    /// 覆盖默认的 prompt 渲染器
    pub fn with_renderer(mut self, factory: RendererFactory) -> Self {
        self.renderer_factory = Some(factory);
        self
    }

    pub fn with_assertion(mut self, assertion: Assertion) -> Self {
        self.assertions.push(assertion);
        self
    }

    pub fn with_terminal_function(mut self, name: impl Into<String>) -> Self {
        self.terminal_function = name.into();
        self
    }

    pub fn with_model_config(mut self, model_config: ModelConfig) -> Self {
        self.model_config = model_config;
        self
    }

    pub fn build(self) -> Result<Generator, GenError> {
        if !self.functions.is_empty() && self.executor.is_none() {
            return Err(GenError::Config(
                "functions were declared without a function executor".to_string(),
            ));
        }
        if self.terminal_function.trim().is_empty() {
            return Err(GenError::Config("terminal function name must not be empty".to_string()));
        }

        let strategy = FunctionCallStrategy::select(self.llm.supports_function_calling());
        let mut signature = self.signature;
        if strategy == FunctionCallStrategy::Simulated && !self.functions.is_empty() {
            signature.add_output_field(
                Field::new(FUNCTION_NAME_FIELD)
                    .optional()
                    .with_description(function_name_description(&self.functions)),
            );
            signature.add_output_field(
                Field::new(FUNCTION_ARGUMENTS_FIELD)
                    .with_type(FieldType::Json)
                    .optional()
                    .with_description(function_arguments_description(&self.functions)),
            );
        }
        tracing::debug!(?strategy, functions = self.functions.len(), "generator built");

        Ok(Generator {
            signature,
            llm: self.llm,
            functions: self.functions,
            function_call: self.function_call,
            executor: self.executor,
            extractor: self.extractor.unwrap_or_else(|| Arc::new(LabeledExtractor::new())),
            renderer_factory: self.renderer_factory.unwrap_or_else(default_renderer_factory),
            assertions: self.assertions,
            strategy,
            terminal_function: self.terminal_function,
            model_config: self.model_config,
            examples: Vec::new(),
            demos: Vec::new(),
        })
    }
}
