//! 生成主循环
//!
//! BuildPrompt -> Complete -> Resolve -> Dispatch -> {Done | BuildPrompt(重试) | Complete(下一步)}。
//! 外层重试（max_retries）只捕获 Validation / Assertion 失败；内层步数（max_steps）耗尽、无结果及其他错误直接终止。
//! 每次 forward 的可变状态（引导字段、渲染器、计数器）放在独立的 RunContext 中，生成器本身只读。

use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::Serialize;
use tokio::sync::mpsc::UnboundedSender;

use crate::config::ForgeConfig;
use crate::core::{Failure, GenError, RecoveryAction, RecoveryEngine};
use crate::generate::assembler::CompletionAssembler;
use crate::generate::dispatcher::ToolDispatcher;
use crate::generate::resolver::{FunctionCallStrategy, OutputResolver, Resolved};
use crate::generate::{Assertion, EventSink, GenEvent};
use crate::llm::{CallOptions, CompletionResult, FunctionCallPolicy, FunctionSpec, LlmClient, ModelConfig};
use crate::memory::{HistoryStore, InMemoryHistory, Message};
use crate::signature::{
    ExtraField, Extractor, PromptRenderer, RenderOptions, RendererFactory, Retval, Signature,
    FUNCTION_ARGUMENTS_FIELD, FUNCTION_NAME_FIELD,
};
use crate::tools::FunctionExecutor;

pub const DEFAULT_MAX_RETRIES: usize = 3;
pub const DEFAULT_MAX_STEPS: usize = 10;
pub const DEFAULT_MAX_COMPLETIONS: usize = 10;
pub const DEFAULT_TERMINAL_FUNCTION: &str = "task_done";

/// 单次 forward 的调用参数
#[derive(Clone)]
pub struct ForwardOptions {
    pub max_retries: usize,
    pub max_steps: usize,
    pub max_completions: usize,
    pub session_id: Option<String>,
    pub trace_id: Option<String>,
    /// 覆盖生成器默认模型参数
    pub model_config: ModelConfig,
    /// 外部对话历史；未提供时每次 forward 使用新的内存历史
    pub history: Option<Arc<dyn HistoryStore>>,
    pub event_tx: Option<UnboundedSender<GenEvent>>,
}

impl Default for ForwardOptions {
    fn default() -> Self {
        Self {
            max_retries: DEFAULT_MAX_RETRIES,
            max_steps: DEFAULT_MAX_STEPS,
            max_completions: DEFAULT_MAX_COMPLETIONS,
            session_id: None,
            trace_id: None,
            model_config: ModelConfig::default(),
            history: None,
            event_tx: None,
        }
    }
}

impl ForwardOptions {
    pub fn from_config(config: &ForgeConfig) -> Self {
        Self {
            max_retries: config.generation.max_retries,
            max_steps: config.generation.max_steps,
            max_completions: config.generation.max_completions,
            ..Default::default()
        }
    }

    pub fn with_max_retries(mut self, n: usize) -> Self {
        self.max_retries = n;
        self
    }

    pub fn with_max_steps(mut self, n: usize) -> Self {
        self.max_steps = n;
        self
    }

    pub fn with_max_completions(mut self, n: usize) -> Self {
        self.max_completions = n;
        self
    }

    pub fn with_session(mut self, session_id: impl Into<String>) -> Self {
        self.session_id = Some(session_id.into());
        self
    }

    pub fn with_trace(mut self, trace_id: impl Into<String>) -> Self {
        self.trace_id = Some(trace_id.into());
        self
    }

    pub fn with_model_config(mut self, model_config: ModelConfig) -> Self {
        self.model_config = model_config;
        self
    }

    pub fn with_history(mut self, history: Arc<dyn HistoryStore>) -> Self {
        self.history = Some(history);
        self
    }

    pub fn with_event_tx(mut self, tx: UnboundedSender<GenEvent>) -> Self {
        self.event_tx = Some(tx);
        self
    }

    fn validate(&self) -> Result<(), GenError> {
        for (name, value) in [
            ("max_retries", self.max_retries),
            ("max_steps", self.max_steps),
            ("max_completions", self.max_completions),
        ] {
            if value == 0 {
                return Err(GenError::Config(format!("{} must be at least 1", name)));
            }
        }
        Ok(())
    }
}

/// 成功时记录的轨迹：输入值 ∪ 解析出的输出值
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Trace {
    pub values: Retval,
    pub session_id: Option<String>,
    pub trace_id: Option<String>,
    pub recorded_at: DateTime<Utc>,
}

/// forward 结果
#[derive(Debug, Clone, PartialEq)]
pub struct GenOutput {
    pub values: Retval,
    pub trace: Trace,
    /// 实际使用的尝试次数
    pub attempts: usize,
    /// 最后一次尝试内的步数
    pub steps: usize,
    /// 可选断言在重试耗尽后仍失败，values 未经校验
    pub degraded: bool,
}

/// 生成任务：签名 + 补全服务 + 函数 + 断言；由 GeneratorBuilder 构建
pub struct Generator {
    pub(crate) signature: Signature,
    pub(crate) llm: Arc<dyn LlmClient>,
    pub(crate) functions: Vec<FunctionSpec>,
    pub(crate) function_call: Option<FunctionCallPolicy>,
    pub(crate) executor: Option<Arc<dyn FunctionExecutor>>,
    pub(crate) extractor: Arc<dyn Extractor>,
    pub(crate) renderer_factory: RendererFactory,
    pub(crate) assertions: Vec<Assertion>,
    pub(crate) strategy: FunctionCallStrategy,
    pub(crate) terminal_function: String,
    pub(crate) model_config: ModelConfig,
    pub(crate) examples: Vec<Retval>,
    pub(crate) demos: Vec<Retval>,
}

/// 单次 forward 的私有状态
#[derive(Default)]
struct RunContext {
    guidance: Vec<ExtraField>,
    /// 首次构建 prompt 时创建，本次 forward 内复用
    renderer: Option<Box<dyn PromptRenderer>>,
    last_failure: Option<Failure>,
    attempt: usize,
    step: usize,
}

enum Phase {
    BuildPrompt,
    Complete,
    Resolve(CompletionResult),
    Dispatch(Resolved),
}

impl Generator {
    pub fn signature(&self) -> &Signature {
        &self.signature
    }

    pub fn strategy(&self) -> FunctionCallStrategy {
        self.strategy
    }

    pub fn add_assertion(&mut self, assertion: Assertion) {
        self.assertions.push(assertion);
    }

    pub fn set_examples(&mut self, examples: Vec<Retval>) {
        self.examples = examples;
    }

    pub fn set_demos(&mut self, demos: Vec<Retval>) {
        self.demos = demos;
    }

    /// 执行生成任务
    pub async fn forward(&self, values: &Retval, options: ForwardOptions) -> Result<GenOutput, GenError> {
        let events = EventSink::new(options.event_tx.clone());
        let result = self.run(values, &options, &events).await;
        match &result {
            Ok(output) => events.emit(GenEvent::Done {
                attempts: output.attempts,
                degraded: output.degraded,
            }),
            Err(e) => {
                tracing::error!(error = %e, session_id = ?options.session_id, "generation failed");
                events.emit(GenEvent::Error { text: e.to_string() });
            }
        }
        result
    }

    async fn run(
        &self,
        values: &Retval,
        options: &ForwardOptions,
        events: &EventSink,
    ) -> Result<GenOutput, GenError> {
        options.validate()?;

        let history: Arc<dyn HistoryStore> = options
            .history
            .clone()
            .unwrap_or_else(|| Arc::new(InMemoryHistory::new()));
        let call_options = CallOptions {
            session_id: options.session_id.clone(),
            trace_id: options.trace_id.clone(),
        };
        let session = call_options.session_id.as_deref();

        let mut assembler = CompletionAssembler::new(self.llm.as_ref(), options.max_completions)
            .with_model_config(self.model_config.merged(&options.model_config))
            .json_output(self.signature.wants_json_output());
        if self.strategy == FunctionCallStrategy::Native {
            assembler = assembler.with_functions(&self.functions, self.function_call.as_ref());
        }
        let resolver = OutputResolver::new(
            &self.signature,
            self.extractor.as_ref(),
            &self.assertions,
            (!self.functions.is_empty()).then_some(self.strategy),
        );
        let dispatcher = ToolDispatcher::new(
            self.executor.as_deref(),
            history.as_ref(),
            &self.terminal_function,
        );
        let recovery = RecoveryEngine::new();

        let mut run = RunContext::default();
        let mut phase = Phase::BuildPrompt;

        loop {
            phase = match phase {
                Phase::BuildPrompt => {
                    if run.attempt >= options.max_retries {
                        return self.retries_exhausted(values, run, &call_options);
                    }
                    run.attempt += 1;
                    run.step = 0;
                    tracing::info!(
                        attempt = run.attempt,
                        max_retries = options.max_retries,
                        session_id = ?session,
                        trace_id = ?call_options.trace_id,
                        "generation attempt"
                    );
                    events.emit(GenEvent::AttemptStarted {
                        attempt: run.attempt,
                        max_retries: options.max_retries,
                    });

                    let renderer = run.renderer.get_or_insert_with(|| {
                        tracing::debug!(signature_hash = %self.signature.hash(), "building prompt renderer");
                        (self.renderer_factory)(&self.signature)
                    });
                    let prompt = renderer.render(
                        values,
                        &RenderOptions {
                            extra_fields: &run.guidance,
                            examples: &self.examples,
                            demos: &self.demos,
                        },
                    )?;
                    history.add(vec![Message::user(prompt)], session);
                    Phase::Complete
                }
                Phase::Complete => {
                    if run.step >= options.max_steps {
                        return Err(GenError::StepsExhausted(options.max_steps));
                    }
                    run.step += 1;
                    events.emit(GenEvent::StepUpdate {
                        step: run.step,
                        max_steps: options.max_steps,
                    });
                    tracing::debug!(attempt = run.attempt, step = run.step, "completion step");

                    let result = assembler
                        .assemble(history.history(session), &call_options, events)
                        .await?;
                    history.add_result(&result, session);
                    Phase::Resolve(result)
                }
                Phase::Resolve(result) => match resolver.resolve(result) {
                    Ok(resolved) => Phase::Dispatch(resolved),
                    Err(err) => match recovery.handle(err, &self.signature) {
                        RecoveryAction::RetryWithGuidance { fields, failure } => {
                            tracing::warn!(
                                attempt = run.attempt,
                                error = %failure.message(),
                                "output rejected, retrying with guidance"
                            );
                            events.emit(GenEvent::Retry {
                                attempt: run.attempt,
                                message: failure.message().to_string(),
                            });
                            run.guidance = fields;
                            run.last_failure = Some(failure);
                            Phase::BuildPrompt
                        }
                        RecoveryAction::Abort(err) => return Err(err),
                    },
                },
                Phase::Dispatch(resolved) => {
                    match dispatcher.dispatch(resolved, &call_options, events).await? {
                        Some(output) => return Ok(self.finish(values, output, &run, &call_options, false)),
                        None => Phase::Complete,
                    }
                }
            };
        }
    }

    /// 重试耗尽：可选断言降级为成功，否则带最后一次错误信息失败
    fn retries_exhausted(
        &self,
        values: &Retval,
        run: RunContext,
        call_options: &CallOptions,
    ) -> Result<GenOutput, GenError> {
        let Some(failure) = &run.last_failure else {
            return Err(GenError::RetriesExhausted("no attempt was made".to_string()));
        };
        match failure.degraded_values() {
            Some(degraded) => {
                tracing::warn!(
                    attempts = run.attempt,
                    error = %failure.message(),
                    "optional assertion still failing, returning unverified output"
                );
                let mut output = degraded.clone();
                if self.strategy == FunctionCallStrategy::Simulated {
                    output.remove(FUNCTION_NAME_FIELD);
                    output.remove(FUNCTION_ARGUMENTS_FIELD);
                }
                Ok(self.finish(values, output, &run, call_options, true))
            }
            None => Err(GenError::RetriesExhausted(failure.message().to_string())),
        }
    }

    fn finish(
        &self,
        inputs: &Retval,
        output: Retval,
        run: &RunContext,
        call_options: &CallOptions,
        degraded: bool,
    ) -> GenOutput {
        let mut traced = inputs.clone();
        traced.extend(output.clone());
        tracing::info!(attempts = run.attempt, steps = run.step, degraded, "generation finished");
        GenOutput {
            values: output,
            trace: Trace {
                values: traced,
                session_id: call_options.session_id.clone(),
                trace_id: call_options.trace_id.clone(),
                recorded_at: Utc::now(),
            },
            attempts: run.attempt,
            steps: run.step,
            degraded,
        }
    }
}
