//! 生成循环集成测试（MockLlmClient，无需 API）

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use serde_json::{json, Value};

use forge::generate::FunctionCallStrategy;
use forge::llm::{ChatResponse, CompletionResult, FinishReason, FunctionCall, MockLlmClient};
use forge::memory::{HistoryStore, InMemoryHistory, Role};
use forge::signature::{
    DefaultPromptRenderer, ExtraField, PromptRenderer, RenderOptions, RendererFactory, FUNCTION_ARGUMENTS_FIELD,
    FUNCTION_NAME_FIELD,
};
use forge::tools::{Tool, ToolExecutor, ToolRegistry};
use forge::{Assertion, Field, FieldType, ForwardOptions, GenError, GenEvent, GeneratorBuilder, Retval, Signature};

fn qa_signature() -> Signature {
    Signature::new("Answer the question")
        .with_input(Field::new("question"))
        .with_output(Field::new("answer"))
}

fn question(q: &str) -> Retval {
    let mut values = Retval::new();
    values.insert("question".into(), json!(q));
    values
}

/// 记录每次渲染收到的引导字段
struct RecordingRenderer {
    inner: DefaultPromptRenderer,
    seen: Arc<Mutex<Vec<Vec<ExtraField>>>>,
}

impl PromptRenderer for RecordingRenderer {
    fn render(&self, values: &Retval, options: &RenderOptions<'_>) -> Result<String, GenError> {
        self.seen.lock().unwrap().push(options.extra_fields.to_vec());
        self.inner.render(values, options)
    }
}

fn recording_factory(seen: Arc<Mutex<Vec<Vec<ExtraField>>>>, built: Arc<AtomicUsize>) -> RendererFactory {
    Arc::new(move |signature: &Signature| -> Box<dyn PromptRenderer> {
        built.fetch_add(1, Ordering::SeqCst);
        Box::new(RecordingRenderer {
            inner: DefaultPromptRenderer::new(signature.clone()),
            seen: seen.clone(),
        })
    })
}

/// 记录参数的搜索工具
struct SearchTool {
    calls: Arc<Mutex<Vec<Value>>>,
}

#[async_trait]
impl Tool for SearchTool {
    fn name(&self) -> &str {
        "search"
    }

    fn description(&self) -> &str {
        "Search the web"
    }

    fn parameters_schema(&self) -> Value {
        json!({
            "type": "object",
            "properties": { "q": { "type": "string" } },
            "required": ["q"]
        })
    }

    async fn execute(&self, args: Value) -> Result<String, String> {
        self.calls.lock().unwrap().push(args.clone());
        Ok(format!("results for {}", args["q"].as_str().unwrap_or("?")))
    }
}

fn search_executor() -> (ToolExecutor, Arc<Mutex<Vec<Value>>>) {
    let calls = Arc::new(Mutex::new(Vec::new()));
    let mut registry = ToolRegistry::new();
    registry.register(SearchTool { calls: calls.clone() });
    (ToolExecutor::new(registry, 5), calls)
}

fn answer_with_calls(content: &str, calls: Vec<FunctionCall>) -> CompletionResult {
    CompletionResult {
        content: Some(content.to_string()),
        finish_reason: FinishReason::FunctionCall,
        function_calls: Some(calls),
    }
}

#[tokio::test]
async fn test_single_success_records_one_prompt() {
    let llm = Arc::new(MockLlmClient::from_results([CompletionResult::text("Answer: Paris")]));
    let generator = GeneratorBuilder::new(qa_signature(), llm.clone()).build().unwrap();
    let history = Arc::new(InMemoryHistory::new());

    let output = generator
        .forward(
            &question("Capital of France?"),
            ForwardOptions::default().with_history(history.clone()),
        )
        .await
        .unwrap();

    assert_eq!(output.values.get("answer"), Some(&json!("Paris")));
    assert_eq!(output.attempts, 1);
    assert_eq!(output.steps, 1);
    assert!(!output.degraded);
    assert_eq!(output.trace.values.get("question"), Some(&json!("Capital of France?")));
    assert_eq!(output.trace.values.get("answer"), Some(&json!("Paris")));

    let messages = history.history(None);
    assert_eq!(messages.iter().filter(|m| m.role == Role::User).count(), 1);
    assert_eq!(messages.len(), 2);
    assert_eq!(llm.call_count(), 1);
}

#[tokio::test]
async fn test_session_scoped_history() {
    let llm = Arc::new(MockLlmClient::from_results([CompletionResult::text("Answer: 4")]));
    let generator = GeneratorBuilder::new(qa_signature(), llm).build().unwrap();
    let history = Arc::new(InMemoryHistory::new());

    let output = generator
        .forward(
            &question("2+2?"),
            ForwardOptions::default()
                .with_history(history.clone())
                .with_session("s1")
                .with_trace("t1"),
        )
        .await
        .unwrap();

    assert_eq!(history.len(Some("s1")), 2);
    assert_eq!(history.len(None), 0);
    assert_eq!(output.trace.session_id.as_deref(), Some("s1"));
    assert_eq!(output.trace.trace_id.as_deref(), Some("t1"));
}

#[tokio::test]
async fn test_truncated_reply_is_continued() {
    let llm = Arc::new(MockLlmClient::from_results([
        CompletionResult::truncated("Answer: Par"),
        CompletionResult::text("is"),
    ]));
    let generator = GeneratorBuilder::new(qa_signature(), llm.clone()).build().unwrap();
    let history = Arc::new(InMemoryHistory::new());

    let output = generator
        .forward(&question("Capital?"), ForwardOptions::default().with_history(history.clone()))
        .await
        .unwrap();

    assert_eq!(output.values.get("answer"), Some(&json!("Paris")));
    assert_eq!(llm.call_count(), 2);
    let requests = llm.requests();
    let last = requests[1].history.last().unwrap();
    assert_eq!(last.role, Role::Assistant);
    assert_eq!(last.content, "Answer: Par");
    // 只持久化拼接后的完整回复
    let messages = history.history(None);
    assert_eq!(messages.len(), 2);
    assert_eq!(messages[1].content, "Answer: Paris");
}

#[tokio::test]
async fn test_no_result_is_not_retried() {
    let llm = Arc::new(MockLlmClient::new([ChatResponse::default()]));
    let generator = GeneratorBuilder::new(qa_signature(), llm.clone()).build().unwrap();

    let err = generator
        .forward(&question("?"), ForwardOptions::default())
        .await
        .unwrap_err();

    assert!(matches!(err, GenError::NoResult));
    assert_eq!(err.to_string(), "No result found");
    assert_eq!(llm.call_count(), 1);
}

#[tokio::test]
async fn test_transport_error_is_not_retried() {
    let llm = Arc::new(MockLlmClient::default());
    let generator = GeneratorBuilder::new(qa_signature(), llm.clone()).build().unwrap();

    let err = generator
        .forward(&question("?"), ForwardOptions::default())
        .await
        .unwrap_err();

    assert!(matches!(err, GenError::Llm(_)));
    assert_eq!(llm.call_count(), 1);
}

#[tokio::test]
async fn test_assertion_guidance_is_rebuilt_each_attempt() {
    let llm = Arc::new(MockLlmClient::from_results([
        CompletionResult::text("Answer: Lyon"),
        CompletionResult::text("Answer: Marseille"),
        CompletionResult::text("Answer: Paris"),
    ]));
    let seen = Arc::new(Mutex::new(Vec::new()));
    let built = Arc::new(AtomicUsize::new(0));
    let generator = GeneratorBuilder::new(qa_signature(), llm.clone())
        .with_renderer(recording_factory(seen.clone(), built.clone()))
        .with_assertion(Assertion::new(
            |v| v.get("answer") == Some(&json!("Paris")),
            "answer must be Paris",
        ))
        .build()
        .unwrap();

    let output = generator
        .forward(&question("Capital of France?"), ForwardOptions::default().with_max_retries(3))
        .await
        .unwrap();

    assert_eq!(output.values.get("answer"), Some(&json!("Paris")));
    assert_eq!(output.attempts, 3);
    assert_eq!(llm.call_count(), 3);
    // 签名不变，渲染器只构建一次
    assert_eq!(built.load(Ordering::SeqCst), 1);

    let seen = seen.lock().unwrap();
    assert_eq!(seen.len(), 3);
    assert!(seen[0].is_empty());
    assert_eq!(
        seen[1],
        vec![
            ExtraField::new("past_answer", "Past Answer", "Lyon"),
            ExtraField::new("instructions", "Instructions", "answer must be Paris"),
        ]
    );
    // 引导字段整体替换，不保留第一次的值
    assert_eq!(
        seen[2],
        vec![
            ExtraField::new("past_answer", "Past Answer", "Marseille"),
            ExtraField::new("instructions", "Instructions", "answer must be Paris"),
        ]
    );
}

#[tokio::test]
async fn test_required_assertion_exhausts_retries() {
    let llm = Arc::new(MockLlmClient::new([]).with_fallback(ChatResponse::single(CompletionResult::text(
        "Answer: Lyon",
    ))));
    let generator = GeneratorBuilder::new(qa_signature(), llm.clone())
        .with_assertion(Assertion::new(
            |v| v.get("answer") == Some(&json!("Paris")),
            "answer must be Paris",
        ))
        .build()
        .unwrap();

    let err = generator
        .forward(&question("?"), ForwardOptions::default().with_max_retries(2))
        .await
        .unwrap_err();

    assert!(matches!(&err, GenError::RetriesExhausted(msg) if msg.contains("answer must be Paris")));
    assert_eq!(llm.call_count(), 2);
}

#[tokio::test]
async fn test_optional_assertion_degrades_to_success() {
    let llm = Arc::new(MockLlmClient::new([]).with_fallback(ChatResponse::single(CompletionResult::text(
        "Answer: Lyon",
    ))));
    let generator = GeneratorBuilder::new(qa_signature(), llm.clone())
        .with_assertion(
            Assertion::new(|v| v.get("answer") == Some(&json!("Paris")), "answer must be Paris").optional(),
        )
        .build()
        .unwrap();

    let output = generator
        .forward(&question("?"), ForwardOptions::default().with_max_retries(3))
        .await
        .unwrap();

    assert!(output.degraded);
    assert_eq!(output.values.get("answer"), Some(&json!("Lyon")));
    assert_eq!(output.attempts, 3);
    assert_eq!(llm.call_count(), 3);
}

#[tokio::test]
async fn test_validation_failure_guides_retry() {
    let signature = qa_signature().with_output(Field::new("confidence").with_type(FieldType::Number));
    let llm = Arc::new(MockLlmClient::from_results([
        CompletionResult::text("Answer: Paris\nConfidence: high"),
        CompletionResult::text("Answer: Paris\nConfidence: 0.9"),
    ]));
    let generator = GeneratorBuilder::new(signature, llm.clone()).build().unwrap();

    let output = generator
        .forward(&question("Capital?"), ForwardOptions::default())
        .await
        .unwrap();

    assert_eq!(output.attempts, 2);
    assert_eq!(output.values.get("confidence"), Some(&json!(0.9)));
    let requests = llm.requests();
    let retry_prompt = &requests[1].history.last().unwrap().content;
    assert!(retry_prompt.contains("Past Confidence: high"));
    assert!(retry_prompt.contains("Instructions: Invalid number value for field: Confidence"));
}

#[tokio::test]
async fn test_native_tool_loop() {
    let (executor, calls) = search_executor();
    let llm = Arc::new(
        MockLlmClient::from_results([
            CompletionResult::calls(vec![FunctionCall::new("search", json!({"q": "rust"})).with_id("c1")]),
            answer_with_calls(
                "Answer: Rust is a systems language",
                vec![FunctionCall::new("task_done", json!({})).with_id("c2")],
            ),
        ])
        .with_function_calling(true),
    );
    let generator = GeneratorBuilder::new(qa_signature(), llm.clone())
        .with_tools(executor)
        .build()
        .unwrap();
    assert_eq!(generator.strategy(), FunctionCallStrategy::Native);
    let history = Arc::new(InMemoryHistory::new());

    let output = generator
        .forward(&question("What is Rust?"), ForwardOptions::default().with_history(history.clone()))
        .await
        .unwrap();

    assert_eq!(output.values.get("answer"), Some(&json!("Rust is a systems language")));
    assert_eq!(output.steps, 2);
    assert_eq!(*calls.lock().unwrap(), vec![json!({"q": "rust"})]);

    let requests = llm.requests();
    assert_eq!(requests[0].functions.as_ref().map(Vec::len), Some(1));
    assert!(!requests[0].history[0].content.contains("Function Name"));

    let messages = history.history(None);
    let function_msg = messages.iter().find(|m| m.role == Role::Function).unwrap();
    assert_eq!(function_msg.function_id.as_deref(), Some("c1"));
    assert_eq!(function_msg.content, "results for rust");
}

#[tokio::test]
async fn test_terminal_call_skips_remaining_calls() {
    let (executor, calls) = search_executor();
    let llm = Arc::new(
        MockLlmClient::from_results([answer_with_calls(
            "Answer: done",
            vec![
                FunctionCall::new("search", json!({"q": "first"})).with_id("c1"),
                FunctionCall::new("task_done", json!({})).with_id("c2"),
                FunctionCall::new("search", json!({"q": "second"})).with_id("c3"),
            ],
        )])
        .with_function_calling(true),
    );
    let generator = GeneratorBuilder::new(qa_signature(), llm.clone())
        .with_tools(executor)
        .build()
        .unwrap();

    let output = generator
        .forward(&question("?"), ForwardOptions::default())
        .await
        .unwrap();

    assert_eq!(output.values.get("answer"), Some(&json!("done")));
    assert_eq!(*calls.lock().unwrap(), vec![json!({"q": "first"})]);
    assert_eq!(llm.call_count(), 1);
}

#[tokio::test]
async fn test_steps_exhausted_is_fatal() {
    let (executor, calls) = search_executor();
    let llm = Arc::new(
        MockLlmClient::new([])
            .with_fallback(ChatResponse::single(CompletionResult::calls(vec![FunctionCall::new(
                "search",
                json!({"q": "again"}),
            )
            .with_id("loop")])))
            .with_function_calling(true),
    );
    let generator = GeneratorBuilder::new(qa_signature(), llm.clone())
        .with_tools(executor)
        .build()
        .unwrap();

    let err = generator
        .forward(&question("?"), ForwardOptions::default().with_max_steps(3).with_max_retries(3))
        .await
        .unwrap_err();

    assert!(matches!(err, GenError::StepsExhausted(3)));
    assert_eq!(
        err.to_string(),
        "Could not complete task within maximum allowed steps (3)"
    );
    assert_eq!(llm.call_count(), 3);
    assert_eq!(calls.lock().unwrap().len(), 3);
}

#[tokio::test]
async fn test_simulated_tool_loop() {
    let (executor, calls) = search_executor();
    let llm = Arc::new(MockLlmClient::from_results([
        CompletionResult::text("Answer: searching\nFunction Name: search\nFunction Arguments: {\"q\": \"rust\"}"),
        CompletionResult::text("Answer: Rust\nFunction Name: task_done\nFunction Arguments: {}"),
    ]));
    let generator = GeneratorBuilder::new(qa_signature(), llm.clone())
        .with_tools(executor)
        .build()
        .unwrap();
    assert_eq!(generator.strategy(), FunctionCallStrategy::Simulated);
    let history = Arc::new(InMemoryHistory::new());

    let output = generator
        .forward(&question("What is Rust?"), ForwardOptions::default().with_history(history.clone()))
        .await
        .unwrap();

    assert_eq!(output.values.get("answer"), Some(&json!("Rust")));
    assert!(!output.values.contains_key(FUNCTION_NAME_FIELD));
    assert_eq!(*calls.lock().unwrap(), vec![json!({"q": "rust"})]);

    let requests = llm.requests();
    assert!(requests[0].functions.is_none());
    assert!(requests[0].history[0].content.contains("Function Name"));

    // 合成调用带 ID，结果写回历史
    let messages = history.history(None);
    let function_msg = messages.iter().find(|m| m.role == Role::Function).unwrap();
    assert!(function_msg.function_id.is_some());
    assert_eq!(function_msg.content, "results for rust");
}

#[tokio::test]
async fn test_events_for_successful_run() {
    let (tx, mut rx) = tokio::sync::mpsc::unbounded_channel();
    let llm = Arc::new(MockLlmClient::from_results([CompletionResult::text("Answer: Paris")]));
    let generator = GeneratorBuilder::new(qa_signature(), llm).build().unwrap();

    generator
        .forward(&question("?"), ForwardOptions::default().with_event_tx(tx))
        .await
        .unwrap();

    let mut events = Vec::new();
    while let Ok(event) = rx.try_recv() {
        events.push(event);
    }
    assert_eq!(
        events,
        vec![
            GenEvent::AttemptStarted {
                attempt: 1,
                max_retries: 3
            },
            GenEvent::StepUpdate { step: 1, max_steps: 10 },
            GenEvent::Done {
                attempts: 1,
                degraded: false
            },
        ]
    );
}

#[tokio::test]
async fn test_zero_limits_rejected() {
    let llm = Arc::new(MockLlmClient::from_results([CompletionResult::text("Answer: x")]));
    let generator = GeneratorBuilder::new(qa_signature(), llm.clone()).build().unwrap();

    let err = generator
        .forward(&question("?"), ForwardOptions::default().with_max_steps(0))
        .await
        .unwrap_err();

    assert!(matches!(err, GenError::Config(_)));
    assert_eq!(llm.call_count(), 0);
}

#[tokio::test]
async fn test_validation_failure_exhausts_retries() {
    let signature = qa_signature().with_output(Field::new("confidence").with_type(FieldType::Number));
    let llm = Arc::new(MockLlmClient::new([]).with_fallback(ChatResponse::single(CompletionResult::text(
        "Answer: Paris\nConfidence: high",
    ))));
    let generator = GeneratorBuilder::new(signature, llm.clone()).build().unwrap();

    let err = generator
        .forward(&question("Capital?"), ForwardOptions::default().with_max_retries(2))
        .await
        .unwrap_err();

    assert!(
        matches!(&err, GenError::RetriesExhausted(msg) if msg.contains("Invalid number value for field: Confidence"))
    );
    assert_eq!(llm.call_count(), 2);
}

#[tokio::test]
async fn test_simulated_degraded_output_drops_function_fields() {
    let (executor, calls) = search_executor();
    let llm = Arc::new(MockLlmClient::new([]).with_fallback(ChatResponse::single(CompletionResult::text(
        "Answer: Lyon\nFunction Name: task_done\nFunction Arguments: {}",
    ))));
    let generator = GeneratorBuilder::new(qa_signature(), llm.clone())
        .with_tools(executor)
        .with_assertion(
            Assertion::new(|v| v.get("answer") == Some(&json!("Paris")), "answer must be Paris").optional(),
        )
        .build()
        .unwrap();
    assert_eq!(generator.strategy(), FunctionCallStrategy::Simulated);

    let output = generator
        .forward(&question("Capital?"), ForwardOptions::default().with_max_retries(2))
        .await
        .unwrap();

    assert!(output.degraded);
    assert_eq!(output.values.get("answer"), Some(&json!("Lyon")));
    assert!(!output.values.contains_key(FUNCTION_NAME_FIELD));
    assert!(!output.values.contains_key(FUNCTION_ARGUMENTS_FIELD));
    assert!(calls.lock().unwrap().is_empty());
    assert_eq!(llm.call_count(), 2);
}

#[tokio::test]
async fn test_function_name_output_without_tools_is_plain_value() {
    let signature = Signature::new("Pick a function").with_output(Field::new(FUNCTION_NAME_FIELD));
    let llm = Arc::new(MockLlmClient::from_results([CompletionResult::text("Function Name: parse_args")]));
    let generator = GeneratorBuilder::new(signature, llm.clone()).build().unwrap();

    let output = generator
        .forward(&Retval::new(), ForwardOptions::default())
        .await
        .unwrap();

    assert_eq!(output.values.get(FUNCTION_NAME_FIELD), Some(&json!("parse_args")));
    assert_eq!(llm.call_count(), 1);
}
