//! 对话历史
//!
//! 按会话 ID 存储消息，只追加不删除；生成循环通过 HistoryStore trait 访问，调用方可替换为持久化实现。

use std::collections::HashMap;
use std::sync::RwLock;

use serde::{Deserialize, Serialize};

use crate::llm::{CompletionResult, FunctionCall};

/// 未指定会话 ID 时使用的键
pub const DEFAULT_SESSION: &str = "default";

/// 消息角色（与 LLM API 一致）
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum Role {
    User,
    Assistant,
    System,
    Function,
}

/// 单条消息
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Message {
    pub role: Role,
    pub content: String,
    /// assistant 消息中模型请求的函数调用
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub function_calls: Option<Vec<FunctionCall>>,
    /// function 消息对应的调用 ID
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub function_id: Option<String>,
}

impl Message {
    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: Role::User,
            content: content.into(),
            function_calls: None,
            function_id: None,
        }
    }

    pub fn assistant(content: impl Into<String>) -> Self {
        Self {
            role: Role::Assistant,
            content: content.into(),
            function_calls: None,
            function_id: None,
        }
    }

    /// 工具执行结果，关联到发起调用的 ID
    pub fn function(function_id: impl Into<String>, result: impl Into<String>) -> Self {
        Self {
            role: Role::Function,
            content: result.into(),
            function_calls: None,
            function_id: Some(function_id.into()),
        }
    }

    /// 补全结果转为 assistant 消息
    pub fn from_result(result: &CompletionResult) -> Self {
        Self {
            role: Role::Assistant,
            content: result.content.clone().unwrap_or_default(),
            function_calls: result.function_calls.clone(),
            function_id: None,
        }
    }
}

/// 对话历史存储：按会话只追加
pub trait HistoryStore: Send + Sync {
    fn history(&self, session_id: Option<&str>) -> Vec<Message>;

    fn add(&self, messages: Vec<Message>, session_id: Option<&str>);

    fn add_result(&self, result: &CompletionResult, session_id: Option<&str>) {
        self.add(vec![Message::from_result(result)], session_id);
    }
}

/// 单个会话的消息序列
#[derive(Clone, Debug, Default)]
pub struct ConversationMemory {
    messages: Vec<Message>,
}

impl ConversationMemory {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, msg: Message) {
        self.messages.push(msg);
    }

    pub fn messages(&self) -> &[Message] {
        &self.messages
    }

    pub fn len(&self) -> usize {
        self.messages.len()
    }

    pub fn is_empty(&self) -> bool {
        self.messages.is_empty()
    }
}

/// 内存历史存储：会话 ID -> ConversationMemory
#[derive(Debug, Default)]
pub struct InMemoryHistory {
    sessions: RwLock<HashMap<String, ConversationMemory>>,
}

impl InMemoryHistory {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self, session_id: Option<&str>) -> usize {
        let sessions = self.sessions.read().unwrap_or_else(|e| e.into_inner());
        sessions
            .get(session_id.unwrap_or(DEFAULT_SESSION))
            .map(ConversationMemory::len)
            .unwrap_or(0)
    }
}

impl HistoryStore for InMemoryHistory {
    fn history(&self, session_id: Option<&str>) -> Vec<Message> {
        let sessions = self.sessions.read().unwrap_or_else(|e| e.into_inner());
        sessions
            .get(session_id.unwrap_or(DEFAULT_SESSION))
            .map(|c| c.messages().to_vec())
            .unwrap_or_default()
    }

    fn add(&self, messages: Vec<Message>, session_id: Option<&str>) {
        let mut sessions = self.sessions.write().unwrap_or_else(|e| e.into_inner());
        let conversation = sessions
            .entry(session_id.unwrap_or(DEFAULT_SESSION).to_string())
            .or_default();
        for msg in messages {
            conversation.push(msg);
        }
    }
}
