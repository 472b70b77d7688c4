//! 记忆层：对话消息与按会话的历史存储

pub mod conversation;

pub use conversation::{ConversationMemory, HistoryStore, InMemoryHistory, Message, Role, DEFAULT_SESSION};
