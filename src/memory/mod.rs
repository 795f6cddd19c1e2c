//! 记忆层：LLM 消息（短期对话）与单次执行内累积的上下文映射

pub mod context;
pub mod conversation;

pub use context::Context;
pub use conversation::{Message, Role};
