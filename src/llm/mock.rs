//! Mock LLM 客户端（用于测试，无需 API）
//!
//! 按顺序返回预设回复（可含错误）；回复用尽后给出 finish 动作，回显最后一条 User 消息的首行。

use std::collections::VecDeque;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;

use async_trait::async_trait;

use crate::llm::LlmClient;
use crate::memory::{Message, Role};

#[derive(Debug, Default)]
pub struct MockLlmClient {
    replies: Mutex<VecDeque<Result<String, String>>>,
    calls: AtomicUsize,
}

impl MockLlmClient {
    pub fn new() -> Self {
        Self::default()
    }

    /// 预设一组成功回复
    pub fn with_replies<I, S>(replies: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let mock = Self::default();
        for r in replies {
            mock.push_reply(r);
        }
        mock
    }

    pub fn push_reply(&self, reply: impl Into<String>) {
        self.queue().push_back(Ok(reply.into()));
    }

    /// 预设一次失败（模拟网络 / 鉴权错误）
    pub fn push_error(&self, error: impl Into<String>) {
        self.queue().push_back(Err(error.into()));
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    fn queue(&self) -> std::sync::MutexGuard<'_, VecDeque<Result<String, String>>> {
        self.replies.lock().unwrap_or_else(|e| e.into_inner())
    }
}

#[async_trait]
impl LlmClient for MockLlmClient {
    async fn complete(&self, messages: &[Message]) -> Result<String, String> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        let scripted = self.queue().pop_front();
        if let Some(reply) = scripted {
            return reply;
        }

        let last_user = messages
            .iter()
            .rev()
            .find(|m| m.role == Role::User)
            .and_then(|m| m.content.lines().find(|l| !l.trim().is_empty() && !l.starts_with('#')))
            .unwrap_or("(no input)");

        Ok(serde_json::json!({
            "action": "finish",
            "result": format!("Echo from Mock: {}", last_user.trim()),
            "rationale": "mock client has no scripted reply",
        })
        .to_string())
    }
}
