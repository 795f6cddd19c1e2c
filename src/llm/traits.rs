//! LLM 客户端抽象
//!
//! 所有后端（OpenAI 兼容 / DeepSeek / Mock）实现 LlmClient；LlmPlanner 只依赖这个 trait。

use async_trait::async_trait;

use crate::memory::Message;

/// LLM 客户端 trait：非流式完成 + token 统计
#[async_trait]
pub trait LlmClient: Send + Sync {
    /// 非流式完成；Err 为可读的失败原因（网络、鉴权、限流等）
    async fn complete(&self, messages: &[Message]) -> Result<String, String>;

    /// 获取累计 token 使用统计：(prompt_tokens, completion_tokens, total_tokens)
    /// 默认返回 (0, 0, 0)，具体实现可覆盖
    fn token_usage(&self) -> (u64, u64, u64) {
        (0, 0, 0)
    }
}
