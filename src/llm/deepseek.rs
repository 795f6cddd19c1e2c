//! DeepSeek API 客户端（OpenAI 兼容格式）
//!
//! - Base URL: https://api.deepseek.com
//! - 模型: deepseek-chat (常规对话), deepseek-reasoner (思考模式)

use crate::llm::OpenAiClient;

pub const DEEPSEEK_BASE_URL: &str = "https://api.deepseek.com";
pub const DEEPSEEK_CHAT: &str = "deepseek-chat";

/// 创建 DeepSeek 客户端；model 为 None 时使用 deepseek-chat
pub fn create_deepseek_client(model: Option<&str>, api_key: &str) -> OpenAiClient {
    let model = model.unwrap_or(DEEPSEEK_CHAT);
    OpenAiClient::new(Some(DEEPSEEK_BASE_URL), model, api_key)
}
