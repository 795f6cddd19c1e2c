//! Agentic Gateway - 工具网关与推理智能体
//!
//! 模块划分：
//! - **config**: 应用配置加载（TOML + 环境变量）
//! - **core**: 编排器、执行状态、错误类型
//! - **llm**: LLM 客户端抽象与实现（OpenAI 兼容 / DeepSeek / Mock）
//! - **memory**: 执行上下文与对话消息
//! - **observability**: tracing 初始化
//! - **react**: Planner（脚本 / LLM）、单步执行、推理主循环
//! - **tools**: 工具 trait、参数 Schema、注册表与带超时的执行器

pub mod config;
pub mod core;
pub mod llm;
pub mod memory;
pub mod observability;
pub mod react;
pub mod tools;

pub use crate::core::{AgentError, ExecutionResult, ExecutionStatus, Orchestrator};
pub use crate::memory::Context;
