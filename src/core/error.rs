//! 错误类型
//!
//! 只有 InvalidGoal 与 PlannerUnavailable 会越过 execute 边界；
//! ToolError / PlannerError::MalformedOutput 在循环内被吸收，记录为 Step 的 Rejected 结果。

use thiserror::Error;

use crate::core::ExecutionResult;

/// execute 向调用方返回的错误
#[derive(Error, Debug)]
pub enum AgentError {
    /// 目标去空白后为空；不做任何规划，不记录 Step
    #[error("Invalid goal: {0}")]
    InvalidGoal(String),

    /// 底层 LLM 无法连接 / 鉴权失败 / 超时；默认不重试。
    /// 若失败前已有 Step，partial 携带截至目前的执行历史
    #[error("Planner unavailable: {reason}")]
    PlannerUnavailable {
        reason: String,
        partial: Option<Box<ExecutionResult>>,
    },

    #[error("Config error: {0}")]
    ConfigError(String),
}

impl AgentError {
    /// PlannerUnavailable 携带的部分执行历史
    pub fn partial_result(&self) -> Option<&ExecutionResult> {
        match self {
            AgentError::PlannerUnavailable { partial, .. } => partial.as_deref(),
            _ => None,
        }
    }
}

/// 工具查找 / 参数校验错误（单步可恢复）
#[derive(Error, Debug, Clone, PartialEq)]
pub enum ToolError {
    #[error("Unknown tool: {0}")]
    UnknownTool(String),

    #[error("Invalid arguments for {tool}: {reason}")]
    InvalidArguments { tool: String, reason: String },
}

/// Planner 错误
#[derive(Error, Debug, Clone, PartialEq)]
pub enum PlannerError {
    /// 决策来源不可用（致命）
    #[error("{0}")]
    Unavailable(String),

    /// 输出无法解析为动作（单步可恢复）
    #[error("Malformed planner output: {0}")]
    MalformedOutput(String),
}
