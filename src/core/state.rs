//! 执行状态：Step / ToolCall / ExecutionResult
//!
//! Step 只追加，索引从 0 连续递增；ToolCall 只由调用了工具的 Step 产生，故 tool_calls.len() <= steps.len()。
//! 全部可序列化，外层 RPC / CLI 直接返回 JSON。

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use uuid::Uuid;

use crate::memory::Context;
use crate::tools::ToolOutcome;

/// Step 选择的动作（不含 rationale）
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum StepAction {
    Invoke { tool: String, arguments: Value },
    Finish { result: Value },
    /// Planner 回复无法解析为动作，保留原文
    Unparsed { raw: String },
}

/// 动作被拒绝的原因
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RejectionKind {
    UnknownTool,
    InvalidArguments,
    MalformedPlan,
}

/// Step 的结果
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum StepOutcome {
    /// Planner 给出最终结果
    Finished { result: Value },
    /// 工具已调用（成功或失败），tool_call 为 ExecutionResult.tool_calls 中的下标
    Tool { tool_call: usize, outcome: ToolOutcome },
    /// 动作未执行：未知工具、参数不合法或 Planner 输出无法解析
    Rejected { kind: RejectionKind, error: String },
}

/// 一次「规划 + 执行」循环
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Step {
    pub index: usize,
    pub action: StepAction,
    pub rationale: String,
    pub outcome: StepOutcome,
}

impl Step {
    /// 一行叙述，用于 reasoning 文本
    pub fn narrate(&self) -> String {
        let rationale = if self.rationale.is_empty() {
            String::new()
        } else {
            format!("{} ", self.rationale)
        };
        let what = match (&self.action, &self.outcome) {
            (StepAction::Finish { result }, _) => format!("-> finish: {}", value_preview(result)),
            (StepAction::Invoke { tool, .. }, StepOutcome::Tool { outcome, .. })
                if outcome.success =>
            {
                format!("-> {} ok: {}", tool, value_preview(&outcome.payload()))
            }
            (StepAction::Invoke { tool, .. }, StepOutcome::Tool { outcome, .. }) => format!(
                "-> {} failed: {}",
                tool,
                outcome.error.as_deref().unwrap_or("unknown error")
            ),
            (StepAction::Invoke { tool, .. }, StepOutcome::Rejected { error, .. }) => {
                format!("-> {} rejected: {}", tool, error)
            }
            (StepAction::Invoke { tool, .. }, StepOutcome::Finished { .. }) => {
                format!("-> {}", tool)
            }
            (StepAction::Unparsed { .. }, StepOutcome::Rejected { error, .. }) => {
                format!("-> unusable plan: {}", error)
            }
            (StepAction::Unparsed { raw }, _) => format!("-> unusable plan: {}", raw),
        };
        format!("Step {}: {}{}", self.index, rationale, what)
    }
}

/// 一次工具调用记录
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ToolCall {
    /// 产生该调用的 Step 索引
    pub step: usize,
    pub tool: String,
    pub arguments: Value,
    pub success: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub result: Option<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub details: Option<Map<String, Value>>,
    pub duration_ms: u64,
}

/// 执行终止状态
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ExecutionStatus {
    /// Planner 给出 Finish
    Completed,
    /// 达到步数上限仍未 Finish（软终止，不是错误）
    StepBudgetExceeded,
    /// 在步边界收到取消信号
    Cancelled,
    /// Planner 不可用而中止；只出现在 AgentError::PlannerUnavailable 携带的部分结果中
    Aborted,
}

/// execute 的最终产物，返回后归调用方所有
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExecutionResult {
    pub execution_id: Uuid,
    pub status: ExecutionStatus,
    pub result: Value,
    pub steps: Vec<Step>,
    pub tool_calls: Vec<ToolCall>,
    /// 人类可读的推理叙述（每步一行）
    pub reasoning: String,
    /// 执行结束时的上下文，可传给下一次 execute
    pub context: Context,
    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
}

impl ExecutionResult {
    pub fn is_complete(&self) -> bool {
        self.status == ExecutionStatus::Completed
    }

    pub fn summary(&self) -> ExecutionSummary {
        ExecutionSummary {
            total_steps: self.steps.len(),
            tools_used: self.tool_calls.iter().map(|tc| tc.tool.clone()).collect(),
            tool_count: self.tool_calls.len(),
        }
    }
}

/// 执行摘要：步数、按调用顺序的工具名、调用次数
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExecutionSummary {
    pub total_steps: usize,
    pub tools_used: Vec<String>,
    pub tool_count: usize,
}

/// JSON 值的单行预览
pub(crate) fn value_preview(value: &Value) -> String {
    const MAX: usize = 120;
    let s = match value {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    };
    if s.chars().count() > MAX {
        format!("{}...", s.chars().take(MAX).collect::<String>())
    } else {
        s
    }
}
