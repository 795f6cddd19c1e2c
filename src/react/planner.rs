//! Planner：根据目标与历史决定下一步动作
//!
//! 循环只依赖 `plan` 契约：生产环境用 LlmPlanner，测试用 ScriptedPlanner 按脚本出动作。
//! Action 的 serde 形状即 LLM 需要输出的 JSON：
//! `{"action": "invoke", "tool": "...", "args": {...}, "rationale": "..."}` 或
//! `{"action": "finish", "result": ..., "rationale": "..."}`。

use std::sync::atomic::{AtomicUsize, Ordering};

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::core::{PlannerError, Step};
use crate::memory::Context;
use crate::tools::ToolDescriptor;

/// Planner 输出的下一步动作
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "action", rename_all = "snake_case")]
pub enum Action {
    /// 结束并给出最终结果
    Finish {
        #[serde(default)]
        result: Value,
        #[serde(default)]
        rationale: String,
    },
    /// 调用工具
    Invoke {
        tool: String,
        #[serde(default, rename = "args", alias = "arguments")]
        arguments: Value,
        #[serde(default)]
        rationale: String,
    },
}

impl Action {
    pub fn finish(result: impl Into<Value>) -> Self {
        Action::Finish {
            result: result.into(),
            rationale: String::new(),
        }
    }

    pub fn invoke(tool: impl Into<String>, arguments: Value) -> Self {
        Action::Invoke {
            tool: tool.into(),
            arguments,
            rationale: String::new(),
        }
    }

    pub fn with_rationale(mut self, text: impl Into<String>) -> Self {
        match &mut self {
            Action::Finish { rationale, .. } | Action::Invoke { rationale, .. } => {
                *rationale = text.into();
            }
        }
        self
    }
}

/// 一次规划所需的全部输入（只读借用循环状态）
#[derive(Debug, Clone, Copy)]
pub struct PlanRequest<'a> {
    pub goal: &'a str,
    pub context: &'a Context,
    pub steps: &'a [Step],
    pub tools: &'a [ToolDescriptor],
}

/// Planner trait：给定历史，提出下一步动作
#[async_trait]
pub trait Planner: Send + Sync {
    async fn plan(&self, request: PlanRequest<'_>) -> Result<Action, PlannerError>;

    /// 累计 token 使用统计 (prompt, completion, total)；不调用 LLM 的实现返回 0
    fn token_usage(&self) -> (u64, u64, u64) {
        (0, 0, 0)
    }
}

/// 脚本化 Planner：按顺序返回预设动作，可循环；脚本用尽后返回 Unavailable
#[derive(Debug)]
pub struct ScriptedPlanner {
    actions: Vec<Action>,
    cycle: bool,
    cursor: AtomicUsize,
}

impl ScriptedPlanner {
    pub fn new(actions: Vec<Action>) -> Self {
        Self {
            actions,
            cycle: false,
            cursor: AtomicUsize::new(0),
        }
    }

    /// 每次都返回同一个动作
    pub fn repeat(action: Action) -> Self {
        Self {
            actions: vec![action],
            cycle: true,
            cursor: AtomicUsize::new(0),
        }
    }

    /// 已被调用的次数
    pub fn calls(&self) -> usize {
        self.cursor.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl Planner for ScriptedPlanner {
    async fn plan(&self, _request: PlanRequest<'_>) -> Result<Action, PlannerError> {
        let i = self.cursor.fetch_add(1, Ordering::SeqCst);
        if let Some(action) = self.actions.get(i) {
            return Ok(action.clone());
        }
        if self.cycle && !self.actions.is_empty() {
            return Ok(self.actions[i % self.actions.len()].clone());
        }
        Err(PlannerError::Unavailable(format!(
            "scripted planner exhausted after {} actions",
            self.actions.len()
        )))
    }
}
