//! 执行过程事件：用于流式展示规划、工具调用、观察与终止原因

use serde::Serialize;

/// 单步过程事件（可序列化为 JSON 供前端展示）
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum AgentEvent {
    /// 开始第几步（从 0 计）
    StepStarted { step: usize, max_steps: usize },
    /// 正在调用 Planner
    Thinking,
    /// 调用工具
    ToolCall {
        step: usize,
        tool: String,
        args: serde_json::Value,
    },
    /// 工具返回（预览，避免过长）
    Observation {
        step: usize,
        tool: String,
        preview: String,
    },
    /// 工具执行失败（不中止循环）
    ToolFailure {
        step: usize,
        tool: String,
        reason: String,
    },
    /// 动作被拒绝：未知工具、参数不合法、Planner 输出无法解析
    Rejected { step: usize, reason: String },
    /// Planner 给出最终结果
    Finished { step: usize, preview: String },
    /// 步数用尽
    BudgetExhausted { max_steps: usize },
    Cancelled { completed_steps: usize },
    /// 错误
    Error { text: String },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_event_json_tag() {
        let ev = AgentEvent::StepStarted { step: 0, max_steps: 10 };
        let v = serde_json::to_value(&ev).unwrap();
        assert_eq!(v["type"], "step_started");
        assert_eq!(v["max_steps"], 10);

        let v = serde_json::to_value(AgentEvent::Thinking).unwrap();
        assert_eq!(v, serde_json::json!({"type": "thinking"}));
    }
}
