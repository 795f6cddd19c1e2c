//! LlmPlanner：由 LLM 决定下一步动作
//!
//! 每轮重新拼消息：system（基础 prompt + 工具目录 + 输出格式 Schema）、user（目标 + 当前上下文），
//! 之后按步回放「assistant: 动作 JSON / user: Observation」，被拒绝的步骤附带纠正提示，让模型下一轮自行修正。
//! LLM 调用带请求超时；传输失败或超时为 Unavailable，回复无法解析为 MalformedOutput。

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use serde_json::Value;
use tokio::time::timeout;

use crate::core::{PlannerError, Step, StepAction, StepOutcome};
use crate::llm::LlmClient;
use crate::memory::Message;
use crate::react::{Action, PlanRequest, Planner};
use crate::tools::{action_schema_json, catalogue_json, ToolDescriptor};

pub const DEFAULT_SYSTEM_PROMPT: &str = "You are a reasoning agent. \
Work towards the user's goal step by step. \
At each step either call exactly one of the available tools, \
or finish with the final answer once the goal is satisfied. \
Use results from earlier steps and the context instead of repeating calls.";

/// 默认 LLM 请求超时（秒）
const DEFAULT_REQUEST_TIMEOUT_SECS: u64 = 60;
/// 回放给 LLM 的单条 Observation 最大字符数
const OBSERVATION_MAX_CHARS: usize = 4000;

pub struct LlmPlanner {
    llm: Arc<dyn LlmClient>,
    system_prompt: String,
    request_timeout: Duration,
}

impl LlmPlanner {
    pub fn new(llm: Arc<dyn LlmClient>, system_prompt: impl Into<String>) -> Self {
        Self {
            llm,
            system_prompt: system_prompt.into(),
            request_timeout: Duration::from_secs(DEFAULT_REQUEST_TIMEOUT_SECS),
        }
    }

    pub fn with_request_timeout(mut self, request_timeout: Duration) -> Self {
        self.request_timeout = request_timeout;
        self
    }

    /// 拼出本轮发给 LLM 的完整消息列表
    pub fn build_messages(&self, request: &PlanRequest<'_>) -> Vec<Message> {
        let mut messages = vec![Message::system(system_section(
            &self.system_prompt,
            request.tools,
        ))];

        let mut opening = format!("## Goal\n{}", request.goal.trim());
        if !request.context.is_empty() {
            opening.push_str("\n\n## Context\n");
            opening.push_str(&request.context.to_json_string());
        }
        messages.push(Message::user(opening));

        for step in request.steps {
            messages.push(Message::assistant(replay_action(step)));
            messages.push(Message::user(observation(step)));
        }
        messages
    }
}

#[async_trait]
impl Planner for LlmPlanner {
    async fn plan(&self, request: PlanRequest<'_>) -> Result<Action, PlannerError> {
        let messages = self.build_messages(&request);
        let reply = match timeout(self.request_timeout, self.llm.complete(&messages)).await {
            Ok(Ok(reply)) => reply,
            Ok(Err(e)) => return Err(PlannerError::Unavailable(format!("LLM error: {e}"))),
            Err(_) => {
                return Err(PlannerError::Unavailable(format!(
                    "LLM request timed out after {}s",
                    self.request_timeout.as_secs()
                )))
            }
        };
        tracing::debug!(step = request.steps.len(), reply = %reply, "planner reply");
        parse_llm_output(&reply)
    }

    fn token_usage(&self) -> (u64, u64, u64) {
        self.llm.token_usage()
    }
}

fn system_section(base: &str, tools: &[ToolDescriptor]) -> String {
    let catalogue = catalogue_json(tools);
    format!(
        "{base}\n\n## Available tools\n{catalogue}\n\n## Response format\n\
        Reply with exactly one JSON object and nothing else.\n\
        To call a tool: \
        {{\"action\": \"invoke\", \"tool\": \"<name>\", \
        \"args\": {{...}}, \"rationale\": \"<why>\"}}\n\
        When the goal is satisfied: \
        {{\"action\": \"finish\", \"result\": <answer>, \"rationale\": \"<why>\"}}\n\
        Schema:\n{}",
        action_schema_json()
    )
}

/// 把已记录的动作还原为 LLM 当时应输出的 JSON
fn replay_action(step: &Step) -> String {
    match &step.action {
        StepAction::Invoke { tool, arguments } => serde_json::json!({
            "action": "invoke",
            "tool": tool,
            "args": arguments,
            "rationale": step.rationale,
        })
        .to_string(),
        StepAction::Finish { result } => serde_json::json!({
            "action": "finish",
            "result": result,
            "rationale": step.rationale,
        })
        .to_string(),
        StepAction::Unparsed { raw } => raw.clone(),
    }
}

fn observation(step: &Step) -> String {
    match &step.outcome {
        StepOutcome::Tool { outcome, .. } => {
            let tool = match &step.action {
                StepAction::Invoke { tool, .. } => tool.as_str(),
                _ => "tool",
            };
            let body = serde_json::to_string(outcome).unwrap_or_default();
            format!(
                "Observation from {} (step {}): {}",
                tool,
                step.index,
                truncate(&body, OBSERVATION_MAX_CHARS)
            )
        }
        StepOutcome::Rejected { error, .. } => format!(
            "Step {} was rejected: {}. Reply with one valid JSON action \
            using only the available tools and their declared arguments.",
            step.index, error
        ),
        StepOutcome::Finished { .. } => format!("Step {} finished.", step.index),
    }
}

fn truncate(s: &str, max: usize) -> String {
    if s.chars().count() > max {
        format!("{}...[truncated]", s.chars().take(max).collect::<String>())
    } else {
        s.to_string()
    }
}

/// 解析 LLM 输出为动作。
///
/// 含 ```json 代码块或 {...} 片段时按 JSON 解析：有 "action" 字段按完整格式，
/// 只有 "tool" 字段按简写 `{"tool": ..., "args": ...}` 处理。
/// 完全不含 JSON 的回复视为最终答案；JSON 回复永远不会被当作最终答案。
pub fn parse_llm_output(output: &str) -> Result<Action, PlannerError> {
    let trimmed = output.trim();
    if trimmed.is_empty() {
        return Err(PlannerError::MalformedOutput("empty response".to_string()));
    }

    // 尝试提取 JSON 块（```json ... ``` 或纯 JSON）
    let json_str = if let Some(start) = trimmed.find("```json") {
        let rest = &trimmed[start + 7..];
        rest.find("```")
            .map(|end| rest[..end].trim())
            .unwrap_or(rest.trim())
    } else if let Some(start) = trimmed.find('{') {
        match trimmed.rfind('}') {
            Some(end) if end > start => &trimmed[start..=end],
            _ => trimmed,
        }
    } else {
        return Ok(Action::finish(trimmed));
    };

    let value: Value = serde_json::from_str(json_str)
        .map_err(|e| PlannerError::MalformedOutput(format!("{}: {}", e, json_str)))?;
    let Some(obj) = value.as_object() else {
        return Err(PlannerError::MalformedOutput(format!(
            "expected a JSON object: {json_str}"
        )));
    };

    if obj.contains_key("action") {
        return serde_json::from_value(value.clone())
            .map_err(|e| PlannerError::MalformedOutput(format!("{}: {}", e, json_str)));
    }

    // 空工具名照常转为 Invoke，由注册表拒绝为 UnknownTool
    match obj.get("tool").and_then(Value::as_str) {
        Some(tool) => {
            let args = obj
                .get("args")
                .or_else(|| obj.get("arguments"))
                .cloned()
                .unwrap_or(Value::Null);
            let rationale = obj
                .get("rationale")
                .and_then(Value::as_str)
                .unwrap_or_default();
            Ok(Action::invoke(tool, args).with_rationale(rationale))
        }
        None => Err(PlannerError::MalformedOutput(format!(
            "expected an \"action\" or \"tool\" field: {json_str}"
        ))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::RejectionKind;
    use crate::llm::MockLlmClient;
    use crate::memory::{Context, Role};
    use crate::tools::ToolOutcome;
    use serde_json::json;

    #[test]
    fn test_parse_full_invoke() {
        let output = r#"{"action": "invoke", "tool": "calculate",
            "args": {"expression": "2+2"}, "rationale": "math"}"#;
        let action = parse_llm_output(output).unwrap();
        assert_eq!(
            action,
            Action::invoke("calculate", json!({"expression": "2+2"})).with_rationale("math")
        );
    }

    #[test]
    fn test_parse_fenced_finish() {
        let output = "Done.\n```json\n{\"action\": \"finish\", \"result\": 4}\n```";
        assert_eq!(parse_llm_output(output).unwrap(), Action::finish(4));
    }

    #[test]
    fn test_parse_short_tool_form() {
        let output = r#"Let me check. {"tool": "echo", "args": {"text": "hi"}}"#;
        let action = parse_llm_output(output).unwrap();
        assert_eq!(action, Action::invoke("echo", json!({"text": "hi"})));
    }

    #[test]
    fn test_blank_tool_name_is_an_invocation_not_an_answer() {
        let action = parse_llm_output(r#"{"tool": "", "args": {"text": "hi"}}"#).unwrap();
        assert_eq!(action, Action::invoke("", json!({"text": "hi"})));
        assert!(!matches!(action, Action::Finish { .. }));
    }

    #[test]
    fn test_plain_text_is_final_answer() {
        assert_eq!(
            parse_llm_output("  The answer is four.  ").unwrap(),
            Action::finish("The answer is four.")
        );
    }

    #[test]
    fn test_malformed_outputs() {
        assert!(matches!(parse_llm_output(""), Err(PlannerError::MalformedOutput(_))));
        assert!(matches!(
            parse_llm_output(r#"{"tool": "echo", "args": "#),
            Err(PlannerError::MalformedOutput(_))
        ));
        assert!(matches!(
            parse_llm_output(r#"{"answer": 4}"#),
            Err(PlannerError::MalformedOutput(_))
        ));
        assert!(matches!(
            parse_llm_output(r#"{"action": "dance"}"#),
            Err(PlannerError::MalformedOutput(_))
        ));
    }

    #[test]
    fn test_build_messages_replays_steps() {
        let planner = LlmPlanner::new(Arc::new(MockLlmClient::new()), "base prompt");
        let mut ctx = Context::new();
        ctx.append("echo_0", json!("hi"));
        let steps = vec![
            Step {
                index: 0,
                action: StepAction::Invoke {
                    tool: "echo".to_string(),
                    arguments: json!({"text": "hi"}),
                },
                rationale: "say hi".to_string(),
                outcome: StepOutcome::Tool {
                    tool_call: 0,
                    outcome: ToolOutcome::ok("hi"),
                },
            },
            Step {
                index: 1,
                action: StepAction::Invoke {
                    tool: "nope".to_string(),
                    arguments: json!({}),
                },
                rationale: String::new(),
                outcome: StepOutcome::Rejected {
                    kind: RejectionKind::UnknownTool,
                    error: "Unknown tool: nope".to_string(),
                },
            },
        ];
        let tools = vec![ToolDescriptor {
            name: "echo".to_string(),
            description: "Echo".to_string(),
            parameters: json!({"type": "object"}),
        }];
        let request = PlanRequest {
            goal: "say hi",
            context: &ctx,
            steps: &steps,
            tools: &tools,
        };

        let messages = planner.build_messages(&request);
        assert_eq!(messages.len(), 6);
        assert_eq!(messages[0].role, Role::System);
        assert!(messages[0].content.starts_with("base prompt"));
        assert!(messages[0].content.contains("\"echo\""));
        assert!(messages[1].content.contains("## Goal\nsay hi"));
        assert!(messages[1].content.contains("echo_0"));
        assert!(messages[3].content.starts_with("Observation from echo (step 0)"));
        assert!(messages[5].content.contains("Unknown tool: nope"));
    }

    #[tokio::test]
    async fn test_plan_uses_llm_reply() {
        let llm = Arc::new(MockLlmClient::with_replies([
            r#"{"action": "finish", "result": "ok", "rationale": "trivial"}"#,
        ]));
        let planner = LlmPlanner::new(llm.clone(), DEFAULT_SYSTEM_PROMPT);
        let ctx = Context::new();
        let request = PlanRequest {
            goal: "anything",
            context: &ctx,
            steps: &[],
            tools: &[],
        };
        let action = planner.plan(request).await.unwrap();
        assert_eq!(action, Action::finish("ok").with_rationale("trivial"));
        assert_eq!(llm.calls(), 1);
    }

    #[tokio::test]
    async fn test_plan_llm_error_is_unavailable() {
        let llm = MockLlmClient::new();
        llm.push_error("401 Unauthorized");
        let planner = LlmPlanner::new(Arc::new(llm), DEFAULT_SYSTEM_PROMPT);
        let ctx = Context::new();
        let request = PlanRequest {
            goal: "anything",
            context: &ctx,
            steps: &[],
            tools: &[],
        };
        match planner.plan(request).await {
            Err(PlannerError::Unavailable(reason)) => assert!(reason.contains("401")),
            other => panic!("Expected Unavailable, got {:?}", other),
        }
    }
}
