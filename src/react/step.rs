//! 单步执行：把 Planner 的动作落地为 Step
//!
//! Finish 直接记为终止步；Invoke 经 ToolExecutor 校验并调用，校验失败记为 Rejected（不产生 ToolCall），
//! 调用完成（无论成功与否）记录 ToolCall，并把结果以 `{tool}_{index}` 为键追加进上下文。

use std::time::Instant;

use serde_json::Value;

use crate::core::{RejectionKind, Step, StepAction, StepOutcome, ToolCall, ToolError};
use crate::memory::Context;
use crate::react::Action;
use crate::tools::ToolExecutor;

/// 一次执行的可变状态，只在循环内持有
#[derive(Debug, Default)]
pub struct ExecutionState {
    pub steps: Vec<Step>,
    pub tool_calls: Vec<ToolCall>,
    pub context: Context,
}

impl ExecutionState {
    pub fn new(context: Context) -> Self {
        Self {
            steps: Vec::new(),
            tool_calls: Vec::new(),
            context,
        }
    }

    /// 下一步的索引
    pub fn next_index(&self) -> usize {
        self.steps.len()
    }

    fn push(&mut self, step: Step) -> &Step {
        let index = self.steps.len();
        self.steps.push(step);
        &self.steps[index]
    }
}

pub struct StepExecutor<'a> {
    executor: &'a ToolExecutor,
}

impl<'a> StepExecutor<'a> {
    pub fn new(executor: &'a ToolExecutor) -> Self {
        Self { executor }
    }

    /// 执行一个动作并追加 Step，返回新追加的 Step
    pub async fn apply<'s>(&self, state: &'s mut ExecutionState, action: Action) -> &'s Step {
        let index = state.next_index();
        match action {
            Action::Finish { result, rationale } => state.push(Step {
                index,
                action: StepAction::Finish {
                    result: result.clone(),
                },
                rationale,
                outcome: StepOutcome::Finished { result },
            }),
            Action::Invoke {
                tool,
                arguments,
                rationale,
            } => {
                let started = Instant::now();
                // ToolCall 记录的是补全默认值后、工具实际收到的参数
                let invoked = match self.executor.validate(&tool, &arguments) {
                    Ok(normalized) => self
                        .executor
                        .execute(&tool, normalized.clone())
                        .await
                        .map(|outcome| (normalized, outcome)),
                    Err(e) => Err(e),
                };
                let (normalized, outcome) = match invoked {
                    Ok(invoked) => invoked,
                    Err(e) => {
                        let kind = match &e {
                            ToolError::UnknownTool(_) => RejectionKind::UnknownTool,
                            ToolError::InvalidArguments { .. } => RejectionKind::InvalidArguments,
                        };
                        tracing::warn!(step = index, tool = %tool, error = %e, "action rejected");
                        return state.push(Step {
                            index,
                            action: StepAction::Invoke { tool, arguments },
                            rationale,
                            outcome: StepOutcome::Rejected {
                                kind,
                                error: e.to_string(),
                            },
                        });
                    }
                };
                let duration_ms = started.elapsed().as_millis() as u64;

                let key = state
                    .context
                    .append(format!("{}_{}", tool, index), outcome.payload());
                tracing::debug!(step = index, tool = %tool, key = %key, "context updated");

                state.tool_calls.push(ToolCall {
                    step: index,
                    tool: tool.clone(),
                    arguments: Value::Object(normalized),
                    success: outcome.success,
                    result: outcome.result.clone(),
                    error: outcome.error.clone(),
                    details: outcome.details.clone(),
                    duration_ms,
                });
                let tool_call = state.tool_calls.len() - 1;
                state.push(Step {
                    index,
                    action: StepAction::Invoke { tool, arguments },
                    rationale,
                    outcome: StepOutcome::Tool { tool_call, outcome },
                })
            }
        }
    }

    /// Planner 输出无法解析：记为 MalformedPlan，消耗一步
    pub fn reject_malformed<'s>(&self, state: &'s mut ExecutionState, raw: String) -> &'s Step {
        let index = state.next_index();
        tracing::warn!(step = index, raw = %raw, "malformed plan");
        let error = format!("Malformed planner output: {}", raw);
        state.push(Step {
            index,
            action: StepAction::Unparsed { raw },
            rationale: String::new(),
            outcome: StepOutcome::Rejected {
                kind: RejectionKind::MalformedPlan,
                error,
            },
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tools::{
        EchoTool, ParamKind, ParamSpec, Tool, ToolOutcome, ToolRegistry, ToolSchema,
    };
    use async_trait::async_trait;
    use serde_json::{json, Map};

    /// 返回收到的参数，便于核对默认值补全
    struct PageTool;

    #[async_trait]
    impl Tool for PageTool {
        fn name(&self) -> &str {
            "page"
        }

        fn description(&self) -> &str {
            "Echo the page request"
        }

        fn schema(&self) -> ToolSchema {
            ToolSchema::new()
                .param(ParamSpec::required("query", ParamKind::String, "Search query"))
                .param(
                    ParamSpec::optional("limit", ParamKind::Integer, "Page size").with_default(10),
                )
        }

        async fn execute(&self, args: Map<String, Value>) -> ToolOutcome {
            ToolOutcome::ok(Value::Object(args))
        }
    }

    fn executor() -> ToolExecutor {
        let mut registry = ToolRegistry::new();
        registry.register(EchoTool);
        registry.register(PageTool);
        ToolExecutor::new(registry, 5)
    }

    #[tokio::test]
    async fn test_invoke_records_tool_call_and_context() {
        let executor = executor();
        let steps = StepExecutor::new(&executor);
        let mut state = ExecutionState::new(Context::new());

        let action = Action::invoke("echo", json!({"text": "hi"})).with_rationale("say hi");
        let step = steps.apply(&mut state, action).await;
        assert_eq!(step.index, 0);
        assert_eq!(step.rationale, "say hi");
        assert!(matches!(step.outcome, StepOutcome::Tool { tool_call: 0, .. }));

        assert_eq!(state.tool_calls.len(), 1);
        assert_eq!(state.tool_calls[0].step, 0);
        assert!(state.tool_calls[0].success);
        assert_eq!(state.context.get("echo_0"), Some(&json!("hi")));
    }

    #[tokio::test]
    async fn test_unknown_tool_is_rejected_without_tool_call() {
        let executor = executor();
        let steps = StepExecutor::new(&executor);
        let mut state = ExecutionState::new(Context::new());

        let step = steps.apply(&mut state, Action::invoke("nope", json!({}))).await;
        assert!(matches!(
            step.outcome,
            StepOutcome::Rejected {
                kind: RejectionKind::UnknownTool,
                ..
            }
        ));
        assert!(state.tool_calls.is_empty());
        assert!(state.context.is_empty());
    }

    #[tokio::test]
    async fn test_invalid_arguments_are_rejected() {
        let executor = executor();
        let steps = StepExecutor::new(&executor);
        let mut state = ExecutionState::new(Context::new());

        let step = steps.apply(&mut state, Action::invoke("echo", json!({"text": 1}))).await;
        assert!(matches!(
            step.outcome,
            StepOutcome::Rejected {
                kind: RejectionKind::InvalidArguments,
                ..
            }
        ));
        assert!(state.tool_calls.is_empty());
    }

    #[tokio::test]
    async fn test_context_key_does_not_overwrite_caller_key() {
        let executor = executor();
        let steps = StepExecutor::new(&executor);
        let mut ctx = Context::new();
        ctx.append("echo_0", json!("caller"));
        let mut state = ExecutionState::new(ctx);

        steps.apply(&mut state, Action::invoke("echo", json!({"text": "tool"}))).await;
        assert_eq!(state.context.get("echo_0"), Some(&json!("caller")));
        assert_eq!(state.context.get("echo_0#1"), Some(&json!("tool")));
    }

    #[test]
    fn test_reject_malformed() {
        let executor = executor();
        let steps = StepExecutor::new(&executor);
        let mut state = ExecutionState::new(Context::new());
        let step = steps.reject_malformed(&mut state, "{not json".to_string());
        assert_eq!(step.index, 0);
        assert!(matches!(step.action, StepAction::Unparsed { .. }));
        assert!(matches!(
            step.outcome,
            StepOutcome::Rejected {
                kind: RejectionKind::MalformedPlan,
                ..
            }
        ));
    }

    #[tokio::test]
    async fn test_tool_call_records_normalized_arguments() {
        let executor = executor();
        let steps = StepExecutor::new(&executor);
        let mut state = ExecutionState::new(Context::new());

        let step = steps
            .apply(&mut state, Action::invoke("page", json!({"query": "rust"})))
            .await;
        // Step 保留 Planner 的原始参数
        assert_eq!(
            step.action,
            StepAction::Invoke {
                tool: "page".to_string(),
                arguments: json!({"query": "rust"}),
            }
        );
        assert_eq!(
            state.tool_calls[0].arguments,
            json!({"query": "rust", "limit": 10})
        );
        assert_eq!(
            state.tool_calls[0].result,
            Some(json!({"query": "rust", "limit": 10}))
        );
    }
}
