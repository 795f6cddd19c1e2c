//! 推理主循环
//!
//! Plan -> Act (Tool) -> Observe -> 下一轮 Plan；每轮开始先检查取消，再检查步数上限。
//! 可选 event_tx：向前端推送 StepStarted / Thinking / ToolCall / Observation / Finished 等事件。

use chrono::Utc;
use serde_json::Value;
use tokio::sync::mpsc::UnboundedSender;
use tokio_util::sync::CancellationToken;
use uuid::Uuid;

use crate::core::{
    value_preview, AgentError, ExecutionResult, ExecutionStatus, PlannerError, Step, StepOutcome,
    ToolCall,
};
use crate::memory::Context;
use crate::react::{AgentEvent, ExecutionState, PlanRequest, Planner, StepExecutor};
use crate::tools::ToolExecutor;

/// 单次执行最大步数的默认值
pub const DEFAULT_MAX_STEPS: usize = 10;

/// 一次执行所需的协作者
pub struct ReasoningSession<'a> {
    pub planner: &'a dyn Planner,
    pub executor: &'a ToolExecutor,
    pub max_steps: usize,
    pub cancel_token: CancellationToken,
    pub event_tx: Option<&'a UnboundedSender<AgentEvent>>,
}

impl<'a> ReasoningSession<'a> {
    pub fn new(planner: &'a dyn Planner, executor: &'a ToolExecutor) -> Self {
        Self {
            planner,
            executor,
            max_steps: DEFAULT_MAX_STEPS,
            cancel_token: CancellationToken::new(),
            event_tx: None,
        }
    }

    /// 设置步数上限（至少 1）
    pub fn with_max_steps(mut self, max_steps: usize) -> Self {
        self.max_steps = max_steps.max(1);
        self
    }

    pub fn with_cancel_token(mut self, token: CancellationToken) -> Self {
        self.cancel_token = token;
        self
    }

    /// 设置事件推送通道
    pub fn with_event_tx(mut self, tx: &'a UnboundedSender<AgentEvent>) -> Self {
        self.event_tx = Some(tx);
        self
    }

    fn send(&self, ev: AgentEvent) {
        if let Some(tx) = self.event_tx {
            let _ = tx.send(ev);
        }
    }
}

/// 执行推理循环
///
/// 目标为空返回 InvalidGoal；Planner 不可用返回 PlannerUnavailable（已有步骤时携带部分结果）。
/// 步数用尽与取消都不是错误，以 ExecutionStatus 区分。
pub async fn reasoning_loop(
    session: &ReasoningSession<'_>,
    goal: &str,
    context: Context,
) -> Result<ExecutionResult, AgentError> {
    let goal = goal.trim();
    if goal.is_empty() {
        return Err(AgentError::InvalidGoal("goal must not be empty".to_string()));
    }

    let execution_id = Uuid::new_v4();
    let started_at = Utc::now();
    let max_steps = session.max_steps.max(1);
    let tools = session.executor.list_tools();
    let step_executor = StepExecutor::new(session.executor);
    let mut state = ExecutionState::new(context);

    tracing::info!(%execution_id, max_steps, tools = tools.len(), "execution started");

    let (status, result) = loop {
        if session.cancel_token.is_cancelled() {
            let completed = state.steps.len();
            tracing::info!(%execution_id, completed, "execution cancelled");
            session.send(AgentEvent::Cancelled {
                completed_steps: completed,
            });
            break (
                ExecutionStatus::Cancelled,
                Value::String(format!("Execution cancelled after {} steps", completed)),
            );
        }

        if state.steps.len() >= max_steps {
            tracing::warn!(%execution_id, max_steps, "step budget exhausted");
            session.send(AgentEvent::BudgetExhausted { max_steps });
            break (
                ExecutionStatus::StepBudgetExceeded,
                Value::String(format!("No conclusive answer reached in {} steps", max_steps)),
            );
        }

        let index = state.next_index();
        session.send(AgentEvent::StepStarted {
            step: index,
            max_steps,
        });
        session.send(AgentEvent::Thinking);

        let planned = session
            .planner
            .plan(PlanRequest {
                goal,
                context: &state.context,
                steps: &state.steps,
                tools: &tools,
            })
            .await;

        match planned {
            Ok(action) => {
                step_executor.apply(&mut state, action).await;
            }
            Err(PlannerError::MalformedOutput(raw)) => {
                step_executor.reject_malformed(&mut state, raw);
            }
            Err(PlannerError::Unavailable(reason)) => {
                tracing::error!(
                    %execution_id,
                    step = index,
                    reason = %reason,
                    "planner unavailable"
                );
                session.send(AgentEvent::Error {
                    text: format!("Planner unavailable: {}", reason),
                });
                let partial = if state.steps.is_empty() {
                    None
                } else {
                    Some(Box::new(assemble(
                        execution_id,
                        started_at,
                        state,
                        ExecutionStatus::Aborted,
                        Value::Null,
                        max_steps,
                    )))
                };
                return Err(AgentError::PlannerUnavailable { reason, partial });
            }
        };

        let step = &state.steps[index];
        tracing::info!(%execution_id, "{}", step.narrate());
        for ev in step_events(step, &state.tool_calls) {
            session.send(ev);
        }
        if let StepOutcome::Finished { result } = &step.outcome {
            break (ExecutionStatus::Completed, result.clone());
        }
    };

    let result = assemble(execution_id, started_at, state, status, result, max_steps);
    tracing::info!(
        %execution_id,
        status = ?result.status,
        steps = result.steps.len(),
        tool_calls = result.tool_calls.len(),
        "execution finished"
    );
    Ok(result)
}

/// 一步落定后推送的事件；ToolCall 只在工具确实被调用后发出，携带补全后的参数
fn step_events(step: &Step, tool_calls: &[ToolCall]) -> Vec<AgentEvent> {
    match &step.outcome {
        StepOutcome::Finished { result } => vec![AgentEvent::Finished {
            step: step.index,
            preview: value_preview(result),
        }],
        StepOutcome::Tool { tool_call, outcome } => {
            let Some(call) = tool_calls.get(*tool_call) else {
                return Vec::new();
            };
            let done = if outcome.success {
                AgentEvent::Observation {
                    step: step.index,
                    tool: call.tool.clone(),
                    preview: value_preview(&outcome.payload()),
                }
            } else {
                AgentEvent::ToolFailure {
                    step: step.index,
                    tool: call.tool.clone(),
                    reason: outcome.error.clone().unwrap_or_default(),
                }
            };
            vec![
                AgentEvent::ToolCall {
                    step: step.index,
                    tool: call.tool.clone(),
                    args: call.arguments.clone(),
                },
                done,
            ]
        }
        StepOutcome::Rejected { error, .. } => vec![AgentEvent::Rejected {
            step: step.index,
            reason: error.clone(),
        }],
    }
}

fn assemble(
    execution_id: Uuid,
    started_at: chrono::DateTime<Utc>,
    state: ExecutionState,
    status: ExecutionStatus,
    result: Value,
    max_steps: usize,
) -> ExecutionResult {
    let mut lines: Vec<String> = state.steps.iter().map(Step::narrate).collect();
    let n = state.steps.len();
    lines.push(match status {
        ExecutionStatus::Completed => format!("Completed in {} steps.", n),
        ExecutionStatus::StepBudgetExceeded => {
            format!("Stopped: step budget of {} exhausted.", max_steps)
        }
        ExecutionStatus::Cancelled => format!("Cancelled after {} steps.", n),
        ExecutionStatus::Aborted => format!("Aborted after {} steps: planner unavailable.", n),
    });

    ExecutionResult {
        execution_id,
        status,
        result,
        steps: state.steps,
        tool_calls: state.tool_calls,
        reasoning: lines.join("\n"),
        context: state.context,
        started_at,
        finished_at: Utc::now(),
    }
}
