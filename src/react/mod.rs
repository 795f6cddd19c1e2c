//! 认知层：Planner（脚本 / LLM）、单步执行、推理主循环与过程事件

pub mod events;
pub mod llm_planner;
pub mod loop_;
pub mod planner;
pub mod step;

pub use events::AgentEvent;
pub use llm_planner::{parse_llm_output, LlmPlanner, DEFAULT_SYSTEM_PROMPT};
pub use loop_::{reasoning_loop, ReasoningSession, DEFAULT_MAX_STEPS};
pub use planner::{Action, PlanRequest, Planner, ScriptedPlanner};
pub use step::{ExecutionState, StepExecutor};
