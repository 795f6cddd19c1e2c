//! 核心编排层：错误类型、执行状态、编排器

pub mod error;
pub mod orchestrator;
pub mod state;

pub use error::{AgentError, PlannerError, ToolError};
pub use orchestrator::{create_llm_from_config, Orchestrator};
pub use state::{
    ExecutionResult, ExecutionStatus, ExecutionSummary, RejectionKind, Step, StepAction,
    StepOutcome, ToolCall,
};
pub(crate) use state::value_preview;
