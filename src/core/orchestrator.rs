//! 编排器：对外的 execute 入口
//!
//! 持有 Planner、工具执行器与步数上限，每次 execute 建立一个 ReasoningSession 跑推理循环。
//! 自身无可变状态，可在多个任务间共享并发执行。

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::mpsc::UnboundedSender;
use tokio_util::sync::CancellationToken;

use crate::config::AppConfig;
use crate::core::{AgentError, ExecutionResult};
use crate::llm::{create_deepseek_client, LlmClient, MockLlmClient, OpenAiClient};
use crate::memory::Context;
use crate::react::{
    reasoning_loop, AgentEvent, LlmPlanner, Planner, ReasoningSession, DEFAULT_MAX_STEPS,
    DEFAULT_SYSTEM_PROMPT,
};
use crate::tools::{ToolDescriptor, ToolExecutor, ToolRegistry};

/// 工具调用默认超时（秒）
const DEFAULT_TOOL_TIMEOUT_SECS: u64 = 30;

pub struct Orchestrator {
    planner: Arc<dyn Planner>,
    executor: ToolExecutor,
    max_steps: usize,
}

impl Orchestrator {
    pub fn new(planner: Arc<dyn Planner>, registry: ToolRegistry) -> Self {
        Self {
            planner,
            executor: ToolExecutor::new(registry, DEFAULT_TOOL_TIMEOUT_SECS),
            max_steps: DEFAULT_MAX_STEPS,
        }
    }

    /// 设置步数上限（0 按 1 处理）
    pub fn with_max_steps(mut self, max_steps: usize) -> Self {
        self.max_steps = max_steps.max(1);
        self
    }

    /// 设置工具调用默认超时
    pub fn with_tool_timeout(mut self, timeout: Duration) -> Self {
        self.executor = self.executor.with_default_timeout(timeout);
        self
    }

    /// 按配置创建：LLM 后端、系统提示词、步数上限、工具超时
    pub fn from_config(cfg: &AppConfig, registry: ToolRegistry) -> Result<Self, AgentError> {
        let llm = create_llm_from_config(cfg)?;
        let planner = LlmPlanner::new(llm, load_system_prompt(cfg))
            .with_request_timeout(Duration::from_secs(cfg.llm.timeouts.request));
        Ok(Self::new(Arc::new(planner), registry)
            .with_max_steps(cfg.agent.max_steps)
            .with_tool_timeout(Duration::from_secs(cfg.tools.tool_timeout_secs)))
    }

    pub fn max_steps(&self) -> usize {
        self.max_steps
    }

    /// Planner 背后 LLM 的累计 token 使用：(prompt, completion, total)
    pub fn token_usage(&self) -> (u64, u64, u64) {
        self.planner.token_usage()
    }

    /// 已注册工具的描述（按名称排序）
    pub fn list_tools(&self) -> Vec<ToolDescriptor> {
        self.executor.list_tools()
    }

    pub async fn execute(
        &self,
        goal: &str,
        context: Option<Context>,
    ) -> Result<ExecutionResult, AgentError> {
        self.run(goal, context, CancellationToken::new(), None).await
    }

    /// 可取消的执行；取消只在步边界生效
    pub async fn execute_with_cancel(
        &self,
        goal: &str,
        context: Option<Context>,
        cancel_token: CancellationToken,
    ) -> Result<ExecutionResult, AgentError> {
        self.run(goal, context, cancel_token, None).await
    }

    /// 执行并把过程事件推送到 event_tx
    pub async fn execute_streaming(
        &self,
        goal: &str,
        context: Option<Context>,
        cancel_token: CancellationToken,
        event_tx: &UnboundedSender<AgentEvent>,
    ) -> Result<ExecutionResult, AgentError> {
        self.run(goal, context, cancel_token, Some(event_tx)).await
    }

    async fn run(
        &self,
        goal: &str,
        context: Option<Context>,
        cancel_token: CancellationToken,
        event_tx: Option<&UnboundedSender<AgentEvent>>,
    ) -> Result<ExecutionResult, AgentError> {
        let mut session = ReasoningSession::new(self.planner.as_ref(), &self.executor)
            .with_max_steps(self.max_steps)
            .with_cancel_token(cancel_token);
        if let Some(tx) = event_tx {
            session = session.with_event_tx(tx);
        }
        reasoning_loop(&session, goal, context.unwrap_or_default()).await
    }
}

/// 根据配置与环境变量选择 LLM 后端（OpenAI 兼容 / DeepSeek / Mock）
///
/// 真实后端缺少 API Key 时返回 PlannerUnavailable。
pub fn create_llm_from_config(cfg: &AppConfig) -> Result<Arc<dyn LlmClient>, AgentError> {
    let provider = cfg.llm.provider.to_lowercase();
    match provider.as_str() {
        "mock" => {
            tracing::warn!("Using Mock LLM");
            Ok(Arc::new(MockLlmClient::new()))
        }
        "deepseek" => {
            let key = std::env::var("DEEPSEEK_API_KEY")
                .or_else(|_| std::env::var("OPENAI_API_KEY"))
                .map_err(|_| unavailable("DEEPSEEK_API_KEY (or OPENAI_API_KEY) is not set"))?;
            let model = if cfg.llm.model.starts_with("deepseek") {
                Some(cfg.llm.model.as_str())
            } else {
                None
            };
            let client = create_deepseek_client(model, &key);
            tracing::info!("Using DeepSeek LLM ({})", client.model());
            Ok(Arc::new(client))
        }
        "openai" => {
            let key = std::env::var("OPENAI_API_KEY")
                .map_err(|_| unavailable("OPENAI_API_KEY is not set"))?;
            tracing::info!("Using OpenAI LLM ({})", cfg.llm.model);
            Ok(Arc::new(OpenAiClient::new(
                cfg.llm.base_url.as_deref(),
                &cfg.llm.model,
                &key,
            )))
        }
        other => Err(AgentError::ConfigError(format!(
            "unknown llm provider: {other}"
        ))),
    }
}

fn unavailable(reason: &str) -> AgentError {
    AgentError::PlannerUnavailable {
        reason: reason.to_string(),
        partial: None,
    }
}

/// 系统提示词：配置路径 > config/prompts/system.txt > 内置默认
fn load_system_prompt(cfg: &AppConfig) -> String {
    let candidates: Vec<PathBuf> = cfg
        .agent
        .system_prompt_path
        .iter()
        .cloned()
        .chain([
            PathBuf::from("config/prompts/system.txt"),
            PathBuf::from("../config/prompts/system.txt"),
        ])
        .collect();
    candidates
        .iter()
        .find_map(|p| std::fs::read_to_string(p).ok())
        .map(|s| s.trim().to_string())
        .filter(|s| !s.is_empty())
        .unwrap_or_else(|| DEFAULT_SYSTEM_PROMPT.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::react::{Action, ScriptedPlanner};
    use crate::tools::EchoTool;

    #[test]
    fn test_max_steps_clamped() {
        let planner = Arc::new(ScriptedPlanner::new(vec![]));
        let orchestrator = Orchestrator::new(planner, ToolRegistry::new()).with_max_steps(0);
        assert_eq!(orchestrator.max_steps(), 1);
    }

    #[test]
    fn test_mock_provider_from_config() {
        let mut cfg = AppConfig::default();
        cfg.llm.provider = "mock".to_string();
        let mut registry = ToolRegistry::new();
        registry.register(EchoTool);
        let orchestrator = Orchestrator::from_config(&cfg, registry).unwrap();
        assert_eq!(orchestrator.max_steps(), 10);
        assert_eq!(orchestrator.list_tools()[0].name, "echo");
    }

    #[test]
    fn test_unknown_provider_is_config_error() {
        let mut cfg = AppConfig::default();
        cfg.llm.provider = "carrier-pigeon".to_string();
        assert!(matches!(
            create_llm_from_config(&cfg),
            Err(AgentError::ConfigError(_))
        ));
    }

    #[tokio::test]
    async fn test_mock_llm_finishes_with_echo() {
        let mut cfg = AppConfig::default();
        cfg.llm.provider = "mock".to_string();
        let orchestrator = Orchestrator::from_config(&cfg, ToolRegistry::new()).unwrap();
        let result = orchestrator.execute("ping", None).await.unwrap();
        assert!(result.is_complete());
        assert_eq!(result.result, serde_json::json!("Echo from Mock: ping"));
    }

    #[tokio::test]
    async fn test_execute_reuses_context() {
        let planner = Arc::new(ScriptedPlanner::new(vec![Action::finish("done")]));
        let orchestrator = Orchestrator::new(planner, ToolRegistry::new());
        let ctx: Context = [("user".to_string(), serde_json::json!("alice"))]
            .into_iter()
            .collect();
        let result = orchestrator.execute("greet", Some(ctx)).await.unwrap();
        assert_eq!(result.context.get("user"), Some(&serde_json::json!("alice")));
    }
}
