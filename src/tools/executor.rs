//! 工具执行器
//!
//! 持有只读的 ToolRegistry 与全局超时：validate 校验参数并补全默认值，execute 在超时内调用工具；
//! 超时归一为失败的 ToolOutcome（循环继续），每次调用输出结构化审计日志（JSON）。

use std::sync::Arc;
use std::time::{Duration, Instant};

use serde_json::{Map, Value};
use tokio::time::timeout;

use crate::core::ToolError;
use crate::tools::{ToolDescriptor, ToolOutcome, ToolRegistry};

/// 审计日志中参数预览的最大字符数
const ARGS_PREVIEW_CHARS: usize = 200;

/// 工具执行器：对每次调用施加超时
#[derive(Clone)]
pub struct ToolExecutor {
    registry: Arc<ToolRegistry>,
    timeout: Duration,
}

impl ToolExecutor {
    pub fn new(registry: ToolRegistry, timeout_secs: u64) -> Self {
        Self {
            registry: Arc::new(registry),
            timeout: Duration::from_secs(timeout_secs),
        }
    }

    /// 替换默认超时（工具自身声明的超时仍优先）
    pub fn with_default_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// 校验工具存在且参数合法，返回补全默认值后的参数（即工具实际收到的参数）
    pub fn validate(&self, tool_name: &str, args: &Value) -> Result<Map<String, Value>, ToolError> {
        self.registry.validate(tool_name, args)
    }

    /// 在超时内执行工具；args 应为 validate 的返回值。
    ///
    /// Err 仅表示工具未注册；工具本身的失败与超时都在 Ok(ToolOutcome) 中。
    pub async fn execute(
        &self,
        tool_name: &str,
        normalized: Map<String, Value>,
    ) -> Result<ToolOutcome, ToolError> {
        let tool = self
            .registry
            .get(tool_name)
            .ok_or_else(|| ToolError::UnknownTool(tool_name.to_string()))?;
        let limit = tool.timeout().unwrap_or(self.timeout);

        let start = Instant::now();
        let args_preview = args_preview(&normalized);
        let result = timeout(limit, tool.execute(normalized)).await;
        let duration_ms = start.elapsed().as_millis() as u64;

        let (outcome, label) = match result {
            Ok(outcome) => {
                let label = if outcome.success { "ok" } else { "error" };
                (outcome, label)
            }
            Err(_) => {
                let mut details = Map::new();
                details.insert("timeout_ms".to_string(), Value::from(limit.as_millis() as u64));
                let outcome = ToolOutcome::failure(format!(
                    "Tool '{}' timed out after {:.1}s",
                    tool_name,
                    limit.as_secs_f64()
                ))
                .with_details(details);
                (outcome, "timeout")
            }
        };

        let audit = serde_json::json!({
            "event": "tool_audit",
            "tool": tool_name,
            "ok": outcome.success,
            "outcome": label,
            "duration_ms": duration_ms,
            "args_preview": args_preview,
        });
        tracing::info!(audit = %audit.to_string(), "tool");

        Ok(outcome)
    }

    pub fn list_tools(&self) -> Vec<ToolDescriptor> {
        self.registry.list_tools()
    }
}

fn args_preview(args: &Map<String, Value>) -> String {
    let s = Value::Object(args.clone()).to_string();
    if s.chars().count() > ARGS_PREVIEW_CHARS {
        format!("{}...", s.chars().take(ARGS_PREVIEW_CHARS).collect::<String>())
    } else {
        s
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tools::{EchoTool, Tool};
    use async_trait::async_trait;
    use serde_json::json;

    struct SlowTool;

    #[async_trait]
    impl Tool for SlowTool {
        fn name(&self) -> &str {
            "slow"
        }

        fn description(&self) -> &str {
            "Sleeps longer than its timeout"
        }

        fn timeout(&self) -> Option<Duration> {
            Some(Duration::from_millis(20))
        }

        async fn execute(&self, _args: Map<String, Value>) -> ToolOutcome {
            tokio::time::sleep(Duration::from_secs(5)).await;
            ToolOutcome::ok("too late")
        }
    }

    #[tokio::test]
    async fn test_timeout_becomes_failed_outcome() {
        let mut registry = ToolRegistry::new();
        registry.register(SlowTool);
        let executor = ToolExecutor::new(registry, 30);

        let outcome = executor.execute("slow", Map::new()).await.unwrap();
        assert!(!outcome.success);
        assert!(outcome.error.unwrap().contains("timed out"));
        assert_eq!(outcome.details.unwrap()["timeout_ms"], json!(20));
    }

    #[tokio::test]
    async fn test_validation_error_is_err() {
        let mut registry = ToolRegistry::new();
        registry.register(EchoTool);
        let executor = ToolExecutor::new(registry, 5);

        let err = executor.validate("echo", &json!({"text": 1})).unwrap_err();
        assert!(matches!(err, ToolError::InvalidArguments { .. }));
        assert!(matches!(
            executor.validate("missing", &json!({})),
            Err(ToolError::UnknownTool(_))
        ));
        assert!(matches!(
            executor.execute("missing", Map::new()).await,
            Err(ToolError::UnknownTool(_))
        ));
    }

    #[test]
    fn test_args_preview_truncates() {
        let mut args = Map::new();
        args.insert("text".to_string(), json!("x".repeat(500)));
        let preview = args_preview(&args);
        assert!(preview.ends_with("..."));
        assert_eq!(preview.chars().count(), ARGS_PREVIEW_CHARS + 3);
    }
}
