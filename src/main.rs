//! Agentic Gateway 命令行入口
//!
//! `agentic-gateway [--config <path>] "<goal>"`：初始化日志、加载配置、注册工具，
//! 执行目标并以 JSON 打印结果与摘要。

use std::path::PathBuf;

use agentic_gateway::config::load_config;
use agentic_gateway::observability;
use agentic_gateway::tools::{EchoTool, ToolRegistry};
use agentic_gateway::{AgentError, Orchestrator};
use anyhow::{bail, Context as _};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // 日志：默认 info，可通过 RUST_LOG 覆盖
    observability::init();

    let mut args = std::env::args().skip(1).peekable();
    let mut config_path = None;
    if args.peek().map(String::as_str) == Some("--config") {
        args.next();
        config_path = Some(PathBuf::from(
            args.next().context("--config requires a path")?,
        ));
    }
    let goal = args.collect::<Vec<_>>().join(" ");
    if goal.trim().is_empty() {
        bail!("usage: agentic-gateway [--config <path>] \"<goal>\"");
    }

    let cfg = load_config(config_path).context("Failed to load config")?;

    let mut registry = ToolRegistry::new();
    registry.register(EchoTool);

    let orchestrator =
        Orchestrator::from_config(&cfg, registry).context("Failed to create orchestrator")?;

    let outcome = orchestrator.execute(&goal, None).await;
    let (prompt_tokens, completion_tokens, total_tokens) = orchestrator.token_usage();
    let token_usage = serde_json::json!({
        "prompt_tokens": prompt_tokens,
        "completion_tokens": completion_tokens,
        "total_tokens": total_tokens,
    });

    match outcome {
        Ok(result) => {
            let summary = result.summary();
            let output = serde_json::json!({
                "success": result.is_complete(),
                "result": result,
                "execution_summary": summary,
                "token_usage": token_usage,
            });
            println!("{}", serde_json::to_string_pretty(&output)?);
            Ok(())
        }
        Err(AgentError::PlannerUnavailable { reason, partial }) => {
            if let Some(partial) = partial {
                let output = serde_json::json!({
                    "success": false,
                    "result": partial,
                    "token_usage": token_usage,
                });
                println!("{}", serde_json::to_string_pretty(&output)?);
            }
            bail!("Planner unavailable: {}", reason)
        }
        Err(e) => Err(e).context("Execution failed"),
    }
}
