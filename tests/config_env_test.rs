//! 环境变量覆盖配置
//!
//! 单独成一个测试二进制：修改进程环境变量不会与其他测试并发冲突。

use agentic_gateway::config::load_config;
use agentic_gateway::tools::ToolRegistry;
use agentic_gateway::Orchestrator;

#[test]
fn test_env_overrides_file_and_defaults() {
    std::env::set_var("GATEWAY__AGENT__MAX_STEPS", "15");
    std::env::set_var("GATEWAY__LLM__PROVIDER", "mock");
    std::env::set_var("GATEWAY__TOOLS__TOOL_TIMEOUT_SECS", "7");

    let cfg = load_config(None).unwrap();
    assert_eq!(cfg.agent.max_steps, 15);
    assert_eq!(cfg.llm.provider, "mock");
    assert_eq!(cfg.tools.tool_timeout_secs, 7);
    // 未覆盖的键保持文件值 / 默认值
    assert_eq!(cfg.llm.timeouts.request, 60);

    let orchestrator = Orchestrator::from_config(&cfg, ToolRegistry::new()).unwrap();
    assert_eq!(orchestrator.max_steps(), 15);
}
