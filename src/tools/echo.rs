//! Echo 工具（测试用）

use async_trait::async_trait;
use serde_json::{Map, Value};

use crate::tools::{ParamKind, ParamSpec, Tool, ToolOutcome, ToolSchema};

/// Echo 工具：回显文本
pub struct EchoTool;

#[async_trait]
impl Tool for EchoTool {
    fn name(&self) -> &str {
        "echo"
    }

    fn description(&self) -> &str {
        "Echo text back unchanged (for testing the tool pipeline)."
    }

    fn schema(&self) -> ToolSchema {
        ToolSchema::new().param(ParamSpec::required("text", ParamKind::String, "Text to echo"))
    }

    async fn execute(&self, args: Map<String, Value>) -> ToolOutcome {
        let text = args
            .get("text")
            .and_then(|v| v.as_str())
            .unwrap_or("(empty)");
        ToolOutcome::ok(text)
    }
}
