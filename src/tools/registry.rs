//! 工具注册表
//!
//! 所有工具实现 Tool trait（name / description / schema / execute），由 ToolRegistry 按名注册与查找；
//! 启动时显式注册，之后只读，可在多个并发执行间共享。
//! 名称匹配区分大小写；调用前按工具声明的 ToolSchema 校验参数。

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::core::ToolError;
use crate::tools::{ToolOutcome, ToolSchema};

/// 工具 trait：名称、描述（供 LLM 理解）、参数 schema、异步执行
///
/// execute 不返回 Err：传输层失败（超时、网络、非 2xx 等）一律归一为 `ToolOutcome::failure`。
#[async_trait]
pub trait Tool: Send + Sync {
    /// 工具名称（Planner 输出中的 "tool" 字段）
    fn name(&self) -> &str;

    /// 工具描述（供 LLM 理解功能）
    fn description(&self) -> &str;

    /// 参数声明，默认无参数
    fn schema(&self) -> ToolSchema {
        ToolSchema::default()
    }

    /// 单次调用超时；None 时使用 ToolExecutor 的全局超时
    fn timeout(&self) -> Option<Duration> {
        None
    }

    /// 执行工具；args 已通过 schema 校验并补全默认值
    async fn execute(&self, args: Map<String, Value>) -> ToolOutcome;
}

/// 机器可读的工具描述，供 Planner 选择工具
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ToolDescriptor {
    pub name: String,
    pub description: String,
    /// JSON Schema 形式的参数声明
    pub parameters: Value,
}

/// 工具注册表：按名称存储 Arc<dyn Tool>
#[derive(Default)]
pub struct ToolRegistry {
    tools: HashMap<String, Arc<dyn Tool>>,
}

impl ToolRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// 注册工具；同名工具后注册者覆盖先注册者
    pub fn register(&mut self, tool: impl Tool + 'static) {
        let name = tool.name().to_string();
        if self.tools.insert(name.clone(), Arc::new(tool)).is_some() {
            tracing::warn!(tool = %name, "tool re-registered, previous adapter replaced");
        }
    }

    pub fn get(&self, name: &str) -> Option<Arc<dyn Tool>> {
        self.tools.get(name).cloned()
    }

    /// 全部工具描述（按名称排序）
    pub fn list_tools(&self) -> Vec<ToolDescriptor> {
        let mut descriptors: Vec<ToolDescriptor> = self
            .tools
            .iter()
            .map(|(name, tool)| ToolDescriptor {
                name: name.clone(),
                description: tool.description().to_string(),
                parameters: tool.schema().to_json_schema(),
            })
            .collect();
        descriptors.sort_by(|a, b| a.name.cmp(&b.name));
        descriptors
    }

    /// 校验工具存在且参数合法，返回补全默认值后的参数
    pub fn validate(&self, name: &str, args: &Value) -> Result<Map<String, Value>, ToolError> {
        let tool = self
            .tools
            .get(name)
            .ok_or_else(|| ToolError::UnknownTool(name.to_string()))?;
        tool.schema().validate(name, args)
    }

    /// 校验后直接调用（不加超时；循环内经 ToolExecutor 调用）
    pub async fn invoke(&self, name: &str, args: &Value) -> Result<ToolOutcome, ToolError> {
        let normalized = self.validate(name, args)?;
        let tool = self
            .get(name)
            .ok_or_else(|| ToolError::UnknownTool(name.to_string()))?;
        Ok(tool.execute(normalized).await)
    }
}

/// 工具目录 JSON（name / description / parameters），拼入 system prompt
pub fn catalogue_json(tools: &[ToolDescriptor]) -> String {
    serde_json::to_string_pretty(tools).unwrap_or_else(|_| "[]".to_string())
}
