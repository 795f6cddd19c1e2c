//! 工具调用的统一结果形状：{success, result?, error?, details?}
//!
//! 适配器把超时、网络错误、非 2xx、not found、限流等全部归一为 success = false + 可读 error，
//! 调用方只会看到这一种形状。

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ToolOutcome {
    pub success: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub result: Option<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub details: Option<Map<String, Value>>,
}

impl ToolOutcome {
    pub fn ok(result: impl Into<Value>) -> Self {
        Self {
            success: true,
            result: Some(result.into()),
            error: None,
            details: None,
        }
    }

    pub fn failure(error: impl Into<String>) -> Self {
        Self {
            success: false,
            result: None,
            error: Some(error.into()),
            details: None,
        }
    }

    pub fn with_details(mut self, details: Map<String, Value>) -> Self {
        self.details = Some(details);
        self
    }

    /// 写入上下文的载荷：成功取 result，失败取 {"error": ...}
    pub fn payload(&self) -> Value {
        if self.success {
            self.result.clone().unwrap_or(Value::Null)
        } else {
            serde_json::json!({ "error": self.error.clone().unwrap_or_default() })
        }
    }
}
