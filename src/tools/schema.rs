//! 工具参数 Schema 与调用前校验
//!
//! 每个工具注册时声明参数（名称、类型、必填/可选、默认值），ToolRegistry 在调用前据此校验并补全默认值；
//! 同时可渲染为 JSON Schema 注入 system prompt。
//! action_schema_json 用 schemars 生成 Planner 输出格式的 Schema，减少 LLM 输出格式错误。

use schemars::{schema_for, JsonSchema};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::core::ToolError;

/// 参数类型（对应 JSON 值类型）
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ParamKind {
    String,
    Integer,
    Number,
    Boolean,
    Array,
    Object,
}

impl ParamKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            ParamKind::String => "string",
            ParamKind::Integer => "integer",
            ParamKind::Number => "number",
            ParamKind::Boolean => "boolean",
            ParamKind::Array => "array",
            ParamKind::Object => "object",
        }
    }

    /// 类型匹配时返回规范化后的值；integer 接受小数部分为 0 的浮点数（如 LLM 输出的 `10.0`）并转为整数
    fn coerce(&self, value: &Value) -> Option<Value> {
        let matches = match self {
            ParamKind::String => value.is_string(),
            ParamKind::Integer => {
                if value.is_i64() || value.is_u64() {
                    true
                } else {
                    return value
                        .as_f64()
                        .filter(|f| f.fract() == 0.0 && f.abs() < i64::MAX as f64)
                        .map(|f| Value::from(f as i64));
                }
            }
            ParamKind::Number => value.is_number(),
            ParamKind::Boolean => value.is_boolean(),
            ParamKind::Array => value.is_array(),
            ParamKind::Object => value.is_object(),
        };
        matches.then(|| value.clone())
    }
}

/// 单个参数声明
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ParamSpec {
    pub name: String,
    pub kind: ParamKind,
    pub description: String,
    pub required: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub default: Option<Value>,
}

impl ParamSpec {
    pub fn required(
        name: impl Into<String>,
        kind: ParamKind,
        description: impl Into<String>,
    ) -> Self {
        Self {
            name: name.into(),
            kind,
            description: description.into(),
            required: true,
            default: None,
        }
    }

    pub fn optional(
        name: impl Into<String>,
        kind: ParamKind,
        description: impl Into<String>,
    ) -> Self {
        Self {
            name: name.into(),
            kind,
            description: description.into(),
            required: false,
            default: None,
        }
    }

    /// 设置默认值（隐含可选）
    pub fn with_default(mut self, default: impl Into<Value>) -> Self {
        self.required = false;
        self.default = Some(default.into());
        self
    }
}

/// 工具参数 Schema：有序参数列表
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ToolSchema {
    pub params: Vec<ParamSpec>,
}

impl ToolSchema {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn param(mut self, spec: ParamSpec) -> Self {
        self.params.push(spec);
        self
    }

    /// 校验参数并补全默认值，返回规范化后的参数对象。
    ///
    /// `null` 视为空对象；值为 `null` 的参数视为未提供。未声明的参数直接拒绝。
    pub fn validate(&self, tool: &str, args: &Value) -> Result<Map<String, Value>, ToolError> {
        let invalid = |reason: String| ToolError::InvalidArguments {
            tool: tool.to_string(),
            reason,
        };

        let provided = match args {
            Value::Null => Map::new(),
            Value::Object(map) => map.clone(),
            other => {
                return Err(invalid(format!(
                    "arguments must be a JSON object, got {}",
                    json_type_name(other)
                )))
            }
        };

        if let Some(unknown) = provided
            .keys()
            .find(|k| !self.params.iter().any(|p| &p.name == *k))
        {
            return Err(invalid(format!("unexpected argument '{unknown}'")));
        }

        let mut normalized = Map::new();
        for spec in &self.params {
            match provided.get(&spec.name).filter(|v| !v.is_null()) {
                Some(value) => {
                    let Some(value) = spec.kind.coerce(value) else {
                        return Err(invalid(format!(
                            "argument '{}' must be {}, got {}",
                            spec.name,
                            spec.kind.as_str(),
                            json_type_name(value)
                        )));
                    };
                    normalized.insert(spec.name.clone(), value);
                }
                None => {
                    if let Some(default) = &spec.default {
                        normalized.insert(spec.name.clone(), default.clone());
                    } else if spec.required {
                        return Err(invalid(format!(
                            "missing required argument '{}'",
                            spec.name
                        )));
                    }
                }
            }
        }
        Ok(normalized)
    }

    /// 渲染为 JSON Schema 对象（供 LLM 生成正确的参数格式）
    pub fn to_json_schema(&self) -> Value {
        let mut properties = Map::new();
        for spec in &self.params {
            let mut prop = serde_json::json!({
                "type": spec.kind.as_str(),
                "description": spec.description,
            });
            if let (Some(default), Some(obj)) = (&spec.default, prop.as_object_mut()) {
                obj.insert("default".to_string(), default.clone());
            }
            properties.insert(spec.name.clone(), prop);
        }
        let required: Vec<&str> = self
            .params
            .iter()
            .filter(|p| p.required)
            .map(|p| p.name.as_str())
            .collect();
        serde_json::json!({
            "type": "object",
            "properties": properties,
            "required": required,
        })
    }
}

fn json_type_name(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(n) if n.is_f64() => "number",
        Value::Number(_) => "integer",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}

/// Planner 输出格式（仅用于 Schema 生成）
#[allow(dead_code)]
#[derive(JsonSchema)]
struct ActionFormat {
    /// "invoke" 调用工具，"finish" 给出最终结果
    pub action: String,
    /// 工具名（action 为 invoke 时必填）
    pub tool: Option<String>,
    /// 工具参数，须符合该工具声明的 parameters
    pub args: Option<Map<String, Value>>,
    /// 最终结果（action 为 finish 时必填）
    pub result: Option<Value>,
    /// 一句话说明为何选择该动作
    pub rationale: Option<String>,
}

/// 返回 Planner 输出格式的 JSON Schema 字符串，可拼入 system prompt
pub fn action_schema_json() -> String {
    let schema = schema_for!(ActionFormat);
    serde_json::to_string_pretty(&schema).unwrap_or_else(|_| String::new())
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn issues_schema() -> ToolSchema {
        ToolSchema::new()
            .param(ParamSpec::required("owner", ParamKind::String, "Repository owner"))
            .param(ParamSpec::required("repo", ParamKind::String, "Repository name"))
            .param(
                ParamSpec::optional("state", ParamKind::String, "open/closed/all")
                    .with_default("open"),
            )
            .param(
                ParamSpec::optional("max_results", ParamKind::Integer, "Limit").with_default(10),
            )
    }

    #[test]
    fn test_validate_fills_defaults() {
        let args = issues_schema()
            .validate("issues", &json!({"owner": "o", "repo": "r"}))
            .unwrap();
        assert_eq!(args.get("state"), Some(&json!("open")));
        assert_eq!(args.get("max_results"), Some(&json!(10)));
    }

    #[test]
    fn test_validate_missing_required() {
        let err = issues_schema()
            .validate("issues", &json!({"owner": "o"}))
            .unwrap_err();
        assert!(err.to_string().contains("missing required argument 'repo'"));
    }

    #[test]
    fn test_validate_wrong_type() {
        let err = issues_schema()
            .validate("issues", &json!({"owner": "o", "repo": "r", "max_results": "ten"}))
            .unwrap_err();
        assert!(err.to_string().contains("'max_results' must be integer"));
    }

    #[test]
    fn test_validate_rejects_unknown_and_non_object() {
        let schema = issues_schema();
        assert!(schema
            .validate("issues", &json!({"owner": "o", "repo": "r", "sort": "stars"}))
            .is_err());
        assert!(schema.validate("issues", &json!(["o", "r"])).is_err());
    }

    #[test]
    fn test_integer_is_a_number_but_float_is_not_an_integer() {
        let schema = ToolSchema::new()
            .param(ParamSpec::required("x", ParamKind::Number, "x"))
            .param(ParamSpec::optional("n", ParamKind::Integer, "n"));
        assert!(schema.validate("t", &json!({"x": 2})).is_ok());
        assert!(schema.validate("t", &json!({"x": 2.5, "n": 1.5})).is_err());
    }

    #[test]
    fn test_whole_float_is_accepted_as_integer() {
        let schema = ToolSchema::new().param(ParamSpec::required("n", ParamKind::Integer, "n"));
        let args = schema.validate("t", &json!({"n": 10.0})).unwrap();
        assert_eq!(args.get("n"), Some(&json!(10)));
        assert!(args["n"].is_i64());

        let err = schema.validate("t", &json!({"n": 1.5})).unwrap_err();
        assert!(err.to_string().contains("'n' must be integer, got number"));
    }

    #[test]
    fn test_json_schema_lists_required() {
        let schema = issues_schema().to_json_schema();
        assert_eq!(schema["required"], json!(["owner", "repo"]));
        assert_eq!(schema["properties"]["state"]["default"], json!("open"));
    }

    #[test]
    fn test_action_schema_mentions_fields() {
        let s = action_schema_json();
        assert!(s.contains("action"));
        assert!(s.contains("rationale"));
    }
}
