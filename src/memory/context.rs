//! 执行上下文：字符串键 -> 任意 JSON 值的扁平映射
//!
//! 单次 execute 内只增不删：工具结果以 "{tool}_{step}" 为键追加，已有键永不覆盖；
//! 结束时随 ExecutionResult 交还调用方，可作为下一次执行的初始上下文。
//! 核心循环不解释任何业务键。

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// 扁平、可序列化的上下文映射（serde 透明，序列化后即一个 JSON 对象）
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Context {
    entries: Map<String, Value>,
}

impl Context {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, key: &str) -> Option<&Value> {
        self.entries.get(key)
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// 追加一条记录，返回实际写入的键。
    ///
    /// 若 `key` 已存在（通常来自调用方传入的旧上下文），依次尝试 `key#1`、`key#2`…，
    /// 直到找到空位；已有的值不会被替换。
    pub fn append(&mut self, key: impl Into<String>, value: Value) -> String {
        let base = key.into();
        let mut candidate = base.clone();
        let mut n = 1usize;
        while self.entries.contains_key(&candidate) {
            candidate = format!("{base}#{n}");
            n += 1;
        }
        self.entries.insert(candidate.clone(), value);
        candidate
    }

    /// 上下文的 JSON 文本（供 prompt 拼接），序列化失败时返回 "{}"
    pub fn to_json_string(&self) -> String {
        serde_json::to_string_pretty(&self.entries).unwrap_or_else(|_| "{}".to_string())
    }
}

impl FromIterator<(String, Value)> for Context {
    fn from_iter<I: IntoIterator<Item = (String, Value)>>(iter: I) -> Self {
        Self {
            entries: iter.into_iter().collect(),
        }
    }
}
