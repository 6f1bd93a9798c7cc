//! 结果元数据（GetResultMetas 的单条返回）
//!
//! 键由提供者定义，协调层不解释，原样透传；这里只提供常用键的便捷读取：
//! - "id"：结果 ID
//! - "name"：显示名称
//! - "icon" / "gicon"：序列化 GIcon 或其文本形式
//! - "icon-data"：像素数据元组 (iiibiiay)
//! - "description"：简短描述
//! - "clipboardText"：激活时写入剪贴板的文本

use std::collections::HashMap;

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// 单条结果的属性映射（字符串 → 任意值）
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ResultMeta(pub HashMap<String, Value>);

impl ResultMeta {
    pub fn new(attributes: HashMap<String, Value>) -> Self {
        Self(attributes)
    }

    pub fn with(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.0.insert(key.into(), value.into());
        self
    }

    pub fn get(&self, key: &str) -> Option<&Value> {
        self.0.get(key)
    }

    fn get_str(&self, key: &str) -> Option<&str> {
        self.0.get(key).and_then(Value::as_str)
    }

    pub fn id(&self) -> Option<&str> {
        self.get_str("id")
    }

    pub fn name(&self) -> Option<&str> {
        self.get_str("name")
    }

    pub fn description(&self) -> Option<&str> {
        self.get_str("description")
    }

    pub fn clipboard_text(&self) -> Option<&str> {
        self.get_str("clipboardText")
    }

    /// 图标的文本形式：优先 "gicon"，其次字符串形式的 "icon"
    pub fn icon_name(&self) -> Option<&str> {
        self.get_str("gicon").or_else(|| self.get_str("icon"))
    }

    pub fn attributes(&self) -> &HashMap<String, Value> {
        &self.0
    }
}
