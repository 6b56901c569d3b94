//! 类型化配置值
//!
//! 定义配置值的有限类型集合，以及从原始字符串到声明类型的转换规则

use super::document::Document;
use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::Value as JsonValue;
use std::fmt;
use std::sync::Arc;
use thiserror::Error;

/// 配置值类型
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ValueKind {
    /// 字符串
    Text,
    /// 平台整数，宽度与目标平台的指针一致（64位平台上为64位）
    Int,
    /// 64位整数
    Int64,
    /// 布尔值
    Bool,
    /// 结构化JSON文档
    Document,
}

impl ValueKind {
    /// 类型名称
    pub fn as_str(&self) -> &'static str {
        match self {
            ValueKind::Text => "string",
            ValueKind::Int => "int",
            ValueKind::Int64 => "int64",
            ValueKind::Bool => "bool",
            ValueKind::Document => "json",
        }
    }
}

impl fmt::Display for ValueKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// 类型转换错误
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("无法转换为 {kind}: {reason}")]
pub struct CoercionError {
    /// 目标类型
    pub kind: ValueKind,
    /// 失败原因
    pub reason: String,
}

impl CoercionError {
    fn new(kind: ValueKind, reason: impl fmt::Display) -> Self {
        Self {
            kind,
            reason: reason.to_string(),
        }
    }
}

/// 配置值
#[derive(Debug, Clone, PartialEq)]
pub enum ConfigValue {
    /// 字符串
    Text(String),
    /// 平台整数
    Int(isize),
    /// 64位整数
    Int64(i64),
    /// 布尔值
    Bool(bool),
    /// 结构化文档
    Document(Document),
}

impl ConfigValue {
    /// 从用户类型构造文档值
    pub fn document<T>(value: T) -> Result<Self, serde_json::Error>
    where
        T: Serialize + DeserializeOwned + Send + Sync + 'static,
    {
        Document::new(value).map(ConfigValue::Document)
    }

    /// 当前值的类型
    pub fn kind(&self) -> ValueKind {
        match self {
            ConfigValue::Text(_) => ValueKind::Text,
            ConfigValue::Int(_) => ValueKind::Int,
            ConfigValue::Int64(_) => ValueKind::Int64,
            ConfigValue::Bool(_) => ValueKind::Bool,
            ConfigValue::Document(_) => ValueKind::Document,
        }
    }

    /// 按当前值的类型转换原始字符串
    ///
    /// 不修改自身；成功时返回同类型的新值。
    ///
    /// # 参数
    /// * `raw` - 存储中读取的原始字符串
    ///
    /// # 返回
    /// * `Result<ConfigValue, CoercionError>` - 转换结果
    pub fn coerce(&self, raw: &str) -> Result<ConfigValue, CoercionError> {
        let kind = self.kind();
        match self {
            ConfigValue::Text(_) => Ok(ConfigValue::Text(raw.to_string())),
            ConfigValue::Int(_) => raw
                .parse::<isize>()
                .map(ConfigValue::Int)
                .map_err(|e| CoercionError::new(kind, e)),
            ConfigValue::Int64(_) => raw
                .parse::<i64>()
                .map(ConfigValue::Int64)
                .map_err(|e| CoercionError::new(kind, e)),
            ConfigValue::Bool(_) => raw
                .parse::<bool>()
                .map(ConfigValue::Bool)
                .map_err(|e| CoercionError::new(kind, e)),
            ConfigValue::Document(doc) => doc
                .decode(raw)
                .map(ConfigValue::Document)
                .map_err(|e| CoercionError::new(kind, e)),
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            ConfigValue::Text(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_int(&self) -> Option<isize> {
        match self {
            ConfigValue::Int(v) => Some(*v),
            _ => None,
        }
    }

    pub fn as_i64(&self) -> Option<i64> {
        match self {
            ConfigValue::Int64(v) => Some(*v),
            _ => None,
        }
    }

    pub fn as_bool(&self) -> Option<bool> {
        match self {
            ConfigValue::Bool(v) => Some(*v),
            _ => None,
        }
    }

    /// 获取文档的具体类型
    pub fn as_document<T: Send + Sync + 'static>(&self) -> Option<Arc<T>> {
        match self {
            ConfigValue::Document(doc) => doc.downcast::<T>(),
            _ => None,
        }
    }

    /// 转换为JSON，用于对外展示
    pub fn to_json(&self) -> JsonValue {
        match self {
            ConfigValue::Text(s) => JsonValue::String(s.clone()),
            ConfigValue::Int(v) => JsonValue::from(*v),
            ConfigValue::Int64(v) => JsonValue::from(*v),
            ConfigValue::Bool(v) => JsonValue::Bool(*v),
            ConfigValue::Document(doc) => doc.json().clone(),
        }
    }
}

impl fmt::Display for ConfigValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConfigValue::Text(s) => f.write_str(s),
            ConfigValue::Int(v) => write!(f, "{v}"),
            ConfigValue::Int64(v) => write!(f, "{v}"),
            ConfigValue::Bool(v) => write!(f, "{v}"),
            ConfigValue::Document(doc) => write!(f, "{}", doc.json()),
        }
    }
}

impl From<String> for ConfigValue {
    fn from(value: String) -> Self {
        ConfigValue::Text(value)
    }
}

impl From<&str> for ConfigValue {
    fn from(value: &str) -> Self {
        ConfigValue::Text(value.to_string())
    }
}

impl From<i32> for ConfigValue {
    fn from(value: i32) -> Self {
        // i32 总能无损放入 isize
        ConfigValue::Int(value as isize)
    }
}

impl From<isize> for ConfigValue {
    fn from(value: isize) -> Self {
        ConfigValue::Int(value)
    }
}

impl From<i64> for ConfigValue {
    fn from(value: i64) -> Self {
        ConfigValue::Int64(value)
    }
}

impl From<bool> for ConfigValue {
    fn from(value: bool) -> Self {
        ConfigValue::Bool(value)
    }
}

/// 注册配置项
///
/// 默认值决定配置项在整个进程生命周期内的声明类型。
#[derive(Debug, Clone)]
pub struct KeyValueInit {
    /// 配置键
    pub key: String,
    /// 默认值
    pub default_value: ConfigValue,
}

impl KeyValueInit {
    /// 以标量默认值注册
    pub fn new(key: impl Into<String>, default_value: impl Into<ConfigValue>) -> Self {
        Self {
            key: key.into(),
            default_value: default_value.into(),
        }
    }

    /// 以结构化文档默认值注册
    ///
    /// 默认值无法序列化时在注册阶段即返回错误。
    pub fn document<T>(key: impl Into<String>, default_value: T) -> Result<Self, serde_json::Error>
    where
        T: Serialize + DeserializeOwned + Send + Sync + 'static,
    {
        Ok(Self {
            key: key.into(),
            default_value: ConfigValue::document(default_value)?,
        })
    }
}
