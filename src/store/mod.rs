//! 配置值存储模块
//!
//! 提供进程内的类型化配置值存储

pub mod document;
pub mod value;

pub use document::Document;
pub use value::{CoercionError, ConfigValue, KeyValueInit, ValueKind};

use crate::error::{ConfigError, Result};
use parking_lot::RwLock;
use std::collections::HashMap;

/// 类型化配置值存储
///
/// 键集合在构造时固定，之后不会增删。每个条目各自持有读写锁，
/// 重载某个键时只锁住该条目，读者不会看到写了一半的文档值。
#[derive(Debug)]
pub struct ValueStore {
    entries: HashMap<String, RwLock<ConfigValue>>,
}

impl ValueStore {
    /// 由注册列表构造存储
    ///
    /// 重复注册的键以最后一次为准。
    pub fn new(registrations: impl IntoIterator<Item = KeyValueInit>) -> Self {
        let entries = registrations
            .into_iter()
            .map(|init| (init.key, RwLock::new(init.default_value)))
            .collect();
        Self { entries }
    }

    /// 获取配置值的副本
    pub fn get(&self, key: &str) -> Result<ConfigValue> {
        self.entries
            .get(key)
            .map(|entry| entry.read().clone())
            .ok_or_else(|| ConfigError::not_found(key))
    }

    /// 是否已注册
    pub fn contains(&self, key: &str) -> bool {
        self.entries.contains_key(key)
    }

    /// 配置项的声明类型
    pub fn kind_of(&self, key: &str) -> Result<ValueKind> {
        self.entries
            .get(key)
            .map(|entry| entry.read().kind())
            .ok_or_else(|| ConfigError::not_found(key))
    }

    /// 已注册的键（排序后）
    pub fn keys(&self) -> Vec<String> {
        let mut keys: Vec<String> = self.entries.keys().cloned().collect();
        keys.sort();
        keys
    }

    /// 所有配置值的快照
    pub fn snapshot(&self) -> HashMap<String, ConfigValue> {
        self.entries
            .iter()
            .map(|(key, entry)| (key.clone(), entry.read().clone()))
            .collect()
    }

    /// 使用原始字符串重载某个配置项
    ///
    /// 转换在持有写锁期间完成，失败时保留原值。
    pub(crate) fn reload(&self, key: &str, raw: &str) -> Result<()> {
        let entry = self
            .entries
            .get(key)
            .ok_or_else(|| ConfigError::not_found(key))?;

        let mut current = entry.write();
        let fresh = current.coerce(raw).map_err(|e| ConfigError::Parse {
            key: key.to_string(),
            kind: e.kind.to_string(),
            reason: e.reason,
        })?;
        *current = fresh;
        Ok(())
    }

    /// 仅校验原始字符串能否转换为该配置项的类型
    pub(crate) fn validate(&self, key: &str, raw: &str) -> Result<()> {
        let current = self.get(key)?;
        current.coerce(raw).map(|_| ()).map_err(|e| ConfigError::Parse {
            key: key.to_string(),
            kind: e.kind.to_string(),
            reason: e.reason,
        })
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn create_test_store() -> ValueStore {
        ValueStore::new(vec![
            KeyValueInit::new("max_age", 0),
            KeyValueInit::new("big", 0i64),
            KeyValueInit::new("flag", false),
            KeyValueInit::new("name", ""),
        ])
    }

    #[test]
    fn test_get_unregistered_key() {
        let store = create_test_store();
        let err = store.get("missing").unwrap_err();
        assert!(err.is_not_found());
        // 无副作用
        assert_eq!(store.len(), 4);
    }

    #[test]
    fn test_reload_success_replaces_value() {
        let store = create_test_store();
        store.reload("max_age", "42").unwrap();
        assert_eq!(store.get("max_age").unwrap(), ConfigValue::Int(42));
    }

    #[test]
    fn test_reload_failure_keeps_previous_value() {
        let store = create_test_store();
        store.reload("max_age", "42").unwrap();

        let err = store.reload("max_age", "not_a_number").unwrap_err();
        assert!(matches!(err, ConfigError::Parse { .. }));
        assert_eq!(store.get("max_age").unwrap(), ConfigValue::Int(42));
    }

    #[test]
    fn test_reload_is_idempotent() {
        let store = create_test_store();
        for _ in 0..3 {
            store.reload("big", "123456789012").unwrap();
            assert_eq!(store.get("big").unwrap(), ConfigValue::Int64(123_456_789_012));
        }
        for _ in 0..3 {
            assert!(store.reload("flag", "maybe").is_err());
            assert_eq!(store.get("flag").unwrap(), ConfigValue::Bool(false));
        }
    }

    #[test]
    fn test_validate_does_not_mutate() {
        let store = create_test_store();
        store.validate("max_age", "7").unwrap();
        assert_eq!(store.get("max_age").unwrap(), ConfigValue::Int(0));
        assert!(store.validate("max_age", "x").is_err());
        assert!(store.validate("missing", "1").unwrap_err().is_not_found());
    }

    #[test]
    fn test_keys_and_kinds() {
        let store = create_test_store();
        assert_eq!(store.keys(), vec!["big", "flag", "max_age", "name"]);
        assert_eq!(store.kind_of("flag").unwrap(), ValueKind::Bool);
        assert_eq!(store.snapshot().len(), 4);
    }
}
