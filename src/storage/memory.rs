//! 内存存储实现
//!
//! 用于单进程嵌入和测试

use super::ConfigStorage;
use crate::error::StorageError;
use async_trait::async_trait;
use parking_lot::RwLock;
use std::collections::HashMap;

/// 内存键值存储
#[derive(Debug, Default)]
pub struct MemoryStorage {
    rows: RwLock<HashMap<String, String>>,
}

impl MemoryStorage {
    pub fn new() -> Self {
        Self::default()
    }

    /// 使用初始数据创建
    pub fn with_values<K, V>(values: impl IntoIterator<Item = (K, V)>) -> Self
    where
        K: Into<String>,
        V: Into<String>,
    {
        let rows = values
            .into_iter()
            .map(|(k, v)| (k.into(), v.into()))
            .collect();
        Self {
            rows: RwLock::new(rows),
        }
    }

    /// 直接读取当前行，不经过trait
    pub fn raw(&self, key: &str) -> Option<String> {
        self.rows.read().get(key).cloned()
    }
}

#[async_trait]
impl ConfigStorage for MemoryStorage {
    async fn get_value(&self, key: &str) -> Result<String, StorageError> {
        self.raw(key).ok_or_else(|| StorageError::NotFound {
            key: key.to_string(),
        })
    }

    async fn insert_value(&self, key: &str, value: &str) -> Result<(), StorageError> {
        let mut rows = self.rows.write();
        if rows.contains_key(key) {
            return Err(StorageError::Duplicate {
                key: key.to_string(),
            });
        }
        rows.insert(key.to_string(), value.to_string());
        Ok(())
    }

    async fn update_value(&self, key: &str, value: &str) -> Result<(), StorageError> {
        let mut rows = self.rows.write();
        match rows.get_mut(key) {
            Some(row) => {
                *row = value.to_string();
                Ok(())
            }
            None => Err(StorageError::NotFound {
                key: key.to_string(),
            }),
        }
    }
}
