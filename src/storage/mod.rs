//! 持久化存储模块
//!
//! 定义配置键值的持久化访问接口，提供SQL与内存两种实现

pub mod memory;
pub mod sql;

pub use memory::MemoryStorage;
pub use sql::{SqlStorage, TableSchema};

use crate::error::StorageError;
use async_trait::async_trait;

/// 持久化访问trait
///
/// 后端是一张只有键、值两列的表；值始终以原始字符串读写。
#[async_trait]
pub trait ConfigStorage: Send + Sync {
    /// 读取配置项的原始值
    ///
    /// # 参数
    /// * `key` - 配置键
    ///
    /// # 返回
    /// * `Result<String, StorageError>` - 不存在时返回 `StorageError::NotFound`
    async fn get_value(&self, key: &str) -> Result<String, StorageError>;

    /// 插入新的配置项
    async fn insert_value(&self, key: &str, value: &str) -> Result<(), StorageError>;

    /// 更新已有配置项
    async fn update_value(&self, key: &str, value: &str) -> Result<(), StorageError>;
}
