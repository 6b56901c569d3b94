//! SQL存储实现
//!
//! 基于sqlx连接池访问键值配置表，支持主库写、从库读

use super::ConfigStorage;
use crate::error::StorageError;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use sqlx::sqlite::SqlitePoolOptions;
use sqlx::SqlitePool;
use std::time::Duration;
use tracing::info;

/// 配置表结构
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TableSchema {
    /// 表名
    pub table_name: String,
    /// 键列名
    pub key_column: String,
    /// 值列名
    pub value_column: String,
}

impl Default for TableSchema {
    fn default() -> Self {
        Self {
            table_name: "config_kv".to_string(),
            key_column: "key".to_string(),
            value_column: "value".to_string(),
        }
    }
}

impl TableSchema {
    /// 校验表名与列名
    ///
    /// 标识符会被拼接进SQL语句，只接受 `[A-Za-z_][A-Za-z0-9_]*`。
    pub fn validate(&self) -> Result<(), StorageError> {
        for ident in [&self.table_name, &self.key_column, &self.value_column] {
            if !is_valid_identifier(ident) {
                return Err(StorageError::InvalidIdentifier(ident.clone()));
            }
        }
        Ok(())
    }

    fn select_sql(&self) -> String {
        format!(
            r#"SELECT COALESCE("{value}", '') FROM "{table}" WHERE "{key}" = ? LIMIT 1"#,
            value = self.value_column,
            table = self.table_name,
            key = self.key_column,
        )
    }

    fn insert_sql(&self) -> String {
        format!(
            r#"INSERT INTO "{table}" ("{key}", "{value}") VALUES (?, ?)"#,
            table = self.table_name,
            key = self.key_column,
            value = self.value_column,
        )
    }

    fn update_sql(&self) -> String {
        format!(
            r#"UPDATE "{table}" SET "{value}" = ? WHERE "{key}" = ?"#,
            table = self.table_name,
            value = self.value_column,
            key = self.key_column,
        )
    }
}

fn is_valid_identifier(ident: &str) -> bool {
    let mut chars = ident.chars();
    match chars.next() {
        Some(c) if c.is_ascii_alphabetic() || c == '_' => {}
        _ => return false,
    }
    chars.all(|c| c.is_ascii_alphanumeric() || c == '_')
}

/// SQL键值存储
#[derive(Debug, Clone)]
pub struct SqlStorage {
    /// 写连接池
    primary: SqlitePool,
    /// 读连接池
    replica: SqlitePool,
    select_sql: String,
    insert_sql: String,
    update_sql: String,
}

impl SqlStorage {
    const ACQUIRE_TIMEOUT: Duration = Duration::from_secs(5);
    const IDLE_TIMEOUT: Duration = Duration::from_secs(60);

    /// 读写共用同一个连接池
    pub fn new(pool: SqlitePool, schema: &TableSchema) -> Result<Self, StorageError> {
        Self::with_replica(pool.clone(), pool, schema)
    }

    /// 主库写、从库读
    pub fn with_replica(
        primary: SqlitePool,
        replica: SqlitePool,
        schema: &TableSchema,
    ) -> Result<Self, StorageError> {
        schema.validate()?;
        Ok(Self {
            primary,
            replica,
            select_sql: schema.select_sql(),
            insert_sql: schema.insert_sql(),
            update_sql: schema.update_sql(),
        })
    }

    /// 按URL建立连接池
    ///
    /// # 参数
    /// * `url` - 主库连接串
    /// * `replica_url` - 从库连接串，缺省时读写都走主库
    /// * `schema` - 配置表结构
    pub async fn connect(
        url: &str,
        replica_url: Option<&str>,
        schema: &TableSchema,
    ) -> Result<Self, StorageError> {
        let primary = Self::open_pool(url).await?;
        info!(url = %url, "主库连接成功");

        let replica = match replica_url {
            Some(replica_url) => {
                let pool = Self::open_pool(replica_url).await?;
                info!(url = %replica_url, "从库连接成功");
                pool
            }
            None => primary.clone(),
        };

        Self::with_replica(primary, replica, schema)
    }

    async fn open_pool(url: &str) -> Result<SqlitePool, StorageError> {
        let pool = SqlitePoolOptions::new()
            .max_connections(5)
            .acquire_timeout(Self::ACQUIRE_TIMEOUT)
            .idle_timeout(Some(Self::IDLE_TIMEOUT))
            .test_before_acquire(true)
            .connect(url)
            .await?;
        Ok(pool)
    }
}

#[async_trait]
impl ConfigStorage for SqlStorage {
    async fn get_value(&self, key: &str) -> Result<String, StorageError> {
        sqlx::query_scalar::<_, String>(&self.select_sql)
            .bind(key)
            .fetch_optional(&self.replica)
            .await?
            .ok_or_else(|| StorageError::NotFound {
                key: key.to_string(),
            })
    }

    async fn insert_value(&self, key: &str, value: &str) -> Result<(), StorageError> {
        let result = sqlx::query(&self.insert_sql)
            .bind(key)
            .bind(value)
            .execute(&self.primary)
            .await;

        match result {
            Ok(_) => Ok(()),
            Err(sqlx::Error::Database(db)) if db.is_unique_violation() => {
                Err(StorageError::Duplicate {
                    key: key.to_string(),
                })
            }
            Err(e) => Err(e.into()),
        }
    }

    async fn update_value(&self, key: &str, value: &str) -> Result<(), StorageError> {
        let result = sqlx::query(&self.update_sql)
            .bind(value)
            .bind(key)
            .execute(&self.primary)
            .await?;

        if result.rows_affected() == 0 {
            return Err(StorageError::NotFound {
                key: key.to_string(),
            });
        }
        Ok(())
    }
}
