//! 错误处理模块
//!
//! 定义配置缓存的统一错误类型

use crate::store::ValueKind;
use thiserror::Error;

/// 配置缓存的主要错误类型
#[derive(Error, Debug)]
pub enum ConfigError {
    /// 配置项未注册
    #[error("ConfigNotFound: {key}")]
    ConfigNotFound { key: String },

    /// 更新过于频繁，被限流拒绝
    #[error("UpdateConfigIsTooFast")]
    UpdateTooFast,

    /// 原始值无法转换为配置项声明的类型
    #[error("配置值解析失败 {key} ({kind}): {reason}")]
    Parse {
        key: String,
        kind: String,
        reason: String,
    },

    /// 按错误的类型读取配置项
    #[error("配置类型不匹配 {key}: 期望 {expected}, 实际 {actual}")]
    TypeMismatch {
        key: String,
        expected: ValueKind,
        actual: ValueKind,
    },

    /// 持久化存储错误
    #[error("存储错误: {0}")]
    Storage(#[from] StorageError),

    /// 变更通道错误
    #[error("变更通道错误: {0}")]
    Channel(#[from] ChannelError),

    /// 初始化阶段某个配置项加载失败
    #[error("初始化配置失败 {key}: {source}")]
    Init {
        key: String,
        #[source]
        source: Box<ConfigError>,
    },

    /// 配置选项无效
    #[error("配置选项无效: {0}")]
    InvalidOptions(String),
}

impl ConfigError {
    /// 构造未注册错误
    pub fn not_found(key: impl Into<String>) -> Self {
        Self::ConfigNotFound { key: key.into() }
    }

    /// 是否为限流拒绝
    pub fn is_too_fast(&self) -> bool {
        matches!(self, Self::UpdateTooFast)
    }

    /// 是否为未注册错误
    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::ConfigNotFound { .. })
    }
}

/// 持久化存储错误类型
#[derive(Error, Debug)]
pub enum StorageError {
    /// 存储中不存在该配置项
    #[error("存储中不存在配置项: {key}")]
    NotFound { key: String },

    /// 配置项已存在
    #[error("配置项已存在: {key}")]
    Duplicate { key: String },

    /// 数据库错误
    #[error("数据库错误: {0}")]
    Database(#[from] sqlx::Error),

    /// 表名或列名不合法
    #[error("非法的SQL标识符: {0}")]
    InvalidIdentifier(String),
}

/// 变更通道错误类型
#[derive(Error, Debug)]
pub enum ChannelError {
    /// 通用消息代理错误
    #[error("消息代理错误: {0}")]
    Broker(String),

    /// Redis错误
    #[error("Redis错误: {0}")]
    Redis(#[from] redis::RedisError),

    /// 变更标记格式错误
    #[error("变更标记格式错误: {0}")]
    MalformedMarker(String),
}

/// 配置文件加载错误类型
#[derive(Error, Debug)]
pub enum LoadError {
    /// 配置文件解析错误
    #[error("配置文件解析失败: {0}")]
    ParseError(String),

    /// 配置验证错误
    #[error("配置验证失败: {0}")]
    ValidationError(String),

    /// 配置文件不存在
    #[error("配置文件不存在: {path}")]
    FileNotFound { path: String },

    /// 环境变量替换错误
    #[error("环境变量替换失败: {var}")]
    EnvVarError { var: String },
}

/// 结果类型别名
pub type Result<T> = std::result::Result<T, ConfigError>;
