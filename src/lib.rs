//! dbkv-config - 数据库支撑的实时配置缓存
//!
//! 进程内缓存一组类型化配置，权威数据保存在关系型数据库中，
//! 通过消息代理在多个进程之间传播变更：
//! - 固定键集合，注册时声明类型（字符串、整数、布尔、JSON文档）
//! - 推送模式（发布/订阅）和轮询模式（变更标记）两种通知策略
//! - 更新限流，避免在重载尚未传播时连续写入
//! - 可选的HTTP接口和命令行工具

pub mod channel;
pub mod cli;
pub mod clock;
pub mod config;
pub mod error;
pub mod logging;
pub mod manager;
pub mod notifier;
pub mod storage;
pub mod store;
pub mod web;

// 重新导出主要类型
pub use channel::{ChangeChannel, MemoryChannel, RedisChannel};
pub use clock::{Clock, ManualClock, SystemClock};
pub use config::ManagerOptions;
pub use error::{ChannelError, ConfigError, Result, StorageError};
pub use manager::ConfigManager;
pub use notifier::NotifierMode;
pub use storage::{ConfigStorage, MemoryStorage, SqlStorage, TableSchema};
pub use store::{ConfigValue, Document, KeyValueInit, ValueKind};

/// 应用程序版本信息
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// 应用程序名称
pub const APP_NAME: &str = env!("CARGO_PKG_NAME");

/// 应用程序描述
pub const APP_DESCRIPTION: &str = env!("CARGO_PKG_DESCRIPTION");
