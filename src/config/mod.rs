//! 配置模块
//!
//! 提供配置管理器选项与可执行程序配置文件的解析、验证

pub mod loader;
pub mod types;

// 重新导出主要类型
pub use loader::{ConfigLoader, TomlConfigLoader};
pub use types::{
    validate_config, AppConfig, BrokerConfig, DatabaseConfig, KeyDeclaration, ManagerOptions,
    WebConfig, DEFAULT_APPLICATION, DEFAULT_NOTIFICATION_TOPIC,
};
