//! 配置管理模块
//!
//! 编排值存储、持久化存储与通知策略

pub mod config_manager;
pub mod reloader;

pub use config_manager::ConfigManager;
pub use reloader::Reloader;
