//! 命令行参数定义
//!
//! 使用clap定义应用程序的命令行接口

use clap::{Parser, Subcommand, ValueEnum};
use std::path::PathBuf;

/// dbkv-config - 数据库支撑的实时配置缓存
#[derive(Parser, Debug, Clone)]
#[command(
    name = "dbkv-config",
    version = crate::VERSION,
    about = crate::APP_DESCRIPTION,
    long_about = None
)]
pub struct Args {
    /// 配置文件路径
    #[arg(
        short,
        long,
        value_name = "FILE",
        help = "配置文件路径",
        env = "DBKV_CONFIG"
    )]
    pub config: Option<PathBuf>,

    /// 日志级别
    #[arg(
        short,
        long,
        value_enum,
        default_value = "info",
        help = "日志级别",
        env = "DBKV_LOG_LEVEL"
    )]
    pub log_level: LogLevel,

    /// 是否输出JSON格式日志
    #[arg(long, help = "输出JSON格式日志")]
    pub json_logs: bool,

    /// 子命令
    #[command(subcommand)]
    pub command: Commands,
}

/// 日志级别枚举
#[derive(ValueEnum, Clone, Debug, PartialEq)]
pub enum LogLevel {
    /// 调试级别
    Debug,
    /// 信息级别
    Info,
    /// 警告级别
    Warn,
    /// 错误级别
    Error,
}

impl From<LogLevel> for log::LevelFilter {
    fn from(level: LogLevel) -> Self {
        match level {
            LogLevel::Debug => log::LevelFilter::Debug,
            LogLevel::Info => log::LevelFilter::Info,
            LogLevel::Warn => log::LevelFilter::Warn,
            LogLevel::Error => log::LevelFilter::Error,
        }
    }
}

impl std::fmt::Display for LogLevel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            LogLevel::Debug => write!(f, "debug"),
            LogLevel::Info => write!(f, "info"),
            LogLevel::Warn => write!(f, "warn"),
            LogLevel::Error => write!(f, "error"),
        }
    }
}

/// 子命令定义
#[derive(Subcommand, Debug, Clone)]
pub enum Commands {
    /// 启动配置管理器和HTTP接口，直到收到Ctrl-C
    Serve,

    /// 读取配置的当前值
    Get {
        /// 配置键
        key: String,
    },

    /// 插入新的配置项（只写数据库）
    Insert {
        /// 配置键
        key: String,
        /// 原始值
        value: String,
    },

    /// 更新配置项并通知其他进程
    Update {
        /// 配置键
        key: String,
        /// 原始值
        value: String,

        /// 被限流拒绝时最多等待的秒数
        #[arg(long, value_name = "SECONDS", default_value_t = 10)]
        wait: u64,
    },

    /// 验证配置文件
    Validate,

    /// 生成配置文件模板
    Init {
        /// 配置文件路径
        #[arg(value_name = "FILE", default_value = "dbkv-config.toml")]
        config_path: PathBuf,

        /// 覆盖现有文件
        #[arg(short, long, help = "覆盖现有文件")]
        force: bool,
    },
}

impl Args {
    /// 解析命令行参数
    pub fn parse_args() -> Self {
        Self::parse()
    }

    /// 获取配置文件路径，未指定时使用默认路径
    pub fn config_path(&self) -> PathBuf {
        self.config
            .clone()
            .unwrap_or_else(crate::config::loader::get_default_config_path)
    }
}
