//! 配置数据结构定义
//!
//! 定义配置管理器的构造选项，以及可执行程序的配置文件结构

use crate::error::ConfigError;
use crate::notifier::NotifierMode;
use crate::storage::TableSchema;
use crate::store::{ConfigValue, KeyValueInit, ValueKind};
use serde::{Deserialize, Serialize};

/// 默认应用名
pub const DEFAULT_APPLICATION: &str = "Default-Application";
/// 默认通知主题
pub const DEFAULT_NOTIFICATION_TOPIC: &str = "dbkvconfiglistener";

/// 配置管理器构造选项
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ManagerOptions {
    /// 轮询间隔（毫秒）
    #[serde(default = "default_watch_interval_ms")]
    pub watch_interval_ms: u64,
    /// 变更标记过期时间（秒）
    #[serde(default = "default_ttl_seconds")]
    pub ttl_seconds: u64,
    /// 是否使用推送模式
    #[serde(default)]
    pub use_notification_push: bool,
    /// 应用名，仅用于日志
    #[serde(default = "default_application_name")]
    pub application_name: String,
    /// 通知主题，轮询模式下也作为变更标记的键
    #[serde(default = "default_notification_topic")]
    pub notification_topic: String,
    /// 配置表名
    #[serde(default = "default_table_name")]
    pub table_name: String,
    /// 键列名
    #[serde(default = "default_key_column")]
    pub key_column: String,
    /// 值列名
    #[serde(default = "default_value_column")]
    pub value_column: String,
}

// 默认值函数
fn default_watch_interval_ms() -> u64 {
    10_000
}
fn default_ttl_seconds() -> u64 {
    300
}
fn default_application_name() -> String {
    DEFAULT_APPLICATION.to_string()
}
fn default_notification_topic() -> String {
    DEFAULT_NOTIFICATION_TOPIC.to_string()
}
fn default_table_name() -> String {
    "config_kv".to_string()
}
fn default_key_column() -> String {
    "key".to_string()
}
fn default_value_column() -> String {
    "value".to_string()
}

impl Default for ManagerOptions {
    fn default() -> Self {
        Self {
            watch_interval_ms: default_watch_interval_ms(),
            ttl_seconds: default_ttl_seconds(),
            use_notification_push: false,
            application_name: default_application_name(),
            notification_topic: default_notification_topic(),
            table_name: default_table_name(),
            key_column: default_key_column(),
            value_column: default_value_column(),
        }
    }
}

impl ManagerOptions {
    /// 零值与空字符串回退为默认值
    pub fn normalized(mut self) -> Self {
        let defaults = Self::default();
        if self.watch_interval_ms == 0 {
            self.watch_interval_ms = defaults.watch_interval_ms;
        }
        if self.ttl_seconds == 0 {
            self.ttl_seconds = defaults.ttl_seconds;
        }
        if self.application_name.is_empty() {
            self.application_name = defaults.application_name;
        }
        if self.notification_topic.is_empty() {
            self.notification_topic = defaults.notification_topic;
        }
        if self.table_name.is_empty() {
            self.table_name = defaults.table_name;
        }
        if self.key_column.is_empty() {
            self.key_column = defaults.key_column;
        }
        if self.value_column.is_empty() {
            self.value_column = defaults.value_column;
        }
        self
    }

    /// 校验选项
    pub fn validate(&self) -> Result<(), ConfigError> {
        self.table_schema()
            .validate()
            .map_err(|e| ConfigError::InvalidOptions(e.to_string()))
    }

    pub fn notifier_mode(&self) -> NotifierMode {
        if self.use_notification_push {
            NotifierMode::Push
        } else {
            NotifierMode::Poll
        }
    }

    pub fn table_schema(&self) -> TableSchema {
        TableSchema {
            table_name: self.table_name.clone(),
            key_column: self.key_column.clone(),
            value_column: self.value_column.clone(),
        }
    }
}

/// 可执行程序的主配置
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AppConfig {
    /// 数据库配置
    pub database: DatabaseConfig,
    /// 消息代理配置
    #[serde(default)]
    pub broker: BrokerConfig,
    /// 配置管理器选项
    #[serde(default)]
    pub manager: ManagerOptions,
    /// Web API 配置
    #[serde(default)]
    pub web: WebConfig,
    /// 注册的配置项
    #[serde(default)]
    pub keys: Vec<KeyDeclaration>,
}

/// 数据库配置
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct DatabaseConfig {
    /// 主库连接串
    pub url: String,
    /// 从库连接串
    pub replica_url: Option<String>,
}

/// 默认Redis连接串
pub const DEFAULT_REDIS_URL: &str = "redis://127.0.0.1:6379";

/// 消息代理配置
///
/// 省略 `[broker]` 段或 `redis_url` 字段时连接本机默认Redis；
/// 显式写 `redis_url = ""` 时使用进程内通道，变更不会传播到其他进程。
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct BrokerConfig {
    /// Redis连接串
    #[serde(default = "default_redis_url")]
    pub redis_url: Option<String>,
}

fn default_redis_url() -> Option<String> {
    Some(DEFAULT_REDIS_URL.to_string())
}

impl Default for BrokerConfig {
    fn default() -> Self {
        Self {
            redis_url: default_redis_url(),
        }
    }
}

impl BrokerConfig {
    /// 实际使用的Redis连接串，`None` 表示使用进程内通道
    pub fn redis_url(&self) -> Option<&str> {
        self.redis_url
            .as_deref()
            .map(str::trim)
            .filter(|url| !url.is_empty())
    }
}

/// Web API 配置
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct WebConfig {
    /// 绑定地址
    #[serde(default = "default_bind_address")]
    pub bind_address: String,
    /// 端口
    #[serde(default = "default_port")]
    pub port: u16,
}

fn default_bind_address() -> String {
    "0.0.0.0".to_string()
}
fn default_port() -> u16 {
    9090
}

impl Default for WebConfig {
    fn default() -> Self {
        Self {
            bind_address: default_bind_address(),
            port: default_port(),
        }
    }
}

impl WebConfig {
    /// 获取监听地址
    pub fn socket_addr(&self) -> Result<std::net::SocketAddr, String> {
        format!("{}:{}", self.bind_address, self.port)
            .parse()
            .map_err(|e| format!("无效的监听地址 {}:{}: {}", self.bind_address, self.port, e))
    }
}

/// 配置文件中的配置项声明
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct KeyDeclaration {
    /// 配置键
    pub key: String,
    /// 类型：string / int / int64 / bool / json
    pub kind: String,
    /// 默认值，缺省时使用该类型的零值
    pub default: Option<toml::Value>,
}

impl KeyDeclaration {
    /// 转换为注册项
    pub fn to_init(&self) -> Result<KeyValueInit, String> {
        let value = match (self.kind.as_str(), &self.default) {
            ("string", None) => ConfigValue::Text(String::new()),
            ("string", Some(toml::Value::String(s))) => ConfigValue::Text(s.clone()),
            ("int", None) => ConfigValue::Int(0),
            ("int", Some(toml::Value::Integer(v))) => ConfigValue::Int(
                isize::try_from(*v).map_err(|_| format!("配置项 {} 的默认值超出int范围", self.key))?,
            ),
            ("int64", None) => ConfigValue::Int64(0),
            ("int64", Some(toml::Value::Integer(v))) => ConfigValue::Int64(*v),
            ("bool", None) => ConfigValue::Bool(false),
            ("bool", Some(toml::Value::Boolean(v))) => ConfigValue::Bool(*v),
            ("json", default) => {
                let json = match default {
                    Some(value) => serde_json::to_value(value)
                        .map_err(|e| format!("配置项 {} 的默认值无法转换为JSON: {}", self.key, e))?,
                    None => serde_json::Value::Object(Default::default()),
                };
                ConfigValue::document(json)
                    .map_err(|e| format!("配置项 {} 的默认值无效: {}", self.key, e))?
            }
            ("string" | "int" | "int64" | "bool", Some(_)) => {
                return Err(format!(
                    "配置项 {} 的默认值与类型 {} 不匹配",
                    self.key, self.kind
                ))
            }
            (other, _) => {
                return Err(format!(
                    "配置项 {} 的类型 {} 无效，支持的类型: {:?}",
                    self.key,
                    other,
                    [
                        ValueKind::Text.as_str(),
                        ValueKind::Int.as_str(),
                        ValueKind::Int64.as_str(),
                        ValueKind::Bool.as_str(),
                        ValueKind::Document.as_str(),
                    ]
                ))
            }
        };
        Ok(KeyValueInit {
            key: self.key.clone(),
            default_value: value,
        })
    }
}

/// 配置验证函数
///
/// # 参数
/// * `config` - 要验证的配置
///
/// # 返回
/// * `Result<(), String>` - 验证结果，错误时返回错误信息
pub fn validate_config(config: &AppConfig) -> Result<(), String> {
    if config.database.url.trim().is_empty() {
        return Err("数据库连接串不能为空".to_string());
    }

    config.manager.validate().map_err(|e| e.to_string())?;

    if config.web.port == 0 {
        return Err("Web服务器端口不能为0".to_string());
    }

    if config.keys.is_empty() {
        return Err("至少需要注册一个配置项".to_string());
    }

    let mut seen = std::collections::HashSet::new();
    for declaration in &config.keys {
        if declaration.key.trim().is_empty() {
            return Err("配置键不能为空".to_string());
        }
        if !seen.insert(declaration.key.as_str()) {
            return Err(format!("配置键重复: {}", declaration.key));
        }
        declaration.to_init()?;
    }

    Ok(())
}
