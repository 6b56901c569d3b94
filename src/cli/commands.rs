//! 命令处理逻辑
//!
//! 实现各种CLI命令的处理逻辑

use crate::channel::{ChangeChannel, MemoryChannel, RedisChannel};
use crate::cli::args::{Args, Commands};
use crate::config::{AppConfig, ConfigLoader, TomlConfigLoader};
use crate::manager::ConfigManager;
use crate::storage::SqlStorage;
use crate::store::KeyValueInit;
use crate::web::WebServer;
use anyhow::{Context, Result};
use async_trait::async_trait;
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;
use tokio::signal;
use tokio::sync::broadcast;
use tracing::{error, info, warn};

/// 命令处理器trait
#[async_trait]
pub trait Command: Send + Sync {
    /// 执行命令
    async fn execute(&self, args: &Args) -> Result<()>;
}

/// 加载并验证配置文件
pub async fn load_config(args: &Args) -> Result<AppConfig> {
    let path = args.config_path();
    let loader = TomlConfigLoader::new(true);
    loader
        .load_from_file(&path)
        .await
        .with_context(|| format!("加载配置文件失败: {}", path.display()))
}

/// 按配置文件构造配置管理器
pub async fn build_manager(config: &AppConfig) -> Result<ConfigManager> {
    let keys = config
        .keys
        .iter()
        .map(|declaration| declaration.to_init())
        .collect::<std::result::Result<Vec<KeyValueInit>, String>>()
        .map_err(|e| anyhow::anyhow!(e))?;

    let storage = SqlStorage::connect(
        &config.database.url,
        config.database.replica_url.as_deref(),
        &config.manager.table_schema(),
    )
    .await
    .context("连接数据库失败")?;

    let channel: Arc<dyn ChangeChannel> = match config.broker.redis_url() {
        Some(url) => Arc::new(RedisChannel::connect(url).await.context("连接Redis失败")?),
        None => {
            warn!("redis_url 为空，使用进程内变更通道，变更不会传播到其他进程");
            Arc::new(MemoryChannel::new())
        }
    };

    ConfigManager::new(keys, Arc::new(storage), channel, config.manager.clone())
        .await
        .context("初始化配置管理器失败")
}

/// 服务命令：运行配置管理器与HTTP接口
pub struct ServeCommand;

#[async_trait]
impl Command for ServeCommand {
    async fn execute(&self, args: &Args) -> Result<()> {
        let config = load_config(args).await?;
        let manager = Arc::new(build_manager(&config).await?);

        let (shutdown_tx, shutdown_rx) = broadcast::channel(1);

        // 设置Ctrl+C信号处理
        let shutdown_tx_clone = shutdown_tx.clone();
        tokio::spawn(async move {
            match signal::ctrl_c().await {
                Ok(()) => {
                    info!("收到中断信号，正在停止服务...");
                    let _ = shutdown_tx_clone.send(());
                }
                Err(err) => {
                    error!("监听中断信号失败: {}", err);
                }
            }
        });

        let mut server = WebServer::new(config.web.clone(), Arc::clone(&manager), shutdown_rx);
        let result = server.start().await;

        manager.shutdown().await;
        result
    }
}

/// 读取命令
pub struct GetCommand;

#[async_trait]
impl Command for GetCommand {
    async fn execute(&self, args: &Args) -> Result<()> {
        if let Commands::Get { key } = &args.command {
            let config = load_config(args).await?;
            let manager = build_manager(&config).await?;
            let value = manager.get_config(key);
            manager.shutdown().await;

            let value = value?;
            println!("{}", serde_json::to_string_pretty(&value.to_json())?);
        }
        Ok(())
    }
}

/// 插入命令
pub struct InsertCommand;

#[async_trait]
impl Command for InsertCommand {
    async fn execute(&self, args: &Args) -> Result<()> {
        if let Commands::Insert { key, value } = &args.command {
            let config = load_config(args).await?;
            let manager = build_manager(&config).await?;
            let result = manager.insert_config(key, value).await;
            manager.shutdown().await;

            result?;
            println!("配置已插入: {}", key);
        }
        Ok(())
    }
}

/// 更新命令
pub struct UpdateCommand;

#[async_trait]
impl Command for UpdateCommand {
    async fn execute(&self, args: &Args) -> Result<()> {
        if let Commands::Update { key, value, wait } = &args.command {
            let config = load_config(args).await?;
            let manager = build_manager(&config).await?;
            let result = update_with_wait(&manager, key, value, *wait).await;
            manager.shutdown().await;

            result?;
            println!("配置已更新: {}", key);
        }
        Ok(())
    }
}

/// 更新配置，被限流拒绝时每秒重试一次，直到超过等待时间
///
/// 刚构造的管理器在推送模式下必然处于限流窗口内
pub async fn update_with_wait(
    manager: &ConfigManager,
    key: &str,
    value: &str,
    wait_secs: u64,
) -> crate::error::Result<()> {
    let mut waited = 0;
    loop {
        match manager.update_config(key, value).await {
            Err(e) if e.is_too_fast() && waited < wait_secs => {
                info!(key = %key, waited, "更新被限流，稍后重试");
                tokio::time::sleep(Duration::from_secs(1)).await;
                waited += 1;
            }
            other => return other,
        }
    }
}

/// 验证命令
pub struct ValidateCommand;

#[async_trait]
impl Command for ValidateCommand {
    async fn execute(&self, args: &Args) -> Result<()> {
        let path = args.config_path();
        let config = load_config(args).await?;

        println!("✅ 配置文件验证通过: {}", path.display());
        println!("   数据库: {}", config.database.url);
        println!(
            "   变更通道: {}",
            config.broker.redis_url().unwrap_or("进程内")
        );
        println!("   通知模式: {}", config.manager.notifier_mode());
        println!("   注册配置项: {} 个", config.keys.len());
        for declaration in &config.keys {
            println!("     - {} ({})", declaration.key, declaration.kind);
        }
        Ok(())
    }
}

/// 初始化命令
pub struct InitCommand;

#[async_trait]
impl Command for InitCommand {
    async fn execute(&self, args: &Args) -> Result<()> {
        if let Commands::Init { config_path, force } = &args.command {
            self.create_config_file(config_path, *force).await?;
        }
        Ok(())
    }
}

impl InitCommand {
    /// 创建配置文件
    async fn create_config_file(&self, config_path: &Path, force: bool) -> Result<()> {
        if config_path.exists() && !force {
            eprintln!("配置文件已存在: {}", config_path.display());
            eprintln!("使用 --force 参数覆盖现有文件");
            return Ok(());
        }

        if let Some(parent) = config_path.parent() {
            if !parent.as_os_str().is_empty() {
                tokio::fs::create_dir_all(parent).await?;
            }
        }

        tokio::fs::write(config_path, CONFIG_TEMPLATE).await?;

        println!("配置文件已创建: {}", config_path.display());
        Ok(())
    }
}

/// 配置文件模板
pub const CONFIG_TEMPLATE: &str = r#"# dbkv-config 配置文件

[database]
url = "sqlite://config.db"
# replica_url = "sqlite://config.db"

[broker]
# 省略时连接本机默认Redis；设为空字符串时使用进程内通道
redis_url = "redis://127.0.0.1:6379"

[manager]
application_name = "AppTestHTTP"
use_notification_push = true
watch_interval_ms = 10000
ttl_seconds = 300
notification_topic = "dbkvconfiglistener"
table_name = "config_kv"

[web]
bind_address = "0.0.0.0"
port = 9090

[[keys]]
key = "key1"
kind = "json"

[[keys]]
key = "key2"
kind = "int"
default = 0

[[keys]]
key = "key3"
kind = "int64"
default = 0

[[keys]]
key = "key4"
kind = "bool"
default = false
"#;
