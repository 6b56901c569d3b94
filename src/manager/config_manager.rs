//! 配置管理器模块
//!
//! 持有类型化值存储和通知策略，提供读取、插入、更新接口，并执行更新限流规则

use super::reloader::Reloader;
use crate::channel::ChangeChannel;
use crate::clock::{Clock, SystemClock};
use crate::config::ManagerOptions;
use crate::error::{ConfigError, Result};
use crate::notifier::{build_notifier, ChangeNotifier, NotifierMode};
use crate::storage::ConfigStorage;
use crate::store::{ConfigValue, KeyValueInit, ValueKind, ValueStore};
use parking_lot::Mutex;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::broadcast;
use tokio::task::JoinHandle;
use tracing::{error, info, warn};

/// 配置管理器
///
/// 构造时从存储加载全部注册项并启动唯一的后台监听任务。
/// 读取不做任何I/O；更新先写库再通知其他进程，本进程的内存值由自己的监听任务刷新。
pub struct ConfigManager {
    /// 共享给监听任务的重载器
    reloader: Arc<Reloader>,
    /// 通知策略
    notifier: Arc<dyn ChangeNotifier>,
    /// 构造选项
    options: ManagerOptions,
    /// 关闭信号发送器
    shutdown_tx: broadcast::Sender<()>,
    /// 后台监听任务句柄
    watcher: Mutex<Option<JoinHandle<()>>>,
}

impl ConfigManager {
    /// 创建配置管理器
    ///
    /// # 参数
    /// * `keys` - 注册的配置项，决定固定的键集合与各自的声明类型
    /// * `storage` - 持久化存储
    /// * `channel` - 变更通道
    /// * `options` - 构造选项
    ///
    /// # 返回
    /// * `Result<Self>` - 任意一个配置项加载失败都会导致构造失败
    pub async fn new(
        keys: Vec<KeyValueInit>,
        storage: Arc<dyn ConfigStorage>,
        channel: Arc<dyn ChangeChannel>,
        options: ManagerOptions,
    ) -> Result<Self> {
        Self::with_clock(keys, storage, channel, options, Arc::new(SystemClock)).await
    }

    /// 使用指定时钟创建配置管理器
    pub async fn with_clock(
        keys: Vec<KeyValueInit>,
        storage: Arc<dyn ConfigStorage>,
        channel: Arc<dyn ChangeChannel>,
        options: ManagerOptions,
        clock: Arc<dyn Clock>,
    ) -> Result<Self> {
        let options = options.normalized();
        options.validate()?;
        let notifier = build_notifier(&options, channel);
        Self::with_notifier(keys, storage, notifier, options, clock).await
    }

    /// 使用自定义通知策略创建配置管理器
    pub async fn with_notifier(
        keys: Vec<KeyValueInit>,
        storage: Arc<dyn ConfigStorage>,
        notifier: Arc<dyn ChangeNotifier>,
        options: ManagerOptions,
        clock: Arc<dyn Clock>,
    ) -> Result<Self> {
        let key_names: Vec<String> = keys.iter().map(|init| init.key.clone()).collect();
        let store = ValueStore::new(keys);
        let reloader = Arc::new(Reloader::new(
            store,
            storage,
            clock,
            options.application_name.clone(),
        ));

        for key in &key_names {
            reloader.reload(key).await.map_err(|e| ConfigError::Init {
                key: key.clone(),
                source: Box::new(e),
            })?;
        }

        let (shutdown_tx, shutdown_rx) = broadcast::channel(1);
        let handle = notifier.start(Arc::clone(&reloader), shutdown_rx).await?;

        info!(
            application = %options.application_name,
            mode = %notifier.mode(),
            keys = key_names.len(),
            "配置管理器初始化完成"
        );

        Ok(Self {
            reloader,
            notifier,
            options,
            shutdown_tx,
            watcher: Mutex::new(Some(handle)),
        })
    }

    /// 获取配置值
    ///
    /// 纯内存查找；键未注册时返回 `ConfigNotFound`。
    pub fn get_config(&self, key: &str) -> Result<ConfigValue> {
        self.reloader.store().get(key)
    }

    pub fn get_str(&self, key: &str) -> Result<String> {
        match self.get_config(key)? {
            ConfigValue::Text(s) => Ok(s),
            other => Err(mismatch(key, ValueKind::Text, &other)),
        }
    }

    pub fn get_int(&self, key: &str) -> Result<isize> {
        let value = self.get_config(key)?;
        value
            .as_int()
            .ok_or_else(|| mismatch(key, ValueKind::Int, &value))
    }

    pub fn get_i64(&self, key: &str) -> Result<i64> {
        let value = self.get_config(key)?;
        value
            .as_i64()
            .ok_or_else(|| mismatch(key, ValueKind::Int64, &value))
    }

    pub fn get_bool(&self, key: &str) -> Result<bool> {
        let value = self.get_config(key)?;
        value
            .as_bool()
            .ok_or_else(|| mismatch(key, ValueKind::Bool, &value))
    }

    /// 获取结构化文档配置
    pub fn get_document<T: Send + Sync + 'static>(&self, key: &str) -> Result<Arc<T>> {
        let value = self.get_config(key)?;
        value
            .as_document::<T>()
            .ok_or_else(|| mismatch(key, ValueKind::Document, &value))
    }

    /// 插入新配置项
    ///
    /// 只写入持久化存储，不修改内存值，也不发送变更通知。
    pub async fn insert_config(&self, key: &str, value: &str) -> Result<()> {
        self.reloader.storage().insert_value(key, value).await?;
        info!(
            application = %self.options.application_name,
            key = %key,
            "配置插入成功"
        );
        Ok(())
    }

    /// 更新配置项
    ///
    /// 依次执行：注册检查、限流、类型校验、写库、发送变更通知。
    /// 前三步失败没有任何副作用；写库失败不会发送通知；
    /// 通知失败时写库结果不回滚，错误返回给调用方。
    pub async fn update_config(&self, key: &str, value: &str) -> Result<()> {
        self.get_config(key)?;

        let now = self.reloader.now_unix();
        self.notifier
            .check_rate_limit(now, self.reloader.last_reload_unix())
            .await?;

        self.reloader.store().validate(key, value)?;

        self.reloader.storage().update_value(key, value).await?;

        if let Err(e) = self.notifier.announce(key, self.reloader.now_unix()).await {
            error!(
                application = %self.options.application_name,
                key = %key,
                error = %e,
                "配置已写入存储，但变更通知发送失败"
            );
            return Err(e);
        }

        info!(
            application = %self.options.application_name,
            key = %key,
            "配置更新成功"
        );
        Ok(())
    }

    /// 手动重载某个配置项
    pub async fn reload_config(&self, key: &str) -> Result<()> {
        self.reloader.reload(key).await
    }

    /// 最近一次成功重载的时间（Unix秒）
    pub fn last_reload_unix(&self) -> i64 {
        self.reloader.last_reload_unix()
    }

    /// 已注册的键
    pub fn keys(&self) -> Vec<String> {
        self.reloader.store().keys()
    }

    /// 所有配置值的快照
    pub fn snapshot(&self) -> HashMap<String, ConfigValue> {
        self.reloader.store().snapshot()
    }

    pub fn mode(&self) -> NotifierMode {
        self.notifier.mode()
    }

    pub fn options(&self) -> &ManagerOptions {
        &self.options
    }

    /// 停止后台监听任务并等待其退出
    pub async fn shutdown(&self) {
        let _ = self.shutdown_tx.send(());
        let handle = self.watcher.lock().take();
        if let Some(handle) = handle {
            if let Err(e) = handle.await {
                warn!(error = %e, "后台监听任务异常退出");
            }
            info!(application = %self.options.application_name, "配置管理器已停止");
        }
    }

    /// 后台监听任务是否仍在运行
    pub fn is_watching(&self) -> bool {
        self.watcher
            .lock()
            .as_ref()
            .map(|handle| !handle.is_finished())
            .unwrap_or(false)
    }
}

impl Drop for ConfigManager {
    fn drop(&mut self) {
        let _ = self.shutdown_tx.send(());
    }
}

fn mismatch(key: &str, expected: ValueKind, actual: &ConfigValue) -> ConfigError {
    ConfigError::TypeMismatch {
        key: key.to_string(),
        expected,
        actual: actual.kind(),
    }
}
