//! 配置重载器
//!
//! 持有值存储与持久化访问，被前台调用和后台监听任务共享

use crate::clock::Clock;
use crate::error::{ConfigError, Result};
use crate::storage::ConfigStorage;
use crate::store::ValueStore;
use std::sync::atomic::{AtomicI64, Ordering};
use std::sync::Arc;
use tokio::sync::Mutex;
use tracing::{error, info};

/// 配置重载器
///
/// 值存储只通过 [`Reloader::reload`] 修改；成功重载后刷新 `last_reload_unix`。
pub struct Reloader {
    store: ValueStore,
    storage: Arc<dyn ConfigStorage>,
    clock: Arc<dyn Clock>,
    last_reload_unix: AtomicI64,
    /// 串行化"读存储 + 写内存"，后开始的重载一定晚于先开始的生效
    reload_lock: Mutex<()>,
    application_name: String,
}

impl Reloader {
    pub fn new(
        store: ValueStore,
        storage: Arc<dyn ConfigStorage>,
        clock: Arc<dyn Clock>,
        application_name: impl Into<String>,
    ) -> Self {
        Self {
            store,
            storage,
            clock,
            last_reload_unix: AtomicI64::new(0),
            reload_lock: Mutex::new(()),
            application_name: application_name.into(),
        }
    }

    /// 从持久化存储重新读取配置项并更新内存值
    ///
    /// 未注册的键直接返回 `ConfigNotFound`，不访问存储。
    pub async fn reload(&self, key: &str) -> Result<()> {
        if !self.store.contains(key) {
            return Err(ConfigError::not_found(key));
        }

        let _guard = self.reload_lock.lock().await;
        let raw = self.storage.get_value(key).await?;
        self.store.reload(key, &raw)?;
        self.last_reload_unix
            .store(self.clock.now_unix(), Ordering::SeqCst);
        Ok(())
    }

    /// 重载并记录结果，供后台监听任务使用
    ///
    /// 失败只记录日志，不向上传播。
    pub async fn reload_logged(&self, key: &str) -> bool {
        match self.reload(key).await {
            Ok(()) => {
                info!(
                    application = %self.application_name,
                    key = %key,
                    "配置重载成功"
                );
                true
            }
            Err(e) => {
                error!(
                    application = %self.application_name,
                    key = %key,
                    error = %e,
                    "配置重载失败"
                );
                false
            }
        }
    }

    /// 最近一次成功重载的时间（Unix秒）
    pub fn last_reload_unix(&self) -> i64 {
        self.last_reload_unix.load(Ordering::SeqCst)
    }

    pub fn now_unix(&self) -> i64 {
        self.clock.now_unix()
    }

    pub fn store(&self) -> &ValueStore {
        &self.store
    }

    pub fn storage(&self) -> &Arc<dyn ConfigStorage> {
        &self.storage
    }

    pub fn application_name(&self) -> &str {
        &self.application_name
    }
}
