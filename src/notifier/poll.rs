//! 轮询模式通知
//!
//! 按固定间隔读取共享变更标记，标记时间不早于本进程最近一次重载时触发重载

use super::marker::ChangeMarker;
use super::{ChangeNotifier, NotifierMode};
use crate::channel::ChangeChannel;
use crate::error::{ConfigError, Result};
use crate::manager::Reloader;
use async_trait::async_trait;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::broadcast;
use tokio::task::JoinHandle;
use tokio::time::{interval_at, Instant, MissedTickBehavior};
use tracing::{debug, error, info};

/// 在一个轮询间隔之外额外保留的更新间隔秒数
pub const POLL_UPDATE_MARGIN_SECS: i64 = 5;

/// 单次轮询的结果
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PollOutcome {
    /// 标记不存在
    Absent,
    /// 标记中的键为空
    EmptyKey,
    /// 标记早于本进程最近一次重载
    Stale,
    /// 已重载该键
    Reloaded(String),
    /// 读取标记或重载失败
    Failed,
}

/// 轮询模式通知器
pub struct PollNotifier {
    channel: Arc<dyn ChangeChannel>,
    topic: String,
    watch_interval_ms: u64,
    ttl_seconds: u64,
}

impl PollNotifier {
    pub fn new(
        channel: Arc<dyn ChangeChannel>,
        topic: impl Into<String>,
        watch_interval_ms: u64,
        ttl_seconds: u64,
    ) -> Self {
        Self {
            channel,
            topic: topic.into(),
            watch_interval_ms,
            ttl_seconds,
        }
    }

    /// 判断标记是否需要触发重载
    ///
    /// 时间相等视为未过期，宁可多做一次幂等重载也不漏掉更新。
    pub fn should_reload(marker: &ChangeMarker, last_reload_unix: i64) -> bool {
        !marker.changed_key.is_empty() && marker.change_timestamp_unix >= last_reload_unix
    }

    /// 更新限流窗口（秒）：轮询间隔向上取整再加余量
    pub fn update_window_secs(&self) -> i64 {
        let interval_secs = self.watch_interval_ms.div_ceil(1000);
        i64::try_from(interval_secs).unwrap_or(i64::MAX / 2) + POLL_UPDATE_MARGIN_SECS
    }

    /// 执行一次轮询
    pub async fn poll_once(
        channel: &dyn ChangeChannel,
        topic: &str,
        reloader: &Reloader,
    ) -> PollOutcome {
        let marker = match ChangeMarker::load(channel, topic).await {
            Ok(Some(marker)) => marker,
            Ok(None) => return PollOutcome::Absent,
            Err(e) => {
                error!(
                    application = %reloader.application_name(),
                    topic = %topic,
                    error = %e,
                    "读取变更标记失败"
                );
                return PollOutcome::Failed;
            }
        };

        if marker.changed_key.is_empty() {
            return PollOutcome::EmptyKey;
        }
        if !Self::should_reload(&marker, reloader.last_reload_unix()) {
            debug!(
                key = %marker.changed_key,
                changed_at = marker.change_timestamp_unix,
                last_reload = reloader.last_reload_unix(),
                "变更标记已过期，跳过"
            );
            return PollOutcome::Stale;
        }

        if reloader.reload_logged(&marker.changed_key).await {
            PollOutcome::Reloaded(marker.changed_key)
        } else {
            PollOutcome::Failed
        }
    }

    async fn run(
        channel: Arc<dyn ChangeChannel>,
        topic: String,
        period: Duration,
        reloader: Arc<Reloader>,
        mut shutdown: broadcast::Receiver<()>,
    ) {
        info!(
            application = %reloader.application_name(),
            topic = %topic,
            interval_ms = period.as_millis() as u64,
            "轮询模式监听已启动"
        );

        // 首次检查在一个完整间隔之后
        let mut ticker = interval_at(Instant::now() + period, period);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            tokio::select! {
                _ = shutdown.recv() => {
                    info!(application = %reloader.application_name(), "轮询模式监听已停止");
                    break;
                }
                _ = ticker.tick() => {
                    Self::poll_once(channel.as_ref(), &topic, &reloader).await;
                }
            }
        }
    }
}

#[async_trait]
impl ChangeNotifier for PollNotifier {
    fn mode(&self) -> NotifierMode {
        NotifierMode::Poll
    }

    async fn start(
        &self,
        reloader: Arc<Reloader>,
        shutdown: broadcast::Receiver<()>,
    ) -> Result<JoinHandle<()>> {
        let period = Duration::from_millis(self.watch_interval_ms.max(1));
        Ok(tokio::spawn(Self::run(
            Arc::clone(&self.channel),
            self.topic.clone(),
            period,
            reloader,
            shutdown,
        )))
    }

    async fn check_rate_limit(&self, now_unix: i64, _last_reload_unix: i64) -> Result<()> {
        let marker = ChangeMarker::load(self.channel.as_ref(), &self.topic).await?;
        if let Some(marker) = marker {
            // 外部写入的时间戳可能接近 i64::MAX，窗口上界饱和到最大值
            let window_end = marker
                .change_timestamp_unix
                .saturating_add(self.update_window_secs());
            if marker.change_timestamp_unix != 0 && now_unix < window_end {
                return Err(ConfigError::UpdateTooFast);
            }
        }
        Ok(())
    }

    async fn announce(&self, key: &str, now_unix: i64) -> Result<()> {
        ChangeMarker::new(key, now_unix)
            .store(self.channel.as_ref(), &self.topic, self.ttl_seconds)
            .await?;
        Ok(())
    }
}
