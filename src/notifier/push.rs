//! 推送模式通知
//!
//! 订阅通知主题，每条消息负载即一个发生变更的配置键

use super::{ChangeNotifier, NotifierMode};
use crate::channel::{ChangeChannel, Subscription};
use crate::error::{ConfigError, Result};
use crate::manager::Reloader;
use async_trait::async_trait;
use futures::StreamExt;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::broadcast;
use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn};

/// 两次更新之间至少间隔的秒数，以本进程最近一次重载时间为准
pub const PUSH_UPDATE_GUARD_SECS: i64 = 5;
/// 订阅断开后首次重新订阅前的等待时间
pub const RESUBSCRIBE_INITIAL_BACKOFF: Duration = Duration::from_secs(1);
/// 重新订阅等待时间上限
pub const RESUBSCRIBE_MAX_BACKOFF: Duration = Duration::from_secs(30);

/// 推送模式通知器
pub struct PushNotifier {
    channel: Arc<dyn ChangeChannel>,
    topic: String,
    initial_backoff: Duration,
}

impl PushNotifier {
    pub fn new(channel: Arc<dyn ChangeChannel>, topic: impl Into<String>) -> Self {
        Self {
            channel,
            topic: topic.into(),
            initial_backoff: RESUBSCRIBE_INITIAL_BACKOFF,
        }
    }

    /// 设置重新订阅的初始等待时间，每次失败翻倍，最长 [`RESUBSCRIBE_MAX_BACKOFF`]
    pub fn with_resubscribe_backoff(mut self, initial_backoff: Duration) -> Self {
        self.initial_backoff = initial_backoff;
        self
    }

    /// 订阅消息处理循环
    ///
    /// 单次重载失败不会终止循环；订阅流结束时按指数退避重新订阅，
    /// 只有关闭信号才退出。断开期间错过的消息不会补发。
    async fn run(
        channel: Arc<dyn ChangeChannel>,
        topic: String,
        mut subscription: Subscription,
        initial_backoff: Duration,
        reloader: Arc<Reloader>,
        mut shutdown: broadcast::Receiver<()>,
    ) {
        info!(
            application = %reloader.application_name(),
            topic = %topic,
            "推送模式监听已启动"
        );

        loop {
            tokio::select! {
                _ = shutdown.recv() => break,
                message = subscription.next() => match message {
                    Some(key) if key.is_empty() => {
                        debug!(topic = %topic, "忽略空消息");
                    }
                    Some(key) => {
                        reloader.reload_logged(&key).await;
                    }
                    None => {
                        error!(
                            application = %reloader.application_name(),
                            topic = %topic,
                            "订阅流已结束，开始重新订阅"
                        );
                        match Self::resubscribe(
                            channel.as_ref(),
                            &topic,
                            initial_backoff,
                            &mut shutdown,
                        )
                        .await
                        {
                            Some(resubscribed) => subscription = resubscribed,
                            None => break,
                        }
                    }
                }
            }
        }

        info!(application = %reloader.application_name(), "推送模式监听已停止");
    }

    /// 按指数退避重新订阅，收到关闭信号时返回 `None`
    async fn resubscribe(
        channel: &dyn ChangeChannel,
        topic: &str,
        initial_backoff: Duration,
        shutdown: &mut broadcast::Receiver<()>,
    ) -> Option<Subscription> {
        let mut backoff = initial_backoff;
        let mut attempt: u32 = 0;
        loop {
            tokio::select! {
                _ = shutdown.recv() => return None,
                _ = tokio::time::sleep(backoff) => {}
            }

            attempt += 1;
            match channel.subscribe(topic).await {
                Ok(subscription) => {
                    info!(topic = %topic, attempt, "重新订阅成功");
                    return Some(subscription);
                }
                Err(e) => {
                    warn!(
                        topic = %topic,
                        attempt,
                        error = %e,
                        retry_in_ms = backoff.as_millis() as u64,
                        "重新订阅失败"
                    );
                    backoff = (backoff * 2).min(RESUBSCRIBE_MAX_BACKOFF);
                }
            }
        }
    }
}

#[async_trait]
impl ChangeNotifier for PushNotifier {
    fn mode(&self) -> NotifierMode {
        NotifierMode::Push
    }

    async fn start(
        &self,
        reloader: Arc<Reloader>,
        shutdown: broadcast::Receiver<()>,
    ) -> Result<JoinHandle<()>> {
        // 先完成订阅再返回，避免启动后立即发布的消息丢失
        let subscription = self.channel.subscribe(&self.topic).await?;
        Ok(tokio::spawn(Self::run(
            Arc::clone(&self.channel),
            self.topic.clone(),
            subscription,
            self.initial_backoff,
            reloader,
            shutdown,
        )))
    }

    async fn check_rate_limit(&self, now_unix: i64, last_reload_unix: i64) -> Result<()> {
        if now_unix < last_reload_unix.saturating_add(PUSH_UPDATE_GUARD_SECS) {
            return Err(ConfigError::UpdateTooFast);
        }
        Ok(())
    }

    async fn announce(&self, key: &str, _now_unix: i64) -> Result<()> {
        self.channel.publish(&self.topic, key).await?;
        Ok(())
    }
}
