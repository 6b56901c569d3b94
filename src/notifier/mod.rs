//! 变更通知策略模块
//!
//! 检测"其他进程修改了某个键"并触发重载，提供两种可互换的实现：
//! - 推送模式：订阅主题，每条消息即一个变更的键
//! - 轮询模式：定时读取共享变更标记并比较时间戳

pub mod marker;
pub mod poll;
pub mod push;

pub use marker::ChangeMarker;
pub use poll::{PollNotifier, PollOutcome};
pub use push::PushNotifier;

use crate::channel::ChangeChannel;
use crate::config::ManagerOptions;
use crate::error::Result;
use crate::manager::Reloader;
use async_trait::async_trait;
use std::fmt;
use std::sync::Arc;
use tokio::sync::broadcast;
use tokio::task::JoinHandle;

/// 通知模式
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NotifierMode {
    /// 发布/订阅推送
    Push,
    /// 定时轮询变更标记
    Poll,
}

impl fmt::Display for NotifierMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            NotifierMode::Push => write!(f, "push"),
            NotifierMode::Poll => write!(f, "poll"),
        }
    }
}

/// 变更通知策略trait
///
/// 配置管理器只通过该trait与通知策略交互，不再按模式分支。
#[async_trait]
pub trait ChangeNotifier: Send + Sync {
    /// 通知模式
    fn mode(&self) -> NotifierMode;

    /// 启动后台监听任务
    ///
    /// # 参数
    /// * `reloader` - 检测到变更时调用的重载器
    /// * `shutdown` - 关闭信号，收到信号或发送端被丢弃后任务退出
    ///
    /// # 返回
    /// * `Result<JoinHandle<()>>` - 后台任务句柄
    async fn start(
        &self,
        reloader: Arc<Reloader>,
        shutdown: broadcast::Receiver<()>,
    ) -> Result<JoinHandle<()>>;

    /// 更新前的限流检查
    ///
    /// # 参数
    /// * `now_unix` - 当前时间
    /// * `last_reload_unix` - 本进程最近一次成功重载的时间
    ///
    /// # 返回
    /// * `Result<()>` - 过快时返回 `ConfigError::UpdateTooFast`
    async fn check_rate_limit(&self, now_unix: i64, last_reload_unix: i64) -> Result<()>;

    /// 写库成功后向其他进程宣告变更
    async fn announce(&self, key: &str, now_unix: i64) -> Result<()>;
}

/// 按配置构造通知策略
pub fn build_notifier(
    options: &ManagerOptions,
    channel: Arc<dyn ChangeChannel>,
) -> Arc<dyn ChangeNotifier> {
    match options.notifier_mode() {
        NotifierMode::Push => Arc::new(PushNotifier::new(
            channel,
            options.notification_topic.clone(),
        )),
        NotifierMode::Poll => Arc::new(PollNotifier::new(
            channel,
            options.notification_topic.clone(),
            options.watch_interval_ms,
            options.ttl_seconds,
        )),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::channel::MemoryChannel;

    #[test]
    fn test_build_notifier_by_mode() {
        let channel: Arc<dyn ChangeChannel> = Arc::new(MemoryChannel::new());

        let options = ManagerOptions::default();
        assert_eq!(build_notifier(&options, channel.clone()).mode(), NotifierMode::Poll);

        let options = ManagerOptions {
            use_notification_push: true,
            ..ManagerOptions::default()
        };
        assert_eq!(build_notifier(&options, channel).mode(), NotifierMode::Push);
    }
}
