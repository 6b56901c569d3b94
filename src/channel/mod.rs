//! 变更通道模块
//!
//! 定义跨进程传播配置变更的消息代理接口：
//! - 按主题的发布/订阅
//! - 带过期时间的哈希键值存储

pub mod memory;
pub mod redis;

pub use self::memory::MemoryChannel;
pub use self::redis::RedisChannel;

use crate::error::ChannelError;
use async_trait::async_trait;
use futures::stream::BoxStream;
use std::collections::HashMap;

/// 订阅消息流
///
/// 每条消息为一个字符串负载；流结束表示订阅已断开，需要重新订阅。
pub type Subscription = BoxStream<'static, String>;

/// 变更通道trait
#[async_trait]
pub trait ChangeChannel: Send + Sync {
    /// 向主题发布消息
    ///
    /// # 参数
    /// * `topic` - 主题名
    /// * `payload` - 消息负载
    async fn publish(&self, topic: &str, payload: &str) -> Result<(), ChannelError>;

    /// 订阅主题
    ///
    /// 返回时订阅已经生效，之后发布的消息都会出现在流中。
    async fn subscribe(&self, topic: &str) -> Result<Subscription, ChannelError>;

    /// 读取键下的所有字段，键不存在或已过期时返回空映射
    async fn get_fields(&self, key: &str) -> Result<HashMap<String, String>, ChannelError>;

    /// 写入字段并设置过期时间（秒）
    async fn set_fields(
        &self,
        key: &str,
        fields: &HashMap<String, String>,
        ttl_seconds: u64,
    ) -> Result<(), ChannelError>;
}
