//! Redis变更通道
//!
//! PUBLISH/SUBSCRIBE 传播推送通知，HSET + EXPIRE 保存轮询模式的变更标记

use super::{ChangeChannel, Subscription};
use crate::error::ChannelError;
use async_trait::async_trait;
use futures::StreamExt;
use redis::aio::MultiplexedConnection;
use redis::AsyncCommands;
use std::collections::HashMap;
use tracing::{info, warn};

/// Redis消息代理
#[derive(Clone)]
pub struct RedisChannel {
    client: redis::Client,
    conn: MultiplexedConnection,
}

impl RedisChannel {
    /// 连接Redis
    ///
    /// # 参数
    /// * `url` - 形如 `redis://127.0.0.1:6379` 的连接串
    pub async fn connect(url: &str) -> Result<Self, ChannelError> {
        let client = redis::Client::open(url)?;
        let conn = client.get_multiplexed_async_connection().await?;
        info!(url = %url, "Redis连接成功");
        Ok(Self { client, conn })
    }
}

#[async_trait]
impl ChangeChannel for RedisChannel {
    async fn publish(&self, topic: &str, payload: &str) -> Result<(), ChannelError> {
        let mut conn = self.conn.clone();
        let _receivers: i64 = conn.publish(topic, payload).await?;
        Ok(())
    }

    async fn subscribe(&self, topic: &str) -> Result<Subscription, ChannelError> {
        let mut pubsub = self.client.get_async_pubsub().await?;
        pubsub.subscribe(topic).await?;

        let stream = pubsub.into_on_message().filter_map(|message| async move {
            match message.get_payload::<String>() {
                Ok(payload) => Some(payload),
                Err(e) => {
                    warn!(error = %e, "无法解析订阅消息负载");
                    None
                }
            }
        });
        Ok(stream.boxed())
    }

    async fn get_fields(&self, key: &str) -> Result<HashMap<String, String>, ChannelError> {
        let mut conn = self.conn.clone();
        let fields: HashMap<String, String> = conn.hgetall(key).await?;
        Ok(fields)
    }

    async fn set_fields(
        &self,
        key: &str,
        fields: &HashMap<String, String>,
        ttl_seconds: u64,
    ) -> Result<(), ChannelError> {
        let mut conn = self.conn.clone();
        let pairs: Vec<(&str, &str)> = fields
            .iter()
            .map(|(k, v)| (k.as_str(), v.as_str()))
            .collect();
        let ttl = i64::try_from(ttl_seconds)
            .map_err(|_| ChannelError::Broker(format!("过期时间过大: {ttl_seconds}")))?;

        let _: () = redis::pipe()
            .atomic()
            .hset_multiple(key, &pairs)
            .ignore()
            .expire(key, ttl)
            .ignore()
            .query_async(&mut conn)
            .await?;
        Ok(())
    }
}
