//! 进程内变更通道
//!
//! 单进程部署和测试使用，语义与Redis实现保持一致

use super::{ChangeChannel, Subscription};
use crate::error::ChannelError;
use async_trait::async_trait;
use futures::StreamExt;
use parking_lot::Mutex;
use std::collections::HashMap;
use std::time::{Duration, Instant};
use tokio::sync::broadcast;
use tracing::warn;

/// 每个主题的消息缓冲容量
const TOPIC_CAPACITY: usize = 64;

#[derive(Debug)]
struct ExpiringFields {
    fields: HashMap<String, String>,
    expires_at: Instant,
}

/// 内存消息代理
#[derive(Debug, Default)]
pub struct MemoryChannel {
    topics: Mutex<HashMap<String, broadcast::Sender<String>>>,
    hashes: Mutex<HashMap<String, ExpiringFields>>,
}

impl MemoryChannel {
    pub fn new() -> Self {
        Self::default()
    }

    fn sender(&self, topic: &str) -> broadcast::Sender<String> {
        self.topics
            .lock()
            .entry(topic.to_string())
            .or_insert_with(|| broadcast::channel(TOPIC_CAPACITY).0)
            .clone()
    }

    /// 当前订阅者数量
    pub fn subscriber_count(&self, topic: &str) -> usize {
        self.topics
            .lock()
            .get(topic)
            .map(|sender| sender.receiver_count())
            .unwrap_or(0)
    }
}

#[async_trait]
impl ChangeChannel for MemoryChannel {
    async fn publish(&self, topic: &str, payload: &str) -> Result<(), ChannelError> {
        // 没有订阅者时消息直接丢弃，与PUBLISH一致
        let _ = self.sender(topic).send(payload.to_string());
        Ok(())
    }

    async fn subscribe(&self, topic: &str) -> Result<Subscription, ChannelError> {
        let receiver = self.sender(topic).subscribe();
        let topic = topic.to_string();

        let stream = futures::stream::unfold(receiver, move |mut receiver| {
            let topic = topic.clone();
            async move {
                loop {
                    match receiver.recv().await {
                        Ok(message) => return Some((message, receiver)),
                        Err(broadcast::error::RecvError::Lagged(skipped)) => {
                            warn!(topic = %topic, skipped, "订阅者处理过慢，丢弃部分消息");
                        }
                        Err(broadcast::error::RecvError::Closed) => return None,
                    }
                }
            }
        });

        Ok(stream.boxed())
    }

    async fn get_fields(&self, key: &str) -> Result<HashMap<String, String>, ChannelError> {
        let mut hashes = self.hashes.lock();
        match hashes.get(key) {
            Some(entry) if entry.expires_at > Instant::now() => Ok(entry.fields.clone()),
            Some(_) => {
                hashes.remove(key);
                Ok(HashMap::new())
            }
            None => Ok(HashMap::new()),
        }
    }

    async fn set_fields(
        &self,
        key: &str,
        fields: &HashMap<String, String>,
        ttl_seconds: u64,
    ) -> Result<(), ChannelError> {
        let now = Instant::now();
        let mut hashes = self.hashes.lock();
        let entry = hashes
            .entry(key.to_string())
            .or_insert_with(|| ExpiringFields {
                fields: HashMap::new(),
                expires_at: now,
            });
        if entry.expires_at <= now {
            entry.fields.clear();
        }
        // HSET 语义：合并字段
        entry
            .fields
            .extend(fields.iter().map(|(k, v)| (k.clone(), v.clone())));
        entry.expires_at = now + Duration::from_secs(ttl_seconds);
        Ok(())
    }
}
