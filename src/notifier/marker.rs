//! 变更标记
//!
//! 轮询模式下记录"最近一次变更的键及时间"，每个通知主题只有一个标记，每次更新整体覆盖

use crate::channel::ChangeChannel;
use crate::error::ChannelError;
use std::collections::HashMap;

/// 变更键字段名
pub const FIELD_LAST_CHANGE: &str = "field";
/// 变更时间字段名
pub const FIELD_LAST_CHANGE_TIME: &str = "time_last_changes";

/// 变更标记
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ChangeMarker {
    /// 最近变更的配置键
    pub changed_key: String,
    /// 变更时间（Unix秒）
    pub change_timestamp_unix: i64,
}

impl ChangeMarker {
    pub fn new(changed_key: impl Into<String>, change_timestamp_unix: i64) -> Self {
        Self {
            changed_key: changed_key.into(),
            change_timestamp_unix,
        }
    }

    /// 从哈希字段解析
    ///
    /// 空映射表示标记不存在，返回 `None`。
    pub fn from_fields(fields: &HashMap<String, String>) -> Result<Option<Self>, ChannelError> {
        if fields.is_empty() {
            return Ok(None);
        }

        let changed_key = fields.get(FIELD_LAST_CHANGE).cloned().unwrap_or_default();
        let raw_time = fields
            .get(FIELD_LAST_CHANGE_TIME)
            .map(String::as_str)
            .unwrap_or_default();
        let change_timestamp_unix = raw_time.parse::<i64>().map_err(|e| {
            ChannelError::MalformedMarker(format!("{FIELD_LAST_CHANGE_TIME}={raw_time:?}: {e}"))
        })?;

        Ok(Some(Self {
            changed_key,
            change_timestamp_unix,
        }))
    }

    /// 转换为哈希字段
    pub fn to_fields(&self) -> HashMap<String, String> {
        HashMap::from([
            (FIELD_LAST_CHANGE.to_string(), self.changed_key.clone()),
            (
                FIELD_LAST_CHANGE_TIME.to_string(),
                self.change_timestamp_unix.to_string(),
            ),
        ])
    }

    /// 从通道读取标记
    pub async fn load(
        channel: &dyn ChangeChannel,
        topic: &str,
    ) -> Result<Option<Self>, ChannelError> {
        let fields = channel.get_fields(topic).await?;
        Self::from_fields(&fields)
    }

    /// 覆盖写入标记并设置过期时间
    pub async fn store(
        &self,
        channel: &dyn ChangeChannel,
        topic: &str,
        ttl_seconds: u64,
    ) -> Result<(), ChannelError> {
        channel.set_fields(topic, &self.to_fields(), ttl_seconds).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::channel::MemoryChannel;

    #[test]
    fn test_absent_marker() {
        assert_eq!(ChangeMarker::from_fields(&HashMap::new()).unwrap(), None);
    }

    #[test]
    fn test_malformed_timestamp() {
        let fields = HashMap::from([
            (FIELD_LAST_CHANGE.to_string(), "k".to_string()),
            (FIELD_LAST_CHANGE_TIME.to_string(), "soon".to_string()),
        ]);
        assert!(matches!(
            ChangeMarker::from_fields(&fields),
            Err(ChannelError::MalformedMarker(_))
        ));
    }

    #[tokio::test]
    async fn test_store_and_load() {
        let channel = MemoryChannel::new();
        let marker = ChangeMarker::new("max_age", 1_700_000_000);
        marker.store(&channel, "topic", 300).await.unwrap();

        let loaded = ChangeMarker::load(&channel, "topic").await.unwrap();
        assert_eq!(loaded, Some(marker));

        ChangeMarker::new("other", 1_700_000_100)
            .store(&channel, "topic", 300)
            .await
            .unwrap();
        let loaded = ChangeMarker::load(&channel, "topic").await.unwrap().unwrap();
        assert_eq!(loaded.changed_key, "other");
    }
}
