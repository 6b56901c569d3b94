//! 配置管理器集成测试
//!
//! 用内存存储、内存通道和手动时钟模拟多个进程共享同一份配置

use async_trait::async_trait;
use dbkv_config::channel::Subscription;
use dbkv_config::{
    ChangeChannel, ChannelError, ConfigError, ConfigManager, ConfigStorage, ConfigValue,
    KeyValueInit, ManagerOptions, ManualClock, MemoryChannel, MemoryStorage, NotifierMode,
    SqlStorage, StorageError, TableSchema,
};
use futures::StreamExt;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
struct UserConfig {
    max_age: i32,
    min_age: i32,
    information: Information,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
struct Information {
    has_car: bool,
}

fn push_options() -> ManagerOptions {
    ManagerOptions {
        use_notification_push: true,
        application_name: "AppTestPush".to_string(),
        ..ManagerOptions::default()
    }
}

fn poll_options() -> ManagerOptions {
    ManagerOptions {
        use_notification_push: false,
        application_name: "AppTestPoll".to_string(),
        watch_interval_ms: 20,
        ..ManagerOptions::default()
    }
}

fn registrations() -> Vec<KeyValueInit> {
    vec![
        KeyValueInit::new("max_age", 0),
        KeyValueInit::new("name", ""),
        KeyValueInit::new("enabled", false),
    ]
}

fn shared_storage() -> Arc<MemoryStorage> {
    Arc::new(MemoryStorage::with_values([
        ("max_age", "42"),
        ("name", "svc"),
        ("enabled", "true"),
    ]))
}

async fn create_manager(
    storage: Arc<MemoryStorage>,
    channel: Arc<dyn ChangeChannel>,
    clock: Arc<ManualClock>,
    options: ManagerOptions,
) -> ConfigManager {
    ConfigManager::with_clock(registrations(), storage, channel, options, clock)
        .await
        .expect("manager should initialize")
}

/// 等待条件成立，最多约2秒
async fn wait_until(condition: impl Fn() -> bool) -> bool {
    for _ in 0..200 {
        if condition() {
            return true;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    condition()
}

#[tokio::test]
async fn test_initialization_loads_stored_values() {
    let clock = Arc::new(ManualClock::new(1_000));
    let manager = create_manager(
        shared_storage(),
        Arc::new(MemoryChannel::new()),
        clock,
        push_options(),
    )
    .await;

    assert_eq!(manager.get_config("max_age").unwrap(), ConfigValue::Int(42));
    assert_eq!(manager.get_str("name").unwrap(), "svc");
    assert!(manager.get_bool("enabled").unwrap());
    assert_eq!(manager.last_reload_unix(), 1_000);
    assert_eq!(manager.mode(), NotifierMode::Push);
    assert_eq!(manager.keys(), vec!["enabled", "max_age", "name"]);

    manager.shutdown().await;
}

#[tokio::test]
async fn test_get_unregistered_key() {
    let manager = create_manager(
        shared_storage(),
        Arc::new(MemoryChannel::new()),
        Arc::new(ManualClock::new(1_000)),
        poll_options(),
    )
    .await;

    let err = manager.get_config("unknown").unwrap_err();
    assert!(matches!(err, ConfigError::ConfigNotFound { ref key } if key == "unknown"));
    assert!(manager.reload_config("unknown").await.unwrap_err().is_not_found());

    manager.shutdown().await;
}

#[tokio::test]
async fn test_initialization_fails_when_key_missing_from_storage() {
    let storage = Arc::new(MemoryStorage::with_values([("max_age", "42")]));
    let result = ConfigManager::with_clock(
        registrations(),
        storage,
        Arc::new(MemoryChannel::new()),
        push_options(),
        Arc::new(ManualClock::new(1_000)),
    )
    .await;

    match result {
        Err(ConfigError::Init { key, source }) => {
            assert_ne!(key, "max_age");
            assert!(matches!(
                *source,
                ConfigError::Storage(StorageError::NotFound { .. })
            ));
        }
        Err(other) => panic!("unexpected error: {other}"),
        Ok(_) => panic!("initialization should fail"),
    }
}

#[tokio::test]
async fn test_initialization_fails_on_unparsable_value() {
    let storage = Arc::new(MemoryStorage::with_values([
        ("max_age", "forty-two"),
        ("name", "svc"),
        ("enabled", "true"),
    ]));
    let result = ConfigManager::with_clock(
        registrations(),
        storage,
        Arc::new(MemoryChannel::new()),
        poll_options(),
        Arc::new(ManualClock::new(1_000)),
    )
    .await;

    assert!(matches!(
        result,
        Err(ConfigError::Init { ref key, .. }) if key == "max_age"
    ));
}

#[tokio::test]
async fn test_invalid_table_name_rejected() {
    let options = ManagerOptions {
        table_name: "config; DROP TABLE x".to_string(),
        ..push_options()
    };
    let result = ConfigManager::with_clock(
        registrations(),
        shared_storage(),
        Arc::new(MemoryChannel::new()),
        options,
        Arc::new(ManualClock::new(1_000)),
    )
    .await;
    assert!(matches!(result, Err(ConfigError::InvalidOptions(_))));
}

#[tokio::test]
async fn test_push_update_propagates_to_all_processes() {
    let storage = shared_storage();
    let channel: Arc<dyn ChangeChannel> = Arc::new(MemoryChannel::new());
    let clock = Arc::new(ManualClock::new(1_000));

    let writer = create_manager(storage.clone(), channel.clone(), clock.clone(), push_options()).await;
    let reader = create_manager(storage.clone(), channel.clone(), clock.clone(), push_options()).await;

    clock.advance(10);
    writer.update_config("max_age", "50").await.unwrap();
    assert_eq!(storage.raw("max_age").as_deref(), Some("50"));

    // 写入方自己的值也由监听任务刷新
    assert!(wait_until(|| reader.get_int("max_age").ok() == Some(50)).await);
    assert!(wait_until(|| writer.get_int("max_age").ok() == Some(50)).await);
    assert!(wait_until(|| writer.last_reload_unix() == 1_010).await);

    writer.shutdown().await;
    reader.shutdown().await;
}

#[tokio::test]
async fn test_push_rate_limit_after_reload() {
    let storage = shared_storage();
    let clock = Arc::new(ManualClock::new(1_000));
    let manager = create_manager(
        storage.clone(),
        Arc::new(MemoryChannel::new()),
        clock.clone(),
        push_options(),
    )
    .await;

    // 初始化加载后5秒内拒绝更新
    clock.advance(4);
    let err = manager.update_config("max_age", "43").await.unwrap_err();
    assert!(err.is_too_fast());
    assert_eq!(err.to_string(), "UpdateConfigIsTooFast");
    assert_eq!(storage.raw("max_age").as_deref(), Some("42"));

    clock.advance(1);
    manager.update_config("max_age", "43").await.unwrap();
    assert!(wait_until(|| manager.last_reload_unix() == 1_005).await);

    // 回显重载刷新了限流窗口
    assert!(manager
        .update_config("max_age", "44")
        .await
        .unwrap_err()
        .is_too_fast());
    clock.advance(5);
    manager.update_config("max_age", "44").await.unwrap();
    assert!(wait_until(|| manager.get_int("max_age").ok() == Some(44)).await);

    manager.shutdown().await;
}

#[tokio::test]
async fn test_push_ignores_empty_payload() {
    let channel = Arc::new(MemoryChannel::new());
    let clock = Arc::new(ManualClock::new(1_000));
    let manager = create_manager(
        shared_storage(),
        channel.clone(),
        clock.clone(),
        push_options(),
    )
    .await;

    clock.advance(30);
    channel.publish("dbkvconfiglistener", "").await.unwrap();
    tokio::time::sleep(Duration::from_millis(50)).await;
    assert_eq!(manager.last_reload_unix(), 1_000);

    // 监听循环仍然存活
    channel
        .publish("dbkvconfiglistener", "max_age")
        .await
        .unwrap();
    assert!(wait_until(|| manager.last_reload_unix() == 1_030).await);

    manager.shutdown().await;
}

#[tokio::test]
async fn test_push_reload_failure_keeps_previous_value() {
    let storage = shared_storage();
    let channel = Arc::new(MemoryChannel::new());
    let clock = Arc::new(ManualClock::new(1_000));
    let manager = create_manager(storage.clone(), channel.clone(), clock.clone(), push_options()).await;

    // 其他进程绕过校验写入了非法值
    storage.update_value("max_age", "oops").await.unwrap();
    clock.advance(10);
    channel
        .publish("dbkvconfiglistener", "max_age")
        .await
        .unwrap();
    channel.publish("dbkvconfiglistener", "name").await.unwrap();

    assert!(wait_until(|| manager.last_reload_unix() == 1_010).await);
    assert_eq!(manager.get_int("max_age").unwrap(), 42);

    manager.shutdown().await;
}

#[tokio::test]
async fn test_update_with_unparsable_value_has_no_side_effects() {
    let storage = shared_storage();
    let channel = Arc::new(MemoryChannel::new());
    let mut subscription = channel.subscribe("dbkvconfiglistener").await.unwrap();
    let clock = Arc::new(ManualClock::new(1_000));
    let manager = create_manager(storage.clone(), channel.clone(), clock.clone(), push_options()).await;

    clock.advance(10);
    let err = manager
        .update_config("max_age", "not_a_number")
        .await
        .unwrap_err();
    assert!(matches!(err, ConfigError::Parse { .. }));
    assert_eq!(manager.get_int("max_age").unwrap(), 42);
    assert_eq!(storage.raw("max_age").as_deref(), Some("42"));

    let err = manager.update_config("enabled", "yes").await.unwrap_err();
    assert!(matches!(err, ConfigError::Parse { .. }));

    // 没有发出任何通知
    let next = tokio::time::timeout(Duration::from_millis(50), subscription.next()).await;
    assert!(next.is_err());

    manager.shutdown().await;
}

#[tokio::test]
async fn test_poll_update_propagates_and_rate_limits() {
    let storage = shared_storage();
    let channel: Arc<dyn ChangeChannel> = Arc::new(MemoryChannel::new());
    let clock = Arc::new(ManualClock::new(1_000));

    let writer = create_manager(storage.clone(), channel.clone(), clock.clone(), poll_options()).await;
    let reader = create_manager(storage.clone(), channel.clone(), clock.clone(), poll_options()).await;
    assert_eq!(writer.mode(), NotifierMode::Poll);

    // 没有变更标记时可以立即更新
    writer.update_config("name", "renamed").await.unwrap();

    let marker = channel.get_fields("dbkvconfiglistener").await.unwrap();
    assert_eq!(marker.get("field").map(String::as_str), Some("name"));
    assert_eq!(
        marker.get("time_last_changes").map(String::as_str),
        Some("1000")
    );

    // 标记时间等于最近重载时间，仍会触发重载
    assert!(wait_until(|| reader.get_str("name").ok().as_deref() == Some("renamed")).await);
    assert!(wait_until(|| writer.get_str("name").ok().as_deref() == Some("renamed")).await);

    // 窗口 = ceil(20ms) + 5 = 6 秒
    clock.advance(5);
    assert!(writer
        .update_config("name", "again")
        .await
        .unwrap_err()
        .is_too_fast());
    clock.advance(1);
    writer.update_config("name", "again").await.unwrap();
    assert!(wait_until(|| reader.get_str("name").ok().as_deref() == Some("again")).await);

    writer.shutdown().await;
    reader.shutdown().await;
}

#[tokio::test]
async fn test_poll_ignores_stale_marker() {
    let storage = shared_storage();
    let channel: Arc<dyn ChangeChannel> = Arc::new(MemoryChannel::new());
    let mut fields = HashMap::new();
    fields.insert("field".to_string(), "max_age".to_string());
    fields.insert("time_last_changes".to_string(), "900".to_string());
    channel
        .set_fields("dbkvconfiglistener", &fields, 300)
        .await
        .unwrap();

    let clock = Arc::new(ManualClock::new(1_000));
    let manager = create_manager(storage.clone(), channel.clone(), clock.clone(), poll_options()).await;

    clock.advance(10);
    tokio::time::sleep(Duration::from_millis(100)).await;
    assert_eq!(manager.last_reload_unix(), 1_000);

    manager.shutdown().await;
}

#[tokio::test]
async fn test_insert_only_writes_storage() {
    let storage = shared_storage();
    let channel = Arc::new(MemoryChannel::new());
    let mut subscription = channel.subscribe("dbkvconfiglistener").await.unwrap();
    let manager = create_manager(
        storage.clone(),
        channel.clone(),
        Arc::new(ManualClock::new(1_000)),
        push_options(),
    )
    .await;

    // 插入不受限流约束
    manager.insert_config("timeout", "30").await.unwrap();
    assert_eq!(storage.raw("timeout").as_deref(), Some("30"));
    assert!(manager.get_config("timeout").unwrap_err().is_not_found());

    let err = manager.insert_config("max_age", "1").await.unwrap_err();
    assert!(matches!(
        err,
        ConfigError::Storage(StorageError::Duplicate { .. })
    ));

    let next = tokio::time::timeout(Duration::from_millis(50), subscription.next()).await;
    assert!(next.is_err());

    manager.shutdown().await;
}

#[tokio::test]
async fn test_document_values() {
    let storage = Arc::new(MemoryStorage::with_values([(
        "key1",
        r#"{"max_age":60,"min_age":18,"information":{"has_car":true}}"#,
    )]));
    let clock = Arc::new(ManualClock::new(1_000));
    let manager = ConfigManager::with_clock(
        vec![KeyValueInit::document("key1", UserConfig::default()).unwrap()],
        storage.clone(),
        Arc::new(MemoryChannel::new()),
        push_options(),
        clock.clone(),
    )
    .await
    .unwrap();

    let user = manager.get_document::<UserConfig>("key1").unwrap();
    assert_eq!(user.max_age, 60);
    assert!(user.information.has_car);

    clock.advance(10);
    let err = manager.update_config("key1", "{not json").await.unwrap_err();
    assert!(matches!(err, ConfigError::Parse { .. }));

    manager
        .update_config(
            "key1",
            r#"{"max_age":70,"min_age":21,"information":{"has_car":false}}"#,
        )
        .await
        .unwrap();
    assert!(wait_until(|| {
        manager
            .get_document::<UserConfig>("key1")
            .map(|user| user.max_age == 70)
            .unwrap_or(false)
    })
    .await);

    // 之前取得的文档不受重载影响
    assert_eq!(user.max_age, 60);

    manager.shutdown().await;
}

/// 发布总是失败的通道
struct BrokenChannel;

#[async_trait]
impl ChangeChannel for BrokenChannel {
    async fn publish(&self, _topic: &str, _payload: &str) -> Result<(), ChannelError> {
        Err(ChannelError::Broker("connection reset".to_string()))
    }

    async fn subscribe(&self, _topic: &str) -> Result<Subscription, ChannelError> {
        Ok(futures::stream::pending::<String>().boxed())
    }

    async fn get_fields(&self, _key: &str) -> Result<HashMap<String, String>, ChannelError> {
        Ok(HashMap::new())
    }

    async fn set_fields(
        &self,
        _key: &str,
        _fields: &HashMap<String, String>,
        _ttl_seconds: u64,
    ) -> Result<(), ChannelError> {
        Err(ChannelError::Broker("connection reset".to_string()))
    }
}

#[tokio::test]
async fn test_failed_notification_keeps_storage_write() {
    let storage = shared_storage();
    let clock = Arc::new(ManualClock::new(1_000));
    let manager = create_manager(
        storage.clone(),
        Arc::new(BrokenChannel),
        clock.clone(),
        push_options(),
    )
    .await;

    clock.advance(10);
    let err = manager.update_config("max_age", "77").await.unwrap_err();
    assert!(matches!(err, ConfigError::Channel(ChannelError::Broker(_))));

    // 写库不回滚，内存值等待下一次重载
    assert_eq!(storage.raw("max_age").as_deref(), Some("77"));
    assert_eq!(manager.get_int("max_age").unwrap(), 42);
    manager.reload_config("max_age").await.unwrap();
    assert_eq!(manager.get_int("max_age").unwrap(), 77);

    manager.shutdown().await;
}

#[tokio::test]
async fn test_push_subscribe_failure_is_fatal() {
    struct NoSubscribe;

    #[async_trait]
    impl ChangeChannel for NoSubscribe {
        async fn publish(&self, _topic: &str, _payload: &str) -> Result<(), ChannelError> {
            Ok(())
        }
        async fn subscribe(&self, _topic: &str) -> Result<Subscription, ChannelError> {
            Err(ChannelError::Broker("subscribe refused".to_string()))
        }
        async fn get_fields(&self, _key: &str) -> Result<HashMap<String, String>, ChannelError> {
            Ok(HashMap::new())
        }
        async fn set_fields(
            &self,
            _key: &str,
            _fields: &HashMap<String, String>,
            _ttl_seconds: u64,
        ) -> Result<(), ChannelError> {
            Ok(())
        }
    }

    let result = ConfigManager::with_clock(
        registrations(),
        shared_storage(),
        Arc::new(NoSubscribe),
        push_options(),
        Arc::new(ManualClock::new(1_000)),
    )
    .await;
    assert!(matches!(result, Err(ConfigError::Channel(_))));
}

#[tokio::test]
async fn test_shutdown_stops_watcher() {
    let channel = Arc::new(MemoryChannel::new());
    let manager = create_manager(
        shared_storage(),
        channel.clone(),
        Arc::new(ManualClock::new(1_000)),
        push_options(),
    )
    .await;
    assert_eq!(channel.subscriber_count("dbkvconfiglistener"), 1);
    assert!(manager.is_watching());

    manager.shutdown().await;
    assert!(!manager.is_watching());
    assert_eq!(channel.subscriber_count("dbkvconfiglistener"), 0);
}

#[tokio::test]
async fn test_drop_signals_watcher() {
    let channel = Arc::new(MemoryChannel::new());
    let manager = create_manager(
        shared_storage(),
        channel.clone(),
        Arc::new(ManualClock::new(1_000)),
        push_options(),
    )
    .await;
    drop(manager);
    assert!(wait_until(|| channel.subscriber_count("dbkvconfiglistener") == 0).await);
}

#[tokio::test]
async fn test_sqlite_backed_manager() {
    let pool = sqlx::sqlite::SqlitePoolOptions::new()
        .max_connections(1)
        .connect("sqlite::memory:")
        .await
        .unwrap();
    sqlx::query("CREATE TABLE config_kv (key TEXT PRIMARY KEY, value TEXT)")
        .execute(&pool)
        .await
        .unwrap();
    sqlx::query("INSERT INTO config_kv (key, value) VALUES ('max_age', '42'), ('name', NULL), ('enabled', 'false')")
        .execute(&pool)
        .await
        .unwrap();

    let storage: Arc<dyn ConfigStorage> =
        Arc::new(SqlStorage::new(pool.clone(), &TableSchema::default()).unwrap());
    let clock = Arc::new(ManualClock::new(1_000));
    let manager = ConfigManager::with_clock(
        registrations(),
        storage,
        Arc::new(MemoryChannel::new()),
        push_options(),
        clock.clone(),
    )
    .await
    .unwrap();

    assert_eq!(manager.get_int("max_age").unwrap(), 42);
    // NULL 按空字符串读取
    assert_eq!(manager.get_str("name").unwrap(), "");

    clock.advance(10);
    manager.update_config("max_age", "50").await.unwrap();
    assert!(wait_until(|| manager.get_int("max_age").ok() == Some(50)).await);

    let stored: (String,) = sqlx::query_as("SELECT value FROM config_kv WHERE key = 'max_age'")
        .fetch_one(&pool)
        .await
        .unwrap();
    assert_eq!(stored.0, "50");

    manager.shutdown().await;
}
