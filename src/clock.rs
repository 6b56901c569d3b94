//! 时钟模块
//!
//! 提供可注入的墙上时钟，限流与过期判断都以Unix秒为单位

use std::sync::atomic::{AtomicI64, Ordering};

/// 可注入的时钟
///
/// 生产环境使用 [`SystemClock`]，测试中使用 [`ManualClock`] 手动推进时间。
pub trait Clock: Send + Sync + 'static {
    /// 返回当前Unix时间戳（秒）
    fn now_unix(&self) -> i64;
}

/// 系统时钟
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now_unix(&self) -> i64 {
        chrono::Utc::now().timestamp()
    }
}

/// 手动时钟
#[derive(Debug, Default)]
pub struct ManualClock {
    now: AtomicI64,
}

impl ManualClock {
    /// 创建指定起始时间的手动时钟
    pub fn new(start_unix: i64) -> Self {
        Self {
            now: AtomicI64::new(start_unix),
        }
    }

    /// 设置当前时间
    pub fn set(&self, unix: i64) {
        self.now.store(unix, Ordering::SeqCst);
    }

    /// 推进时间
    pub fn advance(&self, secs: i64) {
        self.now.fetch_add(secs, Ordering::SeqCst);
    }
}

impl Clock for ManualClock {
    fn now_unix(&self) -> i64 {
        self.now.load(Ordering::SeqCst)
    }
}
