//! 请求限流：按 key 记录请求时间，滑动窗口判定是否放行
//!
//! 检查与记录拆成两次调用，由调用方决定哪些请求计入限额（例如只有失败的登录才计数）。

use crate::clock::Clock;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Mutex;

/// 限流能力。分布式部署时可替换为共享存储实现。
#[async_trait]
pub trait RequestThrottle: Send + Sync {
    /// 返回是否允许当前请求（不记录）。
    async fn admit(&self, key: &str, max_requests: usize, period: Duration) -> bool;

    /// 记录一次请求（不检查限制）。
    async fn record(&self, key: &str);
}

/// 进程内滑动窗口限流器，重启后状态清空。
#[derive(Debug)]
pub struct MemoryThrottle {
    clock: Arc<dyn Clock>,
    buckets: Mutex<HashMap<String, Vec<DateTime<Utc>>>>,
    /// 全量清理时保留的最长窗口
    retention: Duration,
    sweep_threshold: usize,
}

impl MemoryThrottle {
    pub fn new(clock: Arc<dyn Clock>, retention: Duration) -> Self {
        Self {
            clock,
            buckets: Mutex::new(HashMap::new()),
            retention,
            sweep_threshold: 1024,
        }
    }

    /// 当前 key 在窗口内的记录数
    pub async fn count(&self, key: &str, period: Duration) -> usize {
        let cutoff = self.cutoff(period);
        let buckets = self.buckets.lock().await;
        buckets
            .get(key)
            .map(|times| times.iter().filter(|t| **t >= cutoff).count())
            .unwrap_or(0)
    }

    fn cutoff(&self, period: Duration) -> DateTime<Utc> {
        let period = chrono::Duration::from_std(period).unwrap_or(chrono::Duration::MAX);
        self.clock
            .now()
            .checked_sub_signed(period)
            .unwrap_or(DateTime::<Utc>::MIN_UTC)
    }
}

#[async_trait]
impl RequestThrottle for MemoryThrottle {
    async fn admit(&self, key: &str, max_requests: usize, period: Duration) -> bool {
        let cutoff = self.cutoff(period);
        let mut buckets = self.buckets.lock().await;
        let Some(entry) = buckets.get_mut(key) else {
            return true;
        };
        entry.retain(|t| *t >= cutoff);
        let allowed = entry.len() < max_requests;
        // 清理空桶，避免无限增长
        if entry.is_empty() {
            buckets.remove(key);
        }
        allowed
    }

    async fn record(&self, key: &str) {
        let now = self.clock.now();
        let mut buckets = self.buckets.lock().await;
        buckets.entry(key.to_string()).or_default().push(now);
        // 当 bucket 过多时触发全量清理
        if buckets.len() > self.sweep_threshold {
            let cutoff = self.cutoff(self.retention);
            buckets.retain(|_, times| {
                times.retain(|t| *t >= cutoff);
                !times.is_empty()
            });
        }
    }
}
