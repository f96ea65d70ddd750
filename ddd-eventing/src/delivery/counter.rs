//! 计数存储（CounterStore）
//!
//! 限流与节流门控依赖外部键值存储提供的"原子递增 + 按键过期"语义。
//! 内存版在读到过期键时就地删除，并在递增时按 `SWEEP_INTERVAL` 批量清理，
//! 键的数量随活跃实体而非历史实体增长。
//!
use crate::clock::{Clock, to_delta, until};
use crate::error::EventResult;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use dashmap::DashMap;
use std::sync::{Arc, Mutex};
use std::time::Duration;

#[async_trait]
pub trait CounterStore: Send + Sync {
    /// 当前窗口内的计数；键不存在或已过期时为 0
    async fn hits(&self, key: &str) -> EventResult<u64>;

    /// 原子递增并返回新值；键不存在或已过期时以 `decay` 为有效期重新开始
    async fn increment(&self, key: &str, decay: Duration) -> EventResult<u64>;

    /// 键剩余有效期；键不存在或已过期时为零
    async fn available_in(&self, key: &str) -> EventResult<Duration>;
}

#[derive(Debug, Clone, Copy)]
struct Counter {
    hits: u64,
    expires_at: DateTime<Utc>,
}

/// 两次批量清理的最小间隔
pub const SWEEP_INTERVAL: Duration = Duration::from_secs(60);

/// 内存版计数存储
pub struct InMemoryCounterStore {
    counters: DashMap<String, Counter>,
    last_sweep: Mutex<DateTime<Utc>>,
    clock: Arc<dyn Clock>,
}

impl InMemoryCounterStore {
    pub fn new(clock: Arc<dyn Clock>) -> Self {
        Self {
            counters: DashMap::new(),
            last_sweep: Mutex::new(clock.now()),
            clock,
        }
    }

    /// 当前保存的键数量（含尚未清理的过期键）
    pub fn len(&self) -> usize {
        self.counters.len()
    }

    pub fn is_empty(&self) -> bool {
        self.counters.is_empty()
    }

    fn live(&self, key: &str) -> Option<Counter> {
        let now = self.clock.now();
        let counter = self.counters.get(key).map(|c| *c.value())?;
        if counter.expires_at > now {
            return Some(counter);
        }
        self.counters.remove_if(key, |_, c| c.expires_at <= now);
        None
    }

    fn sweep(&self, now: DateTime<Utc>) {
        {
            let mut last = self.last_sweep.lock().unwrap_or_else(|e| e.into_inner());
            if now - *last < to_delta(SWEEP_INTERVAL) {
                return;
            }
            *last = now;
        }
        self.counters.retain(|_, c| c.expires_at > now);
    }
}

#[async_trait]
impl CounterStore for InMemoryCounterStore {
    async fn hits(&self, key: &str) -> EventResult<u64> {
        Ok(self.live(key).map_or(0, |c| c.hits))
    }

    async fn increment(&self, key: &str, decay: Duration) -> EventResult<u64> {
        let now = self.clock.now();
        self.sweep(now);
        let fresh = Counter {
            hits: 0,
            expires_at: now + to_delta(decay),
        };

        let mut counter = self.counters.entry(key.to_string()).or_insert(fresh);
        if counter.expires_at <= now {
            *counter = fresh;
        }
        counter.hits += 1;
        Ok(counter.hits)
    }

    async fn available_in(&self, key: &str) -> EventResult<Duration> {
        let now = self.clock.now();
        Ok(self
            .live(key)
            .map_or(Duration::ZERO, |c| until(now, c.expires_at)))
    }
}
