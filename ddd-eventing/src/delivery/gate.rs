//! 投递门控（Gate）
//!
//! 任务被取出后、监听器执行前按顺序经过的检查：
//! 1. `RateLimiter`：按事件名的粗粒度限流（默认 60s 窗口）；
//! 2. `Throttle`：按事件名 + 业务实体的细粒度节流（默认 1s 窗口）。
//!
//! 任一门控返回 `Release` 时，任务按给定延迟放回队列，本轮不执行监听器。
//! 计数存储不可用时两个门控都放行（fail open），只记录告警。
//!
//! 计数先读后增，增后复核：并发的工作者可能同时读到未超限的计数，
//! 但只有自增结果不超过上限的那些会被放行，其余按剩余窗口放回。
//! 输掉竞争的尝试仍占一次计数，窗口内计数可能略高于实际放行次数。
//!
use super::counter::CounterStore;
use super::job::DeliveryJob;
use crate::config::DeliveryConfig;
use crate::error::EventResult;
use crate::event::Event;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::sync::Arc;
use std::time::Duration;
use tracing::warn;

/// 门控结论
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GateDecision {
    Pass,
    Release(Duration),
}

#[async_trait]
pub trait Gate: Send + Sync {
    fn name(&self) -> &str;

    /// `now` 为工作者时钟的当前时间
    async fn check(&self, job: &DeliveryJob, now: DateTime<Utc>) -> GateDecision;
}

/// 占用一个计数名额；超限时返回需要等待的时长
async fn take_slot(
    store: &dyn CounterStore,
    key: &str,
    limit: u64,
    decay: Duration,
) -> EventResult<Option<Duration>> {
    if store.hits(key).await? >= limit {
        return Ok(Some(store.available_in(key).await.unwrap_or(decay)));
    }
    if store.increment(key, decay).await? > limit {
        return Ok(Some(store.available_in(key).await.unwrap_or(decay)));
    }
    Ok(None)
}

/// 标准门控链：限流 → 节流
pub fn standard_gates(store: Arc<dyn CounterStore>, config: &DeliveryConfig) -> Vec<Arc<dyn Gate>> {
    vec![
        Arc::new(RateLimiter::new(store.clone(), config.rate_limit_decay)),
        Arc::new(Throttle::new(store, config.throttle_window)),
    ]
}

/// 按事件名限流：上限由任务分层决定
pub struct RateLimiter {
    store: Arc<dyn CounterStore>,
    decay: Duration,
}

impl RateLimiter {
    pub fn new(store: Arc<dyn CounterStore>, decay: Duration) -> Self {
        Self { store, decay }
    }

    pub fn key_for(event: &Event) -> String {
        format!("events:rate:{}", event.name())
    }
}

#[async_trait]
impl Gate for RateLimiter {
    fn name(&self) -> &str {
        "rate_limiter"
    }

    async fn check(&self, job: &DeliveryJob, _now: DateTime<Utc>) -> GateDecision {
        let key = Self::key_for(job.event());
        match take_slot(self.store.as_ref(), &key, job.tier().rate_limit(), self.decay).await {
            Ok(None) => GateDecision::Pass,
            Ok(Some(delay)) => GateDecision::Release(delay),
            Err(e) => {
                warn!(key = %key, error = %e, "rate limiter store unavailable, letting job through");
                GateDecision::Pass
            }
        }
    }
}

/// 按事件名 + 业务实体（用户/商品）节流，避免集中冲击单个实体
pub struct Throttle {
    store: Arc<dyn CounterStore>,
    window: Duration,
}

impl Throttle {
    pub fn new(store: Arc<dyn CounterStore>, window: Duration) -> Self {
        Self { store, window }
    }

    pub fn key_for(event: &Event) -> String {
        let mut key = format!("events:throttle:{}", event.name());
        if let Some(user_id) = event.payload_str("user_id") {
            key.push_str(":user:");
            key.push_str(user_id);
        } else if let Some(product_id) = event.payload_str("product_id") {
            key.push_str(":product:");
            key.push_str(product_id);
        }
        key
    }
}

#[async_trait]
impl Gate for Throttle {
    fn name(&self) -> &str {
        "throttle"
    }

    async fn check(&self, job: &DeliveryJob, now: DateTime<Utc>) -> GateDecision {
        let key = Self::key_for(job.event());
        match take_slot(self.store.as_ref(), &key, job.tier().throttle_limit(), self.window).await {
            Ok(None) => GateDecision::Pass,
            Ok(Some(delay)) => {
                warn!(
                    job = "DeliveryJob",
                    key = %key,
                    event_id = job.event().id(),
                    delay = ?delay,
                    at = %now,
                    "delivery throttled"
                );
                GateDecision::Release(delay)
            }
            Err(e) => {
                warn!(key = %key, error = %e, "throttle store unavailable, letting job through");
                GateDecision::Pass
            }
        }
    }
}
