use crate::clock::to_delta;
use crate::config::DeliveryConfig;
use crate::event::Event;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::time::Duration;
use uuid::Uuid;

/// 投递任务 ID 的 UUIDv5 命名空间
const JOB_NAMESPACE: Uuid = Uuid::from_u128(0x6f1c_2a4e_93b7_4d05_a8e2_51c0_d7f3_9b16);

/// 队列分层（仅影响调度顺序）
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum QueueTier {
    High,
    Medium,
    Low,
}

impl QueueTier {
    /// 由事件优先级选择分层：≥10 高，≥5 中，其余低
    pub fn from_priority(priority: i32) -> Self {
        match priority {
            p if p >= 10 => Self::High,
            p if p >= 5 => Self::Medium,
            _ => Self::Low,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::High => "events-high",
            Self::Medium => "events-medium",
            Self::Low => "events-low",
        }
    }

    /// 限流：每个衰减窗口（默认 60s）允许的次数
    pub fn rate_limit(&self) -> u64 {
        match self {
            Self::High => 1000,
            Self::Medium => 500,
            Self::Low => 100,
        }
    }

    /// 节流：每个节流窗口（默认 1s）允许的次数
    pub fn throttle_limit(&self) -> u64 {
        match self {
            Self::High => 10,
            Self::Medium => 5,
            Self::Low => 2,
        }
    }

    pub(crate) const ORDERED: [QueueTier; 3] = [Self::High, Self::Medium, Self::Low];

    pub(crate) fn index(&self) -> usize {
        match self {
            Self::High => 0,
            Self::Medium => 1,
            Self::Low => 2,
        }
    }
}

/// 投递任务状态机：`Queued → Running → {Succeeded | Released → Queued | DeadLettered}`
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum JobState {
    Queued,
    Running,
    Succeeded,
    Released { delay: Duration },
    DeadLettered,
}

/// 投递任务：携带一个事件与重试控制属性
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DeliveryJob {
    job_id: Uuid,
    event: Event,
    tries: u32,
    max_tries: u32,
    timeout: Duration,
    retry_after: Duration,
    tier: QueueTier,
    created_at: DateTime<Utc>,
    retry_until: DateTime<Utc>,
}

impl DeliveryJob {
    pub fn new(event: Event, config: &DeliveryConfig, now: DateTime<Utc>) -> Self {
        Self {
            job_id: Self::id_for(&event),
            tier: QueueTier::from_priority(event.priority()),
            event,
            tries: 0,
            max_tries: config.max_tries,
            timeout: config.timeout,
            retry_after: config.retry_after,
            created_at: now,
            retry_until: now + to_delta(config.retry_ceiling),
        }
    }

    /// 由事件 ID 确定性派生的任务 ID（幂等键）
    pub fn id_for(event: &Event) -> Uuid {
        Uuid::new_v5(&JOB_NAMESPACE, event.id().as_bytes())
    }

    pub fn job_id(&self) -> Uuid {
        self.job_id
    }

    pub fn event(&self) -> &Event {
        &self.event
    }

    pub fn tries(&self) -> u32 {
        self.tries
    }

    pub fn max_tries(&self) -> u32 {
        self.max_tries
    }

    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    pub fn retry_after(&self) -> Duration {
        self.retry_after
    }

    pub fn tier(&self) -> QueueTier {
        self.tier
    }

    pub fn created_at(&self) -> DateTime<Utc> {
        self.created_at
    }

    pub fn retry_until(&self) -> DateTime<Utc> {
        self.retry_until
    }

    pub(crate) fn begin_attempt(&mut self) {
        self.tries += 1;
    }

    pub fn has_attempts_left(&self) -> bool {
        self.tries < self.max_tries
    }

    pub fn past_deadline(&self, now: DateTime<Utc>) -> bool {
        now >= self.retry_until
    }
}
