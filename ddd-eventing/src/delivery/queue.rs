//! 投递队列（DeliveryQueue）协议与内存实现
//!
//! 外部队列需支持：分层命名队列、带延迟的重新投递、尝试计数与按任务 ID 去重。
//!
use super::job::{DeliveryJob, JobState, QueueTier};
use crate::clock::{Clock, to_delta};
use crate::error::EventResult;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::collections::{HashSet, VecDeque};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use uuid::Uuid;

/// 投递队列
#[async_trait]
pub trait DeliveryQueue: Send + Sync {
    /// 入队；同一任务 ID 仍在排队或执行中时返回 `false`（去重）
    async fn enqueue(&self, job: DeliveryJob) -> EventResult<bool>;

    /// 取出一个已到期的任务（按高 → 中 → 低分层）
    async fn reserve(&self) -> EventResult<Option<DeliveryJob>>;

    /// 将已取出的任务延迟 `delay` 后重新放回队列
    async fn release(&self, job: DeliveryJob, delay: Duration) -> EventResult<()>;

    /// 任务结束（成功或进入死信），释放去重锁
    async fn complete(&self, job_id: &Uuid) -> EventResult<()>;

    /// 排队中的任务数（含延迟任务）
    async fn pending(&self) -> EventResult<usize>;
}

#[derive(Debug)]
struct Pending {
    job: DeliveryJob,
    available_at: DateTime<Utc>,
}

#[derive(Debug, Default)]
struct QueueState {
    tiers: [VecDeque<Pending>; 3],
    unique: HashSet<Uuid>,
    running: HashSet<Uuid>,
}

/// 内存版投递队列，用于测试、示例与单进程部署
pub struct InMemoryDeliveryQueue {
    state: Mutex<QueueState>,
    clock: Arc<dyn Clock>,
}

impl InMemoryDeliveryQueue {
    pub fn new(clock: Arc<dyn Clock>) -> Self {
        Self {
            state: Mutex::new(QueueState::default()),
            clock,
        }
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, QueueState> {
        self.state.lock().unwrap_or_else(|e| e.into_inner())
    }

    fn push_back(state: &mut QueueState, job: DeliveryJob, available_at: DateTime<Utc>) {
        let tier = job.tier().index();
        state.tiers[tier].push_back(Pending { job, available_at });
    }

    /// 任务当前所处状态；已结束或未知任务为 `None`
    pub fn state_of(&self, job_id: &Uuid) -> Option<JobState> {
        let state = self.lock();
        if state.running.contains(job_id) {
            Some(JobState::Running)
        } else if state.unique.contains(job_id) {
            Some(JobState::Queued)
        } else {
            None
        }
    }

    /// 已取出、尚未结束的任务数
    pub fn in_flight(&self) -> usize {
        self.lock().running.len()
    }

    /// 某一分层中排队的任务数
    pub fn pending_in(&self, tier: QueueTier) -> usize {
        self.lock().tiers[tier.index()].len()
    }
}

#[async_trait]
impl DeliveryQueue for InMemoryDeliveryQueue {
    async fn enqueue(&self, job: DeliveryJob) -> EventResult<bool> {
        let now = self.clock.now();
        let mut state = self.lock();
        if !state.unique.insert(job.job_id()) {
            return Ok(false);
        }
        Self::push_back(&mut state, job, now);
        Ok(true)
    }

    async fn reserve(&self) -> EventResult<Option<DeliveryJob>> {
        let now = self.clock.now();
        let mut state = self.lock();
        for tier in QueueTier::ORDERED {
            let queue = &mut state.tiers[tier.index()];
            let Some(pos) = queue.iter().position(|p| p.available_at <= now) else {
                continue;
            };
            if let Some(pending) = queue.remove(pos) {
                state.running.insert(pending.job.job_id());
                return Ok(Some(pending.job));
            }
        }
        Ok(None)
    }

    async fn release(&self, job: DeliveryJob, delay: Duration) -> EventResult<()> {
        let available_at = self.clock.now() + to_delta(delay);
        let mut state = self.lock();
        state.running.remove(&job.job_id());
        state.unique.insert(job.job_id());
        Self::push_back(&mut state, job, available_at);
        Ok(())
    }

    async fn complete(&self, job_id: &Uuid) -> EventResult<()> {
        let mut state = self.lock();
        state.running.remove(job_id);
        state.unique.remove(job_id);
        Ok(())
    }

    async fn pending(&self) -> EventResult<usize> {
        Ok(self.lock().tiers.iter().map(VecDeque::len).sum())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::ManualClock;
    use crate::config::DeliveryConfig;
    use crate::event::Event;

    fn job(priority: i32, clock: &ManualClock) -> DeliveryJob {
        let event = Event::builder().name("e").priority(priority).build();
        DeliveryJob::new(event, &DeliveryConfig::default(), clock.now())
    }

    #[tokio::test]
    async fn duplicate_job_ids_collapse() {
        let clock = Arc::new(ManualClock::default());
        let queue = InMemoryDeliveryQueue::new(clock.clone());
        let first = job(0, &clock);
        let dup = first.clone();

        assert!(queue.enqueue(first).await.unwrap());
        assert!(!queue.enqueue(dup.clone()).await.unwrap());
        assert_eq!(queue.pending().await.unwrap(), 1);

        // 执行中同样去重
        let reserved = queue.reserve().await.unwrap().unwrap();
        assert_eq!(queue.state_of(&reserved.job_id()), Some(JobState::Running));
        assert_eq!(queue.in_flight(), 1);
        assert!(!queue.enqueue(dup.clone()).await.unwrap());

        // 完成后允许再次入队
        queue.complete(&reserved.job_id()).await.unwrap();
        assert_eq!(queue.state_of(&reserved.job_id()), None);
        assert!(queue.enqueue(dup).await.unwrap());
    }

    #[tokio::test]
    async fn reserves_high_tier_first() {
        let clock = Arc::new(ManualClock::default());
        let queue = InMemoryDeliveryQueue::new(clock.clone());
        let low = job(0, &clock);
        let high = job(10, &clock);
        let medium = job(5, &clock);
        queue.enqueue(low.clone()).await.unwrap();
        queue.enqueue(high.clone()).await.unwrap();
        queue.enqueue(medium.clone()).await.unwrap();
        assert_eq!(queue.pending_in(QueueTier::High), 1);

        let order: Vec<Uuid> = [
            queue.reserve().await.unwrap(),
            queue.reserve().await.unwrap(),
            queue.reserve().await.unwrap(),
        ]
        .into_iter()
        .flatten()
        .map(|j| j.job_id())
        .collect();
        assert_eq!(order, vec![high.job_id(), medium.job_id(), low.job_id()]);
    }

    #[tokio::test]
    async fn released_job_waits_for_delay() {
        let clock = Arc::new(ManualClock::default());
        let queue = InMemoryDeliveryQueue::new(clock.clone());
        queue.enqueue(job(0, &clock)).await.unwrap();

        let reserved = queue.reserve().await.unwrap().unwrap();
        queue
            .release(reserved, Duration::from_secs(60))
            .await
            .unwrap();
        assert!(queue.reserve().await.unwrap().is_none());

        clock.advance(Duration::from_secs(59));
        assert!(queue.reserve().await.unwrap().is_none());

        clock.advance(Duration::from_secs(1));
        assert!(queue.reserve().await.unwrap().is_some());
    }
}
