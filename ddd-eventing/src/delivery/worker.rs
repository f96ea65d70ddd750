//! 投递工作者（DeliveryWorker）
//!
//! 从队列取出任务，依次经过门控，再调用 `Dispatcher::dispatch_sync`：
//! - 成功：结束任务；
//! - 门控拒绝：按门控给出的延迟放回队列（不消耗尝试次数）；
//! - 失败：尚有尝试次数且未超过截止时间则延迟重试，否则写入死信。
//!
//! 监听器 panic 被捕获为 `EventError::ListenerPanicked`，与普通失败走同一条重试/死信路径，
//! 工作任务本身不会因此退出。
//!
//! `start` 启动固定数量的长驻工作任务，返回可关闭/等待的 `WorkerHandle`。
//!
use super::counter::CounterStore;
use super::dead_letter::{DeadLetterRecord, DeadLetterStore};
use super::gate::{Gate, GateDecision, standard_gates};
use super::job::{DeliveryJob, JobState};
use super::queue::DeliveryQueue;
use crate::clock::{Clock, SystemClock};
use crate::config::DeliveryConfig;
use crate::dispatcher::Dispatcher;
use crate::error::{EventError, EventResult};
use bon::Builder;
use chrono::{DateTime, Utc};
use futures_util::FutureExt;
use futures_util::future::join_all;
use std::any::Any;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;
use tokio::task::JoinHandle;
use tokio::time::{self, MissedTickBehavior};
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, warn};

// 导入由 bon::Builder 生成的 typestate 模块与状态转换别名
use self::delivery_worker_builder::{IsUnset, SetGates, State as BuilderState};

#[derive(Builder)]
pub struct DeliveryWorker {
    dispatcher: Arc<Dispatcher>,
    queue: Arc<dyn DeliveryQueue>,
    dead_letters: Arc<dyn DeadLetterStore>,
    #[builder(default)]
    gates: Vec<Arc<dyn Gate>>,
    #[builder(default = Arc::new(SystemClock) as Arc<dyn Clock>)]
    clock: Arc<dyn Clock>,
    #[builder(default)]
    config: DeliveryConfig,
}

impl<S: BuilderState> DeliveryWorkerBuilder<S> {
    /// 使用标准门控链（限流 → 节流），窗口取自 `config`
    pub fn counter_store(
        self,
        store: Arc<dyn CounterStore>,
        config: &DeliveryConfig,
    ) -> DeliveryWorkerBuilder<SetGates<S>>
    where
        <S as BuilderState>::Gates: IsUnset,
    {
        self.gates(standard_gates(store, config))
    }
}

impl DeliveryWorker {
    /// 启动工作者池
    pub fn start(self: Arc<Self>) -> WorkerHandle {
        let token = CancellationToken::new();
        let tasks = (0..self.config.workers.max(1))
            .map(|worker| tokio::spawn(Self::work_loop(self.clone(), token.clone(), worker)))
            .collect();

        WorkerHandle { token, tasks }
    }

    async fn work_loop(self: Arc<Self>, token: CancellationToken, worker: usize) {
        let mut ticker = time::interval(self.config.poll_interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);

        loop {
            tokio::select! {
                _ = token.cancelled() => break,
                _ = ticker.tick() => {
                    while !token.is_cancelled() {
                        match self.process_next().await {
                            Ok(Some(_)) => continue,
                            Ok(None) => break,
                            Err(e) => {
                                error!(worker, error = %e, "delivery worker failed to process queue");
                                break;
                            }
                        }
                    }
                }
            }
        }
    }

    /// 取出并处理一个已到期的任务；队列为空时返回 `None`
    pub async fn process_next(&self) -> EventResult<Option<JobState>> {
        let Some(job) = self.queue.reserve().await? else {
            return Ok(None);
        };
        self.process(job).await.map(Some)
    }

    /// 处理队列中所有当前可执行的任务，返回处理数量
    pub async fn run_until_idle(&self) -> EventResult<usize> {
        let mut processed = 0;
        while self.process_next().await?.is_some() {
            processed += 1;
        }
        Ok(processed)
    }

    /// 执行一次任务状态迁移（任务已由队列取出）
    pub async fn process(&self, mut job: DeliveryJob) -> EventResult<JobState> {
        let now = self.clock.now();
        if job.past_deadline(now) {
            let err = EventError::RetryDeadline {
                event_id: job.event().id().to_string(),
                deadline: job.retry_until(),
            };
            return self.bury(job, err, now).await;
        }

        for gate in &self.gates {
            if let GateDecision::Release(delay) = gate.check(&job, now).await {
                debug!(
                    job_id = %job.job_id(),
                    event_id = job.event().id(),
                    gate = gate.name(),
                    delay = ?delay,
                    "delivery job released by gate"
                );
                self.queue.release(job, delay).await?;
                return Ok(JobState::Released { delay });
            }
        }

        job.begin_attempt();
        debug!(
            job_id = %job.job_id(),
            event_id = job.event().id(),
            attempt = job.tries(),
            queue = job.tier().as_str(),
            "delivery job running"
        );

        let fan_out = AssertUnwindSafe(self.dispatcher.dispatch_sync(job.event())).catch_unwind();
        let result = match time::timeout(job.timeout(), fan_out).await {
            Ok(Ok(result)) => result.map(|_| ()),
            Ok(Err(panic)) => Err(EventError::ListenerPanicked {
                event_id: job.event().id().to_string(),
                event_name: job.event().name().to_string(),
                reason: panic_reason(panic.as_ref()),
            }),
            Err(_) => Err(EventError::Timeout {
                event_id: job.event().id().to_string(),
                after: job.timeout(),
            }),
        };

        let err = match result {
            Ok(()) => {
                self.queue.complete(&job.job_id()).await?;
                return Ok(JobState::Succeeded);
            }
            Err(err) => err,
        };

        let now = self.clock.now();
        if job.has_attempts_left() && !job.past_deadline(now) {
            let delay = job.retry_after();
            warn!(
                job_id = %job.job_id(),
                event_id = job.event().id(),
                event_name = job.event().name(),
                attempt = job.tries(),
                max_tries = job.max_tries(),
                error = %err,
                "delivery attempt failed, retrying"
            );
            self.queue.release(job, delay).await?;
            return Ok(JobState::Released { delay });
        }

        self.bury(job, err, now).await
    }

    /// 终态：写入死信并结束任务；死信写入失败只记录日志
    async fn bury(
        &self,
        job: DeliveryJob,
        err: EventError,
        now: DateTime<Utc>,
    ) -> EventResult<JobState> {
        error!(
            job_id = %job.job_id(),
            event_id = job.event().id(),
            event_name = job.event().name(),
            attempts = job.tries(),
            created_at = %job.created_at(),
            error = %err,
            "delivery job permanently failed"
        );

        match DeadLetterRecord::from_job(&job, &err, now) {
            Ok(record) => {
                if let Err(e) = self.dead_letters.store(record).await {
                    error!(
                        event_id = job.event().id(),
                        event_name = job.event().name(),
                        error = %e,
                        "failed to store dead letter"
                    );
                }
            }
            Err(e) => {
                error!(event_id = job.event().id(), error = %e, "failed to build dead letter");
            }
        }

        self.queue.complete(&job.job_id()).await?;
        Ok(JobState::DeadLettered)
    }

    /// 将死信重新入队（新的尝试计数与截止时间）
    pub async fn replay(&self, record: &DeadLetterRecord) -> EventResult<bool> {
        let job = DeliveryJob::new(record.to_event()?, &self.config, self.clock.now());
        self.queue.enqueue(job).await
    }
}

fn panic_reason(panic: &(dyn Any + Send)) -> String {
    if let Some(reason) = panic.downcast_ref::<&str>() {
        (*reason).to_string()
    } else if let Some(reason) = panic.downcast_ref::<String>() {
        reason.clone()
    } else {
        "non-string panic payload".to_string()
    }
}

/// 工作者池句柄：用于优雅关闭与等待任务结束
pub struct WorkerHandle {
    token: CancellationToken,
    tasks: Vec<JoinHandle<()>>,
}

impl WorkerHandle {
    pub fn shutdown(&self) {
        self.token.cancel();
    }

    pub async fn join(mut self) {
        let tasks = std::mem::take(&mut self.tasks);
        for result in join_all(tasks).await {
            if let Err(e) = result {
                error!(error = %e, "delivery worker task aborted");
            }
        }
    }
}

impl Drop for WorkerHandle {
    fn drop(&mut self) {
        self.shutdown();
    }
}
