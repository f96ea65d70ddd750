//! 异步投递管线（delivery）
//!
//! 将异步事件移出调用路径：
//! - `DeliveryJob`：携带事件与尝试次数、超时、重试延迟、分层与截止时间；
//! - `DeliveryQueue`：分层队列，支持延迟重新投递与按任务 ID 去重；
//! - `Gate`：限流（`RateLimiter`）与节流（`Throttle`），依赖 `CounterStore`；
//! - `DeadLetterStore`：重试耗尽后的死信记录；
//! - `DeliveryWorker`：驱动任务状态机的工作者池。
//!
//! 各协议均附带内存实现，便于测试与单进程部署。
//!
pub mod counter;
pub mod dead_letter;
pub mod gate;
pub mod job;
pub mod queue;
pub mod worker;

pub use counter::{CounterStore, InMemoryCounterStore};
pub use dead_letter::{DeadLetterRecord, DeadLetterStore, InMemoryDeadLetterStore};
pub use gate::{Gate, GateDecision, RateLimiter, Throttle, standard_gates};
pub use job::{DeliveryJob, JobState, QueueTier};
pub use queue::{DeliveryQueue, InMemoryDeliveryQueue};
pub use worker::{DeliveryWorker, WorkerHandle};
