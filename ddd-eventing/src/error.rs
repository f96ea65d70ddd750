//! 事件子系统统一错误定义
//!
//! 覆盖监听器失败、序列化、队列、计数存储与死信存储等最小必要集合。
//! 限流/节流不是错误，而是 `GateDecision::Release`；重试耗尽也不是错误，
//! 而是任务的终态 `JobState::DeadLettered`。
//!
use chrono::{DateTime, Utc};
use std::time::Duration;
use thiserror::Error;

/// 统一错误类型
#[non_exhaustive]
#[derive(Debug, Error)]
pub enum EventError {
    // --- 分发 ---
    #[error(
        "listener failed: event_id={event_id}, event={event_name}, listener={listener}, reason={reason}"
    )]
    ListenerFailed {
        event_id: String,
        event_name: String,
        listener: String,
        reason: String,
        /// 错误链与回溯（不参与 Display）
        trace: String,
    },
    #[error("listener panicked: event_id={event_id}, event={event_name}, reason={reason}")]
    ListenerPanicked {
        event_id: String,
        event_name: String,
        reason: String,
    },
    #[error("delivery timed out: event_id={event_id}, after={after:?}")]
    Timeout { event_id: String, after: Duration },
    #[error("retry deadline passed: event_id={event_id}, deadline={deadline}")]
    RetryDeadline {
        event_id: String,
        deadline: DateTime<Utc>,
    },

    // --- 序列化 ---
    #[error("serialization error: {source}")]
    Serde {
        #[from]
        source: serde_json::Error,
    },

    // --- 外部协作方 ---
    #[error("delivery queue error: {reason}")]
    Queue { reason: String },
    #[error("counter store error: {reason}")]
    CounterStore { reason: String },
    #[error("dead letter store error: {reason}")]
    DeadLetter { reason: String },
}

impl EventError {
    pub fn queue(reason: impl Into<String>) -> Self {
        Self::Queue {
            reason: reason.into(),
        }
    }

    pub fn counter_store(reason: impl Into<String>) -> Self {
        Self::CounterStore {
            reason: reason.into(),
        }
    }

    pub fn dead_letter(reason: impl Into<String>) -> Self {
        Self::DeadLetter {
            reason: reason.into(),
        }
    }

    /// 错误回溯；非监听器错误时退回 Debug 输出
    pub fn trace(&self) -> String {
        match self {
            Self::ListenerFailed { trace, .. } => trace.clone(),
            other => format!("{other:?}"),
        }
    }

    /// 失败的监听器名称（仅 `ListenerFailed`）
    pub fn listener(&self) -> Option<&str> {
        match self {
            Self::ListenerFailed { listener, .. } => Some(listener),
            _ => None,
        }
    }
}

/// 统一 Result 类型别名
pub type EventResult<T> = Result<T, EventError>;
