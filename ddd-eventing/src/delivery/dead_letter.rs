//! 死信（Dead Letter）
//!
//! 重试耗尽的投递任务转为死信记录，写入外部只追加存储，供人工排查与重放。
//!
use super::job::DeliveryJob;
use crate::error::{EventError, EventResult};
use crate::event::Event;
use async_trait::async_trait;
use bon::Builder;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::sync::Mutex;

#[derive(Debug, Clone, Builder, Serialize, Deserialize)]
pub struct DeadLetterRecord {
    #[builder(into)]
    event_id: String,
    #[builder(into)]
    event_name: String,
    /// 事件载荷（JSON 文本）
    payload: String,
    /// 事件元数据（JSON 文本）
    metadata: String,
    #[builder(default)]
    priority: i32,
    occurred_at: DateTime<Utc>,
    #[builder(into)]
    error_message: String,
    #[builder(into)]
    error_trace: String,
    attempts: u32,
    failed_at: DateTime<Utc>,
}

impl DeadLetterRecord {
    /// 由失败的任务生成死信记录
    pub fn from_job(job: &DeliveryJob, error: &EventError, failed_at: DateTime<Utc>) -> EventResult<Self> {
        let event = job.event();
        Ok(Self {
            event_id: event.id().to_string(),
            event_name: event.name().to_string(),
            payload: serde_json::to_string(event.payload())?,
            metadata: serde_json::to_string(event.metadata())?,
            priority: event.priority(),
            occurred_at: event.occurred_at(),
            error_message: error.to_string(),
            error_trace: error.trace(),
            attempts: job.tries(),
            failed_at,
        })
    }

    /// 还原原始事件（保持 ID，便于下游按事件 ID 幂等）
    pub fn to_event(&self) -> EventResult<Event> {
        let payload: Map<String, Value> = serde_json::from_str(&self.payload)?;
        let metadata: Map<String, Value> = serde_json::from_str(&self.metadata)?;
        Ok(Event::restore(
            self.event_id.clone(),
            self.event_name.clone(),
            payload,
            metadata,
            self.priority,
            self.occurred_at,
        ))
    }

    pub fn event_id(&self) -> &str {
        &self.event_id
    }

    pub fn event_name(&self) -> &str {
        &self.event_name
    }

    pub fn payload(&self) -> &str {
        &self.payload
    }

    pub fn metadata(&self) -> &str {
        &self.metadata
    }

    pub fn error_message(&self) -> &str {
        &self.error_message
    }

    pub fn error_trace(&self) -> &str {
        &self.error_trace
    }

    pub fn attempts(&self) -> u32 {
        self.attempts
    }

    pub fn failed_at(&self) -> DateTime<Utc> {
        self.failed_at
    }
}

/// 死信存储
#[async_trait]
pub trait DeadLetterStore: Send + Sync {
    async fn store(&self, record: DeadLetterRecord) -> EventResult<()>;

    async fn records(&self) -> EventResult<Vec<DeadLetterRecord>>;
}

/// 内存版死信存储
#[derive(Debug, Default)]
pub struct InMemoryDeadLetterStore {
    records: Mutex<Vec<DeadLetterRecord>>,
}

impl InMemoryDeadLetterStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.records.lock().unwrap_or_else(|e| e.into_inner()).len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[async_trait]
impl DeadLetterStore for InMemoryDeadLetterStore {
    async fn store(&self, record: DeadLetterRecord) -> EventResult<()> {
        self.records
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .push(record);
        Ok(())
    }

    async fn records(&self) -> EventResult<Vec<DeadLetterRecord>> {
        Ok(self
            .records
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .clone())
    }
}
