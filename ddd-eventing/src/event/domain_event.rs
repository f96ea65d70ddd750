use super::event_id::next_event_id;
use super::metadata::merge_metadata;
use bon::bon;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::hash::{Hash, Hasher};

/// 领域事件：业务事实发生时由生产方构造，构造后不可变
///
/// 相等性只比较 `id`。
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Event {
    id: String,
    name: String,
    payload: Map<String, Value>,
    metadata: Map<String, Value>,
    is_async: bool,
    priority: i32,
    occurred_at: DateTime<Utc>,
}

#[bon]
impl Event {
    /// 构造事件：生成 ID 与时间戳，并将 `metadata` 合并进默认元数据
    #[builder]
    pub fn new(
        #[builder(into)] name: String,
        #[builder(default)] payload: Map<String, Value>,
        metadata: Option<Map<String, Value>>,
        #[builder(default)] is_async: bool,
        #[builder(default)] priority: i32,
    ) -> Self {
        let metadata = merge_metadata(&name, metadata);
        Self {
            id: next_event_id(),
            name,
            payload,
            metadata,
            is_async,
            priority,
            occurred_at: Utc::now(),
        }
    }
}

impl Event {
    /// 以已有的 ID 与时间戳还原事件（死信重放）
    pub(crate) fn restore(
        id: String,
        name: String,
        payload: Map<String, Value>,
        metadata: Map<String, Value>,
        priority: i32,
        occurred_at: DateTime<Utc>,
    ) -> Self {
        Self {
            id,
            name,
            payload,
            metadata,
            is_async: true,
            priority,
            occurred_at,
        }
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn payload(&self) -> &Map<String, Value> {
        &self.payload
    }

    /// 按键读取载荷字段：`None` 表示字段不存在，`Some(Value::Null)` 表示存在但为空
    pub fn payload_value(&self, key: &str) -> Option<&Value> {
        self.payload.get(key)
    }

    pub fn has_payload(&self, key: &str) -> bool {
        self.payload.contains_key(key)
    }

    /// 字符串字段；字段缺失或类型不符时为 `None`
    pub fn payload_str(&self, key: &str) -> Option<&str> {
        self.payload.get(key).and_then(Value::as_str)
    }

    pub fn payload_i64(&self, key: &str) -> Option<i64> {
        self.payload.get(key).and_then(Value::as_i64)
    }

    pub fn metadata(&self) -> &Map<String, Value> {
        &self.metadata
    }

    pub fn metadata_str(&self, key: &str) -> Option<&str> {
        self.metadata.get(key).and_then(Value::as_str)
    }

    pub fn is_async(&self) -> bool {
        self.is_async
    }

    /// 投递优先级（仅用于异步队列分层与限流档位，不影响监听器顺序）
    pub fn priority(&self) -> i32 {
        self.priority
    }

    pub fn occurred_at(&self) -> DateTime<Utc> {
        self.occurred_at
    }
}

impl PartialEq for Event {
    fn eq(&self, other: &Self) -> bool {
        self.id == other.id
    }
}

impl Eq for Event {}

impl Hash for Event {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.id.hash(state);
    }
}
