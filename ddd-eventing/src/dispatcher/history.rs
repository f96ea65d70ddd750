use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::VecDeque;

/// 一次分发的结果
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum DispatchOutcome {
    /// 所有匹配的监听器均已执行
    Completed { invoked: usize },
    /// 某监听器请求停止传播
    Stopped { by: String, invoked: usize },
    /// 某监听器失败，剩余监听器被中止
    Failed { listener: String, reason: String },
}

/// 分发历史记录
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DispatchRecord {
    pub event_id: String,
    pub event_name: String,
    pub dispatched_at: DateTime<Utc>,
    pub outcome: DispatchOutcome,
}

/// 有界历史：达到容量后淘汰最早的记录
#[derive(Debug)]
pub(crate) struct EventHistory {
    records: VecDeque<DispatchRecord>,
    capacity: usize,
}

impl EventHistory {
    pub(crate) fn new(capacity: usize) -> Self {
        Self {
            records: VecDeque::with_capacity(capacity.min(1024)),
            capacity,
        }
    }

    pub(crate) fn push(&mut self, record: DispatchRecord) {
        if self.capacity == 0 {
            return;
        }
        while self.records.len() >= self.capacity {
            self.records.pop_front();
        }
        self.records.push_back(record);
    }

    pub(crate) fn snapshot(&self) -> Vec<DispatchRecord> {
        self.records.iter().cloned().collect()
    }

    pub(crate) fn len(&self) -> usize {
        self.records.len()
    }

    pub(crate) fn clear(&mut self) {
        self.records.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn record(id: &str) -> DispatchRecord {
        DispatchRecord {
            event_id: id.into(),
            event_name: "e".into(),
            dispatched_at: Utc::now(),
            outcome: DispatchOutcome::Completed { invoked: 0 },
        }
    }

    #[test]
    fn evicts_oldest_first() {
        let mut history = EventHistory::new(3);
        for id in ["a", "b", "c", "d"] {
            history.push(record(id));
        }

        let ids: Vec<String> = history.snapshot().into_iter().map(|r| r.event_id).collect();
        assert_eq!(ids, vec!["b", "c", "d"]);
        assert_eq!(history.len(), 3);
    }

    #[test]
    fn zero_capacity_keeps_nothing() {
        let mut history = EventHistory::new(0);
        history.push(record("a"));
        assert_eq!(history.len(), 0);
    }
}
