use crate::listener::{Listener, WILDCARD};
use dashmap::DashMap;
use std::cmp::Reverse;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

#[derive(Clone)]
struct RegisteredListener {
    seq: u64,
    priority: i32,
    listener: Arc<dyn Listener>,
}

/// 事件名 → 监听器序列
///
/// 每个桶内按优先级降序排列，同优先级按注册顺序；
/// 查询时合并通配桶并按 (优先级降序, 注册序号升序) 稳定排序。
#[derive(Default)]
pub(crate) struct ListenerRegistry {
    buckets: DashMap<String, Vec<RegisteredListener>>,
    seq: AtomicU64,
}

impl ListenerRegistry {
    pub(crate) fn insert(&self, event_name: &str, listener: Arc<dyn Listener>) {
        let entry = RegisteredListener {
            seq: self.seq.fetch_add(1, Ordering::Relaxed),
            priority: listener.priority(),
            listener,
        };

        let mut bucket = self.buckets.entry(event_name.to_string()).or_default();
        let at = bucket.partition_point(|r| r.priority >= entry.priority);
        bucket.insert(at, entry);
    }

    pub(crate) fn matching(&self, event_name: &str) -> Vec<Arc<dyn Listener>> {
        let mut merged: Vec<RegisteredListener> = Vec::new();
        if let Some(bucket) = self.buckets.get(event_name) {
            merged.extend(bucket.iter().cloned());
        }
        if event_name != WILDCARD {
            if let Some(bucket) = self.buckets.get(WILDCARD) {
                merged.extend(bucket.iter().cloned());
            }
        }

        merged.sort_by_key(|r| (Reverse(r.priority), r.seq));
        merged.into_iter().map(|r| r.listener).collect()
    }

    pub(crate) fn listener_count(&self) -> usize {
        self.buckets.iter().map(|b| b.value().len()).sum()
    }

    pub(crate) fn event_names(&self) -> Vec<String> {
        let mut names: Vec<String> = self.buckets.iter().map(|b| b.key().clone()).collect();
        names.sort();
        names
    }
}
