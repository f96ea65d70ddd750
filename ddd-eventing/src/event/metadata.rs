use serde_json::{Map, Value};

pub const DEFAULT_SOURCE: &str = "domain";
pub const DEFAULT_IMPORTANCE: &str = "normal";

/// 事件的默认元数据：来源、类别（事件名前缀）与重要程度
pub fn default_metadata(event_name: &str) -> Map<String, Value> {
    let category = event_name
        .split(['_', '.'])
        .next()
        .filter(|s| !s.is_empty())
        .unwrap_or(event_name);

    let mut metadata = Map::new();
    metadata.insert("source".into(), Value::from(DEFAULT_SOURCE));
    metadata.insert("category".into(), Value::from(category));
    metadata.insert("importance".into(), Value::from(DEFAULT_IMPORTANCE));
    metadata
}

/// 将调用方提供的元数据合并进默认值（调用方优先）
pub(crate) fn merge_metadata(
    event_name: &str,
    overrides: Option<Map<String, Value>>,
) -> Map<String, Value> {
    let mut metadata = default_metadata(event_name);
    for (key, value) in overrides.into_iter().flatten() {
        metadata.insert(key, value);
    }
    metadata
}
