//! 领域事件（Event）
//!
//! 单一的事件值类型：名称 + 有序载荷 + 元数据 + 异步标记与优先级。
//! 具体事件种类由生产方以具名构造函数组装载荷，不通过继承区分。

mod domain_event;
mod event_id;
mod metadata;

pub use domain_event::Event;
pub use event_id::next_event_id;
pub use metadata::{DEFAULT_IMPORTANCE, DEFAULT_SOURCE, default_metadata};
