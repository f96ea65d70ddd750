//! 事件分发器（dispatcher）
//!
//! - 注册表：事件名 → 按优先级降序、注册顺序稳定排列的监听器；
//! - 同步扇出：逐个执行、`should_handle` 过滤、停止传播、首个失败即中止；
//! - 有界历史：可开关的分发记录，FIFO 淘汰。

mod dispatch;
mod history;
mod registry;

pub use dispatch::{DispatchReport, Dispatcher};
pub use history::{DispatchOutcome, DispatchRecord};
