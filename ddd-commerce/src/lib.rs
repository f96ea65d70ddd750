//! 电商领域的事件生产方（ddd-commerce）
//!
//! 订单、用户、商品三个聚合在业务规则校验通过后修改自身状态并返回领域事件，
//! 由调用方通过 `events::publish` 交给 `ddd_eventing::Dispatcher`。
//!
//! 另附两个示例监听器：审计日志（全部事件）与通知（订单/用户事件）。
//!
pub mod error;
pub mod events;
pub mod listeners;
pub mod order;
pub mod product;
pub mod user;

pub use error::{CommerceError, CommerceResult};
pub use listeners::{
    AuditEntry, AuditLogListener, Notification, NotificationListener, Notifier, RecordingNotifier,
};
pub use order::{Order, OrderLine, OrderStatus};
pub use product::Product;
pub use user::User;
