//! 进程内领域事件分发引擎（ddd-eventing）
//!
//! 生产方（订单、用户、商品等聚合）在业务事实发生时构造 `Event` 并交给
//! `Dispatcher`；分发器决定同步扇出或异步投递：
//! - 同步：按优先级降序（同优先级按注册顺序）逐个执行监听器，支持停止传播，
//!   首个失败即中止并返回错误；
//! - 异步：封装为 `DeliveryJob` 入队后立即返回，工作者取出后经限流/节流门控，
//!   再调用 `dispatch_sync`，失败按固定延迟重试，耗尽后写入死信。
//!
//! 模块一览：
//! - `event`：事件值类型与 ID 生成；
//! - `listener`：监听器协议与闭包适配；
//! - `dispatcher`：注册表、同步扇出与有界历史；
//! - `service`：进程级上下文（全局开关 + 分发器单例）；
//! - `delivery`：投递任务、分层队列、门控、计数存储、死信与工作者池；
//! - `config` / `clock` / `error`：配置、时钟与错误类型。
//!
//! 外部协作方（队列、计数存储、死信存储）均以 trait 定义并附带内存实现，
//! 可替换为真实基础设施。
//!
pub mod clock;
pub mod config;
pub mod delivery;
pub mod dispatcher;
pub mod error;
pub mod event;
pub mod listener;
pub mod service;

pub use config::{DeliveryConfig, EventConfig};
pub use dispatcher::{DispatchOutcome, DispatchRecord, DispatchReport, Dispatcher};
pub use error::{EventError, EventResult};
pub use event::Event;
pub use listener::{FnListener, Listener, SupportedEvents};
pub use service::{EventService, ServiceSnapshot};
