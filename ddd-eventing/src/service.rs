//! 事件服务（EventService）
//!
//! 进程级上下文对象：持有全局开关与惰性创建的分发器，显式注入到生产方与工作者。
//! `EventService::install` 在首次使用前登记进程级实例（可挂接投递队列），
//! `EventService::global()` 返回它，未登记时退回无队列的默认实例；`reset` 仅供测试夹具使用，
//! 用于避免监听器与历史在用例之间泄漏。
//!
use crate::clock::Clock;
use crate::config::EventConfig;
use crate::delivery::DeliveryQueue;
use crate::dispatcher::Dispatcher;
use bon::bon;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, OnceLock, RwLock};

static GLOBAL: OnceLock<EventService> = OnceLock::new();

/// 只读诊断快照
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ServiceSnapshot {
    pub enabled: bool,
    /// 分发器尚未创建时为 `None`
    pub dispatcher_id: Option<String>,
    pub listener_count: usize,
    pub registered_events: Vec<String>,
    pub history_enabled: bool,
    pub history_len: usize,
}

pub struct EventService {
    enabled: Arc<AtomicBool>,
    dispatcher: RwLock<Option<Arc<Dispatcher>>>,
    config: EventConfig,
    queue: Option<Arc<dyn DeliveryQueue>>,
    clock: Option<Arc<dyn Clock>>,
}

#[bon]
impl EventService {
    #[builder]
    pub fn new(
        #[builder(default)] config: EventConfig,
        queue: Option<Arc<dyn DeliveryQueue>>,
        clock: Option<Arc<dyn Clock>>,
    ) -> Self {
        Self {
            enabled: Arc::new(AtomicBool::new(true)),
            dispatcher: RwLock::new(None),
            config,
            queue,
            clock,
        }
    }
}

impl EventService {
    /// 登记进程级实例，只能在首次调用 `global()` 之前成功一次
    ///
    /// 已登记（或 `global()` 已退回默认实例）时原样交还传入的服务。
    pub fn install(service: EventService) -> Result<(), EventService> {
        GLOBAL.set(service)
    }

    /// 进程级实例；未登记时为无投递队列的默认实例，异步事件会被拒绝
    pub fn global() -> &'static EventService {
        GLOBAL.get_or_init(|| EventService::builder().build())
    }

    pub fn enable(&self) {
        self.enabled.store(true, Ordering::Release);
    }

    pub fn disable(&self) {
        self.enabled.store(false, Ordering::Release);
    }

    pub fn is_enabled(&self) -> bool {
        self.enabled.load(Ordering::Acquire)
    }

    /// 分发器单例，首次访问时创建
    pub fn dispatcher(&self) -> Arc<Dispatcher> {
        if let Some(dispatcher) = self.current() {
            return dispatcher;
        }

        let mut slot = self.dispatcher.write().unwrap_or_else(|e| e.into_inner());
        slot.get_or_insert_with(|| {
            let dispatcher = Dispatcher::builder()
                .config(self.config)
                .maybe_queue(self.queue.clone())
                .maybe_clock(self.clock.clone())
                .build()
                .with_switch(self.enabled.clone());
            Arc::new(dispatcher)
        })
        .clone()
    }

    fn current(&self) -> Option<Arc<Dispatcher>> {
        self.dispatcher
            .read()
            .unwrap_or_else(|e| e.into_inner())
            .clone()
    }

    /// 丢弃分发器并恢复默认开关（仅供测试）
    pub fn reset(&self) {
        *self.dispatcher.write().unwrap_or_else(|e| e.into_inner()) = None;
        self.enable();
    }

    /// 诊断快照；不会触发分发器创建
    pub fn debug(&self) -> ServiceSnapshot {
        let dispatcher = self.current();
        ServiceSnapshot {
            enabled: self.is_enabled(),
            dispatcher_id: dispatcher.as_ref().map(|d| d.id().to_string()),
            listener_count: dispatcher.as_ref().map_or(0, |d| d.listener_count()),
            registered_events: dispatcher
                .as_ref()
                .map(|d| d.registered_events())
                .unwrap_or_default(),
            history_enabled: dispatcher
                .as_ref()
                .map_or(self.config.history_enabled, |d| d.history_enabled()),
            history_len: dispatcher.as_ref().map_or(0, |d| d.history_len()),
        }
    }
}
