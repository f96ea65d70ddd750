use super::history::{DispatchOutcome, DispatchRecord, EventHistory};
use super::registry::ListenerRegistry;
use crate::clock::{Clock, SystemClock};
use crate::config::{DeliveryConfig, EventConfig};
use crate::delivery::{DeliveryJob, DeliveryQueue};
use crate::error::{EventError, EventResult};
use crate::event::{Event, next_event_id};
use crate::listener::{Listener, SupportedEvents, WILDCARD};
use bon::bon;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};
use tracing::{debug, error, warn};

/// 一次同步分发的结果
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DispatchReport {
    pub event_id: String,
    /// 按执行顺序排列的监听器名称
    pub invoked: Vec<String>,
    /// 请求停止传播的监听器
    pub stopped_by: Option<String>,
}

impl DispatchReport {
    fn outcome(&self) -> DispatchOutcome {
        match &self.stopped_by {
            Some(by) => DispatchOutcome::Stopped {
                by: by.clone(),
                invoked: self.invoked.len(),
            },
            None => DispatchOutcome::Completed {
                invoked: self.invoked.len(),
            },
        }
    }
}

/// 事件分发器：监听器注册表 + 同步扇出 + 有界历史
///
/// - `dispatch`：系统关闭时静默丢弃；异步事件入队后立即返回；其余同步扇出；
/// - `dispatch_sync`：总是同步扇出，工作者取出任务后调用它。
///
/// 同步扇出按优先级顺序逐个执行监听器，第一个失败即中止本次分发并返回错误，
/// 已执行监听器的副作用保留。
pub struct Dispatcher {
    id: String,
    registry: ListenerRegistry,
    history: Mutex<EventHistory>,
    history_enabled: AtomicBool,
    enabled: Arc<AtomicBool>,
    queue: Option<Arc<dyn DeliveryQueue>>,
    clock: Arc<dyn Clock>,
    delivery: DeliveryConfig,
}

#[bon]
impl Dispatcher {
    #[builder]
    pub fn new(
        #[builder(default)] config: EventConfig,
        queue: Option<Arc<dyn DeliveryQueue>>,
        clock: Option<Arc<dyn Clock>>,
    ) -> Self {
        Self {
            id: next_event_id(),
            registry: ListenerRegistry::default(),
            history: Mutex::new(EventHistory::new(config.history_capacity)),
            history_enabled: AtomicBool::new(config.history_enabled),
            enabled: Arc::new(AtomicBool::new(true)),
            queue,
            clock: clock.unwrap_or_else(|| Arc::new(SystemClock) as Arc<dyn Clock>),
            delivery: config.delivery,
        }
    }
}

impl Dispatcher {
    /// 与 `EventService` 共享全局开关
    pub(crate) fn with_switch(mut self, enabled: Arc<AtomicBool>) -> Self {
        self.enabled = enabled;
        self
    }

    /// 分发器实例标识
    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn is_enabled(&self) -> bool {
        self.enabled.load(Ordering::Acquire)
    }

    /// 注册监听器到 `event_name`（`"*"` 表示所有事件）
    ///
    /// 重复注册同一实例会导致重复执行，由调用方负责避免。
    pub fn listen(&self, event_name: &str, listener: Arc<dyn Listener>) {
        if event_name != WILDCARD && !listener.supported_events().contains(event_name) {
            debug!(
                event_name,
                listener = listener.name(),
                "listener registered for an event it does not declare"
            );
        }
        self.registry.insert(event_name, listener);
    }

    /// 按监听器声明的支持事件注册
    pub fn subscribe(&self, listener: Arc<dyn Listener>) {
        match listener.supported_events() {
            SupportedEvents::All => self.registry.insert(WILDCARD, listener),
            SupportedEvents::One(name) => self.registry.insert(&name, listener),
            SupportedEvents::Many(names) => {
                for name in names {
                    self.registry.insert(&name, listener.clone());
                }
            }
        }
    }

    /// 分发事件
    ///
    /// 系统关闭时不执行任何监听器、不记录历史，也不通知调用方。
    /// 异步事件必须经由投递队列；未挂接队列时返回 `EventError::Queue`。
    pub async fn dispatch(&self, event: &Event) -> EventResult<()> {
        if !self.is_enabled() {
            return Ok(());
        }

        if event.is_async() {
            if let Some(queue) = &self.queue {
                let job = DeliveryJob::new(event.clone(), &self.delivery, self.clock.now());
                let job_id = job.job_id();
                let queued = queue.enqueue(job).await?;
                debug!(
                    event_id = event.id(),
                    event_name = event.name(),
                    job_id = %job_id,
                    queued,
                    "event handed to delivery queue"
                );
                return Ok(());
            }
            warn!(
                event_id = event.id(),
                event_name = event.name(),
                "no delivery queue attached, async event rejected"
            );
            return Err(EventError::queue(format!(
                "no delivery queue attached: event_id={}, event={}",
                event.id(),
                event.name()
            )));
        }

        self.dispatch_sync(event).await.map(|_| ())
    }

    /// 同步扇出，忽略事件的异步标记
    pub async fn dispatch_sync(&self, event: &Event) -> EventResult<DispatchReport> {
        let mut report = DispatchReport {
            event_id: event.id().to_string(),
            invoked: Vec::new(),
            stopped_by: None,
        };

        for listener in self.registry.matching(event.name()) {
            if !listener.should_handle(event) {
                continue;
            }

            if let Err(err) = listener.handle(event).await {
                let reason = format!("{err:#}");
                error!(
                    event_id = event.id(),
                    event_name = event.name(),
                    listener = listener.name(),
                    invoked = report.invoked.len(),
                    error = %reason,
                    "listener failed during dispatch"
                );
                self.record(
                    event,
                    DispatchOutcome::Failed {
                        listener: listener.name().to_string(),
                        reason: reason.clone(),
                    },
                );
                return Err(EventError::ListenerFailed {
                    event_id: event.id().to_string(),
                    event_name: event.name().to_string(),
                    listener: listener.name().to_string(),
                    reason,
                    trace: format!("{err:?}"),
                });
            }

            report.invoked.push(listener.name().to_string());
            if listener.stop_propagation(event) {
                report.stopped_by = Some(listener.name().to_string());
                break;
            }
        }

        self.record(event, report.outcome());
        Ok(report)
    }

    fn record(&self, event: &Event, outcome: DispatchOutcome) {
        if !self.history_enabled() {
            return;
        }
        self.history().push(DispatchRecord {
            event_id: event.id().to_string(),
            event_name: event.name().to_string(),
            dispatched_at: self.clock.now(),
            outcome,
        });
    }

    fn history(&self) -> MutexGuard<'_, EventHistory> {
        self.history.lock().unwrap_or_else(|e| e.into_inner())
    }

    pub fn set_enable_history(&self, enabled: bool) {
        self.history_enabled.store(enabled, Ordering::Release);
    }

    pub fn history_enabled(&self) -> bool {
        self.history_enabled.load(Ordering::Acquire)
    }

    /// 历史记录快照（从旧到新）
    pub fn event_history(&self) -> Vec<DispatchRecord> {
        self.history().snapshot()
    }

    pub fn history_len(&self) -> usize {
        self.history().len()
    }

    pub fn clear_history(&self) {
        self.history().clear();
    }

    /// 某事件将按顺序执行的监听器名称（不经 `should_handle` 过滤）
    pub fn listeners_for(&self, event_name: &str) -> Vec<String> {
        self.registry
            .matching(event_name)
            .iter()
            .map(|l| l.name().to_string())
            .collect()
    }

    pub fn has_listeners(&self, event_name: &str) -> bool {
        !self.registry.matching(event_name).is_empty()
    }

    pub fn listener_count(&self) -> usize {
        self.registry.listener_count()
    }

    /// 已注册监听器的事件名（含通配）
    pub fn registered_events(&self) -> Vec<String> {
        self.registry.event_names()
    }
}

impl Default for Dispatcher {
    fn default() -> Self {
        Self::builder().build()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::listener::FnListener;
    use serde_json::{Value, json};

    type Calls = Arc<Mutex<Vec<String>>>;

    fn recorder(name: &str, priority: i32, calls: &Calls) -> FnListener {
        let calls = calls.clone();
        let label = name.to_string();
        FnListener::new(name, move |_| {
            let calls = calls.clone();
            let label = label.clone();
            Box::pin(async move {
                calls.lock().unwrap().push(label);
                Ok(())
            })
        })
        .with_priority(priority)
    }

    fn failing(name: &str, priority: i32) -> FnListener {
        FnListener::new(name, |_| Box::pin(async { Err(anyhow::anyhow!("boom")) }))
            .with_priority(priority)
    }

    fn event(name: &str) -> Event {
        Event::builder().name(name).build()
    }

    #[tokio::test]
    async fn higher_priority_runs_first() {
        let calls = Calls::default();
        let dispatcher = Dispatcher::default();
        dispatcher.listen("order_created", Arc::new(recorder("low", 1, &calls)));
        dispatcher.listen("order_created", Arc::new(recorder("high", 10, &calls)));

        let report = dispatcher.dispatch(&event("order_created")).await;
        assert!(report.is_ok());
        assert_eq!(*calls.lock().unwrap(), vec!["high", "low"]);
    }

    #[tokio::test]
    async fn should_handle_false_skips_listener() {
        let calls = Calls::default();
        let dispatcher = Dispatcher::default();
        let picky = recorder("picky", 100, &calls)
            .with_supported(SupportedEvents::One("order_paid".into()));
        dispatcher.listen("order_created", Arc::new(picky));
        dispatcher.listen("order_created", Arc::new(recorder("plain", 0, &calls)));

        let report = dispatcher.dispatch_sync(&event("order_created")).await.unwrap();
        assert_eq!(report.invoked, vec!["plain"]);
        assert_eq!(*calls.lock().unwrap(), vec!["plain"]);
    }

    #[tokio::test]
    async fn stop_propagation_skips_lower_priority() {
        let calls = Calls::default();
        let dispatcher = Dispatcher::default();
        dispatcher.listen("e", Arc::new(recorder("first", 10, &calls)));
        dispatcher.listen("e", Arc::new(recorder("stopper", 5, &calls).stopping()));
        dispatcher.listen("e", Arc::new(recorder("never", 1, &calls)));

        let report = dispatcher.dispatch_sync(&event("e")).await.unwrap();
        assert_eq!(report.invoked, vec!["first", "stopper"]);
        assert_eq!(report.stopped_by.as_deref(), Some("stopper"));
        assert_eq!(*calls.lock().unwrap(), vec!["first", "stopper"]);
    }

    #[tokio::test]
    async fn failure_aborts_remaining_listeners() {
        let calls = Calls::default();
        let dispatcher = Dispatcher::default();
        dispatcher.set_enable_history(true);
        dispatcher.listen("e", Arc::new(recorder("before", 10, &calls)));
        dispatcher.listen("e", Arc::new(failing("broken", 5)));
        dispatcher.listen("e", Arc::new(recorder("after", 1, &calls)));

        let ev = event("e");
        let err = dispatcher.dispatch(&ev).await.unwrap_err();
        assert_eq!(err.listener(), Some("broken"));
        assert!(err.to_string().contains(ev.id()));
        assert_eq!(*calls.lock().unwrap(), vec!["before"]);

        let history = dispatcher.event_history();
        assert_eq!(history.len(), 1);
        assert_eq!(
            history[0].outcome,
            DispatchOutcome::Failed {
                listener: "broken".into(),
                reason: "boom".into()
            }
        );
    }

    #[tokio::test]
    async fn async_event_without_queue_is_rejected() {
        let calls = Calls::default();
        let dispatcher = Dispatcher::default();
        dispatcher.set_enable_history(true);
        dispatcher.listen("e", Arc::new(recorder("l", 0, &calls)));

        let ev = Event::builder().name("e").is_async(true).build();
        let err = dispatcher.dispatch(&ev).await.unwrap_err();
        assert!(matches!(err, EventError::Queue { .. }));
        assert!(err.to_string().contains(ev.id()));
        assert!(calls.lock().unwrap().is_empty());
        assert!(dispatcher.event_history().is_empty());

        // 显式同步分发不受影响
        dispatcher.dispatch_sync(&ev).await.unwrap();
        assert_eq!(*calls.lock().unwrap(), vec!["l"]);
    }

    #[tokio::test]
    async fn subscribe_uses_declared_events() {
        let calls = Calls::default();
        let dispatcher = Dispatcher::default();
        let many = recorder("many", 0, &calls).with_supported(SupportedEvents::Many(vec![
            "user_registered".into(),
            "user_deactivated".into(),
        ]));
        dispatcher.subscribe(Arc::new(many));
        dispatcher.subscribe(Arc::new(recorder("all", -1, &calls)));

        assert_eq!(dispatcher.listeners_for("user_registered"), vec!["many", "all"]);
        assert_eq!(dispatcher.listeners_for("order_paid"), vec!["all"]);
        assert!(dispatcher.has_listeners("anything"));
        assert_eq!(dispatcher.listener_count(), 3);

        let Value::Object(payload) = json!({"user_id": "U-1"}) else {
            unreachable!()
        };
        let ev = Event::builder().name("user_deactivated").payload(payload).build();
        dispatcher.dispatch_sync(&ev).await.unwrap();
        assert_eq!(*calls.lock().unwrap(), vec!["many", "all"]);
    }

    #[tokio::test]
    async fn history_is_off_by_default_and_bounded() {
        let dispatcher = Dispatcher::builder()
            .config(EventConfig {
                history_enabled: true,
                history_capacity: 2,
                ..Default::default()
            })
            .build();
        let events: Vec<Event> = (0..3).map(|_| event("e")).collect();
        for ev in &events {
            dispatcher.dispatch(ev).await.unwrap();
        }

        let ids: Vec<String> = dispatcher
            .event_history()
            .into_iter()
            .map(|r| r.event_id)
            .collect();
        assert_eq!(ids, vec![events[1].id().to_string(), events[2].id().to_string()]);

        assert!(!Dispatcher::default().history_enabled());
        dispatcher.clear_history();
        assert_eq!(dispatcher.history_len(), 0);
    }
}
