//! 事件监听器（Listener）
//!
//! 定义监听器的处理逻辑与元信息（名称、优先级、支持的事件、传播控制）。
//! 具体监听器是彼此独立的类型，只需实现该 trait。
//!
use crate::event::Event;
use async_trait::async_trait;
use std::fmt;
use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;

/// 通配事件名：以此名注册的监听器接收所有事件
pub const WILDCARD: &str = "*";

/// 监听器声明支持的事件
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum SupportedEvents {
    One(String),
    Many(Vec<String>),
    All,
}

impl SupportedEvents {
    pub fn contains(&self, event_name: &str) -> bool {
        match self {
            Self::One(name) => name == event_name,
            Self::Many(names) => names.iter().any(|n| n == event_name),
            Self::All => true,
        }
    }
}

/// 事件监听器
#[async_trait]
pub trait Listener: Send + Sync {
    /// 监听器名称（用于日志、历史与失败定位）
    fn name(&self) -> &str;

    /// 优先级，数值越大越先执行
    fn priority(&self) -> i32 {
        0
    }

    /// 声明支持的事件（用于内省与校验，不决定分发正确性）
    fn supported_events(&self) -> SupportedEvents;

    /// 是否处理该事件；分发器在 `handle` 之前调用，返回 `false` 则跳过
    fn should_handle(&self, event: &Event) -> bool {
        self.supported_events().contains(event.name())
    }

    /// 处理事件；返回的错误由分发器负责记录并向上传递
    async fn handle(&self, event: &Event) -> anyhow::Result<()>;

    /// 在 `handle` 之后查询：返回 `true` 则跳过本次分发中剩余的监听器
    fn stop_propagation(&self, _event: &Event) -> bool {
        false
    }
}

/// `FnListener` 处理函数返回的 future
pub type HandleFuture<'a> = Pin<Box<dyn Future<Output = anyhow::Result<()>> + Send + 'a>>;
type HandleFn = Arc<dyn for<'a> Fn(&'a Event) -> HandleFuture<'a> + Send + Sync>;
type StopFn = Arc<dyn Fn(&Event) -> bool + Send + Sync>;

/// 基于闭包的监听器
///
/// ```
/// use ddd_eventing::listener::{FnListener, Listener, SupportedEvents};
///
/// let l = FnListener::new("audit", |event| {
///     let name = event.name().to_string();
///     Box::pin(async move {
///         println!("saw {name}");
///         Ok(())
///     })
/// })
/// .with_priority(5)
/// .with_supported(SupportedEvents::One("order_created".into()));
///
/// assert_eq!(l.priority(), 5);
/// ```
#[derive(Clone)]
pub struct FnListener {
    name: String,
    priority: i32,
    supported: SupportedEvents,
    handle: HandleFn,
    stop: Option<StopFn>,
}

impl FnListener {
    pub fn new<F>(name: impl Into<String>, handle: F) -> Self
    where
        F: for<'a> Fn(&'a Event) -> HandleFuture<'a> + Send + Sync + 'static,
    {
        Self {
            name: name.into(),
            priority: 0,
            supported: SupportedEvents::All,
            handle: Arc::new(handle),
            stop: None,
        }
    }

    pub fn arc<F>(name: impl Into<String>, handle: F) -> Arc<Self>
    where
        F: for<'a> Fn(&'a Event) -> HandleFuture<'a> + Send + Sync + 'static,
    {
        Arc::new(Self::new(name, handle))
    }

    pub fn with_priority(mut self, priority: i32) -> Self {
        self.priority = priority;
        self
    }

    pub fn with_supported(mut self, supported: SupportedEvents) -> Self {
        self.supported = supported;
        self
    }

    /// 处理完成后总是停止传播
    pub fn stopping(self) -> Self {
        self.stop_when(|_| true)
    }

    pub fn stop_when<P>(mut self, predicate: P) -> Self
    where
        P: Fn(&Event) -> bool + Send + Sync + 'static,
    {
        self.stop = Some(Arc::new(predicate));
        self
    }
}

impl fmt::Debug for FnListener {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FnListener")
            .field("name", &self.name)
            .field("priority", &self.priority)
            .field("supported", &self.supported)
            .finish()
    }
}

#[async_trait]
impl Listener for FnListener {
    fn name(&self) -> &str {
        &self.name
    }

    fn priority(&self) -> i32 {
        self.priority
    }

    fn supported_events(&self) -> SupportedEvents {
        self.supported.clone()
    }

    async fn handle(&self, event: &Event) -> anyhow::Result<()> {
        (self.handle)(event).await
    }

    fn stop_propagation(&self, event: &Event) -> bool {
        self.stop.as_ref().is_some_and(|p| p(event))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn supported_events_membership() {
        assert!(SupportedEvents::One("a".into()).contains("a"));
        assert!(!SupportedEvents::One("a".into()).contains("b"));
        assert!(SupportedEvents::Many(vec!["a".into(), "b".into()]).contains("b"));
        assert!(SupportedEvents::All.contains("anything"));
    }

    #[tokio::test]
    async fn fn_listener_defaults_and_stop_predicate() {
        let l = FnListener::new("l", |_| Box::pin(async { Ok(()) }))
            .with_supported(SupportedEvents::One("order_paid".into()))
            .stop_when(|e| e.priority() > 5);

        let paid = Event::builder().name("order_paid").priority(9).build();
        let other = Event::builder().name("order_created").build();

        assert!(l.should_handle(&paid));
        assert!(!l.should_handle(&other));
        assert!(l.handle(&paid).await.is_ok());
        assert!(l.stop_propagation(&paid));
        assert!(!l.stop_propagation(&other));
    }
}
