//! 示例监听器
//!
//! - `AuditLogListener`：订阅全部事件（通配），最低优先级，写结构化日志并保留审计轨迹；
//! - `NotificationListener`：订单/用户事件，通过 `Notifier` 通知对应用户。
//!
use crate::events;
use anyhow::Context;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use ddd_eventing::{Event, Listener, SupportedEvents};
use std::sync::{Arc, Mutex};
use tracing::info;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AuditEntry {
    pub event_id: String,
    pub event_name: String,
    pub category: Option<String>,
    pub occurred_at: DateTime<Utc>,
}

#[derive(Debug, Default)]
pub struct AuditLogListener {
    entries: Mutex<Vec<AuditEntry>>,
}

impl AuditLogListener {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn entries(&self) -> Vec<AuditEntry> {
        self.entries
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .clone()
    }
}

#[async_trait]
impl Listener for AuditLogListener {
    fn name(&self) -> &str {
        "audit-log"
    }

    fn priority(&self) -> i32 {
        -100
    }

    fn supported_events(&self) -> SupportedEvents {
        SupportedEvents::All
    }

    async fn handle(&self, event: &Event) -> anyhow::Result<()> {
        info!(
            event_id = event.id(),
            event_name = event.name(),
            category = event.metadata_str("category"),
            importance = event.metadata_str("importance"),
            is_async = event.is_async(),
            occurred_at = %event.occurred_at(),
            "domain event recorded"
        );
        self.entries
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .push(AuditEntry {
                event_id: event.id().to_string(),
                event_name: event.name().to_string(),
                category: event.metadata_str("category").map(str::to_string),
                occurred_at: event.occurred_at(),
            });
        Ok(())
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Notification {
    pub recipient: String,
    pub subject: String,
    pub event_id: String,
}

/// 通知通道（邮件、短信等）
#[async_trait]
pub trait Notifier: Send + Sync {
    async fn send(&self, notification: Notification) -> anyhow::Result<()>;
}

/// 只记录不发送的通知通道
#[derive(Debug, Default)]
pub struct RecordingNotifier {
    sent: Mutex<Vec<Notification>>,
}

impl RecordingNotifier {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn sent(&self) -> Vec<Notification> {
        self.sent.lock().unwrap_or_else(|e| e.into_inner()).clone()
    }
}

#[async_trait]
impl Notifier for RecordingNotifier {
    async fn send(&self, notification: Notification) -> anyhow::Result<()> {
        self.sent
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .push(notification);
        Ok(())
    }
}

pub struct NotificationListener {
    notifier: Arc<dyn Notifier>,
}

impl NotificationListener {
    pub fn new(notifier: Arc<dyn Notifier>) -> Self {
        Self { notifier }
    }

    fn subject(event: &Event) -> Option<&'static str> {
        let subject = match event.name() {
            events::ORDER_CREATED => "We received your order",
            events::ORDER_SHIPPED => "Your order is on its way",
            events::ORDER_CANCELLED => "Your order was cancelled",
            events::USER_REGISTERED => "Welcome aboard",
            events::USER_EMAIL_CHANGED => "Your email address was changed",
            _ => return None,
        };
        Some(subject)
    }
}

#[async_trait]
impl Listener for NotificationListener {
    fn name(&self) -> &str {
        "notification"
    }

    fn supported_events(&self) -> SupportedEvents {
        SupportedEvents::Many(vec![
            events::ORDER_CREATED.to_string(),
            events::ORDER_SHIPPED.to_string(),
            events::ORDER_CANCELLED.to_string(),
            events::USER_REGISTERED.to_string(),
            events::USER_EMAIL_CHANGED.to_string(),
        ])
    }

    /// 没有收件人的事件直接跳过
    fn should_handle(&self, event: &Event) -> bool {
        self.supported_events().contains(event.name()) && events::user_id(event).is_some()
    }

    async fn handle(&self, event: &Event) -> anyhow::Result<()> {
        let recipient = events::user_id(event).context("event has no user_id")?;
        let subject = Self::subject(event)
            .with_context(|| format!("no notification template for {}", event.name()))?;

        self.notifier
            .send(Notification {
                recipient: recipient.to_string(),
                subject: subject.to_string(),
                event_id: event.id().to_string(),
            })
            .await
            .with_context(|| format!("failed to notify {recipient}"))
    }
}
