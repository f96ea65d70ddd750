//! 事件系统演示：下单 → 支付 → 发货，缺货事件走高优先级队列，
//! 通知失败的事件在重试耗尽后进入死信。
//!
//! 环境变量：
//! - `RUST_LOG`：日志过滤（默认 `info`）
//! - `EVENTS_HISTORY_CAPACITY`：分发历史容量（默认 100）
//! - `EVENTS_WORKERS`：投递工作者数量（默认 4）
//!
use anyhow::Context;
use ddd_commerce::events::publish;
use ddd_commerce::{
    AuditLogListener, NotificationListener, Order, OrderLine, Product, RecordingNotifier, User,
};
use ddd_eventing::clock::{Clock, SystemClock};
use ddd_eventing::delivery::{
    DeadLetterStore, DeliveryQueue, DeliveryWorker, InMemoryCounterStore, InMemoryDeadLetterStore,
    InMemoryDeliveryQueue,
};
use ddd_eventing::{DeliveryConfig, EventConfig, EventService, FnListener};
use std::str::FromStr;
use std::sync::Arc;
use std::time::Duration;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

fn env_or<T>(key: &str, default: T) -> anyhow::Result<T>
where
    T: FromStr,
    T::Err: std::error::Error + Send + Sync + 'static,
{
    match std::env::var(key) {
        Ok(raw) => raw
            .parse()
            .with_context(|| format!("{key} must be a valid number, got {raw:?}")),
        Err(_) => Ok(default),
    }
}

fn load_config() -> anyhow::Result<EventConfig> {
    let delivery = DeliveryConfig {
        workers: env_or("EVENTS_WORKERS", DeliveryConfig::default().workers)?,
        poll_interval: Duration::from_millis(20),
        ..Default::default()
    };
    Ok(EventConfig {
        history_enabled: true,
        history_capacity: env_or(
            "EVENTS_HISTORY_CAPACITY",
            EventConfig::default().history_capacity,
        )?,
        delivery,
    })
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let config = load_config()?;
    let clock: Arc<dyn Clock> = Arc::new(SystemClock);
    let queue = Arc::new(InMemoryDeliveryQueue::new(clock.clone()));
    let dead_letters = Arc::new(InMemoryDeadLetterStore::new());
    let service = EventService::builder()
        .config(config)
        .queue(queue.clone())
        .clock(clock.clone())
        .build();

    let dispatcher = service.dispatcher();
    let audit = Arc::new(AuditLogListener::new());
    let notifier = Arc::new(RecordingNotifier::new());
    dispatcher.subscribe(audit.clone());
    dispatcher.subscribe(Arc::new(NotificationListener::new(notifier.clone())));
    dispatcher.listen(
        "product_out_of_stock",
        FnListener::arc("restock-alert", |event| {
            let product = event.payload_str("name").unwrap_or("unknown").to_string();
            Box::pin(async move {
                warn!(product = %product, "product sold out, restock required");
                Ok(())
            })
        }),
    );
    // 始终失败：演示重试与死信（重试延迟缩短为 50ms 以便观察）
    dispatcher.listen(
        "order_paid",
        FnListener::arc("erp-export", |_| {
            Box::pin(async { Err(anyhow::anyhow!("erp endpoint unreachable")) })
        }),
    );

    let delivery = DeliveryConfig {
        retry_after: Duration::from_millis(50),
        ..config.delivery
    };
    let worker = DeliveryWorker::builder()
        .dispatcher(dispatcher.clone())
        .queue(queue.clone())
        .dead_letters(dead_letters.clone())
        .counter_store(Arc::new(InMemoryCounterStore::new(clock.clone())), &delivery)
        .clock(clock)
        .config(delivery)
        .build();
    let handle = Arc::new(worker).start();
    info!(workers = delivery.workers, "delivery workers started");

    let (user, registered) = User::register("Ada Lovelace", "ada@example.com")?;
    let (mut lamp, created) = Product::create("Desk lamp", 4999, 1)?;
    publish(&dispatcher, &[registered, created]).await?;

    let (mut order, placed) = Order::create(
        user.id(),
        vec![OrderLine::new(lamp.id(), 1, lamp.price_cents())],
    )?;
    publish(&dispatcher, &[placed]).await?;
    publish(&dispatcher, &lamp.adjust_stock(-1)?).await?;
    publish(&dispatcher, &[order.pay("pay-0001")?]).await?;
    publish(&dispatcher, &[order.ship("TRK-0001")?]).await?;

    if let Err(e) = order.cancel("customer request") {
        warn!(order_id = order.id(), error = %e, "cancel rejected");
    }

    // 等待队列清空（含重试）
    tokio::time::timeout(Duration::from_secs(5), async {
        while queue.pending().await.unwrap_or(0) > 0 || queue.in_flight() > 0 {
            tokio::time::sleep(Duration::from_millis(20)).await;
        }
    })
    .await
    .context("delivery queue did not drain in time")?;

    handle.shutdown();
    handle.join().await;

    let snapshot = service.debug();
    info!(
        dispatcher_id = ?snapshot.dispatcher_id,
        listeners = snapshot.listener_count,
        events = ?snapshot.registered_events,
        history = snapshot.history_len,
        "event service snapshot"
    );
    info!(
        audited = audit.entries().len(),
        notified = notifier.sent().len(),
        "listeners finished"
    );
    for record in dead_letters.records().await? {
        warn!(
            event_id = record.event_id(),
            event_name = record.event_name(),
            attempts = record.attempts(),
            error = record.error_message(),
            "dead letter"
        );
    }

    Ok(())
}
