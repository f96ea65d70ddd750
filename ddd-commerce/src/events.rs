//! 电商事件目录
//!
//! 每种事件一个具名构造函数，统一事件名、载荷字段、同步/异步与投递优先级；
//! 监听器通过访问函数读取载荷，避免在各处散落字段名。
//!
//! | 事件                      | 投递 | 优先级 |
//! |---------------------------|------|--------|
//! | `order_created`           | 同步 | 5      |
//! | `order_paid`              | 异步 | 5      |
//! | `order_shipped`           | 异步 | 0      |
//! | `order_cancelled`         | 异步 | 5      |
//! | `user_registered`         | 异步 | 0      |
//! | `user_email_changed`      | 异步 | 0      |
//! | `user_deactivated`        | 同步 | 0      |
//! | `product_created`         | 同步 | 0      |
//! | `product_price_changed`   | 异步 | 0      |
//! | `product_stock_adjusted`  | 异步 | 0      |
//! | `product_out_of_stock`    | 异步 | 10     |
//!
use crate::error::CommerceResult;
use ddd_eventing::{Dispatcher, Event};
use serde_json::{Map, Value};

pub const ORDER_CREATED: &str = "order_created";
pub const ORDER_PAID: &str = "order_paid";
pub const ORDER_SHIPPED: &str = "order_shipped";
pub const ORDER_CANCELLED: &str = "order_cancelled";
pub const USER_REGISTERED: &str = "user_registered";
pub const USER_EMAIL_CHANGED: &str = "user_email_changed";
pub const USER_DEACTIVATED: &str = "user_deactivated";
pub const PRODUCT_CREATED: &str = "product_created";
pub const PRODUCT_PRICE_CHANGED: &str = "product_price_changed";
pub const PRODUCT_STOCK_ADJUSTED: &str = "product_stock_adjusted";
pub const PRODUCT_OUT_OF_STOCK: &str = "product_out_of_stock";

fn fields<const N: usize>(fields: [(&str, Value); N]) -> Map<String, Value> {
    fields
        .into_iter()
        .map(|(key, value)| (key.to_string(), value))
        .collect()
}

fn sync_event(name: &str, payload: Map<String, Value>, priority: i32) -> Event {
    Event::builder()
        .name(name)
        .payload(payload)
        .priority(priority)
        .build()
}

fn async_event(name: &str, payload: Map<String, Value>, priority: i32) -> Event {
    Event::builder()
        .name(name)
        .payload(payload)
        .priority(priority)
        .is_async(true)
        .build()
}

// --- 订单 ---

pub fn order_created(order_id: &str, user_id: &str, total_cents: u64, items: usize) -> Event {
    let payload = fields([
        ("order_id", order_id.into()),
        ("user_id", user_id.into()),
        ("total_cents", total_cents.into()),
        ("items", items.into()),
    ]);
    sync_event(ORDER_CREATED, payload, 5)
}

pub fn order_paid(order_id: &str, user_id: &str, total_cents: u64, payment_ref: &str) -> Event {
    let payload = fields([
        ("order_id", order_id.into()),
        ("user_id", user_id.into()),
        ("total_cents", total_cents.into()),
        ("payment_ref", payment_ref.into()),
    ]);
    async_event(ORDER_PAID, payload, 5)
}

pub fn order_shipped(order_id: &str, user_id: &str, tracking_number: &str) -> Event {
    let payload = fields([
        ("order_id", order_id.into()),
        ("user_id", user_id.into()),
        ("tracking_number", tracking_number.into()),
    ]);
    async_event(ORDER_SHIPPED, payload, 0)
}

pub fn order_cancelled(order_id: &str, user_id: &str, reason: &str, refund_required: bool) -> Event {
    let payload = fields([
        ("order_id", order_id.into()),
        ("user_id", user_id.into()),
        ("reason", reason.into()),
        ("refund_required", refund_required.into()),
    ]);
    async_event(ORDER_CANCELLED, payload, 5)
}

// --- 用户 ---

pub fn user_registered(user_id: &str, name: &str, email: &str) -> Event {
    let payload = fields([
        ("user_id", user_id.into()),
        ("name", name.into()),
        ("email", email.into()),
    ]);
    async_event(USER_REGISTERED, payload, 0)
}

pub fn user_email_changed(user_id: &str, old_email: &str, email: &str) -> Event {
    let payload = fields([
        ("user_id", user_id.into()),
        ("old_email", old_email.into()),
        ("email", email.into()),
    ]);
    async_event(USER_EMAIL_CHANGED, payload, 0)
}

/// `reason` 可缺省：载荷中保留 `null`，以区分“未提供原因”与“字段不存在”
pub fn user_deactivated(user_id: &str, reason: Option<&str>) -> Event {
    let payload = fields([
        ("user_id", user_id.into()),
        ("reason", reason.map_or(Value::Null, Value::from)),
    ]);
    sync_event(USER_DEACTIVATED, payload, 0)
}

// --- 商品 ---

pub fn product_created(product_id: &str, name: &str, price_cents: u64, stock: u32) -> Event {
    let payload = fields([
        ("product_id", product_id.into()),
        ("name", name.into()),
        ("price_cents", price_cents.into()),
        ("stock", stock.into()),
    ]);
    sync_event(PRODUCT_CREATED, payload, 0)
}

pub fn product_price_changed(product_id: &str, old_price_cents: u64, price_cents: u64) -> Event {
    let payload = fields([
        ("product_id", product_id.into()),
        ("old_price_cents", old_price_cents.into()),
        ("price_cents", price_cents.into()),
    ]);
    async_event(PRODUCT_PRICE_CHANGED, payload, 0)
}

pub fn product_stock_adjusted(product_id: &str, delta: i64, stock: u32) -> Event {
    let payload = fields([
        ("product_id", product_id.into()),
        ("delta", delta.into()),
        ("stock", stock.into()),
    ]);
    async_event(PRODUCT_STOCK_ADJUSTED, payload, 0)
}

/// 缺货事件走高优先级队列，并在元数据中标记为高重要度
pub fn product_out_of_stock(product_id: &str, name: &str) -> Event {
    let payload = fields([("product_id", product_id.into()), ("name", name.into())]);
    Event::builder()
        .name(PRODUCT_OUT_OF_STOCK)
        .payload(payload)
        .metadata(fields([("importance", "high".into())]))
        .priority(10)
        .is_async(true)
        .build()
}

// --- 访问函数 ---

pub fn order_id(event: &Event) -> Option<&str> {
    event.payload_str("order_id")
}

pub fn user_id(event: &Event) -> Option<&str> {
    event.payload_str("user_id")
}

pub fn product_id(event: &Event) -> Option<&str> {
    event.payload_str("product_id")
}

pub fn email(event: &Event) -> Option<&str> {
    event.payload_str("email")
}

pub fn total_cents(event: &Event) -> Option<i64> {
    event.payload_i64("total_cents")
}

pub fn price_cents(event: &Event) -> Option<i64> {
    event.payload_i64("price_cents")
}

pub fn stock(event: &Event) -> Option<i64> {
    event.payload_i64("stock")
}

/// 按顺序分发聚合产生的事件；首个失败即返回
pub async fn publish(dispatcher: &Dispatcher, events: &[Event]) -> CommerceResult<()> {
    for event in events {
        dispatcher.dispatch(event).await?;
    }
    Ok(())
}
