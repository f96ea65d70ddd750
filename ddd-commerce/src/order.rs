//! 订单聚合
//!
//! 状态迁移：`Created → Paid → Shipped`，`Created | Paid → Cancelled`。
//! 每个命令方法先校验业务规则，通过后修改状态并返回对应事件。
//!
use crate::error::{CommerceError, CommerceResult};
use crate::events;
use ddd_eventing::Event;
use serde::{Deserialize, Serialize};
use ulid::Ulid;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OrderLine {
    pub sku: String,
    pub quantity: u32,
    pub unit_price_cents: u64,
}

impl OrderLine {
    pub fn new(sku: impl Into<String>, quantity: u32, unit_price_cents: u64) -> Self {
        Self {
            sku: sku.into(),
            quantity,
            unit_price_cents,
        }
    }

    pub fn subtotal_cents(&self) -> u64 {
        self.unit_price_cents.saturating_mul(u64::from(self.quantity))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum OrderStatus {
    Created,
    Paid,
    Shipped,
    Cancelled,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Order {
    id: String,
    user_id: String,
    lines: Vec<OrderLine>,
    status: OrderStatus,
    payment_ref: Option<String>,
    tracking_number: Option<String>,
    version: usize,
}

impl Order {
    /// 下单：至少一项商品，数量均为正
    pub fn create(user_id: &str, lines: Vec<OrderLine>) -> CommerceResult<(Self, Event)> {
        if user_id.trim().is_empty() {
            return Err(CommerceError::invalid_value("order requires a user"));
        }
        if lines.is_empty() {
            return Err(CommerceError::invalid_value(
                "order must contain at least one item",
            ));
        }
        if let Some(line) = lines.iter().find(|l| l.quantity == 0) {
            return Err(CommerceError::invalid_value(format!(
                "quantity must be positive: sku={}",
                line.sku
            )));
        }

        let order = Self {
            id: Ulid::new().to_string(),
            user_id: user_id.to_string(),
            lines,
            status: OrderStatus::Created,
            payment_ref: None,
            tracking_number: None,
            version: 1,
        };
        let event = events::order_created(
            &order.id,
            &order.user_id,
            order.total_cents(),
            order.lines.len(),
        );
        Ok((order, event))
    }

    pub fn pay(&mut self, payment_ref: &str) -> CommerceResult<Event> {
        match self.status {
            OrderStatus::Created => {}
            OrderStatus::Paid | OrderStatus::Shipped => {
                return Err(CommerceError::invalid_state("order already paid"));
            }
            OrderStatus::Cancelled => {
                return Err(CommerceError::invalid_state("order cancelled"));
            }
        }
        if payment_ref.trim().is_empty() {
            return Err(CommerceError::invalid_value("payment reference is empty"));
        }

        self.status = OrderStatus::Paid;
        self.payment_ref = Some(payment_ref.to_string());
        self.version += 1;
        Ok(events::order_paid(
            &self.id,
            &self.user_id,
            self.total_cents(),
            payment_ref,
        ))
    }

    pub fn ship(&mut self, tracking_number: &str) -> CommerceResult<Event> {
        match self.status {
            OrderStatus::Paid => {}
            OrderStatus::Created => {
                return Err(CommerceError::invalid_state("order not paid"));
            }
            OrderStatus::Shipped => {
                return Err(CommerceError::invalid_state("order already shipped"));
            }
            OrderStatus::Cancelled => {
                return Err(CommerceError::invalid_state("order cancelled"));
            }
        }

        self.status = OrderStatus::Shipped;
        self.tracking_number = Some(tracking_number.to_string());
        self.version += 1;
        Ok(events::order_shipped(&self.id, &self.user_id, tracking_number))
    }

    /// 已支付的订单取消时需要退款
    pub fn cancel(&mut self, reason: &str) -> CommerceResult<Event> {
        let refund_required = match self.status {
            OrderStatus::Created => false,
            OrderStatus::Paid => true,
            OrderStatus::Shipped => {
                return Err(CommerceError::invalid_state(
                    "cannot cancel a shipped order",
                ));
            }
            OrderStatus::Cancelled => {
                return Err(CommerceError::invalid_state("order already cancelled"));
            }
        };

        self.status = OrderStatus::Cancelled;
        self.version += 1;
        Ok(events::order_cancelled(
            &self.id,
            &self.user_id,
            reason,
            refund_required,
        ))
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn user_id(&self) -> &str {
        &self.user_id
    }

    pub fn lines(&self) -> &[OrderLine] {
        &self.lines
    }

    pub fn status(&self) -> OrderStatus {
        self.status
    }

    pub fn payment_ref(&self) -> Option<&str> {
        self.payment_ref.as_deref()
    }

    pub fn tracking_number(&self) -> Option<&str> {
        self.tracking_number.as_deref()
    }

    pub fn version(&self) -> usize {
        self.version
    }

    pub fn total_cents(&self) -> u64 {
        self.lines.iter().map(OrderLine::subtotal_cents).sum()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::Value;

    fn lines() -> Vec<OrderLine> {
        vec![OrderLine::new("SKU-1", 2, 1000), OrderLine::new("SKU-2", 1, 500)]
    }

    #[test]
    fn create_emits_order_created() {
        let (order, event) = Order::create("U-1", lines()).unwrap();
        assert_eq!(order.status(), OrderStatus::Created);
        assert_eq!(order.total_cents(), 2500);
        assert_eq!(order.version(), 1);
        assert_eq!(event.name(), events::ORDER_CREATED);
        assert_eq!(events::order_id(&event), Some(order.id()));
        assert_eq!(events::total_cents(&event), Some(2500));
    }

    #[test]
    fn create_requires_items() {
        let err = Order::create("U-1", Vec::new()).unwrap_err();
        assert!(matches!(err, CommerceError::InvalidValue { .. }));

        let err = Order::create("U-1", vec![OrderLine::new("SKU-1", 0, 100)]).unwrap_err();
        assert!(err.to_string().contains("SKU-1"));
    }

    #[test]
    fn lifecycle_pay_then_ship() {
        let (mut order, _) = Order::create("U-1", lines()).unwrap();

        let err = order.ship("TRK-1").unwrap_err();
        assert!(matches!(err, CommerceError::InvalidState { .. }));

        let paid = order.pay("pay-1").unwrap();
        assert_eq!(paid.name(), events::ORDER_PAID);
        assert!(paid.is_async());
        assert!(order.pay("pay-2").is_err());
        assert_eq!(order.payment_ref(), Some("pay-1"));

        let shipped = order.ship("TRK-1").unwrap();
        assert_eq!(shipped.payload_str("tracking_number"), Some("TRK-1"));
        assert_eq!(order.status(), OrderStatus::Shipped);
        assert_eq!(order.version(), 3);

        let err = order.cancel("changed mind").unwrap_err();
        assert!(err.to_string().contains("shipped"));
    }

    #[test]
    fn cancel_after_payment_requires_refund() {
        let (mut unpaid, _) = Order::create("U-1", lines()).unwrap();
        let event = unpaid.cancel("duplicate").unwrap();
        assert_eq!(event.payload_value("refund_required"), Some(&Value::Bool(false)));
        assert!(unpaid.cancel("again").is_err());
        assert!(unpaid.pay("pay-1").is_err());

        let (mut paid, _) = Order::create("U-1", lines()).unwrap();
        paid.pay("pay-1").unwrap();
        let event = paid.cancel("out of stock").unwrap();
        assert_eq!(event.payload_value("refund_required"), Some(&Value::Bool(true)));
        assert_eq!(paid.status(), OrderStatus::Cancelled);
    }
}
