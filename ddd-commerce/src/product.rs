//! 商品聚合
//!
//! 库存降为零时额外产生 `product_out_of_stock`（高优先级异步事件）。
//!
use crate::error::{CommerceError, CommerceResult};
use crate::events;
use ddd_eventing::Event;
use serde::{Deserialize, Serialize};
use ulid::Ulid;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Product {
    id: String,
    name: String,
    price_cents: u64,
    stock: u32,
    version: usize,
}

impl Product {
    pub fn create(name: &str, price_cents: u64, stock: u32) -> CommerceResult<(Self, Event)> {
        let name = name.trim();
        if name.is_empty() {
            return Err(CommerceError::invalid_value("product name is empty"));
        }
        if price_cents == 0 {
            return Err(CommerceError::invalid_value("price must be positive"));
        }

        let product = Self {
            id: Ulid::new().to_string(),
            name: name.to_string(),
            price_cents,
            stock,
            version: 1,
        };
        let event = events::product_created(&product.id, &product.name, price_cents, stock);
        Ok((product, event))
    }

    pub fn change_price(&mut self, price_cents: u64) -> CommerceResult<Event> {
        if price_cents == 0 {
            return Err(CommerceError::invalid_value("price must be positive"));
        }
        if price_cents == self.price_cents {
            return Err(CommerceError::invalid_value("price unchanged"));
        }

        let old_price_cents = std::mem::replace(&mut self.price_cents, price_cents);
        self.version += 1;
        Ok(events::product_price_changed(
            &self.id,
            old_price_cents,
            price_cents,
        ))
    }

    /// 按增量调整库存；库存不能为负
    pub fn adjust_stock(&mut self, delta: i64) -> CommerceResult<Vec<Event>> {
        if delta == 0 {
            return Err(CommerceError::invalid_value("stock delta is zero"));
        }
        let stock = i64::from(self.stock)
            .checked_add(delta)
            .and_then(|s| u32::try_from(s).ok())
            .ok_or_else(|| {
                CommerceError::invalid_value(format!(
                    "insufficient stock: product={}, stock={}, delta={delta}",
                    self.id, self.stock
                ))
            })?;

        self.stock = stock;
        self.version += 1;

        let mut out = vec![events::product_stock_adjusted(&self.id, delta, stock)];
        if stock == 0 {
            out.push(events::product_out_of_stock(&self.id, &self.name));
        }
        Ok(out)
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn price_cents(&self) -> u64 {
        self.price_cents
    }

    pub fn stock(&self) -> u32 {
        self.stock
    }

    pub fn version(&self) -> usize {
        self.version
    }
}
