//! Domain events, published as fire-and-forget notifications after commit.
//! They are never read back; all state lives in the relational store.

use rust_decimal::Decimal;
use serde::Serialize;
use uuid::Uuid;

#[derive(Clone, Debug, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum DomainEvent {
    ProductRegistered { product_id: Uuid, seller_id: Uuid },
    ProductDeactivated { product_id: Uuid },
    StockAdjusted { product_id: Uuid, stock: i32 },
    OrderCreated {
        order_id: Uuid,
        order_number: String,
        user_id: Uuid,
        total_amount: Decimal,
    },
}

impl DomainEvent {
    pub fn subject(&self) -> &'static str {
        match self {
            Self::ProductRegistered { .. } => "storefront.products.registered",
            Self::ProductDeactivated { .. } => "storefront.products.deactivated",
            Self::StockAdjusted { .. } => "storefront.products.stock_adjusted",
            Self::OrderCreated { .. } => "storefront.orders.created",
        }
    }
}
