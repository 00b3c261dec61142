//! Order aggregate. The order exclusively owns its items: they are created
//! in one batch when the order is assembled and never mutated afterwards.
//! Price and line totals are snapshots taken at order time; later product
//! price changes do not affect a stored order.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use sqlx::types::Json;
use thiserror::Error;
use uuid::Uuid;

use crate::domain::address::Address;
use crate::domain::product::Product;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[sqlx(type_name = "order_status", rename_all = "snake_case")]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum OrderStatus {
    PendingPayment,
    Paid,
    Shipped,
    Delivered,
    Cancelled,
}

/// The shipping destination as resolved at order time, stored inline on the
/// order row. `Order::address_id` additionally links back to the address
/// book when the destination came from (or was saved to) it; a one-off
/// destination leaves it empty.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct ShippingAddress {
    pub recipient_name: String,
    pub recipient_phone: String,
    pub street_address: String,
    pub city: String,
    pub zip_code: String,
}

impl From<&Address> for ShippingAddress {
    fn from(address: &Address) -> Self {
        Self {
            recipient_name: address.recipient_name.clone(),
            recipient_phone: address.recipient_phone.clone(),
            street_address: address.street_address.clone(),
            city: address.city.clone(),
            zip_code: address.zip_code.clone(),
        }
    }
}

#[derive(Clone, Debug, sqlx::FromRow)]
pub struct Order {
    pub id: Uuid,
    pub order_number: String,
    pub total_amount: Decimal,
    pub delivery_message: String,
    pub status: OrderStatus,
    pub user_id: Uuid,
    pub address_id: Option<Uuid>,
    pub shipping: Json<ShippingAddress>,
    #[sqlx(skip)]
    pub items: Vec<OrderItem>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Clone, Debug, Serialize, sqlx::FromRow)]
pub struct OrderItem {
    pub id: Uuid,
    pub order_id: Uuid,
    pub product_id: Uuid,
    pub price: Decimal,
    pub quantity: i32,
    pub line_total: Decimal,
}

impl Order {
    pub fn new(
        order_number: impl Into<String>,
        total_amount: Decimal,
        delivery_message: impl Into<String>,
        user_id: Uuid,
        address_id: Option<Uuid>,
        shipping: ShippingAddress,
    ) -> Self {
        let now = Utc::now();
        Self {
            id: Uuid::now_v7(),
            order_number: order_number.into(),
            total_amount,
            delivery_message: delivery_message.into(),
            status: OrderStatus::PendingPayment,
            user_id,
            address_id,
            shipping: Json(shipping),
            items: vec![],
            created_at: now,
            updated_at: now,
        }
    }
}

impl OrderItem {
    /// Builds a line with the product's price snapshotted at order time.
    pub fn snapshot(order_id: Uuid, product: &Product, quantity: u32) -> Self {
        let line_total = product.price * Decimal::from(quantity);
        Self {
            id: Uuid::now_v7(),
            order_id,
            product_id: product.id,
            price: product.price,
            quantity: quantity as i32,
            line_total,
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[sqlx(type_name = "payment_status", rename_all = "lowercase")]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum PaymentStatus {
    Pending,
    Completed,
    Failed,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[sqlx(type_name = "payment_method", rename_all = "snake_case")]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum PaymentMethod {
    CreditCard,
    Cash,
    BankTransfer,
    MobilePayment,
    VirtualAccount,
}

/// Passive payment record attached to an order; no gateway logic lives here.
#[derive(Clone, Debug, Serialize, sqlx::FromRow)]
pub struct Payment {
    pub id: Uuid,
    pub order_id: Uuid,
    pub amount: Decimal,
    pub status: PaymentStatus,
    pub method: PaymentMethod,
    pub transaction_id: Option<String>,
    pub payment_details: Option<String>,
    pub created_at: DateTime<Utc>,
}

#[derive(Clone, Debug, Error, PartialEq, Eq)]
pub enum OrderError {
    #[error("order not found")]
    NotFound,
    #[error("could not allocate a unique order number")]
    NumberExhausted,
}
