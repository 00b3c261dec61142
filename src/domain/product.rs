//! Product entity and stock rules.
//!
//! `version` is the optimistic concurrency token: every successful write
//! through the storage layer bumps it, and a guarded write against a stale
//! version is rejected (see `store::UnitOfWork::update_product`).

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use uuid::Uuid;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[sqlx(type_name = "product_status", rename_all = "lowercase")]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ProductStatus {
    Active,
    Inactive,
}

#[derive(Clone, Debug, Serialize, sqlx::FromRow)]
pub struct Product {
    pub id: Uuid,
    pub name: String,
    pub description: String,
    pub price: Decimal,
    pub stock: i32,
    pub version: i64,
    pub seller_id: Uuid,
    pub image_urls: Vec<String>,
    pub status: ProductStatus,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Product {
    pub fn new(
        name: impl Into<String>,
        description: impl Into<String>,
        price: Decimal,
        stock: i32,
        seller_id: Uuid,
        image_urls: Vec<String>,
    ) -> Self {
        let now = Utc::now();
        Self {
            id: Uuid::now_v7(),
            name: name.into(),
            description: description.into(),
            price,
            stock,
            version: 0,
            seller_id,
            image_urls,
            status: ProductStatus::Active,
            created_at: now,
            updated_at: now,
        }
    }

    pub fn is_active(&self) -> bool {
        self.status == ProductStatus::Active
    }

    pub fn is_owned_by(&self, seller_id: Uuid) -> bool {
        self.seller_id == seller_id
    }

    /// Checks that `quantity` units could be taken from stock right now.
    pub fn check_stock(&self, quantity: u32) -> Result<(), ProductError> {
        if (self.stock as i64) < i64::from(quantity) {
            return Err(ProductError::InsufficientStock {
                name: self.name.clone(),
                requested: quantity,
                available: self.stock.max(0) as u32,
            });
        }
        Ok(())
    }

    /// Subtracts `quantity` from stock. A request for more than the
    /// available stock is rejected, never clamped.
    pub fn decrease_stock(&mut self, quantity: u32) -> Result<(), ProductError> {
        self.check_stock(quantity)?;
        self.stock -= quantity as i32;
        self.touch();
        Ok(())
    }

    pub fn update_stock(&mut self, stock: i32) -> Result<(), ProductError> {
        if stock < 0 {
            return Err(ProductError::NegativeStock);
        }
        if stock == self.stock {
            return Err(ProductError::SameStock);
        }
        self.stock = stock;
        self.touch();
        Ok(())
    }

    pub fn rename(&mut self, name: impl Into<String>) {
        self.name = name.into();
        self.touch();
    }

    pub fn update_description(&mut self, description: impl Into<String>) {
        self.description = description.into();
        self.touch();
    }

    pub fn update_price(&mut self, price: Decimal) {
        self.price = price;
        self.touch();
    }

    /// Logical delete: the row is kept, the product stops being listed.
    pub fn deactivate(&mut self) {
        self.status = ProductStatus::Inactive;
        self.touch();
    }

    fn touch(&mut self) {
        self.updated_at = Utc::now();
    }
}

#[derive(Clone, Debug, Error, PartialEq, Eq)]
pub enum ProductError {
    #[error("product not found")]
    NotFound,
    #[error("not enough stock for {name}: requested {requested}, available {available}")]
    InsufficientStock {
        name: String,
        requested: u32,
        available: u32,
    },
    #[error("the product was modified concurrently, please retry")]
    ConcurrentModification,
    #[error("you do not own this product")]
    NotOwner,
    #[error("price must be at least 100")]
    InvalidPrice,
    #[error("stock must be zero or more")]
    NegativeStock,
    #[error("stock is unchanged")]
    SameStock,
}
