//! Cart aggregate. The cart exclusively owns its items; items are written
//! and deleted only through `Cart` and the storage layer persists the
//! aggregate as a unit.

use chrono::{DateTime, Utc};
use thiserror::Error;
use uuid::Uuid;

#[derive(Clone, Debug, sqlx::FromRow)]
pub struct Cart {
    pub id: Uuid,
    pub user_id: Uuid,
    #[sqlx(skip)]
    pub items: Vec<CartItem>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Clone, Debug, sqlx::FromRow)]
pub struct CartItem {
    pub id: Uuid,
    pub cart_id: Uuid,
    pub product_id: Uuid,
    pub quantity: i32,
}

impl Cart {
    pub fn for_user(user_id: Uuid) -> Self {
        let now = Utc::now();
        Self { id: Uuid::now_v7(), user_id, items: vec![], created_at: now, updated_at: now }
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    /// Adds a line, merging with an existing line for the same product.
    pub fn add_item(&mut self, product_id: Uuid, quantity: u32) {
        if let Some(existing) = self.items.iter_mut().find(|i| i.product_id == product_id) {
            existing.quantity += quantity as i32;
        } else {
            self.items.push(CartItem {
                id: Uuid::now_v7(),
                cart_id: self.id,
                product_id,
                quantity: quantity as i32,
            });
        }
        self.touch();
    }

    /// Sets a line's quantity; zero removes the line.
    pub fn update_quantity(&mut self, cart_item_id: Uuid, quantity: u32) -> Result<(), CartError> {
        let item = self
            .items
            .iter_mut()
            .find(|i| i.id == cart_item_id)
            .ok_or(CartError::ItemNotFound)?;
        if quantity == 0 {
            self.items.retain(|i| i.id != cart_item_id);
        } else {
            item.quantity = quantity as i32;
        }
        self.touch();
        Ok(())
    }

    pub fn remove_item(&mut self, cart_item_id: Uuid) -> Result<(), CartError> {
        let before = self.items.len();
        self.items.retain(|i| i.id != cart_item_id);
        if self.items.len() == before {
            return Err(CartError::ItemNotFound);
        }
        self.touch();
        Ok(())
    }

    pub fn clear(&mut self) {
        self.items.clear();
        self.touch();
    }

    fn touch(&mut self) {
        self.updated_at = Utc::now();
    }
}

#[derive(Clone, Debug, Error, PartialEq, Eq)]
pub enum CartError {
    #[error("cart item not found")]
    ItemNotFound,
}
