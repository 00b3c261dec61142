//! Shopping cart operations.

use std::sync::Arc;

use uuid::Uuid;

use crate::domain::{Cart, CartError, Product, ProductError};
use crate::error::AppError;
use crate::store::Storage;

#[derive(Clone)]
pub struct CartService {
    storage: Arc<dyn Storage>,
}

impl CartService {
    pub fn new(storage: Arc<dyn Storage>) -> Self {
        Self { storage }
    }

    /// A user without a stored cart gets an empty, unsaved one; the row is
    /// only created once something goes in.
    pub async fn cart_for(&self, user_id: Uuid) -> Result<Cart, AppError> {
        let mut uow = self.storage.begin().await?;
        let cart = uow
            .cart_for_user(user_id)
            .await?
            .unwrap_or_else(|| Cart::for_user(user_id));
        uow.commit().await?;
        Ok(cart)
    }

    pub async fn add_item(
        &self,
        user_id: Uuid,
        product_id: Uuid,
        quantity: u32,
    ) -> Result<Cart, AppError> {
        if quantity == 0 {
            return Err(AppError::Validation("quantity must be positive".into()));
        }
        let mut uow = self.storage.begin().await?;
        uow.product_by_id(product_id)
            .await?
            .filter(Product::is_active)
            .ok_or(ProductError::NotFound)?;
        let mut cart = uow
            .cart_for_user(user_id)
            .await?
            .unwrap_or_else(|| Cart::for_user(user_id));
        cart.add_item(product_id, quantity);
        uow.save_cart(&cart).await?;
        uow.commit().await?;
        Ok(cart)
    }

    pub async fn update_quantity(
        &self,
        user_id: Uuid,
        cart_item_id: Uuid,
        quantity: u32,
    ) -> Result<Cart, AppError> {
        let mut uow = self.storage.begin().await?;
        let mut cart = uow
            .cart_for_user(user_id)
            .await?
            .ok_or(CartError::ItemNotFound)?;
        cart.update_quantity(cart_item_id, quantity)?;
        uow.save_cart(&cart).await?;
        uow.commit().await?;
        Ok(cart)
    }

    pub async fn remove_item(&self, user_id: Uuid, cart_item_id: Uuid) -> Result<Cart, AppError> {
        let mut uow = self.storage.begin().await?;
        let mut cart = uow
            .cart_for_user(user_id)
            .await?
            .ok_or(CartError::ItemNotFound)?;
        cart.remove_item(cart_item_id)?;
        uow.save_cart(&cart).await?;
        uow.commit().await?;
        Ok(cart)
    }

    pub async fn clear(&self, user_id: Uuid) -> Result<(), AppError> {
        let mut uow = self.storage.begin().await?;
        if let Some(mut cart) = uow.cart_for_user(user_id).await? {
            cart.clear();
            uow.save_cart(&cart).await?;
        }
        uow.commit().await?;
        Ok(())
    }
}
