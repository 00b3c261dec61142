//! Product catalog and category management.
//!
//! Seller-scoped writes go through the same version-guarded product write
//! the order flow uses, so a stale seller update surfaces as a conflict
//! instead of silently overwriting.

use std::sync::Arc;

use rust_decimal::Decimal;
use tracing::info;
use uuid::Uuid;

use crate::bus::EventBus;
use crate::domain::events::DomainEvent;
use crate::domain::{Category, CategoryError, Product, ProductError, UserError};
use crate::error::AppError;
use crate::store::{Page, Storage, StoreError, UnitOfWork, WriteOutcome};

#[derive(Clone, Debug)]
pub struct RegisterProduct {
    pub name: String,
    pub description: String,
    pub price: Decimal,
    pub stock: i32,
    pub image_urls: Vec<String>,
    pub category_ids: Vec<Uuid>,
}

#[derive(Clone, Debug)]
pub struct ProductChanges {
    pub name: String,
    pub description: String,
    pub price: Decimal,
    pub image_urls: Vec<String>,
    pub category_ids: Option<Vec<Uuid>>,
}

#[derive(Clone)]
pub struct CatalogService {
    storage: Arc<dyn Storage>,
    bus: EventBus,
}

impl CatalogService {
    pub fn new(storage: Arc<dyn Storage>, bus: EventBus) -> Self {
        Self { storage, bus }
    }

    pub async fn list_products(
        &self,
        keyword: Option<&str>,
        page: Page,
    ) -> Result<(Vec<Product>, i64), AppError> {
        let mut uow = self.storage.begin().await?;
        let listed = uow.list_products(keyword, page).await?;
        uow.commit().await?;
        Ok(listed)
    }

    pub async fn get_product(&self, id: Uuid) -> Result<(Product, Vec<Category>), AppError> {
        let mut uow = self.storage.begin().await?;
        let product = uow
            .product_by_id(id)
            .await?
            .filter(Product::is_active)
            .ok_or(ProductError::NotFound)?;
        let categories = uow.categories_for_product(id).await?;
        uow.commit().await?;
        Ok((product, categories))
    }

    pub async fn register_product(
        &self,
        seller_id: Uuid,
        input: RegisterProduct,
    ) -> Result<Product, AppError> {
        if input.price < Decimal::ONE_HUNDRED {
            return Err(ProductError::InvalidPrice.into());
        }
        if input.stock < 0 {
            return Err(ProductError::NegativeStock.into());
        }
        let mut uow = self.storage.begin().await?;
        let seller = uow.user_by_id(seller_id).await?.ok_or(UserError::NotFound)?;
        seller.ensure_seller()?;
        ensure_categories_exist(uow.as_mut(), &input.category_ids).await?;
        let product = Product::new(
            input.name,
            input.description,
            input.price,
            input.stock,
            seller.id,
            input.image_urls,
        );
        uow.insert_product(&product).await?;
        uow.set_product_categories(product.id, &input.category_ids).await?;
        uow.commit().await?;
        info!(product_id = %product.id, seller_id = %seller.id, "product registered");
        self.bus
            .publish(&DomainEvent::ProductRegistered {
                product_id: product.id,
                seller_id: seller.id,
            })
            .await;
        Ok(product)
    }

    pub async fn update_product(
        &self,
        seller_id: Uuid,
        product_id: Uuid,
        changes: ProductChanges,
    ) -> Result<Product, AppError> {
        if changes.price < Decimal::ONE_HUNDRED {
            return Err(ProductError::InvalidPrice.into());
        }
        let mut uow = self.storage.begin().await?;
        let mut product = self.owned_product(uow.as_mut(), seller_id, product_id).await?;
        product.rename(changes.name);
        product.update_description(changes.description);
        product.update_price(changes.price);
        product.image_urls = changes.image_urls;
        if let Some(category_ids) = &changes.category_ids {
            ensure_categories_exist(uow.as_mut(), category_ids).await?;
            uow.set_product_categories(product.id, category_ids).await?;
        }
        if uow.update_product(&product).await? == WriteOutcome::Conflict {
            return Err(ProductError::ConcurrentModification.into());
        }
        uow.commit().await?;
        product.version += 1;
        Ok(product)
    }

    pub async fn update_stock(
        &self,
        seller_id: Uuid,
        product_id: Uuid,
        stock: i32,
    ) -> Result<Product, AppError> {
        let mut uow = self.storage.begin().await?;
        let mut product = self.owned_product(uow.as_mut(), seller_id, product_id).await?;
        product.update_stock(stock)?;
        if uow.update_product(&product).await? == WriteOutcome::Conflict {
            return Err(ProductError::ConcurrentModification.into());
        }
        uow.commit().await?;
        product.version += 1;
        info!(product_id = %product.id, stock, "stock adjusted");
        self.bus
            .publish(&DomainEvent::StockAdjusted { product_id: product.id, stock })
            .await;
        Ok(product)
    }

    /// Logical delete: flips the product to inactive, the row stays.
    pub async fn delete_product(&self, seller_id: Uuid, product_id: Uuid) -> Result<(), AppError> {
        let mut uow = self.storage.begin().await?;
        let mut product = self.owned_product(uow.as_mut(), seller_id, product_id).await?;
        product.deactivate();
        if uow.update_product(&product).await? == WriteOutcome::Conflict {
            return Err(ProductError::ConcurrentModification.into());
        }
        uow.commit().await?;
        info!(product_id = %product.id, "product deactivated");
        self.bus
            .publish(&DomainEvent::ProductDeactivated { product_id: product.id })
            .await;
        Ok(())
    }

    pub async fn create_category(&self, name: &str) -> Result<Category, AppError> {
        let category = Category::new(name);
        let mut uow = self.storage.begin().await?;
        match uow.insert_category(&category).await {
            Ok(()) => {}
            Err(StoreError::UniqueViolation { .. }) => {
                return Err(CategoryError::DuplicateName.into());
            }
            Err(err) => return Err(err.into()),
        }
        uow.commit().await?;
        Ok(category)
    }

    pub async fn list_categories(&self) -> Result<Vec<Category>, AppError> {
        let mut uow = self.storage.begin().await?;
        let categories = uow.list_categories().await?;
        uow.commit().await?;
        Ok(categories)
    }

    async fn owned_product(
        &self,
        uow: &mut dyn UnitOfWork,
        seller_id: Uuid,
        product_id: Uuid,
    ) -> Result<Product, AppError> {
        let product = uow
            .product_by_id(product_id)
            .await?
            .filter(Product::is_active)
            .ok_or(ProductError::NotFound)?;
        if !product.is_owned_by(seller_id) {
            return Err(ProductError::NotOwner.into());
        }
        Ok(product)
    }
}

async fn ensure_categories_exist(
    uow: &mut dyn UnitOfWork,
    category_ids: &[Uuid],
) -> Result<(), AppError> {
    if uow.count_categories(category_ids).await? != category_ids.len() {
        return Err(CategoryError::NotFound.into());
    }
    Ok(())
}
