//! Storage abstraction.
//!
//! Services open a [`UnitOfWork`], perform every read and write of one
//! operation through it, and finish with an explicit `commit` or
//! `rollback`. Dropping an unfinished unit of work rolls it back, so an
//! early `?` return can never leave a partial commit behind.
//!
//! Two backends exist: [`postgres::PgStorage`] for production and
//! [`memory::MemoryStorage`] for tests.

use async_trait::async_trait;
use thiserror::Error;
use uuid::Uuid;

use crate::domain::{Address, Cart, Category, Order, Payment, Product, User};

pub mod memory;
pub mod postgres;

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("unique constraint violated: {constraint}")]
    UniqueViolation { constraint: String },
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),
}

/// Outcome of a version-guarded write.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum WriteOutcome {
    Applied,
    /// The stored version no longer matches the copy the caller read.
    Conflict,
}

#[derive(Clone, Copy, Debug)]
pub struct Page {
    pub page: u32,
    pub per_page: u32,
}

impl Page {
    pub fn clamped(page: Option<u32>, per_page: Option<u32>) -> Self {
        Self {
            page: page.unwrap_or(1).max(1),
            per_page: per_page.unwrap_or(20).clamp(1, 100),
        }
    }

    pub fn limit(&self) -> i64 {
        i64::from(self.per_page)
    }

    pub fn offset(&self) -> i64 {
        i64::from(self.page - 1) * i64::from(self.per_page)
    }
}

#[async_trait]
pub trait Storage: Send + Sync {
    async fn begin(&self) -> Result<Box<dyn UnitOfWork>, StoreError>;
}

#[async_trait]
pub trait UnitOfWork: Send {
    // users
    async fn insert_user(&mut self, user: &User) -> Result<(), StoreError>;
    async fn update_user(&mut self, user: &User) -> Result<(), StoreError>;
    async fn user_by_id(&mut self, id: Uuid) -> Result<Option<User>, StoreError>;
    async fn user_by_email(&mut self, email: &str) -> Result<Option<User>, StoreError>;

    // categories
    async fn insert_category(&mut self, category: &Category) -> Result<(), StoreError>;
    async fn list_categories(&mut self) -> Result<Vec<Category>, StoreError>;
    async fn count_categories(&mut self, ids: &[Uuid]) -> Result<usize, StoreError>;
    async fn set_product_categories(&mut self, product_id: Uuid, category_ids: &[Uuid]) -> Result<(), StoreError>;
    async fn categories_for_product(&mut self, product_id: Uuid) -> Result<Vec<Category>, StoreError>;

    // products
    async fn insert_product(&mut self, product: &Product) -> Result<(), StoreError>;
    async fn product_by_id(&mut self, id: Uuid) -> Result<Option<Product>, StoreError>;
    /// Version-guarded write: the row is updated only while its stored
    /// version still equals `product.version`; on success the stored
    /// version becomes `product.version + 1`. A missing row reports
    /// [`WriteOutcome::Conflict`] as well, since the guard cannot match.
    async fn update_product(&mut self, product: &Product) -> Result<WriteOutcome, StoreError>;
    async fn list_products(&mut self, keyword: Option<&str>, page: Page) -> Result<(Vec<Product>, i64), StoreError>;

    // addresses
    async fn insert_address(&mut self, address: &Address) -> Result<(), StoreError>;
    async fn default_address_for(&mut self, user_id: Uuid) -> Result<Option<Address>, StoreError>;
    async fn address_for_user(&mut self, id: Uuid, user_id: Uuid) -> Result<Option<Address>, StoreError>;

    // carts
    async fn cart_for_user(&mut self, user_id: Uuid) -> Result<Option<Cart>, StoreError>;
    /// Persists the aggregate as a unit: the cart row is upserted and the
    /// item set replaced.
    async fn save_cart(&mut self, cart: &Cart) -> Result<(), StoreError>;

    // orders
    async fn insert_order(&mut self, order: &Order) -> Result<(), StoreError>;
    async fn order_for_user(&mut self, id: Uuid, user_id: Uuid) -> Result<Option<Order>, StoreError>;
    async fn list_orders_for_user(&mut self, user_id: Uuid, page: Page) -> Result<(Vec<Order>, i64), StoreError>;
    async fn payment_for_order(&mut self, order_id: Uuid) -> Result<Option<Payment>, StoreError>;

    async fn commit(self: Box<Self>) -> Result<(), StoreError>;
    async fn rollback(self: Box<Self>) -> Result<(), StoreError>;
}
