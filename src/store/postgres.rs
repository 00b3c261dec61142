//! Postgres storage backend.
//!
//! One [`PgUnitOfWork`] wraps one database transaction. The wrapped
//! transaction rolls back when dropped uncommitted, which is what gives an
//! early `?` return its all-or-nothing semantics.

use async_trait::async_trait;
use sqlx::{PgPool, Postgres, Transaction};
use uuid::Uuid;

use crate::domain::{Address, Cart, CartItem, Category, Order, OrderItem, Payment, Product, User};
use crate::store::{Page, StoreError, Storage, UnitOfWork, WriteOutcome};

#[derive(Clone)]
pub struct PgStorage {
    pool: PgPool,
}

impl PgStorage {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl Storage for PgStorage {
    async fn begin(&self) -> Result<Box<dyn UnitOfWork>, StoreError> {
        let tx = self.pool.begin().await?;
        Ok(Box::new(PgUnitOfWork { tx }))
    }
}

pub struct PgUnitOfWork {
    tx: Transaction<'static, Postgres>,
}

fn map_db_err(err: sqlx::Error) -> StoreError {
    if let sqlx::Error::Database(db) = &err {
        if db.is_unique_violation() {
            return StoreError::UniqueViolation {
                constraint: db.constraint().unwrap_or("unknown").to_string(),
            };
        }
    }
    StoreError::Database(err)
}

#[async_trait]
impl UnitOfWork for PgUnitOfWork {
    async fn insert_user(&mut self, user: &User) -> Result<(), StoreError> {
        sqlx::query(
            "INSERT INTO users (id, email, password_hash, name, role, created_at, updated_at) \
             VALUES ($1, $2, $3, $4, $5, $6, $7)",
        )
        .bind(user.id)
        .bind(&user.email)
        .bind(&user.password_hash)
        .bind(&user.name)
        .bind(user.role)
        .bind(user.created_at)
        .bind(user.updated_at)
        .execute(&mut *self.tx)
        .await
        .map_err(map_db_err)?;
        Ok(())
    }

    async fn update_user(&mut self, user: &User) -> Result<(), StoreError> {
        sqlx::query(
            "UPDATE users SET email = $2, password_hash = $3, name = $4, role = $5, updated_at = $6 \
             WHERE id = $1",
        )
        .bind(user.id)
        .bind(&user.email)
        .bind(&user.password_hash)
        .bind(&user.name)
        .bind(user.role)
        .bind(user.updated_at)
        .execute(&mut *self.tx)
        .await
        .map_err(map_db_err)?;
        Ok(())
    }

    async fn user_by_id(&mut self, id: Uuid) -> Result<Option<User>, StoreError> {
        let user = sqlx::query_as::<_, User>("SELECT * FROM users WHERE id = $1")
            .bind(id)
            .fetch_optional(&mut *self.tx)
            .await?;
        Ok(user)
    }

    async fn user_by_email(&mut self, email: &str) -> Result<Option<User>, StoreError> {
        let user = sqlx::query_as::<_, User>("SELECT * FROM users WHERE email = $1")
            .bind(email)
            .fetch_optional(&mut *self.tx)
            .await?;
        Ok(user)
    }

    async fn insert_category(&mut self, category: &Category) -> Result<(), StoreError> {
        sqlx::query("INSERT INTO categories (id, name, created_at) VALUES ($1, $2, $3)")
            .bind(category.id)
            .bind(&category.name)
            .bind(category.created_at)
            .execute(&mut *self.tx)
            .await
            .map_err(map_db_err)?;
        Ok(())
    }

    async fn list_categories(&mut self) -> Result<Vec<Category>, StoreError> {
        let categories = sqlx::query_as::<_, Category>("SELECT * FROM categories ORDER BY name")
            .fetch_all(&mut *self.tx)
            .await?;
        Ok(categories)
    }

    async fn count_categories(&mut self, ids: &[Uuid]) -> Result<usize, StoreError> {
        let (count,): (i64,) =
            sqlx::query_as("SELECT COUNT(*) FROM categories WHERE id = ANY($1)")
                .bind(ids)
                .fetch_one(&mut *self.tx)
                .await?;
        Ok(count as usize)
    }

    async fn set_product_categories(
        &mut self,
        product_id: Uuid,
        category_ids: &[Uuid],
    ) -> Result<(), StoreError> {
        sqlx::query("DELETE FROM product_categories WHERE product_id = $1")
            .bind(product_id)
            .execute(&mut *self.tx)
            .await?;
        for category_id in category_ids {
            sqlx::query(
                "INSERT INTO product_categories (product_id, category_id) VALUES ($1, $2)",
            )
            .bind(product_id)
            .bind(category_id)
            .execute(&mut *self.tx)
            .await
            .map_err(map_db_err)?;
        }
        Ok(())
    }

    async fn categories_for_product(&mut self, product_id: Uuid) -> Result<Vec<Category>, StoreError> {
        let categories = sqlx::query_as::<_, Category>(
            "SELECT c.* FROM categories c \
             JOIN product_categories pc ON pc.category_id = c.id \
             WHERE pc.product_id = $1 ORDER BY c.name",
        )
        .bind(product_id)
        .fetch_all(&mut *self.tx)
        .await?;
        Ok(categories)
    }

    async fn insert_product(&mut self, product: &Product) -> Result<(), StoreError> {
        sqlx::query(
            "INSERT INTO products (id, name, description, price, stock, version, seller_id, \
             image_urls, status, created_at, updated_at) \
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11)",
        )
        .bind(product.id)
        .bind(&product.name)
        .bind(&product.description)
        .bind(product.price)
        .bind(product.stock)
        .bind(product.version)
        .bind(product.seller_id)
        .bind(&product.image_urls)
        .bind(product.status)
        .bind(product.created_at)
        .bind(product.updated_at)
        .execute(&mut *self.tx)
        .await
        .map_err(map_db_err)?;
        Ok(())
    }

    async fn product_by_id(&mut self, id: Uuid) -> Result<Option<Product>, StoreError> {
        let product = sqlx::query_as::<_, Product>("SELECT * FROM products WHERE id = $1")
            .bind(id)
            .fetch_optional(&mut *self.tx)
            .await?;
        Ok(product)
    }

    async fn update_product(&mut self, product: &Product) -> Result<WriteOutcome, StoreError> {
        // Version-guarded write: under read committed, a competing committed
        // update re-evaluates the guard to false and we see zero rows.
        let result = sqlx::query(
            "UPDATE products SET name = $2, description = $3, price = $4, stock = $5, \
             image_urls = $6, status = $7, updated_at = $8, version = version + 1 \
             WHERE id = $1 AND version = $9",
        )
        .bind(product.id)
        .bind(&product.name)
        .bind(&product.description)
        .bind(product.price)
        .bind(product.stock)
        .bind(&product.image_urls)
        .bind(product.status)
        .bind(product.updated_at)
        .bind(product.version)
        .execute(&mut *self.tx)
        .await
        .map_err(map_db_err)?;
        Ok(if result.rows_affected() == 0 {
            WriteOutcome::Conflict
        } else {
            WriteOutcome::Applied
        })
    }

    async fn list_products(
        &mut self,
        keyword: Option<&str>,
        page: Page,
    ) -> Result<(Vec<Product>, i64), StoreError> {
        let pattern = keyword.map(|keyword| format!("%{keyword}%"));
        let products = sqlx::query_as::<_, Product>(
            "SELECT * FROM products \
             WHERE status = 'active' AND ($1::TEXT IS NULL OR name ILIKE $1) \
             ORDER BY created_at DESC LIMIT $2 OFFSET $3",
        )
        .bind(pattern.as_deref())
        .bind(page.limit())
        .bind(page.offset())
        .fetch_all(&mut *self.tx)
        .await?;
        let (total,): (i64,) = sqlx::query_as(
            "SELECT COUNT(*) FROM products \
             WHERE status = 'active' AND ($1::TEXT IS NULL OR name ILIKE $1)",
        )
        .bind(pattern.as_deref())
        .fetch_one(&mut *self.tx)
        .await?;
        Ok((products, total))
    }

    async fn insert_address(&mut self, address: &Address) -> Result<(), StoreError> {
        sqlx::query(
            "INSERT INTO addresses (id, street_address, city, zip_code, is_default, \
             recipient_name, recipient_phone, user_id, created_at, updated_at) \
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10)",
        )
        .bind(address.id)
        .bind(&address.street_address)
        .bind(&address.city)
        .bind(&address.zip_code)
        .bind(address.is_default)
        .bind(&address.recipient_name)
        .bind(&address.recipient_phone)
        .bind(address.user_id)
        .bind(address.created_at)
        .bind(address.updated_at)
        .execute(&mut *self.tx)
        .await
        .map_err(map_db_err)?;
        Ok(())
    }

    async fn default_address_for(&mut self, user_id: Uuid) -> Result<Option<Address>, StoreError> {
        let address = sqlx::query_as::<_, Address>(
            "SELECT * FROM addresses WHERE user_id = $1 AND is_default LIMIT 1",
        )
        .bind(user_id)
        .fetch_optional(&mut *self.tx)
        .await?;
        Ok(address)
    }

    async fn address_for_user(&mut self, id: Uuid, user_id: Uuid) -> Result<Option<Address>, StoreError> {
        let address =
            sqlx::query_as::<_, Address>("SELECT * FROM addresses WHERE id = $1 AND user_id = $2")
                .bind(id)
                .bind(user_id)
                .fetch_optional(&mut *self.tx)
                .await?;
        Ok(address)
    }

    async fn cart_for_user(&mut self, user_id: Uuid) -> Result<Option<Cart>, StoreError> {
        let cart = sqlx::query_as::<_, Cart>("SELECT * FROM carts WHERE user_id = $1")
            .bind(user_id)
            .fetch_optional(&mut *self.tx)
            .await?;
        let Some(mut cart) = cart else { return Ok(None) };
        cart.items =
            sqlx::query_as::<_, CartItem>("SELECT * FROM cart_items WHERE cart_id = $1 ORDER BY id")
                .bind(cart.id)
                .fetch_all(&mut *self.tx)
                .await?;
        Ok(Some(cart))
    }

    async fn save_cart(&mut self, cart: &Cart) -> Result<(), StoreError> {
        sqlx::query(
            "INSERT INTO carts (id, user_id, created_at, updated_at) VALUES ($1, $2, $3, $4) \
             ON CONFLICT (id) DO UPDATE SET updated_at = EXCLUDED.updated_at",
        )
        .bind(cart.id)
        .bind(cart.user_id)
        .bind(cart.created_at)
        .bind(cart.updated_at)
        .execute(&mut *self.tx)
        .await
        .map_err(map_db_err)?;
        sqlx::query("DELETE FROM cart_items WHERE cart_id = $1")
            .bind(cart.id)
            .execute(&mut *self.tx)
            .await?;
        for item in &cart.items {
            sqlx::query(
                "INSERT INTO cart_items (id, cart_id, product_id, quantity) VALUES ($1, $2, $3, $4)",
            )
            .bind(item.id)
            .bind(item.cart_id)
            .bind(item.product_id)
            .bind(item.quantity)
            .execute(&mut *self.tx)
            .await
            .map_err(map_db_err)?;
        }
        Ok(())
    }

    async fn insert_order(&mut self, order: &Order) -> Result<(), StoreError> {
        sqlx::query(
            "INSERT INTO orders (id, order_number, total_amount, delivery_message, status, \
             user_id, address_id, shipping, created_at, updated_at) \
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10)",
        )
        .bind(order.id)
        .bind(&order.order_number)
        .bind(order.total_amount)
        .bind(&order.delivery_message)
        .bind(order.status)
        .bind(order.user_id)
        .bind(order.address_id)
        .bind(&order.shipping)
        .bind(order.created_at)
        .bind(order.updated_at)
        .execute(&mut *self.tx)
        .await
        .map_err(map_db_err)?;
        for item in &order.items {
            sqlx::query(
                "INSERT INTO order_items (id, order_id, product_id, price, quantity, line_total) \
                 VALUES ($1, $2, $3, $4, $5, $6)",
            )
            .bind(item.id)
            .bind(item.order_id)
            .bind(item.product_id)
            .bind(item.price)
            .bind(item.quantity)
            .bind(item.line_total)
            .execute(&mut *self.tx)
            .await
            .map_err(map_db_err)?;
        }
        Ok(())
    }

    async fn order_for_user(&mut self, id: Uuid, user_id: Uuid) -> Result<Option<Order>, StoreError> {
        let order =
            sqlx::query_as::<_, Order>("SELECT * FROM orders WHERE id = $1 AND user_id = $2")
                .bind(id)
                .bind(user_id)
                .fetch_optional(&mut *self.tx)
                .await?;
        let Some(mut order) = order else { return Ok(None) };
        order.items =
            sqlx::query_as::<_, OrderItem>("SELECT * FROM order_items WHERE order_id = $1 ORDER BY id")
                .bind(order.id)
                .fetch_all(&mut *self.tx)
                .await?;
        Ok(Some(order))
    }

    async fn list_orders_for_user(
        &mut self,
        user_id: Uuid,
        page: Page,
    ) -> Result<(Vec<Order>, i64), StoreError> {
        let orders = sqlx::query_as::<_, Order>(
            "SELECT * FROM orders WHERE user_id = $1 ORDER BY created_at DESC LIMIT $2 OFFSET $3",
        )
        .bind(user_id)
        .bind(page.limit())
        .bind(page.offset())
        .fetch_all(&mut *self.tx)
        .await?;
        let (total,): (i64,) = sqlx::query_as("SELECT COUNT(*) FROM orders WHERE user_id = $1")
            .bind(user_id)
            .fetch_one(&mut *self.tx)
            .await?;
        Ok((orders, total))
    }

    async fn payment_for_order(&mut self, order_id: Uuid) -> Result<Option<Payment>, StoreError> {
        let payment = sqlx::query_as::<_, Payment>("SELECT * FROM payments WHERE order_id = $1")
            .bind(order_id)
            .fetch_optional(&mut *self.tx)
            .await?;
        Ok(payment)
    }

    async fn commit(self: Box<Self>) -> Result<(), StoreError> {
        self.tx.commit().await?;
        Ok(())
    }

    async fn rollback(self: Box<Self>) -> Result<(), StoreError> {
        self.tx.rollback().await?;
        Ok(())
    }
}
