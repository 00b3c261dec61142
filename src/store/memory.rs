//! In-memory storage backend, used by the service-level tests.
//!
//! Writes are applied to the shared state immediately and recorded in an
//! undo log; rollback replays the log in reverse. A competing
//! version-guarded product write therefore observes the latest applied
//! version, which is the same conflict signal the Postgres backend
//! produces from its guarded UPDATE.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard};

use async_trait::async_trait;
use uuid::Uuid;

use crate::domain::{Address, Cart, Category, Order, Payment, Product, User};
use crate::store::{Page, StoreError, Storage, UnitOfWork, WriteOutcome};

#[derive(Default)]
struct State {
    users: HashMap<Uuid, User>,
    categories: HashMap<Uuid, Category>,
    product_categories: HashMap<Uuid, Vec<Uuid>>,
    products: HashMap<Uuid, Product>,
    addresses: HashMap<Uuid, Address>,
    carts: HashMap<Uuid, Cart>,
    orders: HashMap<Uuid, Order>,
    payments: HashMap<Uuid, Payment>,
}

#[derive(Clone, Default)]
pub struct MemoryStorage {
    state: Arc<Mutex<State>>,
}

fn lock(state: &Mutex<State>) -> MutexGuard<'_, State> {
    state.lock().expect("memory store poisoned")
}

impl MemoryStorage {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn address_count(&self) -> usize {
        lock(&self.state).addresses.len()
    }

    pub fn order_count(&self) -> usize {
        lock(&self.state).orders.len()
    }

    pub fn product_stock(&self, id: Uuid) -> Option<i32> {
        lock(&self.state).products.get(&id).map(|p| p.stock)
    }

    pub fn product_version(&self, id: Uuid) -> Option<i64> {
        lock(&self.state).products.get(&id).map(|p| p.version)
    }

    /// Seeds a payment record, standing in for the out-of-scope payment
    /// processor that would create one.
    pub fn put_payment(&self, payment: Payment) {
        lock(&self.state).payments.insert(payment.id, payment);
    }
}

#[async_trait]
impl Storage for MemoryStorage {
    async fn begin(&self) -> Result<Box<dyn UnitOfWork>, StoreError> {
        Ok(Box::new(MemoryUnitOfWork {
            state: Arc::clone(&self.state),
            undo: Vec::new(),
            done: false,
        }))
    }
}

enum Undo {
    User { id: Uuid, prev: Option<User> },
    Category { id: Uuid, prev: Option<Category> },
    Links { product_id: Uuid, prev: Option<Vec<Uuid>> },
    Product { id: Uuid, prev: Option<Product> },
    Address { id: Uuid, prev: Option<Address> },
    Cart { id: Uuid, prev: Option<Cart> },
    Order { id: Uuid, prev: Option<Order> },
}

pub struct MemoryUnitOfWork {
    state: Arc<Mutex<State>>,
    undo: Vec<Undo>,
    done: bool,
}

impl MemoryUnitOfWork {
    fn undo_all(&mut self) {
        let mut state = lock(&self.state);
        for entry in self.undo.drain(..).rev() {
            match entry {
                Undo::User { id, prev } => restore(&mut state.users, id, prev),
                Undo::Category { id, prev } => restore(&mut state.categories, id, prev),
                Undo::Links { product_id, prev } => restore(&mut state.product_categories, product_id, prev),
                Undo::Product { id, prev } => restore(&mut state.products, id, prev),
                Undo::Address { id, prev } => restore(&mut state.addresses, id, prev),
                Undo::Cart { id, prev } => restore(&mut state.carts, id, prev),
                Undo::Order { id, prev } => restore(&mut state.orders, id, prev),
            }
        }
    }
}

fn restore<T>(map: &mut HashMap<Uuid, T>, id: Uuid, prev: Option<T>) {
    match prev {
        Some(value) => {
            map.insert(id, value);
        }
        None => {
            map.remove(&id);
        }
    }
}

impl Drop for MemoryUnitOfWork {
    fn drop(&mut self) {
        if !self.done {
            self.undo_all();
        }
    }
}

#[async_trait]
impl UnitOfWork for MemoryUnitOfWork {
    async fn insert_user(&mut self, user: &User) -> Result<(), StoreError> {
        let mut state = lock(&self.state);
        if state.users.values().any(|u| u.email == user.email) {
            return Err(StoreError::UniqueViolation { constraint: "users_email_key".into() });
        }
        self.undo.push(Undo::User { id: user.id, prev: state.users.get(&user.id).cloned() });
        state.users.insert(user.id, user.clone());
        Ok(())
    }

    async fn update_user(&mut self, user: &User) -> Result<(), StoreError> {
        let mut state = lock(&self.state);
        self.undo.push(Undo::User { id: user.id, prev: state.users.get(&user.id).cloned() });
        state.users.insert(user.id, user.clone());
        Ok(())
    }

    async fn user_by_id(&mut self, id: Uuid) -> Result<Option<User>, StoreError> {
        Ok(lock(&self.state).users.get(&id).cloned())
    }

    async fn user_by_email(&mut self, email: &str) -> Result<Option<User>, StoreError> {
        Ok(lock(&self.state).users.values().find(|u| u.email == email).cloned())
    }

    async fn insert_category(&mut self, category: &Category) -> Result<(), StoreError> {
        let mut state = lock(&self.state);
        if state.categories.values().any(|c| c.name == category.name) {
            return Err(StoreError::UniqueViolation { constraint: "categories_name_key".into() });
        }
        self.undo.push(Undo::Category { id: category.id, prev: state.categories.get(&category.id).cloned() });
        state.categories.insert(category.id, category.clone());
        Ok(())
    }

    async fn list_categories(&mut self) -> Result<Vec<Category>, StoreError> {
        let mut categories: Vec<Category> = lock(&self.state).categories.values().cloned().collect();
        categories.sort_by(|a, b| a.name.cmp(&b.name));
        Ok(categories)
    }

    async fn count_categories(&mut self, ids: &[Uuid]) -> Result<usize, StoreError> {
        let state = lock(&self.state);
        Ok(ids.iter().filter(|id| state.categories.contains_key(id)).count())
    }

    async fn set_product_categories(&mut self, product_id: Uuid, category_ids: &[Uuid]) -> Result<(), StoreError> {
        let mut state = lock(&self.state);
        self.undo.push(Undo::Links { product_id, prev: state.product_categories.get(&product_id).cloned() });
        state.product_categories.insert(product_id, category_ids.to_vec());
        Ok(())
    }

    async fn categories_for_product(&mut self, product_id: Uuid) -> Result<Vec<Category>, StoreError> {
        let state = lock(&self.state);
        let ids = state.product_categories.get(&product_id).cloned().unwrap_or_default();
        Ok(ids.iter().filter_map(|id| state.categories.get(id).cloned()).collect())
    }

    async fn insert_product(&mut self, product: &Product) -> Result<(), StoreError> {
        let mut state = lock(&self.state);
        self.undo.push(Undo::Product { id: product.id, prev: state.products.get(&product.id).cloned() });
        state.products.insert(product.id, product.clone());
        Ok(())
    }

    async fn product_by_id(&mut self, id: Uuid) -> Result<Option<Product>, StoreError> {
        Ok(lock(&self.state).products.get(&id).cloned())
    }

    async fn update_product(&mut self, product: &Product) -> Result<WriteOutcome, StoreError> {
        let mut state = lock(&self.state);
        let current_version = match state.products.get(&product.id) {
            Some(current) => current.version,
            None => return Ok(WriteOutcome::Conflict),
        };
        if current_version != product.version {
            return Ok(WriteOutcome::Conflict);
        }
        self.undo.push(Undo::Product { id: product.id, prev: state.products.get(&product.id).cloned() });
        let mut next = product.clone();
        next.version += 1;
        state.products.insert(product.id, next);
        Ok(WriteOutcome::Applied)
    }

    async fn list_products(&mut self, keyword: Option<&str>, page: Page) -> Result<(Vec<Product>, i64), StoreError> {
        let state = lock(&self.state);
        let needle = keyword.map(str::to_lowercase);
        let mut matches: Vec<Product> = state
            .products
            .values()
            .filter(|p| p.is_active())
            .filter(|p| match &needle {
                Some(needle) => p.name.to_lowercase().contains(needle),
                None => true,
            })
            .cloned()
            .collect();
        matches.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        let total = matches.len() as i64;
        let items = matches
            .into_iter()
            .skip(page.offset() as usize)
            .take(page.limit() as usize)
            .collect();
        Ok((items, total))
    }

    async fn insert_address(&mut self, address: &Address) -> Result<(), StoreError> {
        let mut state = lock(&self.state);
        self.undo.push(Undo::Address { id: address.id, prev: state.addresses.get(&address.id).cloned() });
        state.addresses.insert(address.id, address.clone());
        Ok(())
    }

    async fn default_address_for(&mut self, user_id: Uuid) -> Result<Option<Address>, StoreError> {
        Ok(lock(&self.state)
            .addresses
            .values()
            .find(|a| a.user_id == user_id && a.is_default)
            .cloned())
    }

    async fn address_for_user(&mut self, id: Uuid, user_id: Uuid) -> Result<Option<Address>, StoreError> {
        Ok(lock(&self.state)
            .addresses
            .get(&id)
            .filter(|a| a.user_id == user_id)
            .cloned())
    }

    async fn cart_for_user(&mut self, user_id: Uuid) -> Result<Option<Cart>, StoreError> {
        Ok(lock(&self.state).carts.values().find(|c| c.user_id == user_id).cloned())
    }

    async fn save_cart(&mut self, cart: &Cart) -> Result<(), StoreError> {
        let mut state = lock(&self.state);
        self.undo.push(Undo::Cart { id: cart.id, prev: state.carts.get(&cart.id).cloned() });
        state.carts.insert(cart.id, cart.clone());
        Ok(())
    }

    async fn insert_order(&mut self, order: &Order) -> Result<(), StoreError> {
        let mut state = lock(&self.state);
        if state.orders.values().any(|o| o.order_number == order.order_number) {
            return Err(StoreError::UniqueViolation { constraint: "orders_order_number_key".into() });
        }
        self.undo.push(Undo::Order { id: order.id, prev: state.orders.get(&order.id).cloned() });
        state.orders.insert(order.id, order.clone());
        Ok(())
    }

    async fn order_for_user(&mut self, id: Uuid, user_id: Uuid) -> Result<Option<Order>, StoreError> {
        Ok(lock(&self.state).orders.get(&id).filter(|o| o.user_id == user_id).cloned())
    }

    async fn list_orders_for_user(&mut self, user_id: Uuid, page: Page) -> Result<(Vec<Order>, i64), StoreError> {
        let state = lock(&self.state);
        let mut matches: Vec<Order> = state.orders.values().filter(|o| o.user_id == user_id).cloned().collect();
        matches.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        let total = matches.len() as i64;
        let items = matches
            .into_iter()
            .skip(page.offset() as usize)
            .take(page.limit() as usize)
            .collect();
        Ok((items, total))
    }

    async fn payment_for_order(&mut self, order_id: Uuid) -> Result<Option<Payment>, StoreError> {
        Ok(lock(&self.state).payments.values().find(|p| p.order_id == order_id).cloned())
    }

    async fn commit(mut self: Box<Self>) -> Result<(), StoreError> {
        self.done = true;
        self.undo.clear();
        Ok(())
    }

    async fn rollback(mut self: Box<Self>) -> Result<(), StoreError> {
        self.undo_all();
        self.done = true;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use rust_decimal::Decimal;

    use super::*;
    use crate::domain::Role;

    fn product() -> Product {
        Product::new("Widget", "", Decimal::new(1000, 2), 5, Uuid::now_v7(), vec![])
    }

    #[tokio::test]
    async fn guarded_write_detects_a_stale_version() {
        let storage = MemoryStorage::new();
        let p = product();
        let mut uow = storage.begin().await.unwrap();
        uow.insert_product(&p).await.unwrap();
        uow.commit().await.unwrap();

        // First writer wins, second sees the bumped version.
        let mut first = storage.begin().await.unwrap();
        let mut second = storage.begin().await.unwrap();
        let read_first = first.product_by_id(p.id).await.unwrap().unwrap();
        let read_second = second.product_by_id(p.id).await.unwrap().unwrap();
        assert_eq!(first.update_product(&read_first).await.unwrap(), WriteOutcome::Applied);
        first.commit().await.unwrap();
        assert_eq!(second.update_product(&read_second).await.unwrap(), WriteOutcome::Conflict);
        second.rollback().await.unwrap();
        assert_eq!(storage.product_version(p.id), Some(1));
    }

    #[tokio::test]
    async fn rollback_restores_every_write() {
        let storage = MemoryStorage::new();
        let p = product();
        let user = User::new("a@b.com", "hash", "A", Role::Customer);
        let mut uow = storage.begin().await.unwrap();
        uow.insert_product(&p).await.unwrap();
        uow.commit().await.unwrap();

        let mut uow = storage.begin().await.unwrap();
        let mut copy = uow.product_by_id(p.id).await.unwrap().unwrap();
        copy.decrease_stock(2).unwrap();
        uow.update_product(&copy).await.unwrap();
        uow.insert_user(&user).await.unwrap();
        let address = Address::new("1 Main St", "Springfield", "12345", true, "A", "010", user.id);
        uow.insert_address(&address).await.unwrap();
        uow.rollback().await.unwrap();

        assert_eq!(storage.product_stock(p.id), Some(5));
        assert_eq!(storage.product_version(p.id), Some(0));
        assert_eq!(storage.address_count(), 0);
    }

    #[tokio::test]
    async fn dropping_an_unfinished_unit_of_work_rolls_back() {
        let storage = MemoryStorage::new();
        let p = product();
        {
            let mut uow = storage.begin().await.unwrap();
            uow.insert_product(&p).await.unwrap();
            // No commit: goes out of scope here.
        }
        let mut uow = storage.begin().await.unwrap();
        assert!(uow.product_by_id(p.id).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn duplicate_order_numbers_are_rejected() {
        let storage = MemoryStorage::new();
        let shipping = crate::domain::ShippingAddress {
            recipient_name: "A".into(),
            recipient_phone: "010".into(),
            street_address: "1 Main St".into(),
            city: "Springfield".into(),
            zip_code: "12345".into(),
        };
        let first = Order::new("20250101-0001", Decimal::ONE, "", Uuid::now_v7(), None, shipping.clone());
        let second = Order::new("20250101-0001", Decimal::ONE, "", Uuid::now_v7(), None, shipping);
        let mut uow = storage.begin().await.unwrap();
        uow.insert_order(&first).await.unwrap();
        let err = uow.insert_order(&second).await.unwrap_err();
        assert!(matches!(err, StoreError::UniqueViolation { ref constraint } if constraint.contains("order_number")));
    }
}
