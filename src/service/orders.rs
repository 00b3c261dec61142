//! Order placement and queries.
//!
//! `create_order` runs as one unit of work end to end: validate the lines,
//! resolve the shipping address, assemble the aggregate, decrement stock,
//! insert the order. Any failure rolls the whole unit of work back, address
//! save and stock decrements included.
//!
//! Stock writes are version-guarded. A conflicting writer is retried exactly
//! once, against a fresh read of the product by id; the stale in-memory copy
//! is never reused, because its version token would just conflict again.

use std::sync::Arc;

use chrono::Utc;
use rand::Rng;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use tracing::{error, info, warn};
use uuid::Uuid;
use validator::Validate;

use crate::bus::EventBus;
use crate::domain::events::DomainEvent;
use crate::domain::{
    Address, AddressError, Order, OrderError, OrderItem, OrderStatus, Payment, Product,
    ProductError, ShippingAddress, User, UserError,
};
use crate::error::AppError;
use crate::store::{Page, Storage, StoreError, UnitOfWork, WriteOutcome};

const ORDER_NUMBER_ATTEMPTS: u32 = 3;

/// How the shipping address for an order is chosen.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum DeliveryOption {
    DefaultAddress,
    SavedAddress,
    NewAddress,
    #[serde(other)]
    Unknown,
}

#[derive(Clone, Debug, Deserialize, Validate)]
pub struct PlaceOrderRequest {
    pub delivery_option: DeliveryOption,
    pub address_id: Option<Uuid>,
    pub new_address: Option<NewAddressRequest>,
    pub delivery_message: Option<String>,
    #[validate(length(min = 1, message = "order needs at least one line"))]
    pub lines: Vec<OrderLineRequest>,
}

#[derive(Clone, Debug, Deserialize)]
pub struct NewAddressRequest {
    pub street_address: String,
    pub city: String,
    pub zip_code: String,
    pub recipient_name: String,
    pub recipient_phone: String,
    #[serde(default)]
    pub save_to_address_book: bool,
}

#[derive(Clone, Copy, Debug, Deserialize, Serialize)]
pub struct OrderLineRequest {
    pub product_id: Uuid,
    pub quantity: u32,
}

/// A validated line: the resolved product plus the requested quantity.
/// Lives only for the duration of one `create_order` call.
#[derive(Clone, Debug)]
struct OrderLine {
    product: Product,
    quantity: u32,
}

#[derive(Clone, Debug, Serialize)]
pub struct OrderSummary {
    pub id: Uuid,
    pub order_number: String,
    pub total_amount: Decimal,
    pub status: OrderStatus,
    pub items: Vec<OrderLineSummary>,
}

#[derive(Clone, Debug, Serialize)]
pub struct OrderLineSummary {
    pub product_id: Uuid,
    pub name: String,
    pub price: Decimal,
    pub quantity: u32,
    pub line_total: Decimal,
}

#[derive(Clone)]
pub struct OrderService {
    storage: Arc<dyn Storage>,
    bus: EventBus,
}

impl OrderService {
    pub fn new(storage: Arc<dyn Storage>, bus: EventBus) -> Self {
        Self { storage, bus }
    }

    pub async fn create_order(
        &self,
        user_id: Uuid,
        request: PlaceOrderRequest,
    ) -> Result<OrderSummary, AppError> {
        let mut uow = self.storage.begin().await?;
        match place_order(uow.as_mut(), user_id, &request).await {
            Ok((order, lines)) => {
                uow.commit().await?;
                info!(
                    order_number = %order.order_number,
                    user_id = %user_id,
                    total = %order.total_amount,
                    "order created"
                );
                self.bus
                    .publish(&DomainEvent::OrderCreated {
                        order_id: order.id,
                        order_number: order.order_number.clone(),
                        user_id,
                        total_amount: order.total_amount,
                    })
                    .await;
                Ok(summarize(&order, &lines))
            }
            Err(err) => {
                error!(user_id = %user_id, %err, "order rolled back");
                // The caller gets the original failure even if the rollback
                // itself errors; the dropped unit of work cannot half-commit.
                if let Err(rollback_err) = uow.rollback().await {
                    error!(%rollback_err, "rollback failed");
                }
                Err(err)
            }
        }
    }

    pub async fn list_orders(
        &self,
        user_id: Uuid,
        page: Page,
    ) -> Result<(Vec<Order>, i64), AppError> {
        let mut uow = self.storage.begin().await?;
        let listed = uow.list_orders_for_user(user_id, page).await?;
        uow.commit().await?;
        Ok(listed)
    }

    /// The order plus its passive payment record, if one exists. Scoped to
    /// the caller: someone else's order id reads as not found.
    pub async fn order_detail(
        &self,
        user_id: Uuid,
        order_id: Uuid,
    ) -> Result<(Order, Option<Payment>), AppError> {
        let mut uow = self.storage.begin().await?;
        let order = uow
            .order_for_user(order_id, user_id)
            .await?
            .ok_or(OrderError::NotFound)?;
        let payment = uow.payment_for_order(order.id).await?;
        uow.commit().await?;
        Ok((order, payment))
    }
}

async fn place_order(
    uow: &mut dyn UnitOfWork,
    user_id: Uuid,
    request: &PlaceOrderRequest,
) -> Result<(Order, Vec<OrderLine>), AppError> {
    let user = uow.user_by_id(user_id).await?.ok_or(UserError::NotFound)?;
    let lines = validate_order_lines(uow, &request.lines).await?;
    let (address_id, shipping) = resolve_shipping_address(uow, request, &user).await?;

    let total = lines
        .iter()
        .fold(Decimal::ZERO, |acc, line| {
            acc + line.product.price * Decimal::from(line.quantity)
        });
    let mut order = Order::new(
        generate_order_number(),
        total,
        request.delivery_message.clone().unwrap_or_default(),
        user.id,
        address_id,
        shipping,
    );
    let order_id = order.id;
    order.items = lines
        .iter()
        .map(|line| OrderItem::snapshot(order_id, &line.product, line.quantity))
        .collect();

    for line in &lines {
        commit_stock_decrement(uow, line).await?;
    }
    let order = persist_order(uow, order).await?;
    Ok((order, lines))
}

/// Resolves every requested line and fail-fast checks stock against the
/// current read. Duplicate products merge into one line, so the decrement
/// later writes each product exactly once. Pure reads: calling this any
/// number of times changes nothing.
async fn validate_order_lines(
    uow: &mut dyn UnitOfWork,
    requests: &[OrderLineRequest],
) -> Result<Vec<OrderLine>, AppError> {
    if requests.is_empty() {
        return Err(AppError::Validation("order needs at least one line".into()));
    }
    let mut lines: Vec<OrderLine> = Vec::with_capacity(requests.len());
    for request in requests {
        if request.quantity == 0 {
            return Err(AppError::Validation("quantity must be positive".into()));
        }
        if let Some(line) = lines.iter_mut().find(|l| l.product.id == request.product_id) {
            line.quantity += request.quantity;
            continue;
        }
        let product = uow
            .product_by_id(request.product_id)
            .await?
            .filter(Product::is_active)
            .ok_or(ProductError::NotFound)?;
        lines.push(OrderLine { product, quantity: request.quantity });
    }
    for line in &lines {
        line.product.check_stock(line.quantity)?;
    }
    Ok(lines)
}

/// Exactly one delivery-option branch runs. A new address is persisted
/// inside the open unit of work only when the payload asks for it, so a
/// later failure unwinds the save too.
async fn resolve_shipping_address(
    uow: &mut dyn UnitOfWork,
    request: &PlaceOrderRequest,
    user: &User,
) -> Result<(Option<Uuid>, ShippingAddress), AppError> {
    match request.delivery_option {
        DeliveryOption::DefaultAddress => {
            let address = uow
                .default_address_for(user.id)
                .await?
                .ok_or(AddressError::NoDefaultAddress)?;
            Ok((Some(address.id), ShippingAddress::from(&address)))
        }
        DeliveryOption::SavedAddress => {
            let id = request.address_id.ok_or(AddressError::AddressRequired)?;
            let address = uow
                .address_for_user(id, user.id)
                .await?
                .ok_or(AddressError::AddressNotFound)?;
            Ok((Some(address.id), ShippingAddress::from(&address)))
        }
        DeliveryOption::NewAddress => {
            let payload = request
                .new_address
                .as_ref()
                .ok_or(AddressError::MissingNewAddress)?;
            let address = Address::new(
                &payload.street_address,
                &payload.city,
                &payload.zip_code,
                false,
                &payload.recipient_name,
                &payload.recipient_phone,
                user.id,
            );
            let shipping = ShippingAddress::from(&address);
            if payload.save_to_address_book {
                uow.insert_address(&address).await?;
                Ok((Some(address.id), shipping))
            } else {
                Ok((None, shipping))
            }
        }
        DeliveryOption::Unknown => Err(AddressError::InvalidDeliveryOption.into()),
    }
}

/// Applies one line's decrement through a version-guarded write. On a
/// conflict the product is re-read by id and the write retried exactly
/// once; a second conflict is terminal.
async fn commit_stock_decrement(
    uow: &mut dyn UnitOfWork,
    line: &OrderLine,
) -> Result<(), AppError> {
    let mut product = line.product.clone();
    product.decrease_stock(line.quantity)?;
    if uow.update_product(&product).await? == WriteOutcome::Applied {
        return Ok(());
    }
    warn!(product_id = %line.product.id, "stock write conflicted, retrying against a fresh read");
    let mut fresh = uow
        .product_by_id(line.product.id)
        .await?
        .ok_or(ProductError::NotFound)?;
    fresh.decrease_stock(line.quantity)?;
    match uow.update_product(&fresh).await? {
        WriteOutcome::Applied => Ok(()),
        WriteOutcome::Conflict => Err(ProductError::ConcurrentModification.into()),
    }
}

/// Inserts the assembled aggregate. A storage-level collision on the order
/// number gets a fresh number and another attempt, bounded; any other
/// failure propagates untouched.
async fn persist_order(uow: &mut dyn UnitOfWork, mut order: Order) -> Result<Order, AppError> {
    for attempt in 1..=ORDER_NUMBER_ATTEMPTS {
        match uow.insert_order(&order).await {
            Ok(()) => return Ok(order),
            Err(StoreError::UniqueViolation { constraint })
                if constraint.contains("order_number") =>
            {
                if attempt == ORDER_NUMBER_ATTEMPTS {
                    break;
                }
                warn!(discarded = %order.order_number, "order number collided, regenerating");
                order.order_number = generate_order_number();
            }
            Err(err) => return Err(err.into()),
        }
    }
    Err(OrderError::NumberExhausted.into())
}

/// `YYYYMMDD-NNNN`: a date stamp plus a zero-padded random suffix. The
/// storage-level uniqueness constraint is the actual collision guard.
fn generate_order_number() -> String {
    let suffix: u16 = rand::thread_rng().gen_range(0..10_000);
    format!("{}-{:04}", Utc::now().format("%Y%m%d"), suffix)
}

fn summarize(order: &Order, lines: &[OrderLine]) -> OrderSummary {
    OrderSummary {
        id: order.id,
        order_number: order.order_number.clone(),
        total_amount: order.total_amount,
        status: order.status,
        items: lines
            .iter()
            .map(|line| OrderLineSummary {
                product_id: line.product.id,
                name: line.product.name.clone(),
                price: line.product.price,
                quantity: line.quantity,
                line_total: line.product.price * Decimal::from(line.quantity),
            })
            .collect(),
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicUsize, Ordering};

    use async_trait::async_trait;

    use super::*;
    use crate::domain::{Cart, Category, Role};
    use crate::store::memory::MemoryStorage;

    fn service(storage: Arc<dyn Storage>) -> OrderService {
        OrderService::new(storage, EventBus::default())
    }

    async fn seed_user(storage: &MemoryStorage) -> Uuid {
        let user = User::new(format!("{}@b.com", Uuid::now_v7()), "hash", "U", Role::Customer);
        let mut uow = storage.begin().await.unwrap();
        uow.insert_user(&user).await.unwrap();
        uow.commit().await.unwrap();
        user.id
    }

    async fn seed_product(storage: &MemoryStorage, stock: i32, price: Decimal) -> Uuid {
        let product = Product::new("Widget", "", price, stock, Uuid::now_v7(), vec![]);
        let mut uow = storage.begin().await.unwrap();
        uow.insert_product(&product).await.unwrap();
        uow.commit().await.unwrap();
        product.id
    }

    async fn seed_default_address(storage: &MemoryStorage, user_id: Uuid) -> Uuid {
        let address = Address::new("1 Main St", "Springfield", "12345", true, "A", "010", user_id);
        let mut uow = storage.begin().await.unwrap();
        uow.insert_address(&address).await.unwrap();
        uow.commit().await.unwrap();
        address.id
    }

    fn default_request(product_id: Uuid, quantity: u32) -> PlaceOrderRequest {
        PlaceOrderRequest {
            delivery_option: DeliveryOption::DefaultAddress,
            address_id: None,
            new_address: None,
            delivery_message: Some("leave at the door".into()),
            lines: vec![OrderLineRequest { product_id, quantity }],
        }
    }

    fn new_address_payload(save: bool) -> NewAddressRequest {
        NewAddressRequest {
            street_address: "2 Oak Ave".into(),
            city: "Shelbyville".into(),
            zip_code: "54321".into(),
            recipient_name: "B".into(),
            recipient_phone: "011".into(),
            save_to_address_book: save,
        }
    }

    #[tokio::test]
    async fn a_successful_order_decrements_stock_and_snapshots_prices() {
        let storage = MemoryStorage::new();
        let orders = service(Arc::new(storage.clone()));
        let user_id = seed_user(&storage).await;
        let address_id = seed_default_address(&storage, user_id).await;
        let product_id = seed_product(&storage, 5, Decimal::new(19_900, 2)).await;

        let summary = orders
            .create_order(user_id, default_request(product_id, 3))
            .await
            .unwrap();
        assert_eq!(summary.status, OrderStatus::PendingPayment);
        assert_eq!(summary.total_amount, Decimal::new(59_700, 2));
        assert_eq!(summary.items.len(), 1);
        assert_eq!(storage.product_stock(product_id), Some(2));

        // A later price change must not leak into the stored order.
        let mut uow = storage.begin().await.unwrap();
        let mut product = uow.product_by_id(product_id).await.unwrap().unwrap();
        product.update_price(Decimal::new(99_900, 2));
        uow.update_product(&product).await.unwrap();
        uow.commit().await.unwrap();

        let (stored, payment) = orders.order_detail(user_id, summary.id).await.unwrap();
        assert_eq!(stored.total_amount, Decimal::new(59_700, 2));
        assert_eq!(stored.items[0].price, Decimal::new(19_900, 2));
        assert_eq!(stored.address_id, Some(address_id));
        assert!(payment.is_none());
    }

    #[tokio::test]
    async fn duplicate_lines_merge_into_one_decrement() {
        let storage = MemoryStorage::new();
        let orders = service(Arc::new(storage.clone()));
        let user_id = seed_user(&storage).await;
        seed_default_address(&storage, user_id).await;
        let product_id = seed_product(&storage, 5, Decimal::new(10_000, 2)).await;

        let mut request = default_request(product_id, 1);
        request.lines.push(OrderLineRequest { product_id, quantity: 2 });
        let summary = orders.create_order(user_id, request).await.unwrap();

        assert_eq!(summary.items.len(), 1);
        assert_eq!(summary.items[0].quantity, 3);
        assert_eq!(summary.total_amount, Decimal::new(30_000, 2));
        assert_eq!(storage.product_stock(product_id), Some(2));
        // One guarded write for the combined quantity, one version bump.
        assert_eq!(storage.product_version(product_id), Some(1));
    }

    #[tokio::test]
    async fn insufficient_stock_is_rejected_before_any_write() {
        let storage = MemoryStorage::new();
        let orders = service(Arc::new(storage.clone()));
        let user_id = seed_user(&storage).await;
        seed_default_address(&storage, user_id).await;
        let product_id = seed_product(&storage, 5, Decimal::new(10_000, 2)).await;

        let err = orders
            .create_order(user_id, default_request(product_id, 6))
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            AppError::Product(ProductError::InsufficientStock { requested: 6, available: 5, .. })
        ));
        assert_eq!(storage.product_stock(product_id), Some(5));
        assert_eq!(storage.order_count(), 0);
    }

    #[tokio::test]
    async fn unknown_users_and_products_are_terminal() {
        let storage = MemoryStorage::new();
        let orders = service(Arc::new(storage.clone()));
        let user_id = seed_user(&storage).await;
        let product_id = seed_product(&storage, 5, Decimal::new(10_000, 2)).await;

        let err = orders
            .create_order(Uuid::now_v7(), default_request(product_id, 1))
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::User(UserError::NotFound)));

        let err = orders
            .create_order(user_id, default_request(Uuid::now_v7(), 1))
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::Product(ProductError::NotFound)));
    }

    #[tokio::test]
    async fn every_delivery_option_resolves_or_names_its_error() {
        let storage = MemoryStorage::new();
        let orders = service(Arc::new(storage.clone()));
        let user_id = seed_user(&storage).await;
        let product_id = seed_product(&storage, 50, Decimal::new(10_000, 2)).await;

        // DEFAULT_ADDRESS without a default on file.
        let err = orders
            .create_order(user_id, default_request(product_id, 1))
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::Address(AddressError::NoDefaultAddress)));

        // SAVED_ADDRESS without an id.
        let mut request = default_request(product_id, 1);
        request.delivery_option = DeliveryOption::SavedAddress;
        let err = orders.create_order(user_id, request).await.unwrap_err();
        assert!(matches!(err, AppError::Address(AddressError::AddressRequired)));

        // NEW_ADDRESS without a payload.
        let mut request = default_request(product_id, 1);
        request.delivery_option = DeliveryOption::NewAddress;
        let err = orders.create_order(user_id, request).await.unwrap_err();
        assert!(matches!(err, AppError::Address(AddressError::MissingNewAddress)));

        // Anything unrecognized.
        let mut request = default_request(product_id, 1);
        request.delivery_option = DeliveryOption::Unknown;
        let err = orders.create_order(user_id, request).await.unwrap_err();
        assert!(matches!(err, AppError::Address(AddressError::InvalidDeliveryOption)));

        // Nothing above touched stock or created an order.
        assert_eq!(storage.product_stock(product_id), Some(50));
        assert_eq!(storage.order_count(), 0);
    }

    #[tokio::test]
    async fn a_saved_address_of_another_user_reads_as_not_found() {
        let storage = MemoryStorage::new();
        let orders = service(Arc::new(storage.clone()));
        let user_id = seed_user(&storage).await;
        let other_id = seed_user(&storage).await;
        let foreign_address = seed_default_address(&storage, other_id).await;
        let product_id = seed_product(&storage, 5, Decimal::new(10_000, 2)).await;

        let mut request = default_request(product_id, 2);
        request.delivery_option = DeliveryOption::SavedAddress;
        request.address_id = Some(foreign_address);
        let err = orders.create_order(user_id, request).await.unwrap_err();
        assert!(matches!(err, AppError::Address(AddressError::AddressNotFound)));
        assert_eq!(storage.product_stock(product_id), Some(5));
        assert_eq!(storage.order_count(), 0);
    }

    #[tokio::test]
    async fn a_transient_new_address_is_never_persisted() {
        let storage = MemoryStorage::new();
        let orders = service(Arc::new(storage.clone()));
        let user_id = seed_user(&storage).await;
        let product_id = seed_product(&storage, 5, Decimal::new(10_000, 2)).await;

        let mut request = default_request(product_id, 1);
        request.delivery_option = DeliveryOption::NewAddress;
        request.new_address = Some(new_address_payload(false));
        let summary = orders.create_order(user_id, request).await.unwrap();

        assert_eq!(storage.address_count(), 0);
        let (stored, _) = orders.order_detail(user_id, summary.id).await.unwrap();
        assert_eq!(stored.address_id, None);
        assert_eq!(stored.shipping.0.city, "Shelbyville");
    }

    #[tokio::test]
    async fn a_saved_new_address_lands_in_the_address_book() {
        let storage = MemoryStorage::new();
        let orders = service(Arc::new(storage.clone()));
        let user_id = seed_user(&storage).await;
        let product_id = seed_product(&storage, 5, Decimal::new(10_000, 2)).await;

        let mut request = default_request(product_id, 1);
        request.delivery_option = DeliveryOption::NewAddress;
        request.new_address = Some(new_address_payload(true));
        let summary = orders.create_order(user_id, request).await.unwrap();

        assert_eq!(storage.address_count(), 1);
        let (stored, _) = orders.order_detail(user_id, summary.id).await.unwrap();
        assert!(stored.address_id.is_some());
    }

    #[tokio::test]
    async fn validation_reads_change_nothing() {
        let storage = MemoryStorage::new();
        let product_id = seed_product(&storage, 5, Decimal::new(10_000, 2)).await;
        let requests = vec![OrderLineRequest { product_id, quantity: 2 }];

        let mut uow = storage.begin().await.unwrap();
        for _ in 0..3 {
            let lines = validate_order_lines(uow.as_mut(), &requests).await.unwrap();
            assert_eq!(lines[0].quantity, 2);
        }
        uow.commit().await.unwrap();
        assert_eq!(storage.product_stock(product_id), Some(5));
        assert_eq!(storage.product_version(product_id), Some(0));
    }

    #[tokio::test]
    async fn a_stale_version_is_retried_against_a_fresh_read() {
        let storage = MemoryStorage::new();
        let product_id = seed_product(&storage, 5, Decimal::new(10_000, 2)).await;

        // Read the product, then let a competing writer commit first.
        let mut uow = storage.begin().await.unwrap();
        let lines = validate_order_lines(
            uow.as_mut(),
            &[OrderLineRequest { product_id, quantity: 2 }],
        )
        .await
        .unwrap();

        let mut competing = storage.begin().await.unwrap();
        let mut copy = competing.product_by_id(product_id).await.unwrap().unwrap();
        copy.decrease_stock(2).unwrap();
        competing.update_product(&copy).await.unwrap();
        competing.commit().await.unwrap();

        // First write conflicts, the fresh re-read succeeds.
        commit_stock_decrement(uow.as_mut(), &lines[0]).await.unwrap();
        uow.commit().await.unwrap();
        assert_eq!(storage.product_stock(product_id), Some(1));
        assert_eq!(storage.product_version(product_id), Some(2));
    }

    #[tokio::test]
    async fn stock_exhausted_between_read_and_write_is_terminal() {
        let storage = MemoryStorage::new();
        let product_id = seed_product(&storage, 5, Decimal::new(10_000, 2)).await;

        let mut uow = storage.begin().await.unwrap();
        let lines = validate_order_lines(
            uow.as_mut(),
            &[OrderLineRequest { product_id, quantity: 3 }],
        )
        .await
        .unwrap();

        // A competing order takes most of the stock before our write lands.
        let mut competing = storage.begin().await.unwrap();
        let mut copy = competing.product_by_id(product_id).await.unwrap().unwrap();
        copy.decrease_stock(4).unwrap();
        competing.update_product(&copy).await.unwrap();
        competing.commit().await.unwrap();

        let err = commit_stock_decrement(uow.as_mut(), &lines[0]).await.unwrap_err();
        assert!(matches!(
            err,
            AppError::Product(ProductError::InsufficientStock { requested: 3, available: 1, .. })
        ));
        uow.rollback().await.unwrap();
        assert_eq!(storage.product_stock(product_id), Some(1));
    }

    #[tokio::test]
    async fn concurrent_orders_never_oversell() {
        let storage = MemoryStorage::new();
        let orders = service(Arc::new(storage.clone()));
        let user_id = seed_user(&storage).await;
        seed_default_address(&storage, user_id).await;
        let product_id = seed_product(&storage, 5, Decimal::new(10_000, 2)).await;

        let (first, second) = tokio::join!(
            orders.create_order(user_id, default_request(product_id, 3)),
            orders.create_order(user_id, default_request(product_id, 3)),
        );
        let successes = [&first, &second].iter().filter(|r| r.is_ok()).count();
        assert_eq!(successes, 1);
        for result in [first, second] {
            if let Err(err) = result {
                assert!(matches!(
                    err,
                    AppError::Product(
                        ProductError::InsufficientStock { .. }
                            | ProductError::ConcurrentModification
                    )
                ));
            }
        }
        assert_eq!(storage.product_stock(product_id), Some(2));
        assert_eq!(storage.order_count(), 1);
    }

    #[tokio::test]
    async fn order_numbers_carry_a_date_stamp_and_random_suffix() {
        let number = generate_order_number();
        let (date, suffix) = number.split_once('-').unwrap();
        assert_eq!(date, Utc::now().format("%Y%m%d").to_string());
        assert_eq!(suffix.len(), 4);
        assert!(suffix.chars().all(|c| c.is_ascii_digit()));
    }

    #[tokio::test]
    async fn listing_is_scoped_to_the_caller() {
        let storage = MemoryStorage::new();
        let orders = service(Arc::new(storage.clone()));
        let user_id = seed_user(&storage).await;
        let other_id = seed_user(&storage).await;
        seed_default_address(&storage, user_id).await;
        seed_default_address(&storage, other_id).await;
        let product_id = seed_product(&storage, 10, Decimal::new(10_000, 2)).await;

        let mine = orders.create_order(user_id, default_request(product_id, 1)).await.unwrap();
        orders.create_order(other_id, default_request(product_id, 1)).await.unwrap();

        let (listed, total) = orders.list_orders(user_id, Page::clamped(None, None)).await.unwrap();
        assert_eq!(total, 1);
        assert_eq!(listed[0].id, mine.id);

        let err = orders.order_detail(other_id, mine.id).await.unwrap_err();
        assert!(matches!(err, AppError::Order(OrderError::NotFound)));
    }

    #[tokio::test]
    async fn the_detail_carries_the_payment_record_when_one_exists() {
        let storage = MemoryStorage::new();
        let orders = service(Arc::new(storage.clone()));
        let user_id = seed_user(&storage).await;
        seed_default_address(&storage, user_id).await;
        let product_id = seed_product(&storage, 5, Decimal::new(10_000, 2)).await;

        let summary = orders
            .create_order(user_id, default_request(product_id, 1))
            .await
            .unwrap();
        storage.put_payment(Payment {
            id: Uuid::now_v7(),
            order_id: summary.id,
            amount: summary.total_amount,
            status: crate::domain::PaymentStatus::Completed,
            method: crate::domain::PaymentMethod::CreditCard,
            transaction_id: Some("tx-1".into()),
            payment_details: None,
            created_at: Utc::now(),
        });

        let (_, payment) = orders.order_detail(user_id, summary.id).await.unwrap();
        let payment = payment.unwrap();
        assert_eq!(payment.amount, summary.total_amount);
    }

    // ------------------------------------------------------------------
    // Storage wrapper that fails order inserts on demand, for the
    // atomicity and order-number-collision paths.
    // ------------------------------------------------------------------

    #[derive(Clone)]
    struct FlakyOrderInserts {
        inner: MemoryStorage,
        failures: Arc<AtomicUsize>,
        unique_violation: bool,
    }

    impl FlakyOrderInserts {
        fn new(inner: MemoryStorage, failures: usize, unique_violation: bool) -> Self {
            Self {
                inner,
                failures: Arc::new(AtomicUsize::new(failures)),
                unique_violation,
            }
        }
    }

    #[async_trait]
    impl Storage for FlakyOrderInserts {
        async fn begin(&self) -> Result<Box<dyn UnitOfWork>, StoreError> {
            Ok(Box::new(FlakyUow {
                inner: self.inner.begin().await?,
                failures: Arc::clone(&self.failures),
                unique_violation: self.unique_violation,
            }))
        }
    }

    struct FlakyUow {
        inner: Box<dyn UnitOfWork>,
        failures: Arc<AtomicUsize>,
        unique_violation: bool,
    }

    #[async_trait]
    impl UnitOfWork for FlakyUow {
        async fn insert_user(&mut self, user: &User) -> Result<(), StoreError> {
            self.inner.insert_user(user).await
        }
        async fn update_user(&mut self, user: &User) -> Result<(), StoreError> {
            self.inner.update_user(user).await
        }
        async fn user_by_id(&mut self, id: Uuid) -> Result<Option<User>, StoreError> {
            self.inner.user_by_id(id).await
        }
        async fn user_by_email(&mut self, email: &str) -> Result<Option<User>, StoreError> {
            self.inner.user_by_email(email).await
        }
        async fn insert_category(&mut self, category: &Category) -> Result<(), StoreError> {
            self.inner.insert_category(category).await
        }
        async fn list_categories(&mut self) -> Result<Vec<Category>, StoreError> {
            self.inner.list_categories().await
        }
        async fn count_categories(&mut self, ids: &[Uuid]) -> Result<usize, StoreError> {
            self.inner.count_categories(ids).await
        }
        async fn set_product_categories(
            &mut self,
            product_id: Uuid,
            category_ids: &[Uuid],
        ) -> Result<(), StoreError> {
            self.inner.set_product_categories(product_id, category_ids).await
        }
        async fn categories_for_product(
            &mut self,
            product_id: Uuid,
        ) -> Result<Vec<Category>, StoreError> {
            self.inner.categories_for_product(product_id).await
        }
        async fn insert_product(&mut self, product: &Product) -> Result<(), StoreError> {
            self.inner.insert_product(product).await
        }
        async fn product_by_id(&mut self, id: Uuid) -> Result<Option<Product>, StoreError> {
            self.inner.product_by_id(id).await
        }
        async fn update_product(&mut self, product: &Product) -> Result<WriteOutcome, StoreError> {
            self.inner.update_product(product).await
        }
        async fn list_products(
            &mut self,
            keyword: Option<&str>,
            page: Page,
        ) -> Result<(Vec<Product>, i64), StoreError> {
            self.inner.list_products(keyword, page).await
        }
        async fn insert_address(&mut self, address: &Address) -> Result<(), StoreError> {
            self.inner.insert_address(address).await
        }
        async fn default_address_for(&mut self, user_id: Uuid) -> Result<Option<Address>, StoreError> {
            self.inner.default_address_for(user_id).await
        }
        async fn address_for_user(
            &mut self,
            id: Uuid,
            user_id: Uuid,
        ) -> Result<Option<Address>, StoreError> {
            self.inner.address_for_user(id, user_id).await
        }
        async fn cart_for_user(&mut self, user_id: Uuid) -> Result<Option<Cart>, StoreError> {
            self.inner.cart_for_user(user_id).await
        }
        async fn save_cart(&mut self, cart: &Cart) -> Result<(), StoreError> {
            self.inner.save_cart(cart).await
        }
        async fn insert_order(&mut self, order: &Order) -> Result<(), StoreError> {
            if self.failures.load(Ordering::SeqCst) > 0 {
                self.failures.fetch_sub(1, Ordering::SeqCst);
                return Err(if self.unique_violation {
                    StoreError::UniqueViolation { constraint: "orders_order_number_key".into() }
                } else {
                    StoreError::Database(sqlx::Error::PoolClosed)
                });
            }
            self.inner.insert_order(order).await
        }
        async fn order_for_user(&mut self, id: Uuid, user_id: Uuid) -> Result<Option<Order>, StoreError> {
            self.inner.order_for_user(id, user_id).await
        }
        async fn list_orders_for_user(
            &mut self,
            user_id: Uuid,
            page: Page,
        ) -> Result<(Vec<Order>, i64), StoreError> {
            self.inner.list_orders_for_user(user_id, page).await
        }
        async fn payment_for_order(&mut self, order_id: Uuid) -> Result<Option<Payment>, StoreError> {
            self.inner.payment_for_order(order_id).await
        }
        async fn commit(self: Box<Self>) -> Result<(), StoreError> {
            self.inner.commit().await
        }
        async fn rollback(self: Box<Self>) -> Result<(), StoreError> {
            self.inner.rollback().await
        }
    }

    #[tokio::test]
    async fn a_failed_order_insert_unwinds_decrement_and_address_save() {
        let memory = MemoryStorage::new();
        let user_id = seed_user(&memory).await;
        let product_id = seed_product(&memory, 5, Decimal::new(10_000, 2)).await;
        let storage = FlakyOrderInserts::new(memory.clone(), usize::MAX, false);
        let orders = service(Arc::new(storage));

        let mut request = default_request(product_id, 3);
        request.delivery_option = DeliveryOption::NewAddress;
        request.new_address = Some(new_address_payload(true));
        let err = orders.create_order(user_id, request).await.unwrap_err();
        assert!(matches!(err, AppError::Store(StoreError::Database(_))));

        assert_eq!(memory.product_stock(product_id), Some(5));
        assert_eq!(memory.product_version(product_id), Some(0));
        assert_eq!(memory.address_count(), 0);
        assert_eq!(memory.order_count(), 0);
    }

    #[tokio::test]
    async fn an_order_number_collision_gets_a_fresh_number() {
        let memory = MemoryStorage::new();
        let user_id = seed_user(&memory).await;
        seed_default_address(&memory, user_id).await;
        let product_id = seed_product(&memory, 5, Decimal::new(10_000, 2)).await;
        let storage = FlakyOrderInserts::new(memory.clone(), 1, true);
        let orders = service(Arc::new(storage));

        let summary = orders
            .create_order(user_id, default_request(product_id, 2))
            .await
            .unwrap();
        assert_eq!(memory.order_count(), 1);
        assert_eq!(memory.product_stock(product_id), Some(3));
        assert!(!summary.order_number.is_empty());
    }

    #[tokio::test]
    async fn persistent_collisions_exhaust_and_roll_back() {
        let memory = MemoryStorage::new();
        let user_id = seed_user(&memory).await;
        seed_default_address(&memory, user_id).await;
        let product_id = seed_product(&memory, 5, Decimal::new(10_000, 2)).await;
        let storage = FlakyOrderInserts::new(memory.clone(), usize::MAX, true);
        let orders = service(Arc::new(storage));

        let err = orders
            .create_order(user_id, default_request(product_id, 2))
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::Order(OrderError::NumberExhausted)));
        assert_eq!(memory.order_count(), 0);
        assert_eq!(memory.product_stock(product_id), Some(5));
    }
}
