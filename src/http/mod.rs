//! HTTP surface: one axum handler per service operation. Handlers stay
//! thin; every rule lives in the service layer.

mod cart;
mod catalog;
mod orders;
mod users;

use std::sync::Arc;

use axum::extract::FromRef;
use axum::routing::{get, patch, post, put};
use axum::{Json, Router};
use serde::{Deserialize, Serialize};
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;

use crate::auth::AuthKeys;
use crate::bus::EventBus;
use crate::service::{CartService, CatalogService, OrderService, UserService};
use crate::store::Storage;

#[derive(Clone, FromRef)]
pub struct AppState {
    pub users: UserService,
    pub catalog: CatalogService,
    pub carts: CartService,
    pub orders: OrderService,
    pub auth: AuthKeys,
}

impl AppState {
    pub fn new(storage: Arc<dyn Storage>, bus: EventBus, auth: AuthKeys) -> Self {
        Self {
            users: UserService::new(Arc::clone(&storage), auth.clone()),
            catalog: CatalogService::new(Arc::clone(&storage), bus.clone()),
            carts: CartService::new(Arc::clone(&storage)),
            orders: OrderService::new(storage, bus),
            auth,
        }
    }
}

pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(health))
        .route("/api/v1/users/signup", post(users::sign_up))
        .route("/api/v1/users/login", post(users::login))
        .route("/api/v1/users/me", get(users::me))
        .route("/api/v1/users/password", put(users::change_password))
        .route("/api/v1/products", get(catalog::list_products).post(catalog::register_product))
        .route(
            "/api/v1/products/:id",
            get(catalog::get_product)
                .put(catalog::update_product)
                .delete(catalog::delete_product),
        )
        .route("/api/v1/products/:id/stock", patch(catalog::update_stock))
        .route("/api/v1/categories", get(catalog::list_categories).post(catalog::create_category))
        .route("/api/v1/cart", get(cart::get_cart).delete(cart::clear_cart))
        .route("/api/v1/cart/items", post(cart::add_item))
        .route("/api/v1/cart/items/:id", put(cart::update_item).delete(cart::remove_item))
        .route("/api/v1/orders", get(orders::list_orders).post(orders::create_order))
        .route("/api/v1/orders/:id", get(orders::get_order))
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
        .with_state(state)
}

async fn health() -> Json<serde_json::Value> {
    Json(serde_json::json!({"status": "healthy", "service": "storefront"}))
}

#[derive(Debug, Deserialize)]
pub struct ListParams {
    pub page: Option<u32>,
    pub per_page: Option<u32>,
    pub keyword: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct PaginatedResponse<T> {
    pub data: Vec<T>,
    pub total: i64,
    pub page: u32,
}
