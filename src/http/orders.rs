use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::Json;
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::Serialize;
use uuid::Uuid;
use validator::Validate;

use crate::auth::CurrentUser;
use crate::domain::{Order, OrderItem, OrderStatus, Payment, ShippingAddress};
use crate::error::AppError;
use crate::http::{ListParams, PaginatedResponse};
use crate::service::{OrderService, OrderSummary, PlaceOrderRequest};
use crate::store::Page;

#[derive(Debug, Serialize)]
pub struct OrderResponse {
    pub id: Uuid,
    pub order_number: String,
    pub total_amount: Decimal,
    pub status: OrderStatus,
    pub created_at: DateTime<Utc>,
}

impl From<&Order> for OrderResponse {
    fn from(order: &Order) -> Self {
        Self {
            id: order.id,
            order_number: order.order_number.clone(),
            total_amount: order.total_amount,
            status: order.status,
            created_at: order.created_at,
        }
    }
}

#[derive(Debug, Serialize)]
pub struct OrderDetailResponse {
    pub id: Uuid,
    pub order_number: String,
    pub total_amount: Decimal,
    pub delivery_message: String,
    pub status: OrderStatus,
    pub shipping: ShippingAddress,
    pub address_id: Option<Uuid>,
    pub items: Vec<OrderItem>,
    pub payment: Option<Payment>,
    pub created_at: DateTime<Utc>,
}

pub async fn create_order(
    current: CurrentUser,
    State(orders): State<OrderService>,
    Json(request): Json<PlaceOrderRequest>,
) -> Result<(StatusCode, Json<OrderSummary>), AppError> {
    request.validate()?;
    let summary = orders.create_order(current.id, request).await?;
    Ok((StatusCode::CREATED, Json(summary)))
}

pub async fn list_orders(
    current: CurrentUser,
    State(orders): State<OrderService>,
    Query(params): Query<ListParams>,
) -> Result<Json<PaginatedResponse<OrderResponse>>, AppError> {
    let page = Page::clamped(params.page, params.per_page);
    let (listed, total) = orders.list_orders(current.id, page).await?;
    Ok(Json(PaginatedResponse {
        data: listed.iter().map(Into::into).collect(),
        total,
        page: page.page,
    }))
}

pub async fn get_order(
    current: CurrentUser,
    State(orders): State<OrderService>,
    Path(id): Path<Uuid>,
) -> Result<Json<OrderDetailResponse>, AppError> {
    let (order, payment) = orders.order_detail(current.id, id).await?;
    Ok(Json(OrderDetailResponse {
        id: order.id,
        order_number: order.order_number,
        total_amount: order.total_amount,
        delivery_message: order.delivery_message,
        status: order.status,
        shipping: order.shipping.0,
        address_id: order.address_id,
        items: order.items,
        payment,
        created_at: order.created_at,
    }))
}
