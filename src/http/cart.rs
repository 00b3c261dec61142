use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::Json;
use serde::{Deserialize, Serialize};
use uuid::Uuid;
use validator::Validate;

use crate::auth::CurrentUser;
use crate::domain::Cart;
use crate::error::AppError;
use crate::service::CartService;

#[derive(Debug, Deserialize, Validate)]
pub struct AddItemRequest {
    pub product_id: Uuid,
    #[validate(range(min = 1))]
    pub quantity: u32,
}

/// Zero removes the line.
#[derive(Debug, Deserialize)]
pub struct UpdateItemRequest {
    pub quantity: u32,
}

#[derive(Debug, Serialize)]
pub struct CartResponse {
    pub id: Uuid,
    pub items: Vec<CartItemResponse>,
}

#[derive(Debug, Serialize)]
pub struct CartItemResponse {
    pub id: Uuid,
    pub product_id: Uuid,
    pub quantity: i32,
}

impl From<Cart> for CartResponse {
    fn from(cart: Cart) -> Self {
        Self {
            id: cart.id,
            items: cart
                .items
                .into_iter()
                .map(|item| CartItemResponse {
                    id: item.id,
                    product_id: item.product_id,
                    quantity: item.quantity,
                })
                .collect(),
        }
    }
}

pub async fn get_cart(
    current: CurrentUser,
    State(carts): State<CartService>,
) -> Result<Json<CartResponse>, AppError> {
    let cart = carts.cart_for(current.id).await?;
    Ok(Json(cart.into()))
}

pub async fn add_item(
    current: CurrentUser,
    State(carts): State<CartService>,
    Json(request): Json<AddItemRequest>,
) -> Result<(StatusCode, Json<CartResponse>), AppError> {
    request.validate()?;
    let cart = carts.add_item(current.id, request.product_id, request.quantity).await?;
    Ok((StatusCode::CREATED, Json(cart.into())))
}

pub async fn update_item(
    current: CurrentUser,
    State(carts): State<CartService>,
    Path(id): Path<Uuid>,
    Json(request): Json<UpdateItemRequest>,
) -> Result<Json<CartResponse>, AppError> {
    let cart = carts.update_quantity(current.id, id, request.quantity).await?;
    Ok(Json(cart.into()))
}

pub async fn remove_item(
    current: CurrentUser,
    State(carts): State<CartService>,
    Path(id): Path<Uuid>,
) -> Result<Json<CartResponse>, AppError> {
    let cart = carts.remove_item(current.id, id).await?;
    Ok(Json(cart.into()))
}

pub async fn clear_cart(
    current: CurrentUser,
    State(carts): State<CartService>,
) -> Result<StatusCode, AppError> {
    carts.clear(current.id).await?;
    Ok(StatusCode::NO_CONTENT)
}
