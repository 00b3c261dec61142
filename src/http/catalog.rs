use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::Json;
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use uuid::Uuid;
use validator::Validate;

use crate::auth::CurrentUser;
use crate::domain::{Category, Product, ProductStatus};
use crate::error::AppError;
use crate::http::{ListParams, PaginatedResponse};
use crate::service::{CatalogService, ProductChanges, RegisterProduct};
use crate::store::Page;

#[derive(Debug, Deserialize, Validate)]
pub struct RegisterProductRequest {
    #[validate(length(min = 1))]
    pub name: String,
    #[serde(default)]
    pub description: String,
    pub price: Decimal,
    #[validate(range(min = 0))]
    pub stock: i32,
    #[serde(default)]
    pub image_urls: Vec<String>,
    #[serde(default)]
    pub category_ids: Vec<Uuid>,
}

#[derive(Debug, Deserialize, Validate)]
pub struct UpdateProductRequest {
    #[validate(length(min = 1))]
    pub name: String,
    #[serde(default)]
    pub description: String,
    pub price: Decimal,
    #[serde(default)]
    pub image_urls: Vec<String>,
    pub category_ids: Option<Vec<Uuid>>,
}

#[derive(Debug, Deserialize)]
pub struct UpdateStockRequest {
    pub stock: i32,
}

#[derive(Debug, Deserialize, Validate)]
pub struct CreateCategoryRequest {
    #[validate(length(min = 1))]
    pub name: String,
}

#[derive(Debug, Serialize)]
pub struct ProductResponse {
    pub id: Uuid,
    pub name: String,
    pub description: String,
    pub price: Decimal,
    pub stock: i32,
    pub status: ProductStatus,
    pub seller_id: Uuid,
    pub image_urls: Vec<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl From<Product> for ProductResponse {
    fn from(product: Product) -> Self {
        Self {
            id: product.id,
            name: product.name,
            description: product.description,
            price: product.price,
            stock: product.stock,
            status: product.status,
            seller_id: product.seller_id,
            image_urls: product.image_urls,
            created_at: product.created_at,
            updated_at: product.updated_at,
        }
    }
}

#[derive(Debug, Serialize)]
pub struct ProductDetailResponse {
    #[serde(flatten)]
    pub product: ProductResponse,
    pub categories: Vec<Category>,
}

pub async fn list_products(
    State(catalog): State<CatalogService>,
    Query(params): Query<ListParams>,
) -> Result<Json<PaginatedResponse<ProductResponse>>, AppError> {
    let page = Page::clamped(params.page, params.per_page);
    let (products, total) = catalog.list_products(params.keyword.as_deref(), page).await?;
    Ok(Json(PaginatedResponse {
        data: products.into_iter().map(Into::into).collect(),
        total,
        page: page.page,
    }))
}

pub async fn get_product(
    State(catalog): State<CatalogService>,
    Path(id): Path<Uuid>,
) -> Result<Json<ProductDetailResponse>, AppError> {
    let (product, categories) = catalog.get_product(id).await?;
    Ok(Json(ProductDetailResponse { product: product.into(), categories }))
}

pub async fn register_product(
    current: CurrentUser,
    State(catalog): State<CatalogService>,
    Json(request): Json<RegisterProductRequest>,
) -> Result<(StatusCode, Json<ProductResponse>), AppError> {
    request.validate()?;
    let product = catalog
        .register_product(
            current.id,
            RegisterProduct {
                name: request.name,
                description: request.description,
                price: request.price,
                stock: request.stock,
                image_urls: request.image_urls,
                category_ids: request.category_ids,
            },
        )
        .await?;
    Ok((StatusCode::CREATED, Json(product.into())))
}

pub async fn update_product(
    current: CurrentUser,
    State(catalog): State<CatalogService>,
    Path(id): Path<Uuid>,
    Json(request): Json<UpdateProductRequest>,
) -> Result<Json<ProductResponse>, AppError> {
    request.validate()?;
    let product = catalog
        .update_product(
            current.id,
            id,
            ProductChanges {
                name: request.name,
                description: request.description,
                price: request.price,
                image_urls: request.image_urls,
                category_ids: request.category_ids,
            },
        )
        .await?;
    Ok(Json(product.into()))
}

pub async fn update_stock(
    current: CurrentUser,
    State(catalog): State<CatalogService>,
    Path(id): Path<Uuid>,
    Json(request): Json<UpdateStockRequest>,
) -> Result<Json<ProductResponse>, AppError> {
    let product = catalog.update_stock(current.id, id, request.stock).await?;
    Ok(Json(product.into()))
}

pub async fn delete_product(
    current: CurrentUser,
    State(catalog): State<CatalogService>,
    Path(id): Path<Uuid>,
) -> Result<StatusCode, AppError> {
    catalog.delete_product(current.id, id).await?;
    Ok(StatusCode::NO_CONTENT)
}

pub async fn create_category(
    _current: CurrentUser,
    State(catalog): State<CatalogService>,
    Json(request): Json<CreateCategoryRequest>,
) -> Result<(StatusCode, Json<Category>), AppError> {
    request.validate()?;
    let category = catalog.create_category(&request.name).await?;
    Ok((StatusCode::CREATED, Json(category)))
}

pub async fn list_categories(
    State(catalog): State<CatalogService>,
) -> Result<Json<Vec<Category>>, AppError> {
    Ok(Json(catalog.list_categories().await?))
}
