//! Application error taxonomy.
//!
//! Every failure a service can produce folds into [`AppError`], which knows
//! its HTTP status class and a stable machine-readable code. Handlers just
//! return it; the `IntoResponse` impl renders the error envelope.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use thiserror::Error;
use tracing::error;

use crate::domain::{AddressError, CartError, CategoryError, OrderError, ProductError, UserError};
use crate::store::StoreError;

#[derive(Debug, Error)]
pub enum AppError {
    #[error(transparent)]
    User(#[from] UserError),
    #[error(transparent)]
    Product(#[from] ProductError),
    #[error(transparent)]
    Address(#[from] AddressError),
    #[error(transparent)]
    Cart(#[from] CartError),
    #[error(transparent)]
    Category(#[from] CategoryError),
    #[error(transparent)]
    Order(#[from] OrderError),
    #[error("invalid request: {0}")]
    Validation(String),
    #[error(transparent)]
    Store(#[from] StoreError),
    #[error("internal error: {0}")]
    Internal(String),
}

impl From<validator::ValidationErrors> for AppError {
    fn from(errors: validator::ValidationErrors) -> Self {
        Self::Validation(errors.to_string())
    }
}

impl AppError {
    pub fn status(&self) -> StatusCode {
        match self {
            Self::User(UserError::NotFound)
            | Self::Product(ProductError::NotFound)
            | Self::Address(AddressError::NoDefaultAddress | AddressError::AddressNotFound)
            | Self::Cart(CartError::ItemNotFound)
            | Self::Category(CategoryError::NotFound)
            | Self::Order(OrderError::NotFound) => StatusCode::NOT_FOUND,

            Self::User(UserError::LoginRequired | UserError::InvalidCredentials) => {
                StatusCode::UNAUTHORIZED
            }

            Self::User(UserError::SellerOnly) | Self::Product(ProductError::NotOwner) => {
                StatusCode::FORBIDDEN
            }

            Self::User(UserError::DuplicateEmail)
            | Self::Product(ProductError::ConcurrentModification)
            | Self::Category(CategoryError::DuplicateName)
            | Self::Order(OrderError::NumberExhausted)
            | Self::Store(StoreError::UniqueViolation { .. }) => StatusCode::CONFLICT,

            Self::Store(StoreError::Database(_)) | Self::Internal(_) => {
                StatusCode::INTERNAL_SERVER_ERROR
            }

            _ => StatusCode::BAD_REQUEST,
        }
    }

    pub fn code(&self) -> &'static str {
        match self {
            Self::User(UserError::NotFound) => "USER_NOT_FOUND",
            Self::User(UserError::DuplicateEmail) => "DUPLICATE_EMAIL",
            Self::User(UserError::LoginRequired) => "LOGIN_REQUIRED",
            Self::User(UserError::InvalidCredentials) => "INVALID_CREDENTIALS",
            Self::User(UserError::WrongPassword) => "WRONG_PASSWORD",
            Self::User(UserError::SamePassword) => "SAME_PASSWORD",
            Self::User(UserError::PasswordTooShort) => "PASSWORD_TOO_SHORT",
            Self::User(UserError::SellerOnly) => "SELLER_ONLY",
            Self::Product(ProductError::NotFound) => "PRODUCT_NOT_FOUND",
            Self::Product(ProductError::InsufficientStock { .. }) => "INSUFFICIENT_STOCK",
            Self::Product(ProductError::ConcurrentModification) => "STOCK_CONFLICT",
            Self::Product(ProductError::NotOwner) => "NOT_PRODUCT_OWNER",
            Self::Product(ProductError::InvalidPrice) => "INVALID_PRICE",
            Self::Product(ProductError::NegativeStock) => "NEGATIVE_STOCK",
            Self::Product(ProductError::SameStock) => "SAME_STOCK",
            Self::Address(AddressError::NoDefaultAddress) => "NO_DEFAULT_ADDRESS",
            Self::Address(AddressError::AddressRequired) => "ADDRESS_REQUIRED",
            Self::Address(AddressError::AddressNotFound) => "ADDRESS_NOT_FOUND",
            Self::Address(AddressError::MissingNewAddress) => "MISSING_NEW_ADDRESS",
            Self::Address(AddressError::InvalidDeliveryOption) => "INVALID_DELIVERY_OPTION",
            Self::Cart(CartError::ItemNotFound) => "CART_ITEM_NOT_FOUND",
            Self::Category(CategoryError::NotFound) => "CATEGORY_NOT_FOUND",
            Self::Category(CategoryError::DuplicateName) => "DUPLICATE_CATEGORY",
            Self::Order(OrderError::NotFound) => "ORDER_NOT_FOUND",
            Self::Order(OrderError::NumberExhausted) => "ORDER_NUMBER_EXHAUSTED",
            Self::Validation(_) => "VALIDATION",
            Self::Store(StoreError::UniqueViolation { .. }) => "CONFLICT",
            Self::Store(StoreError::Database(_)) | Self::Internal(_) => "INTERNAL",
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = self.status();
        let message = if status == StatusCode::INTERNAL_SERVER_ERROR {
            error!(error = %self, "request failed");
            "internal error".to_string()
        } else {
            self.to_string()
        };
        let body = Json(serde_json::json!({
            "status": "error",
            "error": { "code": self.code(), "message": message },
        }));
        (status, body).into_response()
    }
}
