//! Address entity and delivery resolution errors.

use chrono::{DateTime, Utc};
use serde::Serialize;
use thiserror::Error;
use uuid::Uuid;

/// An address-book entry owned by a user.
#[derive(Clone, Debug, Serialize, sqlx::FromRow)]
pub struct Address {
    pub id: Uuid,
    pub street_address: String,
    pub city: String,
    pub zip_code: String,
    pub is_default: bool,
    pub recipient_name: String,
    pub recipient_phone: String,
    pub user_id: Uuid,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Address {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        street_address: impl Into<String>,
        city: impl Into<String>,
        zip_code: impl Into<String>,
        is_default: bool,
        recipient_name: impl Into<String>,
        recipient_phone: impl Into<String>,
        user_id: Uuid,
    ) -> Self {
        let now = Utc::now();
        Self {
            id: Uuid::now_v7(),
            street_address: street_address.into(),
            city: city.into(),
            zip_code: zip_code.into(),
            is_default,
            recipient_name: recipient_name.into(),
            recipient_phone: recipient_phone.into(),
            user_id,
            created_at: now,
            updated_at: now,
        }
    }
}

#[derive(Clone, Debug, Error, PartialEq, Eq)]
pub enum AddressError {
    #[error("no default address is configured")]
    NoDefaultAddress,
    #[error("an address id is required for this delivery option")]
    AddressRequired,
    #[error("the selected address could not be found")]
    AddressNotFound,
    #[error("new address details are required for this delivery option")]
    MissingNewAddress,
    #[error("unknown delivery option")]
    InvalidDeliveryOption,
}
