//! User entity

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use uuid::Uuid;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[sqlx(type_name = "user_role", rename_all = "lowercase")]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Role {
    Customer,
    Seller,
}

#[derive(Clone, Debug, sqlx::FromRow)]
pub struct User {
    pub id: Uuid,
    pub email: String,
    pub password_hash: String,
    pub name: String,
    pub role: Role,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl User {
    pub fn new(email: impl Into<String>, password_hash: impl Into<String>, name: impl Into<String>, role: Role) -> Self {
        let now = Utc::now();
        Self {
            id: Uuid::now_v7(),
            email: email.into(),
            password_hash: password_hash.into(),
            name: name.into(),
            role,
            created_at: now,
            updated_at: now,
        }
    }

    pub fn is_seller(&self) -> bool {
        self.role == Role::Seller
    }

    pub fn ensure_seller(&self) -> Result<(), UserError> {
        if !self.is_seller() {
            return Err(UserError::SellerOnly);
        }
        Ok(())
    }

    pub fn set_password(&mut self, password_hash: impl Into<String>) {
        self.password_hash = password_hash.into();
        self.touch();
    }

    pub fn rename(&mut self, name: impl Into<String>) {
        self.name = name.into();
        self.touch();
    }

    fn touch(&mut self) {
        self.updated_at = Utc::now();
    }
}

#[derive(Clone, Debug, Error, PartialEq, Eq)]
pub enum UserError {
    #[error("user not found")]
    NotFound,
    #[error("email is already in use")]
    DuplicateEmail,
    #[error("login required")]
    LoginRequired,
    #[error("check your email and password")]
    InvalidCredentials,
    #[error("current password does not match")]
    WrongPassword,
    #[error("new password must differ from the current one")]
    SamePassword,
    #[error("password must be at least 8 characters")]
    PasswordTooShort,
    #[error("this action is only available to sellers")]
    SellerOnly,
}
