//! Category entity

use chrono::{DateTime, Utc};
use serde::Serialize;
use thiserror::Error;
use uuid::Uuid;

#[derive(Clone, Debug, Serialize, sqlx::FromRow)]
pub struct Category {
    pub id: Uuid,
    pub name: String,
    pub created_at: DateTime<Utc>,
}

impl Category {
    pub fn new(name: impl Into<String>) -> Self {
        Self { id: Uuid::now_v7(), name: name.into(), created_at: Utc::now() }
    }
}

#[derive(Clone, Debug, Error, PartialEq, Eq)]
pub enum CategoryError {
    #[error("category not found")]
    NotFound,
    #[error("category name is already in use")]
    DuplicateName,
}
