use axum::extract::State;
use axum::http::StatusCode;
use axum::Json;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;
use validator::Validate;

use crate::auth::CurrentUser;
use crate::domain::{Role, User};
use crate::error::AppError;
use crate::service::UserService;

#[derive(Debug, Deserialize, Validate)]
pub struct SignupRequest {
    #[validate(email)]
    pub email: String,
    #[validate(length(min = 8))]
    pub password: String,
    #[validate(length(min = 1))]
    pub name: String,
    pub role: Role,
}

#[derive(Debug, Deserialize)]
pub struct LoginRequest {
    pub email: String,
    pub password: String,
}

#[derive(Debug, Deserialize, Validate)]
pub struct ChangePasswordRequest {
    pub current_password: String,
    #[validate(length(min = 8))]
    pub new_password: String,
}

#[derive(Debug, Serialize)]
pub struct UserResponse {
    pub id: Uuid,
    pub email: String,
    pub name: String,
    pub role: Role,
    pub created_at: DateTime<Utc>,
}

impl From<User> for UserResponse {
    fn from(user: User) -> Self {
        Self {
            id: user.id,
            email: user.email,
            name: user.name,
            role: user.role,
            created_at: user.created_at,
        }
    }
}

#[derive(Debug, Serialize)]
pub struct LoginResponse {
    pub token: String,
    pub user: UserResponse,
}

pub async fn sign_up(
    State(users): State<UserService>,
    Json(request): Json<SignupRequest>,
) -> Result<(StatusCode, Json<UserResponse>), AppError> {
    request.validate()?;
    let user = users
        .sign_up(&request.email, &request.password, &request.name, request.role)
        .await?;
    Ok((StatusCode::CREATED, Json(user.into())))
}

pub async fn login(
    State(users): State<UserService>,
    Json(request): Json<LoginRequest>,
) -> Result<Json<LoginResponse>, AppError> {
    let (token, user) = users.login(&request.email, &request.password).await?;
    Ok(Json(LoginResponse { token, user: user.into() }))
}

pub async fn me(
    current: CurrentUser,
    State(users): State<UserService>,
) -> Result<Json<UserResponse>, AppError> {
    let user = users.me(current.id).await?;
    Ok(Json(user.into()))
}

pub async fn change_password(
    current: CurrentUser,
    State(users): State<UserService>,
    Json(request): Json<ChangePasswordRequest>,
) -> Result<StatusCode, AppError> {
    request.validate()?;
    users
        .change_password(current.id, &request.current_password, &request.new_password)
        .await?;
    Ok(StatusCode::NO_CONTENT)
}
