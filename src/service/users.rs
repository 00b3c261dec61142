//! Account registration, login and profile operations.

use std::sync::Arc;

use tracing::info;
use uuid::Uuid;

use crate::auth::{self, AuthKeys};
use crate::domain::{Role, User, UserError};
use crate::error::AppError;
use crate::store::{Storage, StoreError};

const MIN_PASSWORD_LEN: usize = 8;

#[derive(Clone)]
pub struct UserService {
    storage: Arc<dyn Storage>,
    keys: AuthKeys,
}

impl UserService {
    pub fn new(storage: Arc<dyn Storage>, keys: AuthKeys) -> Self {
        Self { storage, keys }
    }

    pub async fn sign_up(
        &self,
        email: &str,
        password: &str,
        name: &str,
        role: Role,
    ) -> Result<User, AppError> {
        if password.len() < MIN_PASSWORD_LEN {
            return Err(UserError::PasswordTooShort.into());
        }
        let user = User::new(email, auth::hash_password(password)?, name, role);
        let mut uow = self.storage.begin().await?;
        match uow.insert_user(&user).await {
            Ok(()) => {}
            Err(StoreError::UniqueViolation { .. }) => {
                return Err(UserError::DuplicateEmail.into());
            }
            Err(err) => return Err(err.into()),
        }
        uow.commit().await?;
        info!(user_id = %user.id, "user registered");
        Ok(user)
    }

    pub async fn login(&self, email: &str, password: &str) -> Result<(String, User), AppError> {
        let mut uow = self.storage.begin().await?;
        let user = uow
            .user_by_email(email)
            .await?
            .ok_or(UserError::InvalidCredentials)?;
        uow.commit().await?;
        if !auth::verify_password(password, &user.password_hash) {
            return Err(UserError::InvalidCredentials.into());
        }
        let token = self.keys.issue(&user)?;
        Ok((token, user))
    }

    pub async fn me(&self, user_id: Uuid) -> Result<User, AppError> {
        let mut uow = self.storage.begin().await?;
        let user = uow.user_by_id(user_id).await?.ok_or(UserError::NotFound)?;
        uow.commit().await?;
        Ok(user)
    }

    pub async fn change_password(
        &self,
        user_id: Uuid,
        current: &str,
        new: &str,
    ) -> Result<(), AppError> {
        if new.len() < MIN_PASSWORD_LEN {
            return Err(UserError::PasswordTooShort.into());
        }
        if new == current {
            return Err(UserError::SamePassword.into());
        }
        let mut uow = self.storage.begin().await?;
        let mut user = uow.user_by_id(user_id).await?.ok_or(UserError::NotFound)?;
        if !auth::verify_password(current, &user.password_hash) {
            return Err(UserError::WrongPassword.into());
        }
        user.set_password(auth::hash_password(new)?);
        uow.update_user(&user).await?;
        uow.commit().await?;
        info!(user_id = %user.id, "password changed");
        Ok(())
    }
}
