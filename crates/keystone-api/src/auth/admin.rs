//! Administrative account management
//!
//! Everything here sits behind the `admin` role at the HTTP layer; the
//! service itself only enforces the rules that hold regardless of caller,
//! such as identity uniqueness and the restrictions on an administrator
//! acting on their own account.

use super::error::AuthError;
use super::password::PasswordHasher;
use super::service::{hash_blocking, validate_username};
use keystone_core::{
    normalize_email, normalize_username, AccountPublic, AccountRepository, AccountUpdate,
    NewAccount, Role,
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use utoipa::ToSchema;
use uuid::Uuid;
use validator::Validate;

fn default_active() -> bool {
    true
}

/// Account creation request (admin)
#[derive(Debug, Clone, Serialize, Deserialize, Validate, ToSchema)]
pub struct CreateAccountRequest {
    #[validate(custom(
        function = "validate_username",
        message = "Username must be 1 to 50 characters"
    ))]
    pub username: String,
    #[validate(email(message = "Invalid email address"))]
    pub email: String,
    #[serde(skip_serializing)]
    #[validate(length(min = 6, message = "Password must be at least 6 characters"))]
    pub password: String,
    #[serde(default)]
    pub role: Role,
    #[serde(default = "default_active")]
    pub is_active: bool,
}

/// Account update request (admin). Absent fields are left unchanged.
#[derive(Debug, Clone, Default, Serialize, Deserialize, Validate, ToSchema)]
pub struct UpdateAccountRequest {
    #[serde(skip_serializing_if = "Option::is_none")]
    #[validate(custom(
        function = "validate_username",
        message = "Username must be 1 to 50 characters"
    ))]
    pub username: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    #[validate(email(message = "Invalid email address"))]
    pub email: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub role: Option<Role>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub is_active: Option<bool>,
}

impl From<UpdateAccountRequest> for AccountUpdate {
    fn from(request: UpdateAccountRequest) -> Self {
        AccountUpdate {
            username: request.username.as_deref().map(normalize_username),
            email: request.email.as_deref().map(normalize_email),
            role: request.role,
            is_active: request.is_active,
        }
    }
}

/// Account administration service
#[derive(Clone)]
pub struct AccountAdminService {
    accounts: Arc<dyn AccountRepository>,
    hasher: Arc<PasswordHasher>,
}

impl AccountAdminService {
    pub fn new(accounts: Arc<dyn AccountRepository>, hasher: Arc<PasswordHasher>) -> Self {
        Self { accounts, hasher }
    }

    /// All accounts in creation order
    pub async fn list(&self) -> Result<Vec<AccountPublic>, AuthError> {
        let accounts = self.accounts.list().await?;
        Ok(accounts.iter().map(|a| a.to_public()).collect())
    }

    pub async fn get(&self, id: Uuid) -> Result<AccountPublic, AuthError> {
        self.accounts
            .find_by_id(id)
            .await?
            .map(|a| a.to_public())
            .ok_or(AuthError::NotFound)
    }

    /// Create an account with any role
    pub async fn create(&self, request: CreateAccountRequest) -> Result<AccountPublic, AuthError> {
        let username = normalize_username(&request.username);
        let email = normalize_email(&request.email);

        if let Some(existing) = self
            .accounts
            .find_by_email_or_username(&email, &username)
            .await?
        {
            if let Some(field) = existing.collision_with(&email, &username) {
                return Err(AuthError::DuplicateIdentity(field));
            }
        }

        let password_hash = hash_blocking(&self.hasher, request.password).await?;

        let account = self
            .accounts
            .create(NewAccount {
                username,
                email,
                password_hash,
                role: request.role,
                is_active: request.is_active,
            })
            .await?;

        tracing::info!(account_id = %account.id, role = %account.role, "Account created by admin");
        Ok(account.to_public())
    }

    /// Apply a partial update on behalf of the administrator `acting_id`
    ///
    /// # Returns
    ///
    /// * `Err(AuthError::Forbidden)` - The administrator tried to demote or deactivate itself
    /// * `Err(AuthError::NotFound)` - No account with `id`
    /// * `Err(AuthError::DuplicateIdentity)` - New username or email belongs to another account
    pub async fn update(
        &self,
        acting_id: Uuid,
        id: Uuid,
        update: AccountUpdate,
    ) -> Result<AccountPublic, AuthError> {
        if acting_id == id {
            if update.role.is_some_and(|role| role != Role::Admin) {
                return Err(AuthError::Forbidden(
                    "Administrators cannot remove their own admin role".to_string(),
                ));
            }
            if update.is_active == Some(false) {
                return Err(AuthError::Forbidden(
                    "Administrators cannot deactivate their own account".to_string(),
                ));
            }
        }

        let account = self
            .accounts
            .update_fields(id, update)
            .await?
            .ok_or(AuthError::NotFound)?;

        tracing::info!(account_id = %account.id, "Account updated by admin");
        Ok(account.to_public())
    }

    /// Delete an account. `acting_id` is the administrator performing the
    /// call and may not delete itself.
    pub async fn delete(&self, acting_id: Uuid, id: Uuid) -> Result<(), AuthError> {
        if acting_id == id {
            return Err(AuthError::Forbidden(
                "Administrators cannot delete their own account".to_string(),
            ));
        }

        if !self.accounts.delete(id).await? {
            return Err(AuthError::NotFound);
        }

        tracing::info!(account_id = %id, "Account deleted by admin");
        Ok(())
    }
}
