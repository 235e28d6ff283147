//! Authentication and authorization failures

use super::jwt::TokenError;
use super::password::PasswordError;
use keystone_core::{IdentityField, RepositoryError};
use thiserror::Error;

/// Message shared by every signin failure that must not reveal whether the
/// email exists
pub const INVALID_CREDENTIALS_MESSAGE: &str = "Invalid credentials";

/// Errors produced by the authentication service and the guard.
///
/// User-caused variants carry specific messages. `Hashing` and `Repository`
/// are internal and surface to callers only as a generic failure.
#[derive(Debug, Error)]
pub enum AuthError {
    #[error("{}", .0.collision_message())]
    DuplicateIdentity(IdentityField),

    #[error("Invalid credentials")]
    InvalidCredentials,

    /// Wrong current password on a password change
    #[error("Current password is incorrect")]
    IncorrectCurrentPassword,

    #[error("Account is deactivated. Please contact support.")]
    AccountDeactivated,

    #[error("Account not found")]
    NotFound,

    #[error("Authentication required")]
    Unauthenticated,

    #[error("{0}")]
    Forbidden(String),

    #[error("Invalid token")]
    InvalidToken,

    #[error("{0}")]
    Validation(String),

    #[error("Password hashing failed: {0}")]
    Hashing(String),

    #[error("Repository failure: {0}")]
    Repository(RepositoryError),
}

impl AuthError {
    pub fn insufficient_role() -> Self {
        AuthError::Forbidden("Insufficient permissions".to_string())
    }

    /// Whether this failure is internal rather than caused by the caller
    pub fn is_internal(&self) -> bool {
        matches!(self, AuthError::Hashing(_) | AuthError::Repository(_))
    }
}

impl From<RepositoryError> for AuthError {
    fn from(err: RepositoryError) -> Self {
        match err {
            RepositoryError::Conflict(field) => AuthError::DuplicateIdentity(field),
            RepositoryError::NotFound => AuthError::NotFound,
            other => AuthError::Repository(other),
        }
    }
}

impl From<PasswordError> for AuthError {
    fn from(err: PasswordError) -> Self {
        AuthError::Hashing(err.to_string())
    }
}

impl From<TokenError> for AuthError {
    fn from(err: TokenError) -> Self {
        match err {
            TokenError::Invalid => AuthError::InvalidToken,
            // Signing with a valid key does not fail for caller input
            TokenError::Encoding(msg) => AuthError::Hashing(format!("token signing: {msg}")),
        }
    }
}
