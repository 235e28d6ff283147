//! Account storage contract
//!
//! The storage engine is an external collaborator. Implementations must
//! enforce username and email uniqueness themselves (unique indexes, a single
//! write lock, ...) and report violations as [`RepositoryError::Conflict`].

use crate::{Account, AccountUpdate, IdentityField, NewAccount, Role};
use async_trait::async_trait;
use thiserror::Error;
use uuid::Uuid;

/// Repository errors
#[derive(Debug, Error)]
pub enum RepositoryError {
    #[error("Identity conflict on {0}")]
    Conflict(IdentityField),

    #[error("Account not found")]
    NotFound,

    #[error("Database error: {0}")]
    Database(String),
}

/// Durable store of accounts keyed by unique email and username
#[async_trait]
pub trait AccountRepository: Send + Sync {
    /// Single combined lookup matching either identity field
    async fn find_by_email_or_username(
        &self,
        email: &str,
        username: &str,
    ) -> Result<Option<Account>, RepositoryError>;

    async fn find_by_email(&self, email: &str) -> Result<Option<Account>, RepositoryError>;

    async fn find_by_id(&self, id: Uuid) -> Result<Option<Account>, RepositoryError>;

    /// Persist a new account; fails with `Conflict` on a uniqueness violation
    async fn create(&self, account: NewAccount) -> Result<Account, RepositoryError>;

    /// Replace the stored password hash; fails with `NotFound` if no such account
    async fn update_password(&self, id: Uuid, password_hash: &str)
        -> Result<(), RepositoryError>;

    /// Apply an administrative update, returning `None` if no such account
    async fn update_fields(
        &self,
        id: Uuid,
        update: AccountUpdate,
    ) -> Result<Option<Account>, RepositoryError>;

    /// All accounts ordered by creation time
    async fn list(&self) -> Result<Vec<Account>, RepositoryError>;

    /// Remove an account; returns whether a record was deleted
    async fn delete(&self, id: Uuid) -> Result<bool, RepositoryError>;

    async fn count_by_role(&self, role: Role) -> Result<u64, RepositoryError>;
}
