//! Administrator bootstrap

use super::error::AuthError;
use super::password::PasswordHasher;
use super::service::hash_blocking;
use keystone_core::{
    normalize_email, normalize_username, AccountPublic, AccountRepository, BootstrapConfig,
    NewAccount, Role,
};
use std::sync::Arc;

/// Result of [`ensure_admin`]
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BootstrapOutcome {
    Created(AccountPublic),
    AlreadyPresent,
    /// No administrator exists, but a non-admin account already holds the
    /// configured username or email. Nothing is created or promoted.
    IdentityInUse(AccountPublic),
}

/// Seed an administrator when the store has none.
///
/// Safe to run on every start: once any `admin` account exists this is a
/// read-only check. An ordinary account holding the bootstrap identity is
/// left untouched and reported, so startup never fails on it.
pub async fn ensure_admin(
    accounts: &Arc<dyn AccountRepository>,
    hasher: &Arc<PasswordHasher>,
    config: &BootstrapConfig,
) -> Result<BootstrapOutcome, AuthError> {
    if accounts.count_by_role(Role::Admin).await? > 0 {
        tracing::debug!("Administrator already present, skipping bootstrap");
        return Ok(BootstrapOutcome::AlreadyPresent);
    }

    let username = normalize_username(&config.admin_username);
    let email = normalize_email(&config.admin_email);

    if let Some(holder) = accounts.find_by_email_or_username(&email, &username).await? {
        tracing::warn!(
            account_id = %holder.id,
            username = %holder.username,
            "Bootstrap identity belongs to a non-admin account; no administrator created"
        );
        return Ok(BootstrapOutcome::IdentityInUse(holder.to_public()));
    }

    let password_hash = hash_blocking(hasher, config.admin_password.clone()).await?;

    let account = accounts
        .create(NewAccount {
            username,
            email,
            password_hash,
            role: Role::Admin,
            is_active: true,
        })
        .await?;

    if config.uses_default_password() {
        tracing::warn!(
            username = %account.username,
            password = %config.admin_password,
            "Created default administrator; change this password immediately"
        );
    } else {
        tracing::info!(username = %account.username, "Created administrator");
    }

    Ok(BootstrapOutcome::Created(account.to_public()))
}
