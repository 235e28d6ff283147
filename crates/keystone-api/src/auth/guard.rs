//! Authorization guard
//!
//! A two-stage gate applied to every protected operation:
//!
//! 1. [`Guard::authenticate`] turns a bearer credential into a
//!    [`SessionContext`], re-reading the account from the repository so that
//!    role and active status are current.
//! 2. [`Guard::authorize`] checks the session's role against the roles the
//!    operation requires.
//!
//! [`Guard::check`] runs both in that order, so an unauthenticated caller
//! never reaches a role check.

use super::error::AuthError;
use super::jwt::TokenService;
use super::session::SessionContext;
use keystone_core::{AccountRepository, Role};
use std::sync::Arc;

const BEARER_PREFIX: &str = "Bearer ";

/// Extract the token from an `Authorization` header value.
///
/// A missing header, a wrong scheme and an empty token are all treated as a
/// missing credential.
pub fn bearer_token(header: Option<&str>) -> Result<&str, AuthError> {
    let token = header
        .and_then(|value| value.strip_prefix(BEARER_PREFIX))
        .ok_or(AuthError::Unauthenticated)?
        .trim();

    if token.is_empty() {
        return Err(AuthError::Unauthenticated);
    }
    Ok(token)
}

#[derive(Clone)]
pub struct Guard {
    tokens: TokenService,
    accounts: Arc<dyn AccountRepository>,
}

impl Guard {
    pub fn new(tokens: TokenService, accounts: Arc<dyn AccountRepository>) -> Self {
        Self { tokens, accounts }
    }

    /// Verify the bearer credential and load the current account
    pub async fn authenticate(&self, header: Option<&str>) -> Result<SessionContext, AuthError> {
        let token = bearer_token(header)?;

        let claims = self
            .tokens
            .verify(token)
            .map_err(|_| AuthError::Unauthenticated)?;

        let account_id = claims.subject().ok_or(AuthError::Unauthenticated)?;

        let account = self
            .accounts
            .find_by_id(account_id)
            .await?
            .ok_or_else(|| {
                tracing::debug!(%account_id, "Token subject no longer exists");
                AuthError::Unauthenticated
            })?;

        if !account.is_active {
            tracing::debug!(%account_id, "Token presented for deactivated account");
            return Err(AuthError::Unauthenticated);
        }

        Ok(SessionContext::new(&account, claims.exp))
    }

    /// Check the session role against the operation's required roles.
    ///
    /// An empty set means any authenticated caller may proceed.
    pub fn authorize(session: &SessionContext, required_roles: &[Role]) -> Result<(), AuthError> {
        if required_roles.is_empty() || required_roles.contains(&session.role()) {
            return Ok(());
        }

        tracing::debug!(
            account_id = %session.account_id(),
            role = %session.role(),
            "Role not permitted for operation"
        );
        Err(AuthError::insufficient_role())
    }

    /// Authenticate, then authorize
    pub async fn check(
        &self,
        header: Option<&str>,
        required_roles: &[Role],
    ) -> Result<SessionContext, AuthError> {
        let session = self.authenticate(header).await?;
        Self::authorize(&session, required_roles)?;
        Ok(session)
    }
}
