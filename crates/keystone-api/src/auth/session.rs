//! Per-request verified identity

use keystone_core::{Account, AccountPublic, Role};
use uuid::Uuid;

/// Verified identity for the lifetime of one request.
///
/// Built by the guard from the stored account (not from the token body), so
/// `role` and `is_active` reflect the repository at authentication time.
#[derive(Debug, Clone)]
pub struct SessionContext {
    account: AccountPublic,
    token_expires_at: u64,
}

impl SessionContext {
    pub fn new(account: &Account, token_expires_at: u64) -> Self {
        Self {
            account: account.to_public(),
            token_expires_at,
        }
    }

    pub fn account_id(&self) -> Uuid {
        self.account.id
    }

    pub fn email(&self) -> &str {
        &self.account.email
    }

    pub fn role(&self) -> Role {
        self.account.role
    }

    pub fn is_admin(&self) -> bool {
        self.account.role == Role::Admin
    }

    /// Unix timestamp after which the presented token stops verifying
    pub fn token_expires_at(&self) -> u64 {
        self.token_expires_at
    }

    pub fn account(&self) -> &AccountPublic {
        &self.account
    }

    pub fn into_account(self) -> AccountPublic {
        self.account
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use keystone_core::NewAccount;

    #[test]
    fn test_session_from_account() {
        let account = Account::from_new(NewAccount {
            username: "root".to_string(),
            email: "root@example.com".to_string(),
            password_hash: "hash".to_string(),
            role: Role::Admin,
            is_active: true,
        });

        let session = SessionContext::new(&account, 42);

        assert_eq!(session.account_id(), account.id);
        assert_eq!(session.email(), "root@example.com");
        assert_eq!(session.role(), Role::Admin);
        assert!(session.is_admin());
        assert_eq!(session.token_expires_at(), 42);
        assert_eq!(session.into_account().username, "root");
    }
}
