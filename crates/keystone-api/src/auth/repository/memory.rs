use async_trait::async_trait;
use keystone_core::{
    Account, AccountRepository, AccountUpdate, IdentityField, NewAccount, RepositoryError, Role,
};
use tokio::sync::RwLock;
use uuid::Uuid;

/// In-memory account store.
///
/// All writes go through one lock, which is what makes the uniqueness checks
/// on create and update atomic. Accounts are kept in insertion order.
#[derive(Debug, Default)]
pub struct InMemoryAccountRepository {
    accounts: RwLock<Vec<Account>>,
}

impl InMemoryAccountRepository {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of stored accounts
    pub async fn len(&self) -> usize {
        self.accounts.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.accounts.read().await.is_empty()
    }
}

fn conflict_in(
    accounts: &[Account],
    skip: Option<Uuid>,
    email: Option<&str>,
    username: Option<&str>,
) -> Option<IdentityField> {
    let mut username_taken = false;

    for account in accounts.iter().filter(|a| Some(a.id) != skip) {
        if email == Some(account.email.as_str()) {
            return Some(IdentityField::Email);
        }
        if username == Some(account.username.as_str()) {
            username_taken = true;
        }
    }

    username_taken.then_some(IdentityField::Username)
}

#[async_trait]
impl AccountRepository for InMemoryAccountRepository {
    async fn find_by_email_or_username(
        &self,
        email: &str,
        username: &str,
    ) -> Result<Option<Account>, RepositoryError> {
        let accounts = self.accounts.read().await;
        let by_email = accounts.iter().find(|a| a.email == email);
        let found = by_email.or_else(|| accounts.iter().find(|a| a.username == username));
        Ok(found.cloned())
    }

    async fn find_by_email(&self, email: &str) -> Result<Option<Account>, RepositoryError> {
        let accounts = self.accounts.read().await;
        Ok(accounts.iter().find(|a| a.email == email).cloned())
    }

    async fn find_by_id(&self, id: Uuid) -> Result<Option<Account>, RepositoryError> {
        let accounts = self.accounts.read().await;
        Ok(accounts.iter().find(|a| a.id == id).cloned())
    }

    async fn create(&self, account: NewAccount) -> Result<Account, RepositoryError> {
        let mut accounts = self.accounts.write().await;

        if let Some(field) = conflict_in(
            &accounts,
            None,
            Some(&account.email),
            Some(&account.username),
        ) {
            return Err(RepositoryError::Conflict(field));
        }

        let account = Account::from_new(account);
        accounts.push(account.clone());
        Ok(account)
    }

    async fn update_password(
        &self,
        id: Uuid,
        password_hash: &str,
    ) -> Result<(), RepositoryError> {
        let mut accounts = self.accounts.write().await;
        let account = accounts
            .iter_mut()
            .find(|a| a.id == id)
            .ok_or(RepositoryError::NotFound)?;

        account.password_hash = password_hash.to_string();
        account.updated_at = chrono::Utc::now();
        Ok(())
    }

    async fn update_fields(
        &self,
        id: Uuid,
        update: AccountUpdate,
    ) -> Result<Option<Account>, RepositoryError> {
        let mut accounts = self.accounts.write().await;

        if !accounts.iter().any(|a| a.id == id) {
            return Ok(None);
        }

        if let Some(field) = conflict_in(
            &accounts,
            Some(id),
            update.email.as_deref(),
            update.username.as_deref(),
        ) {
            return Err(RepositoryError::Conflict(field));
        }

        let account = accounts
            .iter_mut()
            .find(|a| a.id == id)
            .ok_or(RepositoryError::NotFound)?;
        update.apply_to(account);
        Ok(Some(account.clone()))
    }

    async fn list(&self) -> Result<Vec<Account>, RepositoryError> {
        Ok(self.accounts.read().await.clone())
    }

    async fn delete(&self, id: Uuid) -> Result<bool, RepositoryError> {
        let mut accounts = self.accounts.write().await;
        let before = accounts.len();
        accounts.retain(|a| a.id != id);
        Ok(accounts.len() != before)
    }

    async fn count_by_role(&self, role: Role) -> Result<u64, RepositoryError> {
        let accounts = self.accounts.read().await;
        Ok(accounts.iter().filter(|a| a.role == role).count() as u64)
    }
}
