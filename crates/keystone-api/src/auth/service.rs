//! Authentication service layer
//!
//! Provides business logic for signup, signin, password change, profile and
//! logout. Every mutation is a single repository write, so a failed call
//! leaves no partial state behind.
//!
//! Tokens are stateless: neither logout nor a password change invalidates a
//! token that was already issued. It stays valid until its own expiry.

use super::error::AuthError;
use super::jwt::{TokenClaims, TokenService};
use super::password::{needs_rehash, PasswordHasher};
use super::session::SessionContext;
use keystone_core::{
    normalize_email, normalize_username, Account, AccountPublic, AccountRepository, NewAccount,
    Role,
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use utoipa::ToSchema;
use uuid::Uuid;
use validator::{Validate, ValidationError};

/// Usernames must be 1 to 50 characters once surrounding whitespace is removed
pub(crate) fn validate_username(username: &str) -> Result<(), ValidationError> {
    let len = username.trim().chars().count();
    if len == 0 || len > 50 {
        return Err(ValidationError::new("username_length"));
    }
    Ok(())
}

/// Account signup request
#[derive(Debug, Clone, Deserialize, Validate, ToSchema)]
pub struct SignupRequest {
    #[validate(custom(
        function = "validate_username",
        message = "Username must be 1 to 50 characters"
    ))]
    pub username: String,
    #[validate(email(message = "Invalid email address"))]
    pub email: String,
    #[validate(length(min = 6, message = "Password must be at least 6 characters"))]
    pub password: String,
    /// Only `user` is accepted for public signup
    #[serde(default)]
    pub role: Option<Role>,
}

/// Signin request
#[derive(Debug, Clone, Deserialize, Validate, ToSchema)]
pub struct SigninRequest {
    #[validate(length(min = 1, message = "Email is required"))]
    pub email: String,
    #[validate(length(min = 1, message = "Password is required"))]
    pub password: String,
}

/// Password change request
#[derive(Debug, Clone, Deserialize, Validate, ToSchema)]
pub struct ChangePasswordRequest {
    #[validate(length(min = 1, message = "Current password is required"))]
    pub current_password: String,
    #[validate(length(min = 6, message = "Password must be at least 6 characters"))]
    pub new_password: String,
}

/// Plain acknowledgement body
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct MessageResponse {
    pub message: String,
}

impl MessageResponse {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }
}

/// Authentication response with token
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct AuthResponse {
    pub token: String,
    pub token_type: String,
    /// Token lifetime in seconds
    pub expires_in: u64,
    pub user: AccountPublic,
}

/// Authentication service
#[derive(Clone)]
pub struct AuthService {
    accounts: Arc<dyn AccountRepository>,
    hasher: Arc<PasswordHasher>,
    tokens: TokenService,
}

impl AuthService {
    pub fn new(
        accounts: Arc<dyn AccountRepository>,
        hasher: Arc<PasswordHasher>,
        tokens: TokenService,
    ) -> Self {
        Self {
            accounts,
            hasher,
            tokens,
        }
    }

    /// Register a new account and sign it in
    ///
    /// # Returns
    ///
    /// * `Ok(AuthResponse)` - Token and the created account
    /// * `Err(AuthError::DuplicateIdentity)` - Email (checked first) or username taken
    /// * `Err(AuthError::Forbidden)` - A role other than `user` was requested
    pub async fn signup(&self, request: SignupRequest) -> Result<AuthResponse, AuthError> {
        let role = request.role.unwrap_or_default();
        if role != Role::User {
            return Err(AuthError::Forbidden(
                "Signup cannot assign elevated roles".to_string(),
            ));
        }

        let username = normalize_username(&request.username);
        let email = normalize_email(&request.email);

        if let Some(existing) = self
            .accounts
            .find_by_email_or_username(&email, &username)
            .await?
        {
            let field = existing
                .collision_with(&email, &username)
                .unwrap_or(keystone_core::IdentityField::Email);
            return Err(AuthError::DuplicateIdentity(field));
        }

        let password_hash = hash_blocking(&self.hasher, request.password).await?;

        let account = self
            .accounts
            .create(NewAccount {
                username,
                email,
                password_hash,
                role,
                is_active: true,
            })
            .await?;

        tracing::info!(account_id = %account.id, "Account registered");

        self.respond_with_token(&account)
    }

    /// Verify credentials and issue a token
    ///
    /// An unknown email and a wrong password fail identically with
    /// `InvalidCredentials`, and both pay for one password verification. A
    /// deactivated account fails with
    /// `AccountDeactivated` so the user knows to contact support.
    pub async fn signin(&self, request: SigninRequest) -> Result<AuthResponse, AuthError> {
        let email = normalize_email(&request.email);

        let Some(account) = self.accounts.find_by_email(&email).await? else {
            let hasher = Arc::clone(&self.hasher);
            let password = request.password;
            tokio::task::spawn_blocking(move || hasher.verify_absent(&password))
                .await
                .map_err(|e| AuthError::Hashing(e.to_string()))?;
            return Err(AuthError::InvalidCredentials);
        };

        if !account.is_active {
            return Err(AuthError::AccountDeactivated);
        }

        let valid = verify_blocking(
            &self.hasher,
            request.password.clone(),
            account.password_hash.clone(),
        )
        .await?;

        if !valid {
            tracing::debug!(account_id = %account.id, "Signin rejected");
            return Err(AuthError::InvalidCredentials);
        }

        if needs_rehash(&account.password_hash) {
            self.upgrade_hash(account.id, request.password).await;
        }

        tracing::info!(account_id = %account.id, "Signin succeeded");

        self.respond_with_token(&account)
    }

    /// Rotate an account's password after checking the current one
    ///
    /// Outstanding tokens are not invalidated.
    pub async fn change_password(
        &self,
        account_id: Uuid,
        request: ChangePasswordRequest,
    ) -> Result<(), AuthError> {
        let account = self
            .accounts
            .find_by_id(account_id)
            .await?
            .ok_or(AuthError::NotFound)?;

        let valid = verify_blocking(
            &self.hasher,
            request.current_password,
            account.password_hash.clone(),
        )
        .await?;

        if !valid {
            return Err(AuthError::IncorrectCurrentPassword);
        }

        let new_hash = hash_blocking(&self.hasher, request.new_password).await?;
        self.accounts.update_password(account.id, &new_hash).await?;

        tracing::info!(account_id = %account.id, "Password changed");
        Ok(())
    }

    /// Current account for an authenticated session
    pub fn profile(&self, session: SessionContext) -> AccountPublic {
        session.into_account()
    }

    /// Acknowledge a logout. Tokens are stateless, so nothing is invalidated;
    /// the client discards its copy.
    pub fn logout(&self, session: &SessionContext) {
        tracing::debug!(account_id = %session.account_id(), "Logout acknowledged");
    }

    fn respond_with_token(&self, account: &Account) -> Result<AuthResponse, AuthError> {
        let token = self.tokens.issue(&TokenClaims {
            subject: account.id,
            email: account.email.clone(),
            role: account.role,
        })?;

        Ok(AuthResponse {
            token,
            token_type: "Bearer".to_string(),
            expires_in: self.tokens.ttl().as_secs(),
            user: account.to_public(),
        })
    }

    /// Replace a legacy digest with a fresh one. Failures are logged only.
    async fn upgrade_hash(&self, account_id: Uuid, password: String) {
        let result = match hash_blocking(&self.hasher, password).await {
            Ok(hash) => self
                .accounts
                .update_password(account_id, &hash)
                .await
                .map_err(AuthError::from),
            Err(e) => Err(e),
        };

        match result {
            Ok(()) => tracing::info!(%account_id, "Upgraded legacy password hash"),
            Err(e) => tracing::warn!(%account_id, error = %e, "Password hash upgrade failed"),
        }
    }
}

/// Hash on the blocking pool so request handling is not stalled
pub(crate) async fn hash_blocking(
    hasher: &Arc<PasswordHasher>,
    password: String,
) -> Result<String, AuthError> {
    let hasher = Arc::clone(hasher);
    tokio::task::spawn_blocking(move || hasher.hash(&password))
        .await
        .map_err(|e| AuthError::Hashing(e.to_string()))?
        .map_err(AuthError::from)
}

pub(crate) async fn verify_blocking(
    hasher: &Arc<PasswordHasher>,
    password: String,
    digest: String,
) -> Result<bool, AuthError> {
    let hasher = Arc::clone(hasher);
    tokio::task::spawn_blocking(move || hasher.verify(&password, &digest))
        .await
        .map_err(|e| AuthError::Hashing(e.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::auth::password::test_hasher;
    use crate::auth::repository::InMemoryAccountRepository;
    use async_trait::async_trait;
    use keystone_core::{AccountUpdate, AuthConfig, IdentityField, RepositoryError};
    use std::sync::atomic::{AtomicUsize, Ordering};

    /// Delegating repository that counts `create` calls
    #[derive(Default)]
    struct CountingRepository {
        inner: InMemoryAccountRepository,
        creates: AtomicUsize,
    }

    #[async_trait]
    impl AccountRepository for CountingRepository {
        async fn find_by_email_or_username(
            &self,
            email: &str,
            username: &str,
        ) -> Result<Option<Account>, RepositoryError> {
            self.inner.find_by_email_or_username(email, username).await
        }

        async fn find_by_email(&self, email: &str) -> Result<Option<Account>, RepositoryError> {
            self.inner.find_by_email(email).await
        }

        async fn find_by_id(&self, id: Uuid) -> Result<Option<Account>, RepositoryError> {
            self.inner.find_by_id(id).await
        }

        async fn create(&self, account: NewAccount) -> Result<Account, RepositoryError> {
            self.creates.fetch_add(1, Ordering::SeqCst);
            self.inner.create(account).await
        }

        async fn update_password(
            &self,
            id: Uuid,
            password_hash: &str,
        ) -> Result<(), RepositoryError> {
            self.inner.update_password(id, password_hash).await
        }

        async fn update_fields(
            &self,
            id: Uuid,
            update: AccountUpdate,
        ) -> Result<Option<Account>, RepositoryError> {
            self.inner.update_fields(id, update).await
        }

        async fn list(&self) -> Result<Vec<Account>, RepositoryError> {
            self.inner.list().await
        }

        async fn delete(&self, id: Uuid) -> Result<bool, RepositoryError> {
            self.inner.delete(id).await
        }

        async fn count_by_role(&self, role: Role) -> Result<u64, RepositoryError> {
            self.inner.count_by_role(role).await
        }
    }

    struct Fixture {
        service: AuthService,
        repo: Arc<CountingRepository>,
        hasher: Arc<PasswordHasher>,
        tokens: TokenService,
    }

    fn fixture() -> Fixture {
        let repo = Arc::new(CountingRepository::default());
        let hasher = Arc::new(test_hasher());
        let tokens = TokenService::new(&AuthConfig::default());
        let service = AuthService::new(repo.clone(), hasher.clone(), tokens.clone());
        Fixture {
            service,
            repo,
            hasher,
            tokens,
        }
    }

    fn signup(username: &str, email: &str, password: &str) -> SignupRequest {
        SignupRequest {
            username: username.to_string(),
            email: email.to_string(),
            password: password.to_string(),
            role: None,
        }
    }

    fn signin(email: &str, password: &str) -> SigninRequest {
        SigninRequest {
            email: email.to_string(),
            password: password.to_string(),
        }
    }

    #[test]
    fn test_request_validation() {
        assert!(signup("alice", "a@x.com", "Secret123!").validate().is_ok());
        assert!(signup("   ", "a@x.com", "Secret123!").validate().is_err());
        assert!(signup(&"x".repeat(51), "a@x.com", "Secret123!")
            .validate()
            .is_err());
        assert!(signup("alice", "not-an-email", "Secret123!")
            .validate()
            .is_err());
        assert!(signup("alice", "a@x.com", "12345").validate().is_err());

        let change = ChangePasswordRequest {
            current_password: "old".to_string(),
            new_password: "short".to_string(),
        };
        assert!(change.validate().is_err());
    }

    #[tokio::test]
    async fn test_signup_issues_token_for_new_account() {
        let fx = fixture();
        let response = fx
            .service
            .signup(signup("alice", "a@x.com", "Secret123!"))
            .await
            .unwrap();

        assert_eq!(response.user.username, "alice");
        assert_eq!(response.user.role, Role::User);
        assert!(response.user.is_active);
        assert_eq!(response.token_type, "Bearer");
        assert_eq!(response.expires_in, 604_800);

        let claims = fx.tokens.verify(&response.token).unwrap();
        assert_eq!(claims.subject(), Some(response.user.id));
        assert_eq!(claims.role, Role::User);
        assert_eq!(claims.email, "a@x.com");
    }

    #[tokio::test]
    async fn test_signup_stores_hash_not_plaintext() {
        let fx = fixture();
        let response = fx
            .service
            .signup(signup("alice", "a@x.com", "Secret123!"))
            .await
            .unwrap();

        let stored = fx.repo.find_by_id(response.user.id).await.unwrap().unwrap();
        assert_ne!(stored.password_hash, "Secret123!");
        assert!(stored.password_hash.starts_with("$argon2id$"));
    }

    #[tokio::test]
    async fn test_signup_duplicate_email_creates_nothing() {
        let fx = fixture();
        fx.service
            .signup(signup("alice", "a@x.com", "Secret123!"))
            .await
            .unwrap();
        assert_eq!(fx.repo.creates.load(Ordering::SeqCst), 1);

        let result = fx
            .service
            .signup(signup("bob", "a@x.com", "Other123!"))
            .await;

        match result {
            Err(e @ AuthError::DuplicateIdentity(IdentityField::Email)) => {
                assert_eq!(e.to_string(), "Email already registered");
            }
            other => panic!("expected duplicate email, got {other:?}"),
        }
        assert_eq!(fx.repo.creates.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_signup_duplicate_username() {
        let fx = fixture();
        fx.service
            .signup(signup("alice", "a@x.com", "Secret123!"))
            .await
            .unwrap();

        let result = fx
            .service
            .signup(signup("alice", "other@x.com", "Other123!"))
            .await;
        assert!(matches!(
            result,
            Err(AuthError::DuplicateIdentity(IdentityField::Username))
        ));
    }

    #[tokio::test]
    async fn test_signup_reports_email_before_username() {
        let fx = fixture();
        fx.service
            .signup(signup("alice", "a@x.com", "Secret123!"))
            .await
            .unwrap();

        let result = fx
            .service
            .signup(signup("alice", "a@x.com", "Secret123!"))
            .await;
        assert!(matches!(
            result,
            Err(AuthError::DuplicateIdentity(IdentityField::Email))
        ));
    }

    #[tokio::test]
    async fn test_signup_normalizes_email() {
        let fx = fixture();
        fx.service
            .signup(signup("alice", "  A@X.com ", "Secret123!"))
            .await
            .unwrap();

        let result = fx
            .service
            .signup(signup("bob", "a@x.com", "Other123!"))
            .await;
        assert!(matches!(
            result,
            Err(AuthError::DuplicateIdentity(IdentityField::Email))
        ));

        assert!(fx
            .service
            .signin(signin("A@x.COM", "Secret123!"))
            .await
            .is_ok());
    }

    #[tokio::test]
    async fn test_signup_rejects_admin_role() {
        let fx = fixture();
        let mut request = signup("mallory", "m@x.com", "Secret123!");
        request.role = Some(Role::Admin);

        let result = fx.service.signup(request).await;
        assert!(matches!(result, Err(AuthError::Forbidden(_))));
        assert_eq!(fx.repo.creates.load(Ordering::SeqCst), 0);

        let mut request = signup("mallory", "m@x.com", "Secret123!");
        request.role = Some(Role::User);
        assert!(fx.service.signup(request).await.is_ok());
    }

    #[tokio::test]
    async fn test_signin_failures_are_indistinguishable() {
        let fx = fixture();
        fx.service
            .signup(signup("alice", "a@x.com", "Secret123!"))
            .await
            .unwrap();

        let wrong_password = fx
            .service
            .signin(signin("a@x.com", "wrong"))
            .await
            .unwrap_err();
        let unknown_email = fx
            .service
            .signin(signin("nobody@x.com", "Secret123!"))
            .await
            .unwrap_err();

        assert!(matches!(wrong_password, AuthError::InvalidCredentials));
        assert!(matches!(unknown_email, AuthError::InvalidCredentials));
        assert_eq!(wrong_password.to_string(), unknown_email.to_string());
    }

    #[tokio::test]
    async fn test_signin_unknown_email_still_verifies() {
        let fx = fixture();
        assert!(!fx.hasher.has_absent_digest());

        let result = fx.service.signin(signin("nobody@x.com", "Secret123!")).await;

        assert!(matches!(result, Err(AuthError::InvalidCredentials)));
        assert!(fx.hasher.has_absent_digest());
    }

    #[tokio::test]
    async fn test_signin_deactivated_account() {
        let fx = fixture();
        let created = fx
            .service
            .signup(signup("alice", "a@x.com", "Secret123!"))
            .await
            .unwrap();
        fx.repo
            .update_fields(
                created.user.id,
                AccountUpdate {
                    is_active: Some(false),
                    ..Default::default()
                },
            )
            .await
            .unwrap();

        let result = fx.service.signin(signin("a@x.com", "Secret123!")).await;
        assert!(matches!(result, Err(AuthError::AccountDeactivated)));
    }

    #[tokio::test]
    async fn test_change_password_wrong_current_keeps_hash() {
        let fx = fixture();
        let created = fx
            .service
            .signup(signup("alice", "a@x.com", "Secret123!"))
            .await
            .unwrap();
        let before = fx
            .repo
            .find_by_id(created.user.id)
            .await
            .unwrap()
            .unwrap()
            .password_hash;

        let result = fx
            .service
            .change_password(
                created.user.id,
                ChangePasswordRequest {
                    current_password: "nope".to_string(),
                    new_password: "New123!".to_string(),
                },
            )
            .await;
        assert!(matches!(result, Err(AuthError::IncorrectCurrentPassword)));

        let after = fx
            .repo
            .find_by_id(created.user.id)
            .await
            .unwrap()
            .unwrap()
            .password_hash;
        assert_eq!(before, after);
        assert!(fx
            .service
            .signin(signin("a@x.com", "Secret123!"))
            .await
            .is_ok());
    }

    #[tokio::test]
    async fn test_change_password_unknown_account() {
        let fx = fixture();
        let result = fx
            .service
            .change_password(
                Uuid::new_v4(),
                ChangePasswordRequest {
                    current_password: "a".to_string(),
                    new_password: "b".to_string(),
                },
            )
            .await;
        assert!(matches!(result, Err(AuthError::NotFound)));
    }

    #[tokio::test]
    async fn test_change_password_keeps_outstanding_token_valid() {
        let fx = fixture();
        let created = fx
            .service
            .signup(signup("alice", "a@x.com", "Secret123!"))
            .await
            .unwrap();

        fx.service
            .change_password(
                created.user.id,
                ChangePasswordRequest {
                    current_password: "Secret123!".to_string(),
                    new_password: "New123!".to_string(),
                },
            )
            .await
            .unwrap();

        assert!(fx.tokens.verify(&created.token).is_ok());
    }

    #[tokio::test]
    async fn test_alice_and_bob_scenario() {
        let fx = fixture();

        let alice = fx
            .service
            .signup(signup("alice", "a@x.com", "Secret123!"))
            .await
            .unwrap();
        let claims = fx.tokens.verify(&alice.token).unwrap();
        assert_eq!(claims.subject(), Some(alice.user.id));
        assert_eq!(claims.role, Role::User);

        let bob = fx
            .service
            .signup(signup("bob", "a@x.com", "Other123!"))
            .await
            .unwrap_err();
        assert_eq!(bob.to_string(), "Email already registered");

        assert!(matches!(
            fx.service.signin(signin("a@x.com", "wrong")).await,
            Err(AuthError::InvalidCredentials)
        ));

        fx.service
            .change_password(
                alice.user.id,
                ChangePasswordRequest {
                    current_password: "Secret123!".to_string(),
                    new_password: "New123!".to_string(),
                },
            )
            .await
            .unwrap();

        assert!(matches!(
            fx.service.signin(signin("a@x.com", "Secret123!")).await,
            Err(AuthError::InvalidCredentials)
        ));
        let again = fx
            .service
            .signin(signin("a@x.com", "New123!"))
            .await
            .unwrap();
        assert_eq!(again.user.id, alice.user.id);
    }

    #[tokio::test]
    async fn test_signin_upgrades_legacy_bcrypt_hash() {
        let fx = fixture();
        let legacy = bcrypt::hash("Secret123!", 4).unwrap();
        let account = fx
            .repo
            .create(NewAccount {
                username: "legacy".to_string(),
                email: "legacy@x.com".to_string(),
                password_hash: legacy.clone(),
                role: Role::User,
                is_active: true,
            })
            .await
            .unwrap();

        fx.service
            .signin(signin("legacy@x.com", "Secret123!"))
            .await
            .unwrap();

        let stored = fx.repo.find_by_id(account.id).await.unwrap().unwrap();
        assert_ne!(stored.password_hash, legacy);
        assert!(stored.password_hash.starts_with("$argon2id$"));
        assert!(fx
            .service
            .signin(signin("legacy@x.com", "Secret123!"))
            .await
            .is_ok());
    }

    #[tokio::test]
    async fn test_profile_and_logout() {
        let fx = fixture();
        let created = fx
            .service
            .signup(signup("alice", "a@x.com", "Secret123!"))
            .await
            .unwrap();
        let account = fx.repo.find_by_id(created.user.id).await.unwrap().unwrap();
        let session = SessionContext::new(&account, 0);

        fx.service.logout(&session);
        let profile = fx.service.profile(session);
        assert_eq!(profile, created.user);
    }
}
