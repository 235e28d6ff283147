//! Keystone Core - Account model, repository contract and configuration
//!
//! This crate defines the abstractions shared by the Keystone services:
//! - Account identity records and their public projection
//! - The closed role set used for authorization decisions
//! - The `AccountRepository` storage contract and its error type
//! - Configuration management

pub mod config;
pub mod repository;

pub use config::{
    AppConfig, AuthConfig, BootstrapConfig, ConfigError, DatabaseConfig, LoggingConfig,
    PasswordConfig, ServerConfig, StorageBackend,
};
pub use repository::{AccountRepository, RepositoryError};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;
use uuid::Uuid;

// ============================================================================
// Roles
// ============================================================================

/// Coarse-grained permission class attached to every account.
///
/// The set is closed: anything other than `user` or `admin` is rejected when
/// parsed or deserialized.
#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize, ToSchema,
)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    #[default]
    User,
    Admin,
}

impl Role {
    pub fn as_str(&self) -> &'static str {
        match self {
            Role::User => "user",
            Role::Admin => "admin",
        }
    }
}

impl std::fmt::Display for Role {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Error returned when a role string is outside the closed set
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("Unknown role: {0}")]
pub struct UnknownRole(pub String);

impl std::str::FromStr for Role {
    type Err = UnknownRole;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "user" => Ok(Role::User),
            "admin" => Ok(Role::Admin),
            other => Err(UnknownRole(other.to_string())),
        }
    }
}

// ============================================================================
// Accounts
// ============================================================================

/// Identity field that must be unique across all accounts
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum IdentityField {
    Email,
    Username,
}

impl IdentityField {
    /// Human-readable collision message for this field
    pub fn collision_message(&self) -> &'static str {
        match self {
            IdentityField::Email => "Email already registered",
            IdentityField::Username => "Username already taken",
        }
    }
}

impl std::fmt::Display for IdentityField {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            IdentityField::Email => f.write_str("email"),
            IdentityField::Username => f.write_str("username"),
        }
    }
}

/// Stored account record.
///
/// `password_hash` is only ever read by the password hasher and the
/// repository. It is skipped on serialization and redacted from `Debug`.
#[derive(Clone, Serialize, Deserialize)]
pub struct Account {
    pub id: Uuid,
    pub username: String,
    pub email: String,
    #[serde(skip_serializing, default)]
    pub password_hash: String,
    pub role: Role,
    pub is_active: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl std::fmt::Debug for Account {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Account")
            .field("id", &self.id)
            .field("username", &self.username)
            .field("email", &self.email)
            .field("password_hash", &"<redacted>")
            .field("role", &self.role)
            .field("is_active", &self.is_active)
            .field("created_at", &self.created_at)
            .field("updated_at", &self.updated_at)
            .finish()
    }
}

impl Account {
    /// Build a fresh account from creation fields, assigning id and timestamps
    pub fn from_new(new: NewAccount) -> Self {
        let now = Utc::now();
        Self {
            id: Uuid::new_v4(),
            username: new.username,
            email: new.email,
            password_hash: new.password_hash,
            role: new.role,
            is_active: new.is_active,
            created_at: now,
            updated_at: now,
        }
    }

    /// Public projection without the password hash
    pub fn to_public(&self) -> AccountPublic {
        AccountPublic {
            id: self.id,
            username: self.username.clone(),
            email: self.email.clone(),
            role: self.role,
            is_active: self.is_active,
            created_at: self.created_at,
            updated_at: self.updated_at,
        }
    }

    /// Which identity field of this account collides with the given pair.
    ///
    /// Email is checked first.
    pub fn collision_with(&self, email: &str, username: &str) -> Option<IdentityField> {
        if self.email == email {
            Some(IdentityField::Email)
        } else if self.username == username {
            Some(IdentityField::Username)
        } else {
            None
        }
    }
}

/// Account representation safe for responses
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
pub struct AccountPublic {
    pub id: Uuid,
    pub username: String,
    pub email: String,
    pub role: Role,
    pub is_active: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Fields required to create an account. The password is already hashed.
#[derive(Clone)]
pub struct NewAccount {
    pub username: String,
    pub email: String,
    pub password_hash: String,
    pub role: Role,
    pub is_active: bool,
}

impl std::fmt::Debug for NewAccount {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("NewAccount")
            .field("username", &self.username)
            .field("email", &self.email)
            .field("role", &self.role)
            .field("is_active", &self.is_active)
            .finish_non_exhaustive()
    }
}

/// Administrative partial update. Password changes go through
/// `AccountRepository::update_password` instead.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
pub struct AccountUpdate {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub username: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub email: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub role: Option<Role>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub is_active: Option<bool>,
}

impl AccountUpdate {
    pub fn is_empty(&self) -> bool {
        self.username.is_none()
            && self.email.is_none()
            && self.role.is_none()
            && self.is_active.is_none()
    }

    /// Apply the present fields to an account and bump `updated_at`
    pub fn apply_to(&self, account: &mut Account) {
        if let Some(username) = &self.username {
            account.username = username.clone();
        }
        if let Some(email) = &self.email {
            account.email = email.clone();
        }
        if let Some(role) = self.role {
            account.role = role;
        }
        if let Some(is_active) = self.is_active {
            account.is_active = is_active;
        }
        account.updated_at = Utc::now();
    }
}

/// Canonical form of an email address used for storage and lookup
pub fn normalize_email(email: &str) -> String {
    email.trim().to_lowercase()
}

/// Canonical form of a username (surrounding whitespace dropped, case kept)
pub fn normalize_username(username: &str) -> String {
    username.trim().to_string()
}

// ============================================================================
// Tests
// ============================================================================
