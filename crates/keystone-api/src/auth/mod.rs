//! Authentication and authorization module
//!
//! This module provides token-based authentication with the following components:
//! - Password hashing with Argon2 (legacy bcrypt digests are still verified)
//! - Signed, expiring bearer tokens
//! - Authentication service for signup, signin, password change and logout
//! - A guard that authenticates a request and checks its role
//! - Axum middleware adapters around the guard
//! - Account administration and administrator bootstrap
//! - Repository implementations for memory and PostgreSQL

pub mod admin;
pub mod bootstrap;
pub mod error;
pub mod guard;
pub mod jwt;
pub mod middleware;
pub mod password;
pub mod repository;
pub mod service;
pub mod session;

pub use admin::{AccountAdminService, CreateAccountRequest, UpdateAccountRequest};
pub use bootstrap::{ensure_admin, BootstrapOutcome};
pub use error::AuthError;
pub use guard::{bearer_token, Guard};
pub use jwt::{Claims, TokenClaims, TokenError, TokenService};
pub use middleware::{require_auth, require_roles};
pub use password::{PasswordError, PasswordHasher};
pub use repository::{InMemoryAccountRepository, PgAccountRepository};
pub use service::{
    AuthResponse, AuthService, ChangePasswordRequest, MessageResponse, SigninRequest,
    SignupRequest,
};
pub use session::SessionContext;
