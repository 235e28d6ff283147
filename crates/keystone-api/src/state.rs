//! Application state management

use crate::auth::{AccountAdminService, AuthService, Guard, PasswordHasher, TokenService};
use keystone_core::{AccountRepository, AppConfig};
use std::sync::Arc;
use std::time::Instant;

/// Application state shared across handlers
pub struct AppState {
    /// Application configuration
    pub config: AppConfig,
    /// Server start time
    pub start_time: Instant,
    /// Account storage
    pub accounts: Arc<dyn AccountRepository>,
    pub hasher: Arc<PasswordHasher>,
    pub tokens: TokenService,
    /// Authentication and role check for protected routes
    pub guard: Guard,
}

impl AppState {
    /// Create new application state with config and an account store
    pub fn new(config: AppConfig, accounts: Arc<dyn AccountRepository>) -> Self {
        let hasher = Arc::new(PasswordHasher::new(config.auth.password.clone()));
        let tokens = TokenService::new(&config.auth);
        let guard = Guard::new(tokens.clone(), Arc::clone(&accounts));

        Self {
            config,
            start_time: Instant::now(),
            accounts,
            hasher,
            tokens,
            guard,
        }
    }

    pub fn auth_service(&self) -> AuthService {
        AuthService::new(
            Arc::clone(&self.accounts),
            Arc::clone(&self.hasher),
            self.tokens.clone(),
        )
    }

    pub fn admin_service(&self) -> AccountAdminService {
        AccountAdminService::new(Arc::clone(&self.accounts), Arc::clone(&self.hasher))
    }

    /// Get uptime in seconds
    pub fn uptime_secs(&self) -> u64 {
        self.start_time.elapsed().as_secs()
    }
}
