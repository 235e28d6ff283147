//! API route definitions

use crate::auth::middleware::{require_auth, require_roles};
use crate::handlers::{auth, users};
use crate::state::AppState;
use axum::{
    middleware,
    routing::{get, post, put},
    Router,
};
use keystone_core::Role;
use std::sync::Arc;

/// Create API v1 routes
pub fn api_routes(state: Arc<AppState>) -> Router<Arc<AppState>> {
    // Public routes (no authentication required)
    let public_routes = Router::new()
        .route("/auth/signup", post(auth::signup_handler))
        .route("/auth/signin", post(auth::signin_handler));

    // Protected routes (any active account)
    let protected_routes = Router::new()
        .route("/auth/profile", get(auth::profile_handler))
        .route("/auth/change-password", put(auth::change_password_handler))
        .route("/auth/logout", post(auth::logout_handler))
        .route_layer(middleware::from_fn_with_state(state.clone(), require_auth));

    // Admin routes
    let admin_routes = Router::new()
        .route(
            "/users",
            get(users::list_accounts).post(users::create_account),
        )
        .route(
            "/users/:id",
            get(users::get_account)
                .put(users::update_account)
                .delete(users::delete_account),
        )
        .route_layer(middleware::from_fn_with_state(
            state,
            require_roles(&[Role::Admin]),
        ));

    Router::new()
        .merge(public_routes)
        .merge(protected_routes)
        .merge(admin_routes)
}
