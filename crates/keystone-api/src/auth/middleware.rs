/// Axum adapters over [`Guard`](super::guard::Guard)
///
/// Both middlewares read the `Authorization` header, run the guard and, on
/// success, add the [`SessionContext`](super::session::SessionContext) to the
/// request extensions. Handlers extract it with `Extension<SessionContext>`.
///
/// # Usage
///
/// ```ignore
/// use axum::{middleware, routing::get, Router};
/// use keystone_api::auth::middleware::{require_auth, require_roles};
/// use keystone_core::Role;
///
/// let app = Router::new()
///     .route("/profile", get(profile_handler))
///     .route_layer(middleware::from_fn_with_state(state.clone(), require_auth));
///
/// let admin = Router::new()
///     .route("/users", get(list_users))
///     .route_layer(middleware::from_fn_with_state(
///         state.clone(),
///         require_roles(&[Role::Admin]),
///     ));
/// ```
use crate::error::AppError;
use crate::state::AppState;
use axum::{
    body::Body,
    extract::{Request, State},
    http::{header, HeaderMap},
    middleware::Next,
    response::Response,
};
use keystone_core::Role;
use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;

/// Type alias for role middleware future
type RoleMiddlewareFuture = Pin<Box<dyn Future<Output = Result<Response, AppError>> + Send>>;

fn authorization_header(headers: &HeaderMap) -> Option<String> {
    headers
        .get(header::AUTHORIZATION)
        .and_then(|value| value.to_str().ok())
        .map(str::to_owned)
}

async fn guarded(
    state: Arc<AppState>,
    mut request: Request<Body>,
    next: Next,
    required_roles: &[Role],
) -> Result<Response, AppError> {
    let header = authorization_header(request.headers());
    let session = state.guard.check(header.as_deref(), required_roles).await?;

    request.extensions_mut().insert(session);
    Ok(next.run(request).await)
}

/// Require any authenticated, active account
pub async fn require_auth(
    State(state): State<Arc<AppState>>,
    request: Request<Body>,
    next: Next,
) -> Result<Response, AppError> {
    guarded(state, request, next, &[]).await
}

/// Require an authenticated account holding one of `required_roles`
pub fn require_roles(
    required_roles: &'static [Role],
) -> impl Fn(State<Arc<AppState>>, Request<Body>, Next) -> RoleMiddlewareFuture + Clone {
    move |State(state): State<Arc<AppState>>,
          request: Request<Body>,
          next: Next|
          -> RoleMiddlewareFuture { Box::pin(guarded(state, request, next, required_roles)) }
}
