//! Authentication API handlers
//!
//! Provides HTTP endpoints for signup, signin, profile, password change and
//! logout.

use crate::auth::{
    ChangePasswordRequest, MessageResponse, SessionContext, SigninRequest, SignupRequest,
};
use crate::error::AppError;
use crate::state::AppState;
use axum::{extract::State, http::StatusCode, response::IntoResponse, Extension, Json};
use std::sync::Arc;
use validator::Validate;

/// Register a new account
///
/// Creates an account with the `user` role and returns a token for it.
///
/// # Request Body
///
/// * `username` - 1 to 50 characters, unique
/// * `email` - Valid email address, unique (case-insensitive)
/// * `password` - At least 6 characters
/// * `role` - Optional; only `user` is accepted
///
/// # Responses
///
/// * `201 Created` - Account created, returns token
/// * `400 Bad Request` - Invalid input
/// * `403 Forbidden` - Elevated role requested
/// * `409 Conflict` - Email or username already in use
#[utoipa::path(
    post,
    path = "/api/v1/auth/signup",
    tag = "auth",
    request_body = SignupRequest,
    responses(
        (status = 201, description = "Account created", body = crate::auth::AuthResponse),
        (status = 400, description = "Invalid input", body = crate::error::ApiError),
        (status = 403, description = "Role not allowed", body = crate::error::ApiError),
        (status = 409, description = "Email or username already in use", body = crate::error::ApiError),
        (status = 500, description = "Internal server error", body = crate::error::ApiError),
    )
)]
pub async fn signup_handler(
    State(state): State<Arc<AppState>>,
    Json(request): Json<SignupRequest>,
) -> Result<impl IntoResponse, AppError> {
    request.validate()?;
    let response = state.auth_service().signup(request).await?;

    Ok((StatusCode::CREATED, Json(response)))
}

/// Sign in with email and password
///
/// # Responses
///
/// * `200 OK` - Authentication successful, returns token
/// * `401 Unauthorized` - Invalid credentials
/// * `403 Forbidden` - Account deactivated
#[utoipa::path(
    post,
    path = "/api/v1/auth/signin",
    tag = "auth",
    request_body = SigninRequest,
    responses(
        (status = 200, description = "Signin successful", body = crate::auth::AuthResponse),
        (status = 400, description = "Invalid input", body = crate::error::ApiError),
        (status = 401, description = "Invalid credentials", body = crate::error::ApiError),
        (status = 403, description = "Account deactivated", body = crate::error::ApiError),
        (status = 500, description = "Internal server error", body = crate::error::ApiError),
    )
)]
pub async fn signin_handler(
    State(state): State<Arc<AppState>>,
    Json(request): Json<SigninRequest>,
) -> Result<impl IntoResponse, AppError> {
    request.validate()?;
    let response = state.auth_service().signin(request).await?;

    Ok(Json(response))
}

/// Get the authenticated account
#[utoipa::path(
    get,
    path = "/api/v1/auth/profile",
    tag = "auth",
    responses(
        (status = 200, description = "Current account", body = keystone_core::AccountPublic),
        (status = 401, description = "Unauthorized", body = crate::error::ApiError),
    ),
    security(
        ("bearer_auth" = [])
    )
)]
pub async fn profile_handler(
    State(state): State<Arc<AppState>>,
    Extension(session): Extension<SessionContext>,
) -> Result<impl IntoResponse, AppError> {
    Ok(Json(state.auth_service().profile(session)))
}

/// Change the authenticated account's password
///
/// Tokens issued before the change remain valid until they expire.
///
/// # Responses
///
/// * `200 OK` - Password changed
/// * `400 Bad Request` - Current password incorrect or new password invalid
/// * `401 Unauthorized` - Invalid or missing authentication
/// * `404 Not Found` - Account no longer exists
#[utoipa::path(
    put,
    path = "/api/v1/auth/change-password",
    tag = "auth",
    request_body = ChangePasswordRequest,
    responses(
        (status = 200, description = "Password changed", body = MessageResponse),
        (status = 400, description = "Current password incorrect or invalid input", body = crate::error::ApiError),
        (status = 401, description = "Unauthorized", body = crate::error::ApiError),
        (status = 404, description = "Account not found", body = crate::error::ApiError),
        (status = 500, description = "Internal server error", body = crate::error::ApiError),
    ),
    security(
        ("bearer_auth" = [])
    )
)]
pub async fn change_password_handler(
    State(state): State<Arc<AppState>>,
    Extension(session): Extension<SessionContext>,
    Json(request): Json<ChangePasswordRequest>,
) -> Result<impl IntoResponse, AppError> {
    request.validate()?;
    state
        .auth_service()
        .change_password(session.account_id(), request)
        .await?;

    Ok(Json(MessageResponse::new("Password changed successfully")))
}

/// Log out
///
/// Tokens are stateless and are not revoked; the client should discard its
/// copy.
#[utoipa::path(
    post,
    path = "/api/v1/auth/logout",
    tag = "auth",
    responses(
        (status = 200, description = "Logout acknowledged", body = MessageResponse),
        (status = 401, description = "Unauthorized", body = crate::error::ApiError),
    ),
    security(
        ("bearer_auth" = [])
    )
)]
pub async fn logout_handler(
    State(state): State<Arc<AppState>>,
    Extension(session): Extension<SessionContext>,
) -> Result<impl IntoResponse, AppError> {
    state.auth_service().logout(&session);

    Ok(Json(MessageResponse::new("Logged out successfully")))
}
