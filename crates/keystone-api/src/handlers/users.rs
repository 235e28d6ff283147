//! Account administration handlers
//!
//! Every route here is mounted behind the `admin` role.

use crate::auth::{CreateAccountRequest, MessageResponse, SessionContext, UpdateAccountRequest};
use crate::error::AppError;
use crate::state::AppState;
use axum::{
    extract::{Path, State},
    http::StatusCode,
    response::IntoResponse,
    Extension, Json,
};
use keystone_core::AccountUpdate;
use std::sync::Arc;
use uuid::Uuid;
use validator::Validate;

/// List all accounts
#[utoipa::path(
    get,
    path = "/api/v1/users",
    tag = "users",
    responses(
        (status = 200, description = "All accounts", body = Vec<keystone_core::AccountPublic>),
        (status = 401, description = "Unauthorized", body = crate::error::ApiError),
        (status = 403, description = "Admin role required", body = crate::error::ApiError),
    ),
    security(
        ("bearer_auth" = [])
    )
)]
pub async fn list_accounts(
    State(state): State<Arc<AppState>>,
) -> Result<impl IntoResponse, AppError> {
    let accounts = state.admin_service().list().await?;
    Ok(Json(accounts))
}

/// Get an account by ID
#[utoipa::path(
    get,
    path = "/api/v1/users/{id}",
    tag = "users",
    params(
        ("id" = Uuid, Path, description = "Account ID")
    ),
    responses(
        (status = 200, description = "Account", body = keystone_core::AccountPublic),
        (status = 401, description = "Unauthorized", body = crate::error::ApiError),
        (status = 403, description = "Admin role required", body = crate::error::ApiError),
        (status = 404, description = "Account not found", body = crate::error::ApiError),
    ),
    security(
        ("bearer_auth" = [])
    )
)]
pub async fn get_account(
    State(state): State<Arc<AppState>>,
    Path(id): Path<Uuid>,
) -> Result<impl IntoResponse, AppError> {
    let account = state.admin_service().get(id).await?;
    Ok(Json(account))
}

/// Create an account with any role
#[utoipa::path(
    post,
    path = "/api/v1/users",
    tag = "users",
    request_body = CreateAccountRequest,
    responses(
        (status = 201, description = "Account created", body = keystone_core::AccountPublic),
        (status = 400, description = "Invalid input", body = crate::error::ApiError),
        (status = 401, description = "Unauthorized", body = crate::error::ApiError),
        (status = 403, description = "Admin role required", body = crate::error::ApiError),
        (status = 409, description = "Email or username already in use", body = crate::error::ApiError),
    ),
    security(
        ("bearer_auth" = [])
    )
)]
pub async fn create_account(
    State(state): State<Arc<AppState>>,
    Json(request): Json<CreateAccountRequest>,
) -> Result<impl IntoResponse, AppError> {
    request.validate()?;
    let account = state.admin_service().create(request).await?;

    Ok((StatusCode::CREATED, Json(account)))
}

/// Update an account's username, email, role or active flag
///
/// Administrators cannot demote or deactivate their own account.
#[utoipa::path(
    put,
    path = "/api/v1/users/{id}",
    tag = "users",
    params(
        ("id" = Uuid, Path, description = "Account ID")
    ),
    request_body = UpdateAccountRequest,
    responses(
        (status = 200, description = "Account updated", body = keystone_core::AccountPublic),
        (status = 400, description = "Invalid input", body = crate::error::ApiError),
        (status = 401, description = "Unauthorized", body = crate::error::ApiError),
        (status = 403, description = "Admin role required or self-demotion", body = crate::error::ApiError),
        (status = 404, description = "Account not found", body = crate::error::ApiError),
        (status = 409, description = "Email or username already in use", body = crate::error::ApiError),
    ),
    security(
        ("bearer_auth" = [])
    )
)]
pub async fn update_account(
    State(state): State<Arc<AppState>>,
    Extension(session): Extension<SessionContext>,
    Path(id): Path<Uuid>,
    Json(request): Json<UpdateAccountRequest>,
) -> Result<impl IntoResponse, AppError> {
    request.validate()?;

    let update = AccountUpdate::from(request);
    if update.is_empty() {
        return Err(AppError::BadRequest("No fields to update".to_string()));
    }

    let account = state
        .admin_service()
        .update(session.account_id(), id, update)
        .await?;
    Ok(Json(account))
}

/// Delete an account
///
/// Administrators cannot delete their own account.
#[utoipa::path(
    delete,
    path = "/api/v1/users/{id}",
    tag = "users",
    params(
        ("id" = Uuid, Path, description = "Account ID")
    ),
    responses(
        (status = 200, description = "Account deleted", body = MessageResponse),
        (status = 401, description = "Unauthorized", body = crate::error::ApiError),
        (status = 403, description = "Admin role required or self-delete", body = crate::error::ApiError),
        (status = 404, description = "Account not found", body = crate::error::ApiError),
    ),
    security(
        ("bearer_auth" = [])
    )
)]
pub async fn delete_account(
    State(state): State<Arc<AppState>>,
    Extension(session): Extension<SessionContext>,
    Path(id): Path<Uuid>,
) -> Result<impl IntoResponse, AppError> {
    state
        .admin_service()
        .delete(session.account_id(), id)
        .await?;

    Ok(Json(MessageResponse::new("Account deleted successfully")))
}
