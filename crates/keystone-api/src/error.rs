//! API error handling

use crate::auth::AuthError;
use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

/// API error response
#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct ApiError {
    /// Error code
    pub code: String,
    /// Human-readable message
    pub message: String,
    /// Additional details
    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<String>,
}

impl ApiError {
    pub fn new(code: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            code: code.into(),
            message: message.into(),
            details: None,
        }
    }

    pub fn with_details(mut self, details: impl Into<String>) -> Self {
        self.details = Some(details.into());
        self
    }

    pub fn unauthorized() -> Self {
        Self::new("UNAUTHORIZED", "Authentication required")
    }

    pub fn internal_error() -> Self {
        Self::new("INTERNAL_ERROR", "Internal server error")
    }
}

/// Application error type
#[derive(Debug)]
pub enum AppError {
    NotFound(String),
    BadRequest(String),
    Validation(String),
    Unauthorized,
    /// Failed credential check; `status` is 401 on signin and 400 on a
    /// password change
    InvalidCredentials { status: StatusCode, message: String },
    Forbidden(String),
    AccountDeactivated(String),
    Conflict(String),
    Internal,
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, error) = match self {
            AppError::NotFound(msg) => (StatusCode::NOT_FOUND, ApiError::new("NOT_FOUND", msg)),
            AppError::BadRequest(msg) => {
                (StatusCode::BAD_REQUEST, ApiError::new("BAD_REQUEST", msg))
            }
            AppError::Validation(details) => (
                StatusCode::BAD_REQUEST,
                ApiError::new("VALIDATION_ERROR", "Invalid request").with_details(details),
            ),
            AppError::Unauthorized => (StatusCode::UNAUTHORIZED, ApiError::unauthorized()),
            AppError::InvalidCredentials { status, message } => {
                (status, ApiError::new("INVALID_CREDENTIALS", message))
            }
            AppError::Forbidden(msg) => (StatusCode::FORBIDDEN, ApiError::new("FORBIDDEN", msg)),
            AppError::AccountDeactivated(msg) => (
                StatusCode::FORBIDDEN,
                ApiError::new("ACCOUNT_DEACTIVATED", msg),
            ),
            AppError::Conflict(msg) => (StatusCode::CONFLICT, ApiError::new("CONFLICT", msg)),
            AppError::Internal => (
                StatusCode::INTERNAL_SERVER_ERROR,
                ApiError::internal_error(),
            ),
        };

        (status, Json(error)).into_response()
    }
}

impl From<AuthError> for AppError {
    fn from(err: AuthError) -> Self {
        if err.is_internal() {
            tracing::error!(error = %err, "Request failed");
            return AppError::Internal;
        }

        let message = err.to_string();
        match err {
            AuthError::DuplicateIdentity(_) => AppError::Conflict(message),
            AuthError::InvalidCredentials => AppError::InvalidCredentials {
                status: StatusCode::UNAUTHORIZED,
                message,
            },
            AuthError::IncorrectCurrentPassword => AppError::InvalidCredentials {
                status: StatusCode::BAD_REQUEST,
                message,
            },
            AuthError::AccountDeactivated => AppError::AccountDeactivated(message),
            AuthError::NotFound => AppError::NotFound(message),
            AuthError::Unauthenticated | AuthError::InvalidToken => AppError::Unauthorized,
            AuthError::Forbidden(msg) => AppError::Forbidden(msg),
            AuthError::Validation(msg) => AppError::Validation(msg),
            AuthError::Hashing(_) | AuthError::Repository(_) => AppError::Internal,
        }
    }
}

impl From<validator::ValidationErrors> for AppError {
    fn from(err: validator::ValidationErrors) -> Self {
        AppError::Validation(err.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use keystone_core::{IdentityField, RepositoryError};

    fn status_of(err: AuthError) -> StatusCode {
        AppError::from(err).into_response().status()
    }

    #[test]
    fn test_auth_error_status_mapping() {
        assert_eq!(
            status_of(AuthError::DuplicateIdentity(IdentityField::Email)),
            StatusCode::CONFLICT
        );
        assert_eq!(
            status_of(AuthError::InvalidCredentials),
            StatusCode::UNAUTHORIZED
        );
        assert_eq!(
            status_of(AuthError::IncorrectCurrentPassword),
            StatusCode::BAD_REQUEST
        );
        assert_eq!(
            status_of(AuthError::AccountDeactivated),
            StatusCode::FORBIDDEN
        );
        assert_eq!(status_of(AuthError::NotFound), StatusCode::NOT_FOUND);
        assert_eq!(
            status_of(AuthError::Unauthenticated),
            StatusCode::UNAUTHORIZED
        );
        assert_eq!(status_of(AuthError::InvalidToken), StatusCode::UNAUTHORIZED);
        assert_eq!(
            status_of(AuthError::insufficient_role()),
            StatusCode::FORBIDDEN
        );
        assert_eq!(
            status_of(AuthError::Validation("bad".to_string())),
            StatusCode::BAD_REQUEST
        );
    }

    #[test]
    fn test_internal_errors_are_generic() {
        for err in [
            AuthError::Hashing("argon2 exploded".to_string()),
            AuthError::Repository(RepositoryError::Database("connection refused".to_string())),
        ] {
            let app_err = AppError::from(err);
            assert!(matches!(app_err, AppError::Internal));
            assert_eq!(
                app_err.into_response().status(),
                StatusCode::INTERNAL_SERVER_ERROR
            );
        }
    }

    #[test]
    fn test_api_error_omits_empty_details() {
        let json = serde_json::to_value(ApiError::unauthorized()).unwrap();
        assert_eq!(json["code"], "UNAUTHORIZED");
        assert_eq!(json["message"], "Authentication required");
        assert!(json.get("details").is_none());
    }
}
