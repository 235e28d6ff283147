//! OpenAPI document and Swagger UI

use crate::auth::{
    AuthResponse, ChangePasswordRequest, CreateAccountRequest, MessageResponse, SigninRequest,
    SignupRequest, UpdateAccountRequest,
};
use crate::error::ApiError;
use crate::handlers::health::HealthResponse;
use axum::Router;
use keystone_core::{AccountPublic, Role};
use utoipa::openapi::security::{HttpAuthScheme, HttpBuilder, SecurityScheme};
use utoipa::{Modify, OpenApi};
use utoipa_swagger_ui::SwaggerUi;

#[derive(OpenApi)]
#[openapi(
    info(
        title = "Keystone API",
        description = "Account signup, signin and role-based access control.\n\n\
                       Protected endpoints expect an `Authorization: Bearer <token>` header."
    ),
    tags(
        (name = "health", description = "Service health"),
        (name = "auth", description = "Signup, signin and session operations"),
        (name = "users", description = "Account administration (admin role)")
    ),
    components(
        schemas(
            HealthResponse,
            ApiError,
            Role,
            AccountPublic,
            AuthResponse,
            SignupRequest,
            SigninRequest,
            ChangePasswordRequest,
            MessageResponse,
            CreateAccountRequest,
            UpdateAccountRequest,
        )
    ),
    paths(
        crate::handlers::health::health_check,
        crate::handlers::auth::signup_handler,
        crate::handlers::auth::signin_handler,
        crate::handlers::auth::profile_handler,
        crate::handlers::auth::change_password_handler,
        crate::handlers::auth::logout_handler,
        crate::handlers::users::list_accounts,
        crate::handlers::users::get_account,
        crate::handlers::users::create_account,
        crate::handlers::users::update_account,
        crate::handlers::users::delete_account,
    ),
    modifiers(&SecurityAddon)
)]
pub struct ApiDoc;

struct SecurityAddon;

impl Modify for SecurityAddon {
    fn modify(&self, openapi: &mut utoipa::openapi::OpenApi) {
        if let Some(components) = openapi.components.as_mut() {
            components.add_security_scheme(
                "bearer_auth",
                SecurityScheme::Http(
                    HttpBuilder::new()
                        .scheme(HttpAuthScheme::Bearer)
                        .bearer_format("JWT")
                        .build(),
                ),
            );
        }
    }
}

pub fn swagger_ui_router<S>() -> Router<S>
where
    S: Clone + Send + Sync + 'static,
{
    SwaggerUi::new("/swagger-ui")
        .url("/api-docs/openapi.json", ApiDoc::openapi())
        .into()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_openapi_spec_lists_routes() {
        let spec = ApiDoc::openapi();
        let json = serde_json::to_string_pretty(&spec).unwrap();

        assert!(json.contains("Keystone API"));
        assert!(json.contains("/api/v1/auth/signup"));
        assert!(json.contains("/api/v1/auth/change-password"));
        assert!(json.contains("/api/v1/users/{id}"));
        assert!(json.contains("bearer_auth"));
    }
}
