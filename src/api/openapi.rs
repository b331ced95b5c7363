//! OpenAPI document assembled from the `#[utoipa::path]` annotations.

use utoipa::OpenApi;

use super::handlers;

#[derive(OpenApi)]
#[openapi(
    paths(
        handlers::health::health,
        handlers::auth::register,
        handlers::auth::login,
        handlers::auth::refresh,
        handlers::auth::logout,
        handlers::confirm::confirm,
        handlers::confirm::password_reset,
        handlers::confirm::password_reset_confirm,
        handlers::personal::get_data,
        handlers::personal::update_data,
        handlers::personal::update_password,
        handlers::users::list,
    ),
    components(schemas(
        handlers::auth::RegisterRequest,
        handlers::auth::LoginRequest,
        handlers::auth::RefreshRequest,
        handlers::confirm::ConfirmRequest,
        handlers::confirm::PasswordResetRequest,
        handlers::confirm::PasswordResetConfirmRequest,
        handlers::personal::UserResponse,
        handlers::personal::UpdateProfileRequest,
        handlers::personal::UpdatePasswordRequest,
        crate::auth::session::TokenPair,
        crate::auth::Role,
    )),
    tags(
        (name = "auth", description = "Registration, login, and session lifecycle"),
        (name = "personal", description = "Authenticated self-service"),
        (name = "users", description = "Admin account management"),
        (name = "health", description = "Service health")
    )
)]
pub struct ApiDoc;
