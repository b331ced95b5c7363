//! Confirmation-code verification and password-reset endpoints.

use axum::{extract::Extension, http::StatusCode, response::IntoResponse, Json};
use serde::{Deserialize, Serialize};
use serde_json::json;
use sqlx::PgPool;
use std::sync::Arc;
use tracing::error;
use utoipa::ToSchema;

use crate::auth::{confirmation, password, session, AuthError, AuthState, CodePurpose};
use crate::users;

#[derive(ToSchema, Serialize, Deserialize, Debug)]
pub struct ConfirmRequest {
    pub email: String,
    pub purpose: String,
    pub code: String,
}

#[derive(ToSchema, Serialize, Deserialize, Debug)]
pub struct PasswordResetRequest {
    pub email: String,
}

#[derive(ToSchema, Serialize, Deserialize, Debug)]
pub struct PasswordResetConfirmRequest {
    pub email: String,
    pub code: String,
    pub new_password: String,
}

#[utoipa::path(
    post,
    path = "/auth/confirm",
    request_body = ConfirmRequest,
    responses(
        (status = 204, description = "Code consumed"),
        (status = 400, description = "Incorrect or expired code")
    ),
    tag = "auth"
)]
pub async fn confirm(
    pool: Extension<PgPool>,
    payload: Option<Json<ConfirmRequest>>,
) -> impl IntoResponse {
    let request: ConfirmRequest = match payload {
        Some(Json(payload)) => payload,
        None => return (StatusCode::BAD_REQUEST, "Missing payload".to_string()).into_response(),
    };

    let Ok(purpose) = request.purpose.parse::<CodePurpose>() else {
        return (StatusCode::BAD_REQUEST, "Unknown purpose".to_string()).into_response();
    };

    let email = users::normalize_email(&request.email);
    let identity = match users::find_by_email(&pool, &email).await {
        Ok(Some(identity)) => identity,
        // An unknown email reads the same as a wrong code; the endpoint never
        // reveals whether an outstanding code exists.
        Ok(None) => {
            let err = AuthError::IncorrectCode;
            return (err.status(), err.message().to_string()).into_response();
        }
        Err(err) => {
            error!("Failed to lookup user for confirmation: {err}");
            return StatusCode::INTERNAL_SERVER_ERROR.into_response();
        }
    };

    match confirmation::verify(&pool, identity.id, purpose, request.code.trim()).await {
        Ok(()) => {
            if purpose == CodePurpose::RegisterConfirm {
                if let Err(err) = users::mark_email_verified(&pool, identity.id).await {
                    error!("Failed to mark email verified: {err}");
                    return StatusCode::INTERNAL_SERVER_ERROR.into_response();
                }
            }
            StatusCode::NO_CONTENT.into_response()
        }
        Err(AuthError::Internal(err)) => {
            error!("Failed to verify confirmation code: {err}");
            StatusCode::INTERNAL_SERVER_ERROR.into_response()
        }
        Err(err) => (err.status(), err.message().to_string()).into_response(),
    }
}

#[utoipa::path(
    post,
    path = "/auth/password-reset",
    request_body = PasswordResetRequest,
    responses(
        (status = 204, description = "Reset accepted"),
        (status = 503, description = "Confirmation delivery unavailable")
    ),
    tag = "auth"
)]
pub async fn password_reset(
    pool: Extension<PgPool>,
    auth_state: Extension<Arc<AuthState>>,
    payload: Option<Json<PasswordResetRequest>>,
) -> impl IntoResponse {
    let request: PasswordResetRequest = match payload {
        Some(Json(payload)) => payload,
        None => return (StatusCode::BAD_REQUEST, "Missing payload".to_string()).into_response(),
    };

    let email = users::normalize_email(&request.email);
    if !users::valid_email(&email) {
        // Always accept; invalid and unknown emails look identical.
        return StatusCode::NO_CONTENT.into_response();
    }

    let identity = match users::find_by_email(&pool, &email).await {
        Ok(Some(identity)) => identity,
        Ok(None) => return StatusCode::NO_CONTENT.into_response(),
        Err(err) => {
            error!("Failed to lookup user for password reset: {err}");
            return StatusCode::INTERNAL_SERVER_ERROR.into_response();
        }
    };

    match confirmation::issue(&pool, &auth_state, identity.id, &email, CodePurpose::PasswordReset)
        .await
    {
        Ok(()) => StatusCode::NO_CONTENT.into_response(),
        Err(err @ AuthError::ServiceUnavailable) => {
            (err.status(), err.message().to_string()).into_response()
        }
        Err(err) => {
            error!("Failed to issue password reset code: {err}");
            StatusCode::INTERNAL_SERVER_ERROR.into_response()
        }
    }
}

#[utoipa::path(
    post,
    path = "/auth/password-reset/confirm",
    request_body = PasswordResetConfirmRequest,
    responses(
        (status = 200, description = "Password replaced, all sessions revoked"),
        (status = 400, description = "Incorrect or expired code")
    ),
    tag = "auth"
)]
pub async fn password_reset_confirm(
    pool: Extension<PgPool>,
    payload: Option<Json<PasswordResetConfirmRequest>>,
) -> impl IntoResponse {
    let request: PasswordResetConfirmRequest = match payload {
        Some(Json(payload)) => payload,
        None => return (StatusCode::BAD_REQUEST, "Missing payload".to_string()).into_response(),
    };

    // Same policy as registration; a reset code must not allow a weaker
    // password than signup does.
    if super::password_too_short(&request.new_password) {
        return (
            StatusCode::BAD_REQUEST,
            format!(
                "Password must be at least {} characters",
                super::MIN_PASSWORD_LENGTH
            ),
        )
            .into_response();
    }

    let email = users::normalize_email(&request.email);
    let identity = match users::find_by_email(&pool, &email).await {
        Ok(Some(identity)) => identity,
        Ok(None) => {
            let err = AuthError::IncorrectCode;
            return (err.status(), err.message().to_string()).into_response();
        }
        Err(err) => {
            error!("Failed to lookup user for password reset: {err}");
            return StatusCode::INTERNAL_SERVER_ERROR.into_response();
        }
    };

    if let Err(err) = confirmation::verify(
        &pool,
        identity.id,
        CodePurpose::PasswordReset,
        request.code.trim(),
    )
    .await
    {
        return match err {
            AuthError::Internal(err) => {
                error!("Failed to verify reset code: {err}");
                StatusCode::INTERNAL_SERVER_ERROR.into_response()
            }
            err => (err.status(), err.message().to_string()).into_response(),
        };
    }

    let password_hash = match password::hash_password(&request.new_password) {
        Ok(hash) => hash,
        Err(err) => {
            error!("Failed to hash password: {err}");
            return StatusCode::INTERNAL_SERVER_ERROR.into_response();
        }
    };

    if let Err(err) = users::update_password(&pool, identity.id, &password_hash).await {
        error!("Failed to update password: {err}");
        return StatusCode::INTERNAL_SERVER_ERROR.into_response();
    }

    // Sessions issued under the old password die with it.
    if let Err(err) = session::revoke_all_for_user(&pool, identity.id).await {
        error!("Failed to revoke sessions after reset: {err}");
        return StatusCode::INTERNAL_SERVER_ERROR.into_response();
    }

    (StatusCode::OK, Json(json!({ "message": "success" }))).into_response()
}

#[cfg(test)]
mod tests {
    use super::*;
    use anyhow::Result;
    use sqlx::postgres::PgPoolOptions;

    fn lazy_pool() -> Result<PgPool> {
        Ok(PgPoolOptions::new().connect_lazy("postgres://postgres@localhost/postgres")?)
    }

    #[tokio::test]
    async fn confirm_missing_payload() -> Result<()> {
        let response = confirm(Extension(lazy_pool()?), None).await.into_response();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        Ok(())
    }

    #[tokio::test]
    async fn confirm_rejects_unknown_purpose_before_store_access() -> Result<()> {
        let response = confirm(
            Extension(lazy_pool()?),
            Some(Json(ConfirmRequest {
                email: "alice@example.com".to_string(),
                purpose: "magic-link".to_string(),
                code: "abc".to_string(),
            })),
        )
        .await
        .into_response();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        Ok(())
    }

    #[tokio::test]
    async fn reset_confirm_rejects_short_password_before_store_access() -> Result<()> {
        let response = password_reset_confirm(
            Extension(lazy_pool()?),
            Some(Json(PasswordResetConfirmRequest {
                email: "alice@example.com".to_string(),
                code: "abc123".to_string(),
                new_password: "x".to_string(),
            })),
        )
        .await
        .into_response();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        Ok(())
    }

    #[tokio::test]
    async fn password_reset_accepts_invalid_email_opaquely() -> Result<()> {
        let state = Arc::new(crate::auth::AuthState::new(
            crate::auth::AuthConfig::new(),
            &secrecy::SecretString::from("confirm-test-secret".to_string()),
            Arc::new(crate::auth::LogConfirmationSender),
        ));
        let response = password_reset(
            Extension(lazy_pool()?),
            Extension(state),
            Some(Json(PasswordResetRequest {
                email: "not-an-email".to_string(),
            })),
        )
        .await
        .into_response();
        assert_eq!(response.status(), StatusCode::NO_CONTENT);
        Ok(())
    }
}
