//! Authenticated self-service endpoints.
//!
//! Flow Overview:
//! 1) Authenticate via the bearer access token and the session store.
//! 2) Enforce the route's declared role set (none for personal routes).
//! 3) Apply allow-listed updates against the account store.

use axum::{
    extract::Extension,
    http::{HeaderMap, StatusCode},
    response::IntoResponse,
    Json,
};
use serde::{Deserialize, Serialize};
use serde_json::json;
use sqlx::PgPool;
use std::sync::Arc;
use tracing::error;
use utoipa::ToSchema;

use crate::auth::{guard, password, session, AuthError, AuthState, Operation, Role};
use crate::users::{self, Identity, UpdateOutcome};

#[derive(Debug, Serialize, ToSchema)]
pub struct UserResponse {
    pub id: String,
    pub email: String,
    pub username: String,
    pub roles: Vec<Role>,
    pub email_verified: bool,
    pub created_at: String,
    pub updated_at: String,
}

impl From<Identity> for UserResponse {
    fn from(identity: Identity) -> Self {
        Self {
            id: identity.id.to_string(),
            email: identity.email,
            username: identity.username,
            roles: identity.roles,
            email_verified: identity.email_verified,
            created_at: identity.created_at,
            updated_at: identity.updated_at,
        }
    }
}

#[derive(Debug, Deserialize, ToSchema)]
#[serde(deny_unknown_fields)]
pub struct UpdateProfileRequest {
    pub username: Option<String>,
}

#[derive(Debug, Deserialize, ToSchema)]
pub struct UpdatePasswordRequest {
    pub password: String,
    pub new_password: String,
}

#[utoipa::path(
    get,
    path = "/personal/data",
    responses(
        (status = 200, description = "Authenticated identity profile", body = UserResponse),
        (status = 401, description = "Missing or invalid bearer token")
    ),
    tag = "personal"
)]
pub async fn get_data(
    headers: HeaderMap,
    pool: Extension<PgPool>,
    auth_state: Extension<Arc<AuthState>>,
) -> impl IntoResponse {
    let principal =
        match guard::authorize(&headers, &pool, &auth_state, Operation::PersonalRead).await {
            Ok(principal) => principal,
            Err(status) => return status.into_response(),
        };

    match users::find_by_id(&pool, principal.user_id).await {
        Ok(Some(identity)) => (StatusCode::OK, Json(UserResponse::from(identity))).into_response(),
        Ok(None) => StatusCode::NOT_FOUND.into_response(),
        Err(err) => {
            error!("Failed to fetch profile: {err}");
            StatusCode::INTERNAL_SERVER_ERROR.into_response()
        }
    }
}

#[utoipa::path(
    patch,
    path = "/personal/data",
    request_body = UpdateProfileRequest,
    responses(
        (status = 200, description = "Profile updated", body = UserResponse),
        (status = 400, description = "No updates provided"),
        (status = 401, description = "Missing or invalid bearer token"),
        (status = 409, description = "Username already taken")
    ),
    tag = "personal"
)]
pub async fn update_data(
    headers: HeaderMap,
    pool: Extension<PgPool>,
    auth_state: Extension<Arc<AuthState>>,
    payload: Option<Json<UpdateProfileRequest>>,
) -> impl IntoResponse {
    let principal =
        match guard::authorize(&headers, &pool, &auth_state, Operation::PersonalUpdate).await {
            Ok(principal) => principal,
            Err(status) => return status.into_response(),
        };

    let request: UpdateProfileRequest = match payload {
        Some(Json(payload)) => payload,
        None => return (StatusCode::BAD_REQUEST, "Missing payload".to_string()).into_response(),
    };

    let Some(username) = request
        .username
        .map(|value| value.trim().to_string())
        .filter(|value| !value.is_empty())
    else {
        return (StatusCode::BAD_REQUEST, "No updates provided".to_string()).into_response();
    };

    match users::update_username(&pool, principal.user_id, &username).await {
        Ok(UpdateOutcome::Updated(identity)) => {
            (StatusCode::OK, Json(UserResponse::from(identity))).into_response()
        }
        Ok(UpdateOutcome::Conflict) => {
            (StatusCode::CONFLICT, "Username already taken".to_string()).into_response()
        }
        Ok(UpdateOutcome::NotFound) => StatusCode::NOT_FOUND.into_response(),
        Err(err) => {
            error!("Failed to update profile: {err}");
            StatusCode::INTERNAL_SERVER_ERROR.into_response()
        }
    }
}

#[utoipa::path(
    patch,
    path = "/personal/data/password",
    request_body = UpdatePasswordRequest,
    responses(
        (status = 200, description = "Password changed, other sessions revoked"),
        (status = 400, description = "Current password wrong or new password equals old"),
        (status = 401, description = "Missing or invalid bearer token")
    ),
    tag = "personal"
)]
pub async fn update_password(
    headers: HeaderMap,
    pool: Extension<PgPool>,
    auth_state: Extension<Arc<AuthState>>,
    payload: Option<Json<UpdatePasswordRequest>>,
) -> impl IntoResponse {
    let principal = match guard::authorize(
        &headers,
        &pool,
        &auth_state,
        Operation::PersonalPasswordChange,
    )
    .await
    {
        Ok(principal) => principal,
        Err(status) => return status.into_response(),
    };

    let request: UpdatePasswordRequest = match payload {
        Some(Json(payload)) => payload,
        None => return (StatusCode::BAD_REQUEST, "Missing payload".to_string()).into_response(),
    };

    // Rejected before any store mutation.
    if request.password == request.new_password {
        let err = AuthError::PasswordsMatch;
        return (err.status(), err.message().to_string()).into_response();
    }

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

    let identity = match users::find_by_id(&pool, principal.user_id).await {
        Ok(Some(identity)) => identity,
        Ok(None) => return StatusCode::NOT_FOUND.into_response(),
        Err(err) => {
            error!("Failed to fetch identity for password change: {err}");
            return StatusCode::INTERNAL_SERVER_ERROR.into_response();
        }
    };

    if !password::verify_password(&request.password, &identity.password_hash) {
        return (StatusCode::BAD_REQUEST, "Password invalid".to_string()).into_response();
    }

    let password_hash = match password::hash_password(&request.new_password) {
        Ok(hash) => hash,
        Err(err) => {
            error!("Failed to hash password: {err}");
            return StatusCode::INTERNAL_SERVER_ERROR.into_response();
        }
    };

    if let Err(err) = users::update_password(&pool, principal.user_id, &password_hash).await {
        error!("Failed to update password: {err}");
        return StatusCode::INTERNAL_SERVER_ERROR.into_response();
    }

    // Every outstanding session was issued under the old password.
    if let Err(err) = session::revoke_all_for_user(&pool, principal.user_id).await {
        error!("Failed to revoke sessions after password change: {err}");
        return StatusCode::INTERNAL_SERVER_ERROR.into_response();
    }

    (StatusCode::OK, Json(json!({ "message": "success" }))).into_response()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::auth::{AuthConfig, LogConfirmationSender};
    use anyhow::Result;
    use secrecy::SecretString;
    use sqlx::postgres::PgPoolOptions;

    fn auth_state() -> Arc<AuthState> {
        Arc::new(AuthState::new(
            AuthConfig::new(),
            &SecretString::from("personal-test-secret".to_string()),
            Arc::new(LogConfirmationSender),
        ))
    }

    fn lazy_pool() -> Result<PgPool> {
        Ok(PgPoolOptions::new().connect_lazy("postgres://postgres@localhost/postgres")?)
    }

    #[tokio::test]
    async fn get_data_without_token_is_unauthorized() -> Result<()> {
        let response = get_data(HeaderMap::new(), Extension(lazy_pool()?), Extension(auth_state()))
            .await
            .into_response();
        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
        Ok(())
    }

    #[tokio::test]
    async fn update_data_without_token_is_unauthorized() -> Result<()> {
        let response = update_data(
            HeaderMap::new(),
            Extension(lazy_pool()?),
            Extension(auth_state()),
            Some(Json(UpdateProfileRequest {
                username: Some("new-name".to_string()),
            })),
        )
        .await
        .into_response();
        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
        Ok(())
    }

    #[tokio::test]
    async fn update_password_without_token_is_unauthorized() -> Result<()> {
        let response = update_password(
            HeaderMap::new(),
            Extension(lazy_pool()?),
            Extension(auth_state()),
            Some(Json(UpdatePasswordRequest {
                password: "old".to_string(),
                new_password: "new".to_string(),
            })),
        )
        .await
        .into_response();
        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
        Ok(())
    }

    #[test]
    fn user_response_from_identity_keeps_fields() {
        let identity = Identity {
            id: uuid::Uuid::nil(),
            email: "alice@example.com".to_string(),
            username: "alice".to_string(),
            password_hash: "$argon2id$stub".to_string(),
            roles: vec![Role::User],
            email_verified: true,
            created_at: "2026-01-01T00:00:00Z".to_string(),
            updated_at: "2026-01-02T00:00:00Z".to_string(),
        };
        let response = UserResponse::from(identity);
        assert_eq!(response.id, uuid::Uuid::nil().to_string());
        assert_eq!(response.roles, vec![Role::User]);
        assert!(response.email_verified);
    }
}
