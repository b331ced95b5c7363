//! Admin-only account listing.

use axum::{
    extract::Extension,
    http::{HeaderMap, StatusCode},
    response::IntoResponse,
    Json,
};
use sqlx::PgPool;
use std::sync::Arc;
use tracing::error;

use crate::auth::{guard, AuthState, Operation};
use crate::users;

use super::personal::UserResponse;

#[utoipa::path(
    get,
    path = "/users",
    responses(
        (status = 200, description = "All registered identities", body = [UserResponse]),
        (status = 401, description = "Missing or invalid bearer token"),
        (status = 403, description = "Authenticated identity lacks the admin role")
    ),
    tag = "users"
)]
pub async fn list(
    headers: HeaderMap,
    pool: Extension<PgPool>,
    auth_state: Extension<Arc<AuthState>>,
) -> impl IntoResponse {
    if let Err(status) =
        guard::authorize(&headers, &pool, &auth_state, Operation::UsersList).await
    {
        return status.into_response();
    }

    match users::list_users(&pool).await {
        Ok(identities) => {
            let body: Vec<UserResponse> = identities.into_iter().map(UserResponse::from).collect();
            (StatusCode::OK, Json(body)).into_response()
        }
        Err(err) => {
            error!("Failed to list users: {err}");
            StatusCode::INTERNAL_SERVER_ERROR.into_response()
        }
    }
}
