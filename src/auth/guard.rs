//! Request authentication and role enforcement guards.
//!
//! Flow Overview: protected handlers call [`authorize`], which extracts the
//! bearer token, validates the session, and checks the invoked operation's
//! required roles from a static table. Authentication failures are an
//! undifferentiated 401; an authenticated identity lacking every required
//! role is a 403.

use axum::http::{header::AUTHORIZATION, HeaderMap, StatusCode};
use sqlx::PgPool;
use tracing::error;
use uuid::Uuid;

use crate::users::Identity;

use super::roles::Role;
use super::session;
use super::state::AuthState;
use super::AuthError;

/// Authenticated identity attached to the request after the guard runs.
#[derive(Clone, Debug)]
pub struct Principal {
    pub user_id: Uuid,
    pub email: String,
    pub username: String,
    pub roles: Vec<Role>,
}

impl From<Identity> for Principal {
    fn from(identity: Identity) -> Self {
        Self {
            user_id: identity.id,
            email: identity.email,
            username: identity.username,
            roles: identity.roles,
        }
    }
}

/// Operations with a guarded route, used to key the role table.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Operation {
    PersonalRead,
    PersonalUpdate,
    PersonalPasswordChange,
    UsersList,
}

/// Static required-role table, resolved once at compile time.
///
/// An empty set means any authenticated identity may call the operation.
/// A non-empty set requires at least one matching role (logical OR).
#[must_use]
pub const fn required_roles(operation: Operation) -> &'static [Role] {
    match operation {
        Operation::PersonalRead
        | Operation::PersonalUpdate
        | Operation::PersonalPasswordChange => &[],
        Operation::UsersList => &[Role::Admin],
    }
}

/// Resolve the bearer token into a principal, or 401 for any failure.
///
/// The response never distinguishes malformed, expired, and revoked tokens.
pub async fn require_auth(
    headers: &HeaderMap,
    pool: &PgPool,
    state: &AuthState,
) -> Result<Principal, StatusCode> {
    let Some(token) = extract_bearer_token(headers) else {
        return Err(StatusCode::UNAUTHORIZED);
    };
    match session::validate(pool, state, &token).await {
        Ok(identity) => Ok(Principal::from(identity)),
        Err(AuthError::Internal(err)) => {
            error!("Failed to validate session: {err}");
            Err(StatusCode::INTERNAL_SERVER_ERROR)
        }
        Err(_) => Err(StatusCode::UNAUTHORIZED),
    }
}

/// Check a principal against a required-role set.
///
/// `None` means no identity reached the enforcer at all, which is a 401, not
/// a 403: "not logged in" and "logged in but insufficient" stay distinct.
pub fn enforce_roles(
    principal: Option<&Principal>,
    required: &[Role],
) -> Result<(), StatusCode> {
    let Some(principal) = principal else {
        return Err(StatusCode::UNAUTHORIZED);
    };
    if required.is_empty() {
        return Ok(());
    }
    if required.iter().any(|role| principal.roles.contains(role)) {
        Ok(())
    } else {
        Err(StatusCode::FORBIDDEN)
    }
}

/// Authenticate, then enforce the operation's declared role set.
pub async fn authorize(
    headers: &HeaderMap,
    pool: &PgPool,
    state: &AuthState,
    operation: Operation,
) -> Result<Principal, StatusCode> {
    let principal = require_auth(headers, pool, state).await?;
    enforce_roles(Some(&principal), required_roles(operation))?;
    Ok(principal)
}

/// Pull the token out of the `Authorization` header, if well-formed.
pub(crate) fn extract_bearer_token(headers: &HeaderMap) -> Option<String> {
    let value = headers.get(AUTHORIZATION)?.to_str().ok()?;
    let trimmed = value.trim();
    let token = trimmed
        .strip_prefix("Bearer ")
        .or_else(|| trimmed.strip_prefix("bearer "))?
        .trim();
    if token.is_empty() {
        None
    } else {
        Some(token.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::super::confirmation::LogConfirmationSender;
    use super::super::state::{AuthConfig, AuthState};
    use super::*;
    use anyhow::Result;
    use axum::http::HeaderValue;
    use secrecy::SecretString;
    use sqlx::postgres::PgPoolOptions;
    use std::sync::Arc;

    fn principal_with(roles: Vec<Role>) -> Principal {
        Principal {
            user_id: Uuid::nil(),
            email: "alice@example.com".to_string(),
            username: "alice".to_string(),
            roles,
        }
    }

    #[test]
    fn bearer_extraction_accepts_both_prefixes() {
        let mut headers = HeaderMap::new();
        headers.insert(AUTHORIZATION, HeaderValue::from_static("Bearer abc"));
        assert_eq!(extract_bearer_token(&headers), Some("abc".to_string()));

        headers.insert(AUTHORIZATION, HeaderValue::from_static("bearer xyz"));
        assert_eq!(extract_bearer_token(&headers), Some("xyz".to_string()));
    }

    #[test]
    fn bearer_extraction_rejects_malformed_headers() {
        let mut headers = HeaderMap::new();
        headers.insert(AUTHORIZATION, HeaderValue::from_static("Basic abc"));
        assert_eq!(extract_bearer_token(&headers), None);

        headers.insert(AUTHORIZATION, HeaderValue::from_static("Bearer "));
        assert_eq!(extract_bearer_token(&headers), None);

        assert_eq!(extract_bearer_token(&HeaderMap::new()), None);
    }

    #[test]
    fn personal_routes_have_no_role_restriction() {
        assert!(required_roles(Operation::PersonalRead).is_empty());
        assert!(required_roles(Operation::PersonalUpdate).is_empty());
        assert!(required_roles(Operation::PersonalPasswordChange).is_empty());
    }

    #[test]
    fn users_list_requires_admin() {
        assert_eq!(required_roles(Operation::UsersList), &[Role::Admin]);
    }

    #[test]
    fn enforce_roles_distinguishes_missing_identity_from_missing_role() {
        // No identity at all: 401.
        assert_eq!(
            enforce_roles(None, &[Role::Admin]),
            Err(StatusCode::UNAUTHORIZED)
        );
        // Identity without the role: 403.
        let principal = principal_with(vec![Role::User]);
        assert_eq!(
            enforce_roles(Some(&principal), &[Role::Admin]),
            Err(StatusCode::FORBIDDEN)
        );
    }

    #[test]
    fn enforce_roles_is_logical_or() {
        let principal = principal_with(vec![Role::User]);
        assert_eq!(
            enforce_roles(Some(&principal), &[Role::Admin, Role::User]),
            Ok(())
        );
    }

    #[test]
    fn empty_role_set_allows_any_identity() {
        let principal = principal_with(Vec::new());
        assert_eq!(enforce_roles(Some(&principal), &[]), Ok(()));
    }

    #[tokio::test]
    async fn require_auth_rejects_missing_header_before_store_access() -> Result<()> {
        let pool = PgPoolOptions::new().connect_lazy("postgres://postgres@localhost/postgres")?;
        let state = AuthState::new(
            AuthConfig::new(),
            &SecretString::from("guard-test-secret".to_string()),
            Arc::new(LogConfirmationSender),
        );
        let status = require_auth(&HeaderMap::new(), &pool, &state)
            .await
            .unwrap_err();
        assert_eq!(status, StatusCode::UNAUTHORIZED);
        Ok(())
    }

    #[tokio::test]
    async fn require_auth_rejects_garbage_token_before_store_access() -> Result<()> {
        let pool = PgPoolOptions::new().connect_lazy("postgres://postgres@localhost/postgres")?;
        let state = AuthState::new(
            AuthConfig::new(),
            &SecretString::from("guard-test-secret".to_string()),
            Arc::new(LogConfirmationSender),
        );
        let mut headers = HeaderMap::new();
        headers.insert(AUTHORIZATION, HeaderValue::from_static("Bearer not-a-jwt"));
        let status = require_auth(&headers, &pool, &state).await.unwrap_err();
        assert_eq!(status, StatusCode::UNAUTHORIZED);
        Ok(())
    }
}
