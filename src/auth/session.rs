//! Session lifecycle: login issuance, refresh rotation, revocation, and
//! per-request validation.
//!
//! A session pairs one access and one refresh token identifier. The only
//! state transition is Active -> Revoked; expiry is carried inside the token
//! itself and never stored. Logging in does not touch existing sessions, so a
//! user may hold one session per device.

use anyhow::Context;
use serde::Serialize;
use sqlx::PgPool;
use utoipa::ToSchema;
use uuid::Uuid;

use crate::users::{self, Identity};

use super::error::AuthError;
use super::state::AuthState;
use super::storage;
use super::token::TokenKind;

/// Freshly issued credential pair returned by login and refresh.
#[derive(Debug, Serialize, ToSchema)]
pub struct TokenPair {
    pub access_token: String,
    pub refresh_token: String,
}

/// Issue a new access/refresh pair and record the session.
///
/// Exactly one session row is created per call; the two token identifiers are
/// freshly generated UUIDs.
pub async fn generate_tokens(
    pool: &PgPool,
    state: &AuthState,
    user_id: Uuid,
) -> Result<TokenPair, AuthError> {
    let config = state.config();
    let (access_token, access_id) = state
        .codec()
        .issue(user_id, TokenKind::Access, config.access_ttl_seconds())?;
    let (refresh_token, refresh_id) = state
        .codec()
        .issue(user_id, TokenKind::Refresh, config.refresh_ttl_seconds())?;

    storage::insert_session(pool, user_id, access_id, refresh_id)
        .await
        .context("failed to record session")?;

    Ok(TokenPair {
        access_token,
        refresh_token,
    })
}

/// Rotate a session: verify the refresh token, revoke the old pair, and issue
/// a new one.
///
/// The revoke is a conditional update, so of two concurrent calls with the
/// same refresh token exactly one wins; the loser observes `SessionRevoked`.
pub async fn refresh(
    pool: &PgPool,
    state: &AuthState,
    refresh_token: &str,
) -> Result<TokenPair, AuthError> {
    let claims = state.codec().verify(refresh_token)?;
    if claims.kind != TokenKind::Refresh {
        return Err(AuthError::TokenInvalid);
    }

    let Some(user_id) = storage::revoke_session_by_refresh(pool, claims.jti)
        .await
        .context("failed to rotate session")?
    else {
        // Missing or already revoked: either way the token is spent.
        return Err(AuthError::SessionRevoked);
    };

    generate_tokens(pool, state, user_id).await
}

/// Revoke the session behind an access token (logout).
///
/// The token only needs to verify structurally; a user must be able to log
/// out with a stale token. Unknown, already-revoked, and malformed tokens are
/// all a no-op success so logout is safe to retry and leaks nothing.
pub async fn revoke_access_token(
    pool: &PgPool,
    state: &AuthState,
    access_token: &str,
) -> Result<(), AuthError> {
    let Ok(claims) = state.codec().verify_ignore_expiry(access_token) else {
        return Ok(());
    };
    if claims.kind != TokenKind::Access {
        return Ok(());
    }
    storage::revoke_session_by_access(pool, claims.jti)
        .await
        .context("failed to revoke session")?;
    Ok(())
}

/// Validate an access token and resolve the identity behind it.
///
/// Called by the request guard on every protected request. Every failure
/// (bad signature, expired, wrong kind, missing session, revoked session,
/// vanished user) collapses to `Unauthenticated`.
pub async fn validate(
    pool: &PgPool,
    state: &AuthState,
    access_token: &str,
) -> Result<Identity, AuthError> {
    let claims = state
        .codec()
        .verify(access_token)
        .map_err(|_| AuthError::Unauthenticated)?;
    if claims.kind != TokenKind::Access {
        return Err(AuthError::Unauthenticated);
    }

    let session = storage::lookup_session_by_access(pool, claims.jti)
        .await
        .context("failed to lookup session")?;
    let Some(session) = session else {
        return Err(AuthError::Unauthenticated);
    };
    if session.revoked {
        return Err(AuthError::Unauthenticated);
    }

    users::find_by_id(pool, session.user_id)
        .await
        .context("failed to resolve identity")?
        .ok_or(AuthError::Unauthenticated)
}

/// Revoke every active session a user holds, e.g. after a password change.
pub async fn revoke_all_for_user(pool: &PgPool, user_id: Uuid) -> Result<u64, AuthError> {
    let revoked = storage::revoke_sessions_for_user(pool, user_id)
        .await
        .context("failed to revoke user sessions")?;
    Ok(revoked)
}
