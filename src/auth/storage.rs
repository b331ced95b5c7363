//! Database helpers for session and confirmation-code state.
//!
//! All cross-request coordination happens here as single-row conditional
//! updates so multiple server instances can share one database. Session rows
//! are never deleted; revocation flips a flag and the row stays for audit.

use anyhow::{Context, Result};
use sqlx::{PgPool, Row};
use tracing::Instrument;
use uuid::Uuid;

/// Session row fields needed to validate a presented token.
pub(crate) struct SessionRow {
    pub(crate) user_id: Uuid,
    pub(crate) revoked: bool,
}

/// Outcome of the atomic confirmation-code consumption.
#[derive(Debug, PartialEq, Eq)]
pub(crate) enum ConsumeOutcome {
    Consumed,
    Expired,
    NoMatch,
}

pub(crate) async fn insert_session(
    pool: &PgPool,
    user_id: Uuid,
    access_token_id: Uuid,
    refresh_token_id: Uuid,
) -> Result<()> {
    let query = r"
        INSERT INTO sessions (user_id, access_token_id, refresh_token_id)
        VALUES ($1, $2, $3)
    ";
    let span = tracing::info_span!(
        "db.query",
        db.system = "postgresql",
        db.operation = "INSERT",
        db.statement = query
    );
    sqlx::query(query)
        .bind(user_id)
        .bind(access_token_id)
        .bind(refresh_token_id)
        .execute(pool)
        .instrument(span)
        .await
        .context("failed to insert session")?;
    Ok(())
}

pub(crate) async fn lookup_session_by_access(
    pool: &PgPool,
    access_token_id: Uuid,
) -> Result<Option<SessionRow>> {
    let query = r"
        SELECT user_id, revoked
        FROM sessions
        WHERE access_token_id = $1
        LIMIT 1
    ";
    let span = tracing::info_span!(
        "db.query",
        db.system = "postgresql",
        db.operation = "SELECT",
        db.statement = query
    );
    let row = sqlx::query(query)
        .bind(access_token_id)
        .fetch_optional(pool)
        .instrument(span)
        .await
        .context("failed to lookup session")?;
    Ok(row.map(|row| SessionRow {
        user_id: row.get("user_id"),
        revoked: row.get("revoked"),
    }))
}

/// Last-write-wins revoke for logout. Revoking an unknown or already-revoked
/// session affects zero rows, which is fine.
pub(crate) async fn revoke_session_by_access(pool: &PgPool, access_token_id: Uuid) -> Result<()> {
    let query = r"
        UPDATE sessions
        SET revoked = TRUE
        WHERE access_token_id = $1
    ";
    let span = tracing::info_span!(
        "db.query",
        db.system = "postgresql",
        db.operation = "UPDATE",
        db.statement = query
    );
    sqlx::query(query)
        .bind(access_token_id)
        .execute(pool)
        .instrument(span)
        .await
        .context("failed to revoke session")?;
    Ok(())
}

/// Conditional revoke used by refresh rotation: only flips the row if it is
/// still active, so of two racing refresh calls exactly one gets the user id
/// back and the other sees `None`.
pub(crate) async fn revoke_session_by_refresh(
    pool: &PgPool,
    refresh_token_id: Uuid,
) -> Result<Option<Uuid>> {
    let query = r"
        UPDATE sessions
        SET revoked = TRUE
        WHERE refresh_token_id = $1
          AND NOT revoked
        RETURNING user_id
    ";
    let span = tracing::info_span!(
        "db.query",
        db.system = "postgresql",
        db.operation = "UPDATE",
        db.statement = query
    );
    let row = sqlx::query(query)
        .bind(refresh_token_id)
        .fetch_optional(pool)
        .instrument(span)
        .await
        .context("failed to rotate session")?;
    Ok(row.map(|row| row.get("user_id")))
}

/// Bulk revoke of every active session a user holds.
pub(crate) async fn revoke_sessions_for_user(pool: &PgPool, user_id: Uuid) -> Result<u64> {
    let query = r"
        UPDATE sessions
        SET revoked = TRUE
        WHERE user_id = $1
          AND NOT revoked
    ";
    let span = tracing::info_span!(
        "db.query",
        db.system = "postgresql",
        db.operation = "UPDATE",
        db.statement = query
    );
    let result = sqlx::query(query)
        .bind(user_id)
        .execute(pool)
        .instrument(span)
        .await
        .context("failed to revoke user sessions")?;
    Ok(result.rows_affected())
}

/// Insert a fresh confirmation code, superseding any outstanding unconsumed
/// code for the same (user, purpose) in the same transaction.
pub(crate) async fn insert_confirmation_code(
    pool: &PgPool,
    user_id: Uuid,
    purpose: &str,
    code: &str,
    ttl_seconds: i64,
) -> Result<()> {
    let mut tx = pool.begin().await.context("begin code transaction")?;

    let query = r"
        UPDATE confirmation_codes
        SET consumed = TRUE
        WHERE user_id = $1
          AND purpose = $2
          AND NOT consumed
    ";
    let span = tracing::info_span!(
        "db.query",
        db.system = "postgresql",
        db.operation = "UPDATE",
        db.statement = query
    );
    sqlx::query(query)
        .bind(user_id)
        .bind(purpose)
        .execute(&mut *tx)
        .instrument(span)
        .await
        .context("failed to supersede prior codes")?;

    let query = r"
        INSERT INTO confirmation_codes (user_id, purpose, code, expires_at)
        VALUES ($1, $2, $3, NOW() + ($4 * INTERVAL '1 second'))
    ";
    let span = tracing::info_span!(
        "db.query",
        db.system = "postgresql",
        db.operation = "INSERT",
        db.statement = query
    );
    sqlx::query(query)
        .bind(user_id)
        .bind(purpose)
        .bind(code)
        .bind(ttl_seconds)
        .execute(&mut *tx)
        .instrument(span)
        .await
        .context("failed to insert confirmation code")?;

    tx.commit().await.context("commit code transaction")?;
    Ok(())
}

/// Atomically consume a code: the update only wins while the row is still
/// unconsumed and unexpired, so two concurrent verifies cannot both succeed.
/// A follow-up select distinguishes "expired" from "no such code" for the
/// caller's error message.
pub(crate) async fn consume_confirmation_code(
    pool: &PgPool,
    user_id: Uuid,
    purpose: &str,
    code: &str,
) -> Result<ConsumeOutcome> {
    let query = r"
        UPDATE confirmation_codes
        SET consumed = TRUE
        WHERE user_id = $1
          AND purpose = $2
          AND code = $3
          AND NOT consumed
          AND expires_at > NOW()
        RETURNING id
    ";
    let span = tracing::info_span!(
        "db.query",
        db.system = "postgresql",
        db.operation = "UPDATE",
        db.statement = query
    );
    let row = sqlx::query(query)
        .bind(user_id)
        .bind(purpose)
        .bind(code)
        .fetch_optional(pool)
        .instrument(span)
        .await
        .context("failed to consume confirmation code")?;

    if row.is_some() {
        return Ok(ConsumeOutcome::Consumed);
    }

    let query = r"
        SELECT 1
        FROM confirmation_codes
        WHERE user_id = $1
          AND purpose = $2
          AND code = $3
          AND NOT consumed
          AND expires_at <= NOW()
        LIMIT 1
    ";
    let span = tracing::info_span!(
        "db.query",
        db.system = "postgresql",
        db.operation = "SELECT",
        db.statement = query
    );
    let stale = sqlx::query(query)
        .bind(user_id)
        .bind(purpose)
        .bind(code)
        .fetch_optional(pool)
        .instrument(span)
        .await
        .context("failed to check for expired code")?;

    if stale.is_some() {
        Ok(ConsumeOutcome::Expired)
    } else {
        Ok(ConsumeOutcome::NoMatch)
    }
}

#[cfg(test)]
mod tests {
    use super::{ConsumeOutcome, SessionRow};
    use uuid::Uuid;

    #[test]
    fn consume_outcome_debug_names() {
        assert_eq!(format!("{:?}", ConsumeOutcome::Consumed), "Consumed");
        assert_eq!(format!("{:?}", ConsumeOutcome::Expired), "Expired");
        assert_eq!(format!("{:?}", ConsumeOutcome::NoMatch), "NoMatch");
    }

    #[test]
    fn session_row_holds_values() {
        let row = SessionRow {
            user_id: Uuid::nil(),
            revoked: false,
        };
        assert_eq!(row.user_id, Uuid::nil());
        assert!(!row.revoked);
    }
}
