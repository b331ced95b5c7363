//! Identity model and account-store helpers.
//!
//! The account subsystem owns the `users` table; the auth core only consumes
//! lookups and the password/profile update operations here. Identities are
//! never deleted by this service.

use anyhow::{Context, Result};
use regex::Regex;
use sqlx::{PgPool, Row};
use tracing::Instrument;
use uuid::Uuid;

use crate::auth::roles::{parse_roles, Role};

/// An account capable of authenticating.
#[derive(Clone, Debug)]
pub struct Identity {
    pub id: Uuid,
    pub email: String,
    pub username: String,
    pub password_hash: String,
    pub roles: Vec<Role>,
    pub email_verified: bool,
    pub created_at: String,
    pub updated_at: String,
}

/// Outcome when attempting to create a new identity.
#[derive(Debug)]
pub enum InsertOutcome {
    Created(Uuid),
    Conflict,
}

/// Normalize an email for lookup/uniqueness checks.
#[must_use]
pub fn normalize_email(email: &str) -> String {
    email.trim().to_lowercase()
}

/// Basic email format check on already-normalized input.
#[must_use]
pub fn valid_email(email_normalized: &str) -> bool {
    Regex::new(r"^[^@\s]+@[^@\s]+\.[^@\s]+$").is_ok_and(|regex| regex.is_match(email_normalized))
}

pub(crate) fn is_unique_violation(err: &sqlx::Error) -> bool {
    match err {
        sqlx::Error::Database(db_err) => db_err.code().is_some_and(|code| code.as_ref() == "23505"),
        _ => false,
    }
}

const IDENTITY_COLUMNS: &str = r#"
    id,
    email,
    username,
    password_hash,
    roles,
    email_verified_at IS NOT NULL AS email_verified,
    to_char(created_at AT TIME ZONE 'utc', 'YYYY-MM-DD"T"HH24:MI:SS"Z"') AS created_at,
    to_char(updated_at AT TIME ZONE 'utc', 'YYYY-MM-DD"T"HH24:MI:SS"Z"') AS updated_at
"#;

fn identity_from_row(row: &sqlx::postgres::PgRow) -> Identity {
    let stored_roles: Vec<String> = row.get("roles");
    Identity {
        id: row.get("id"),
        email: row.get("email"),
        username: row.get("username"),
        password_hash: row.get("password_hash"),
        roles: parse_roles(&stored_roles),
        email_verified: row.get("email_verified"),
        created_at: row.get("created_at"),
        updated_at: row.get("updated_at"),
    }
}

/// Create an identity with the `user` role. Unique violations on email or
/// username surface as `Conflict` rather than an error.
pub async fn insert_user(
    pool: &PgPool,
    email: &str,
    username: &str,
    password_hash: &str,
) -> Result<InsertOutcome> {
    let query = r"
        INSERT INTO users (email, username, password_hash)
        VALUES ($1, $2, $3)
        RETURNING id
    ";
    let span = tracing::info_span!(
        "db.query",
        db.system = "postgresql",
        db.operation = "INSERT",
        db.statement = query
    );
    let row = sqlx::query(query)
        .bind(email)
        .bind(username)
        .bind(password_hash)
        .fetch_one(pool)
        .instrument(span)
        .await;

    match row {
        Ok(row) => Ok(InsertOutcome::Created(row.get("id"))),
        Err(err) if is_unique_violation(&err) => Ok(InsertOutcome::Conflict),
        Err(err) => Err(err).context("failed to insert user"),
    }
}

pub async fn find_by_email(pool: &PgPool, email: &str) -> Result<Option<Identity>> {
    let query = format!("SELECT {IDENTITY_COLUMNS} FROM users WHERE email = $1 LIMIT 1");
    let span = tracing::info_span!(
        "db.query",
        db.system = "postgresql",
        db.operation = "SELECT",
        db.statement = query.as_str()
    );
    let row = sqlx::query(&query)
        .bind(email)
        .fetch_optional(pool)
        .instrument(span)
        .await
        .context("failed to lookup user by email")?;
    Ok(row.as_ref().map(identity_from_row))
}

pub async fn find_by_id(pool: &PgPool, id: Uuid) -> Result<Option<Identity>> {
    let query = format!("SELECT {IDENTITY_COLUMNS} FROM users WHERE id = $1 LIMIT 1");
    let span = tracing::info_span!(
        "db.query",
        db.system = "postgresql",
        db.operation = "SELECT",
        db.statement = query.as_str()
    );
    let row = sqlx::query(&query)
        .bind(id)
        .fetch_optional(pool)
        .instrument(span)
        .await
        .context("failed to lookup user by id")?;
    Ok(row.as_ref().map(identity_from_row))
}

/// Outcome of a self-service profile update.
#[derive(Debug)]
pub enum UpdateOutcome {
    Updated(Identity),
    Conflict,
    NotFound,
}

/// Apply the allow-listed self-service username update. A taken username
/// surfaces as `Conflict`.
pub async fn update_username(pool: &PgPool, id: Uuid, username: &str) -> Result<UpdateOutcome> {
    let query = format!(
        r"
        UPDATE users
        SET username = $1,
            updated_at = NOW()
        WHERE id = $2
        RETURNING {IDENTITY_COLUMNS}
        "
    );
    let span = tracing::info_span!(
        "db.query",
        db.system = "postgresql",
        db.operation = "UPDATE",
        db.statement = query.as_str()
    );
    let row = sqlx::query(&query)
        .bind(username)
        .bind(id)
        .fetch_optional(pool)
        .instrument(span)
        .await;
    match row {
        Ok(Some(row)) => Ok(UpdateOutcome::Updated(identity_from_row(&row))),
        Ok(None) => Ok(UpdateOutcome::NotFound),
        Err(err) if is_unique_violation(&err) => Ok(UpdateOutcome::Conflict),
        Err(err) => Err(err).context("failed to update username"),
    }
}

pub async fn update_password(pool: &PgPool, id: Uuid, password_hash: &str) -> Result<()> {
    let query = r"
        UPDATE users
        SET password_hash = $1,
            updated_at = NOW()
        WHERE id = $2
    ";
    let span = tracing::info_span!(
        "db.query",
        db.system = "postgresql",
        db.operation = "UPDATE",
        db.statement = query
    );
    sqlx::query(query)
        .bind(password_hash)
        .bind(id)
        .execute(pool)
        .instrument(span)
        .await
        .context("failed to update password")?;
    Ok(())
}

pub async fn mark_email_verified(pool: &PgPool, id: Uuid) -> Result<()> {
    let query = r"
        UPDATE users
        SET email_verified_at = NOW(),
            updated_at = NOW()
        WHERE id = $1
          AND email_verified_at IS NULL
    ";
    let span = tracing::info_span!(
        "db.query",
        db.system = "postgresql",
        db.operation = "UPDATE",
        db.statement = query
    );
    sqlx::query(query)
        .bind(id)
        .execute(pool)
        .instrument(span)
        .await
        .context("failed to mark email verified")?;
    Ok(())
}

pub async fn list_users(pool: &PgPool) -> Result<Vec<Identity>> {
    let query = format!("SELECT {IDENTITY_COLUMNS} FROM users ORDER BY created_at DESC");
    let span = tracing::info_span!(
        "db.query",
        db.system = "postgresql",
        db.operation = "SELECT",
        db.statement = query.as_str()
    );
    let rows = sqlx::query(&query)
        .fetch_all(pool)
        .instrument(span)
        .await
        .context("failed to list users")?;
    Ok(rows.iter().map(identity_from_row).collect())
}
