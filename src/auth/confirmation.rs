//! One-time confirmation codes for sensitive state transitions.
//!
//! Flow Overview: a flow starts by issuing a short random code bound to a
//! (user, purpose) pair and handing it to the [`ConfirmationSender`]; the
//! user later presents the code and verification consumes it atomically.
//! Issuing supersedes any outstanding code for the same pair so at most one
//! code is live at a time.

use anyhow::{Context, Result};
use base64ct::{Base64UrlUnpadded, Encoding};
use rand::{rngs::OsRng, RngCore};
use sqlx::PgPool;
use std::fmt;
use std::str::FromStr;
use tracing::info;
use uuid::Uuid;

use super::error::AuthError;
use super::state::AuthState;
use super::storage::{self, ConsumeOutcome};

/// What a confirmation code authorizes once verified.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum CodePurpose {
    RegisterConfirm,
    PasswordReset,
}

impl CodePurpose {
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::RegisterConfirm => "register-confirm",
            Self::PasswordReset => "password-reset",
        }
    }
}

impl fmt::Display for CodePurpose {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for CodePurpose {
    type Err = String;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value {
            "register-confirm" => Ok(Self::RegisterConfirm),
            "password-reset" => Ok(Self::PasswordReset),
            other => Err(format!("unknown purpose: {other}")),
        }
    }
}

/// Delivery abstraction for handing a code to a user-reachable channel.
pub trait ConfirmationSender: Send + Sync {
    /// Deliver the code or return an error; failures surface to the caller
    /// as `ServiceUnavailable` rather than being swallowed.
    fn send(&self, email: &str, purpose: CodePurpose, code: &str) -> Result<()>;
}

/// Local dev sender that logs instead of delivering real mail.
#[derive(Clone, Debug)]
pub struct LogConfirmationSender;

impl ConfirmationSender for LogConfirmationSender {
    fn send(&self, email: &str, purpose: CodePurpose, code: &str) -> Result<()> {
        info!(email = %email, purpose = %purpose, code = %code, "confirmation send stub");
        Ok(())
    }
}

/// Generate a short random code: 6 bytes from the OS RNG, URL-safe encoded.
pub fn generate_code() -> Result<String> {
    let mut bytes = [0u8; 6];
    OsRng
        .try_fill_bytes(&mut bytes)
        .context("failed to generate confirmation code")?;
    Ok(Base64UrlUnpadded::encode_string(&bytes))
}

/// Issue a fresh code for `(user, purpose)` and hand it to the sender.
///
/// Any prior unconsumed code for the pair becomes unusable.
pub async fn issue(
    pool: &PgPool,
    state: &AuthState,
    user_id: Uuid,
    email: &str,
    purpose: CodePurpose,
) -> Result<(), AuthError> {
    let code = generate_code().context("failed to generate code")?;
    storage::insert_confirmation_code(
        pool,
        user_id,
        purpose.as_str(),
        &code,
        state.config().code_ttl_seconds(),
    )
    .await
    .context("failed to store confirmation code")?;

    state
        .sender()
        .send(email, purpose, &code)
        .map_err(|_| AuthError::ServiceUnavailable)
}

/// Verify and consume a code in a single atomic step.
pub async fn verify(
    pool: &PgPool,
    user_id: Uuid,
    purpose: CodePurpose,
    code: &str,
) -> Result<(), AuthError> {
    let outcome = storage::consume_confirmation_code(pool, user_id, purpose.as_str(), code)
        .await
        .context("failed to consume confirmation code")?;
    match outcome {
        ConsumeOutcome::Consumed => Ok(()),
        ConsumeOutcome::Expired => Err(AuthError::ExpiredCode),
        ConsumeOutcome::NoMatch => Err(AuthError::IncorrectCode),
    }
}
