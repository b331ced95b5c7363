//! Core error taxonomy mapped to stable HTTP statuses.
//!
//! Internal distinctions (expired vs. revoked vs. malformed) are collapsed to
//! `Unauthenticated` at the request boundary so responses never reveal which
//! check failed.

use axum::http::StatusCode;
use thiserror::Error;

use super::token::TokenError;

#[derive(Debug, Error)]
pub enum AuthError {
    #[error("invalid token")]
    TokenInvalid,
    #[error("token expired")]
    TokenExpired,
    #[error("unauthenticated")]
    Unauthenticated,
    #[error("forbidden")]
    Forbidden,
    #[error("session revoked")]
    SessionRevoked,
    #[error("incorrect code")]
    IncorrectCode,
    #[error("code expired")]
    ExpiredCode,
    #[error("passwords match")]
    PasswordsMatch,
    #[error("delivery service unavailable")]
    ServiceUnavailable,
    #[error(transparent)]
    Internal(#[from] anyhow::Error),
}

impl AuthError {
    /// HTTP status exposed to callers for this failure.
    #[must_use]
    pub fn status(&self) -> StatusCode {
        match self {
            Self::TokenInvalid
            | Self::TokenExpired
            | Self::Unauthenticated
            | Self::SessionRevoked => StatusCode::UNAUTHORIZED,
            Self::Forbidden => StatusCode::FORBIDDEN,
            Self::IncorrectCode | Self::ExpiredCode | Self::PasswordsMatch => {
                StatusCode::BAD_REQUEST
            }
            Self::ServiceUnavailable => StatusCode::SERVICE_UNAVAILABLE,
            Self::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    /// Stable external message; internal causes are not surfaced.
    #[must_use]
    pub fn message(&self) -> &'static str {
        match self {
            Self::TokenInvalid
            | Self::TokenExpired
            | Self::Unauthenticated
            | Self::SessionRevoked => "Unauthenticated",
            Self::Forbidden => "Forbidden",
            Self::IncorrectCode => "Incorrect code",
            Self::ExpiredCode => "Code has expired",
            Self::PasswordsMatch => "New password must differ from the current one",
            Self::ServiceUnavailable => "Delivery service is temporarily unavailable",
            Self::Internal(_) => "Internal server error",
        }
    }
}

impl From<TokenError> for AuthError {
    fn from(err: TokenError) -> Self {
        match err {
            TokenError::Expired => Self::TokenExpired,
            TokenError::Invalid => Self::TokenInvalid,
        }
    }
}
