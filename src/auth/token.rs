//! Signed bearer-token codec for access and refresh credentials.
//!
//! Tokens are HS256 JWTs carrying the subject id, the token kind, issue and
//! expiry instants, and a fresh `jti` identifier that matches a session row.
//! The signing key is loaded once at startup and never mutated; verification
//! pins the algorithm so tokens signed with anything else (including `none`)
//! are rejected.

use chrono::Utc;
use jsonwebtoken::{
    decode, encode, Algorithm, DecodingKey, EncodingKey, Header, Validation,
    errors::ErrorKind,
};
use secrecy::{ExposeSecret, SecretString};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use uuid::Uuid;

/// Kind claim distinguishing the two credentials of a session pair.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TokenKind {
    Access,
    Refresh,
}

/// Claims embedded in every issued token.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Claims {
    /// Subject: the owning user id.
    pub sub: Uuid,
    /// Access or refresh.
    pub kind: TokenKind,
    /// Issued-at (UTC Unix timestamp).
    pub iat: i64,
    /// Expiry (UTC Unix timestamp).
    pub exp: i64,
    /// Token identifier matching a session column.
    pub jti: Uuid,
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum TokenError {
    #[error("token expired")]
    Expired,
    #[error("invalid token")]
    Invalid,
}

/// Encodes and verifies bearer tokens with a process-wide signing key.
pub struct TokenCodec {
    encoding: EncodingKey,
    decoding: DecodingKey,
}

impl TokenCodec {
    #[must_use]
    pub fn new(secret: &SecretString) -> Self {
        let secret = secret.expose_secret().as_bytes();
        Self {
            encoding: EncodingKey::from_secret(secret),
            decoding: DecodingKey::from_secret(secret),
        }
    }

    /// Issue a signed token for `subject`, returning the encoded string and
    /// the embedded token identifier.
    pub fn issue(
        &self,
        subject: Uuid,
        kind: TokenKind,
        ttl_seconds: i64,
    ) -> Result<(String, Uuid), TokenError> {
        let now = Utc::now().timestamp();
        let jti = Uuid::new_v4();
        let claims = Claims {
            sub: subject,
            kind,
            iat: now,
            exp: now + ttl_seconds,
            jti,
        };
        let token = encode(&Header::new(Algorithm::HS256), &claims, &self.encoding)
            .map_err(|_| TokenError::Invalid)?;
        Ok((token, jti))
    }

    /// Verify signature, structure, and expiry.
    pub fn verify(&self, token: &str) -> Result<Claims, TokenError> {
        self.decode(token, true)
    }

    /// Verify signature and structure only. Used by logout, which must accept
    /// a stale token so users can always sign out.
    pub fn verify_ignore_expiry(&self, token: &str) -> Result<Claims, TokenError> {
        self.decode(token, false)
    }

    fn decode(&self, token: &str, validate_exp: bool) -> Result<Claims, TokenError> {
        let mut validation = Validation::new(Algorithm::HS256);
        validation.validate_exp = validate_exp;
        decode::<Claims>(token, &self.decoding, &validation)
            .map(|data| data.claims)
            .map_err(|err| match err.kind() {
                ErrorKind::ExpiredSignature => TokenError::Expired,
                _ => TokenError::Invalid,
            })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use anyhow::Result;

    fn codec() -> TokenCodec {
        TokenCodec::new(&SecretString::from(
            "test-secret-that-is-long-enough-for-hmac".to_string(),
        ))
    }

    #[test]
    fn issue_and_verify_round_trip() -> Result<()> {
        let codec = codec();
        let subject = Uuid::new_v4();
        let (token, jti) = codec.issue(subject, TokenKind::Access, 300)?;

        let claims = codec.verify(&token)?;
        assert_eq!(claims.sub, subject);
        assert_eq!(claims.kind, TokenKind::Access);
        assert_eq!(claims.jti, jti);
        assert!(claims.exp > claims.iat);
        Ok(())
    }

    #[test]
    fn token_identifiers_are_unique_per_issue() -> Result<()> {
        let codec = codec();
        let subject = Uuid::new_v4();
        let (_, first) = codec.issue(subject, TokenKind::Access, 300)?;
        let (_, second) = codec.issue(subject, TokenKind::Refresh, 300)?;
        assert_ne!(first, second);
        Ok(())
    }

    #[test]
    fn expired_token_is_rejected_as_expired() -> Result<()> {
        let codec = codec();
        // Issued well in the past so the default leeway cannot save it.
        let (token, _) = codec.issue(Uuid::new_v4(), TokenKind::Access, -3600)?;
        assert_eq!(codec.verify(&token), Err(TokenError::Expired));
        Ok(())
    }

    #[test]
    fn expired_token_still_verifies_structurally() -> Result<()> {
        let codec = codec();
        let subject = Uuid::new_v4();
        let (token, jti) = codec.issue(subject, TokenKind::Access, -3600)?;
        let claims = codec.verify_ignore_expiry(&token)?;
        assert_eq!(claims.sub, subject);
        assert_eq!(claims.jti, jti);
        Ok(())
    }

    #[test]
    fn wrong_key_is_rejected() -> Result<()> {
        let (token, _) = codec().issue(Uuid::new_v4(), TokenKind::Access, 300)?;
        let other = TokenCodec::new(&SecretString::from("a-completely-different-key".to_string()));
        assert_eq!(other.verify(&token), Err(TokenError::Invalid));
        // The structural check still requires a matching signature.
        assert_eq!(other.verify_ignore_expiry(&token), Err(TokenError::Invalid));
        Ok(())
    }

    #[test]
    fn garbage_is_rejected() {
        let codec = codec();
        assert_eq!(codec.verify("not.a.jwt"), Err(TokenError::Invalid));
        assert_eq!(codec.verify(""), Err(TokenError::Invalid));
    }

    #[test]
    fn kind_claim_round_trips_lowercase() -> Result<()> {
        let value = serde_json::to_value(TokenKind::Refresh)?;
        assert_eq!(value, serde_json::json!("refresh"));
        let kind: TokenKind = serde_json::from_value(serde_json::json!("access"))?;
        assert_eq!(kind, TokenKind::Access);
        Ok(())
    }
}
