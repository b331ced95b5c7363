//! Auth configuration and process-wide state.

use secrecy::SecretString;
use std::sync::Arc;

use super::confirmation::ConfirmationSender;
use super::token::TokenCodec;

const DEFAULT_ACCESS_TTL_SECONDS: i64 = 15 * 60;
const DEFAULT_REFRESH_TTL_SECONDS: i64 = 7 * 24 * 60 * 60;
const DEFAULT_CODE_TTL_SECONDS: i64 = 30 * 60;

#[derive(Clone, Debug)]
pub struct AuthConfig {
    access_ttl_seconds: i64,
    refresh_ttl_seconds: i64,
    code_ttl_seconds: i64,
}

impl AuthConfig {
    #[must_use]
    pub fn new() -> Self {
        Self {
            access_ttl_seconds: DEFAULT_ACCESS_TTL_SECONDS,
            refresh_ttl_seconds: DEFAULT_REFRESH_TTL_SECONDS,
            code_ttl_seconds: DEFAULT_CODE_TTL_SECONDS,
        }
    }

    #[must_use]
    pub fn with_access_ttl_seconds(mut self, seconds: i64) -> Self {
        self.access_ttl_seconds = seconds;
        self
    }

    #[must_use]
    pub fn with_refresh_ttl_seconds(mut self, seconds: i64) -> Self {
        self.refresh_ttl_seconds = seconds;
        self
    }

    #[must_use]
    pub fn with_code_ttl_seconds(mut self, seconds: i64) -> Self {
        self.code_ttl_seconds = seconds;
        self
    }

    #[must_use]
    pub fn access_ttl_seconds(&self) -> i64 {
        self.access_ttl_seconds
    }

    #[must_use]
    pub fn refresh_ttl_seconds(&self) -> i64 {
        self.refresh_ttl_seconds
    }

    #[must_use]
    pub fn code_ttl_seconds(&self) -> i64 {
        self.code_ttl_seconds
    }
}

impl Default for AuthConfig {
    fn default() -> Self {
        Self::new()
    }
}

/// Immutable per-process auth state: configuration, the token codec built
/// from the startup signing key, and the confirmation-code sender.
pub struct AuthState {
    config: AuthConfig,
    codec: TokenCodec,
    sender: Arc<dyn ConfirmationSender>,
}

impl AuthState {
    #[must_use]
    pub fn new(config: AuthConfig, secret: &SecretString, sender: Arc<dyn ConfirmationSender>) -> Self {
        Self {
            config,
            codec: TokenCodec::new(secret),
            sender,
        }
    }

    #[must_use]
    pub fn config(&self) -> &AuthConfig {
        &self.config
    }

    #[must_use]
    pub fn codec(&self) -> &TokenCodec {
        &self.codec
    }

    pub(crate) fn sender(&self) -> &dyn ConfirmationSender {
        self.sender.as_ref()
    }
}

#[cfg(test)]
mod tests {
    use super::super::confirmation::LogConfirmationSender;
    use super::*;

    #[test]
    fn auth_config_defaults_and_overrides() {
        let config = AuthConfig::new();
        assert_eq!(config.access_ttl_seconds(), DEFAULT_ACCESS_TTL_SECONDS);
        assert_eq!(config.refresh_ttl_seconds(), DEFAULT_REFRESH_TTL_SECONDS);
        assert_eq!(config.code_ttl_seconds(), DEFAULT_CODE_TTL_SECONDS);

        let config = config
            .with_access_ttl_seconds(60)
            .with_refresh_ttl_seconds(3600)
            .with_code_ttl_seconds(120);
        assert_eq!(config.access_ttl_seconds(), 60);
        assert_eq!(config.refresh_ttl_seconds(), 3600);
        assert_eq!(config.code_ttl_seconds(), 120);
    }

    #[test]
    fn auth_state_constructs_with_log_sender() {
        let secret = SecretString::from("unit-test-secret".to_string());
        let state = AuthState::new(AuthConfig::new(), &secret, Arc::new(LogConfirmationSender));
        assert_eq!(
            state.config().access_ttl_seconds(),
            DEFAULT_ACCESS_TTL_SECONDS
        );
    }
}
