pub mod auth;
pub mod confirm;
pub mod health;
pub mod personal;
pub mod users;

/// Minimum accepted password length, enforced everywhere a password is set:
/// registration, password change, and password-reset confirmation.
pub(crate) const MIN_PASSWORD_LENGTH: usize = 8;

pub(crate) fn password_too_short(password: &str) -> bool {
    password.len() < MIN_PASSWORD_LENGTH
}
