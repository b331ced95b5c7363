//! Authentication and session lifecycle engine.
//!
//! Flow Overview: handlers call into [`session`] and [`confirmation`] for the
//! login/logout/refresh and code flows; protected handlers go through
//! [`guard`] which authenticates the bearer token and enforces the route's
//! role requirements. All shared mutable state lives in the database as
//! single-row conditional updates, never in-process locks.

pub mod confirmation;
pub mod error;
pub mod guard;
pub mod password;
pub mod roles;
pub mod session;
pub mod state;
pub(crate) mod storage;
pub mod token;

pub use confirmation::{CodePurpose, ConfirmationSender, LogConfirmationSender};
pub use error::AuthError;
pub use guard::{Operation, Principal};
pub use roles::Role;
pub use state::{AuthConfig, AuthState};
pub use token::{TokenCodec, TokenKind};
