//! # Portier (Account & Session Backend)
//!
//! `portier` is an account backend handling registration, login, profile
//! self-service, and role-based access control.
//!
//! ## Authentication & Sessions
//!
//! Authentication uses short-lived HS256 access tokens paired with
//! longer-lived refresh tokens. Every issued pair is tracked in a server-side
//! session row so credentials can be revoked before they expire:
//!
//! - **Rotation:** Refreshing revokes the prior session atomically; a refresh
//!   token is single-use and only one of two racing refresh calls can win.
//! - **Revocation:** Logout marks the session revoked and is idempotent, even
//!   for expired or unknown tokens. A revoked token identifier never resolves
//!   to an active session again.
//! - **Multi-device:** Logging in does not revoke existing sessions; each
//!   device holds its own pair.
//!
//! ## Confirmation Codes
//!
//! Sensitive transitions (email verification, password reset) are gated by
//! short one-time codes. A code is usable exactly once and only inside its
//! validity window; issuing a new code supersedes any outstanding one for the
//! same purpose.
//!
//! ## Authorization
//!
//! Protected routes declare a required role set in a static table consulted
//! after authentication. A missing session yields `401 Unauthorized`; an
//! authenticated identity lacking every required role yields `403 Forbidden`.

pub mod api;
pub mod auth;
pub mod cli;
pub mod users;
