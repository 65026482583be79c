//! # Vidhub accounts
//!
//! User accounts, sessions and channel pages for the vidhub video platform.
//!
//! ## Sessions
//!
//! Login issues a short-lived **access token** and a long-lived **refresh
//! token**, both HS256 JWTs signed with distinct secrets. They are returned in
//! the body and as `HttpOnly` cookies. Only the latest refresh token of an
//! account is valid: refreshing rotates it, and presenting an older one is
//! rejected as reuse. Logout clears the stored token.
//!
//! ## Media
//!
//! Avatars and cover images arrive as multipart uploads. They are staged on
//! local disk, pushed to a remote media host, and the staged file is removed
//! whether or not the upload succeeded. Replacing an image deletes the old one
//! from the host.
//!
//! ## Layout
//!
//! - [`auth`]: tokens, password hashing, the session manager and the guard.
//! - [`accounts`]: registration, profile edits and channel queries.
//! - [`store`]: the [`store::CredentialStore`] trait with Postgres and in-memory backends.
//! - [`media`]: the [`media::BlobStore`] trait and upload staging.
//! - [`api`]: the axum router, handlers and `OpenAPI` document.
//! - [`cli`]: argument parsing, telemetry and the server action.

pub mod accounts;
pub mod api;
pub mod auth;
pub mod cli;
pub mod media;
pub mod store;
