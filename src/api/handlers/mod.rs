//! API handlers and shared request helpers.
//!
//! Handlers resolve their caller through [`principal`], read bodies through
//! [`form`] (multipart) or `Json`, and delegate to the session and account
//! services held in [`state::AuthState`]. Errors surface as
//! [`crate::auth::AuthError`], which renders itself as a JSON error body.

pub mod channels;
pub(crate) mod cookies;
pub(crate) mod form;
pub mod health;
pub mod images;
pub mod principal;
pub mod root;
pub mod state;
pub mod users;

pub use state::AuthState;
