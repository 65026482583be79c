//! Credentials and sessions.
//!
//! Passwords are Argon2 digests; sessions are a pair of HS256 tokens. The access
//! token is short lived and never stored, the refresh token is long lived and
//! stored on the account, one per account. Refreshing rotates it, logging out
//! clears it, and logging in again replaces it.

pub mod config;
pub mod error;
pub mod guard;
pub mod password;
pub mod session;
pub mod token;
pub(crate) mod utils;

pub use config::AuthConfig;
pub use error::AuthError;
pub use guard::AuthGuard;
pub use session::{LoginOutcome, SessionManager};
pub use token::{Claims, TokenError, TokenIssuer, TokenPair, TokenVerifier};
