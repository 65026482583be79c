//! Authenticated principal extraction.
//!
//! Flow Overview: read the access token (cookie first, then bearer header), hand
//! it to the guard, and return the sanitized account for downstream handlers.

use axum::http::HeaderMap;

use super::{cookies::extract_access_token, state::AuthState};
use crate::{auth::AuthError, store::PublicAccount};

/// Resolve the request's access token into an account, or fail with 401.
pub async fn require_auth(
    headers: &HeaderMap,
    state: &AuthState,
) -> Result<PublicAccount, AuthError> {
    let token = extract_access_token(headers);
    state.guard().authenticate(token.as_deref()).await
}

/// Like [`require_auth`], but a missing or invalid token is an anonymous
/// request rather than an error. Store failures still propagate.
pub async fn optional_auth(
    headers: &HeaderMap,
    state: &AuthState,
) -> Result<Option<PublicAccount>, AuthError> {
    if extract_access_token(headers).is_none() {
        return Ok(None);
    }
    match require_auth(headers, state).await {
        Ok(account) => Ok(Some(account)),
        Err(AuthError::Unauthorized(_)) => Ok(None),
        Err(err) => Err(err),
    }
}
