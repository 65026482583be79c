//! Failure taxonomy shared by the account core and the HTTP layer.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum AuthError {
    /// Missing or malformed input, rejected before anything is persisted.
    #[error("{0}")]
    Validation(String),
    /// Username or email already belongs to another account.
    #[error("{0}")]
    Conflict(String),
    #[error("{0}")]
    NotFound(String),
    #[error("incorrect password")]
    BadCredentials,
    #[error("old and new password are the same")]
    SamePassword,
    /// Missing, invalid or expired access credential.
    #[error("{0}")]
    Unauthorized(String),
    /// Refresh token failed verification or names an unknown account.
    #[error("invalid refresh token")]
    InvalidRefreshToken,
    /// Refresh token is well formed but no longer the stored one.
    #[error("refresh token is expired or used")]
    ExpiredOrReusedRefresh,
    /// Credential store, hasher or media host failure.
    #[error("upstream failure: {0}")]
    Upstream(#[from] anyhow::Error),
}

impl AuthError {
    pub(crate) fn validation(message: impl Into<String>) -> Self {
        Self::Validation(message.into())
    }

    pub(crate) fn unauthorized(message: impl Into<String>) -> Self {
        Self::Unauthorized(message.into())
    }

    /// Stable, machine-readable identifier for this failure.
    #[must_use]
    pub const fn kind(&self) -> &'static str {
        match self {
            Self::Validation(_) => "validation",
            Self::Conflict(_) => "conflict",
            Self::NotFound(_) => "not_found",
            Self::BadCredentials => "bad_credentials",
            Self::SamePassword => "same_password",
            Self::Unauthorized(_) => "unauthorized",
            Self::InvalidRefreshToken => "invalid_refresh_token",
            Self::ExpiredOrReusedRefresh => "expired_or_reused_refresh",
            Self::Upstream(_) => "upstream_failure",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use anyhow::anyhow;

    #[test]
    fn kinds_are_stable() {
        assert_eq!(AuthError::validation("x").kind(), "validation");
        assert_eq!(AuthError::BadCredentials.kind(), "bad_credentials");
        assert_eq!(
            AuthError::ExpiredOrReusedRefresh.kind(),
            "expired_or_reused_refresh"
        );
        assert_eq!(
            AuthError::Upstream(anyhow!("db down")).kind(),
            "upstream_failure"
        );
    }

    #[test]
    fn upstream_converts_from_anyhow() {
        let err: AuthError = anyhow!("boom").into();
        assert!(matches!(err, AuthError::Upstream(_)));
    }
}
