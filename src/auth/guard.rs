//! Access token gate for protected requests.
//!
//! The guard is read-only: it verifies the presented access token and loads the
//! account it names. Credential extraction (cookie or bearer header) lives in the
//! HTTP layer; the guard only sees the raw token.

use std::sync::Arc;
use tracing::{debug, warn};

use super::{
    config::AuthConfig,
    error::AuthError,
    session::{Clock, unix_now},
    token::{TokenError, TokenVerifier},
};
use crate::store::{CredentialStore, PublicAccount};

#[derive(Clone)]
pub struct AuthGuard {
    store: Arc<dyn CredentialStore>,
    verifier: TokenVerifier,
    clock: Clock,
}

impl AuthGuard {
    #[must_use]
    pub fn new(config: &AuthConfig, store: Arc<dyn CredentialStore>) -> Self {
        Self {
            store,
            verifier: TokenVerifier::new(config),
            clock: unix_now,
        }
    }

    #[must_use]
    pub fn with_clock(mut self, clock: Clock) -> Self {
        self.clock = clock;
        self
    }

    /// Resolve an access token to the sanitized account it belongs to.
    ///
    /// # Errors
    /// Returns [`AuthError::Unauthorized`] when the token is missing, fails
    /// verification, or names an account that no longer exists, and
    /// [`AuthError::Upstream`] on store failures.
    pub async fn authenticate(&self, token: Option<&str>) -> Result<PublicAccount, AuthError> {
        let Some(token) = token.map(str::trim).filter(|token| !token.is_empty()) else {
            return Err(AuthError::unauthorized("unauthorized request"));
        };

        let claims = self
            .verifier
            .verify_access(token, (self.clock)())
            .map_err(|err| {
                match err {
                    TokenError::Expired => debug!("Access token expired"),
                    other => warn!("Access token rejected: {other}"),
                }
                AuthError::unauthorized("invalid access token")
            })?;

        match self.store.find_by_id(claims.account_id).await? {
            Some(account) => Ok(account.public()),
            None => {
                warn!("Access token names unknown account {}", claims.account_id);
                Err(AuthError::unauthorized("invalid access token"))
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::auth::token::{Claims, TokenKind, TokenIssuer, sign};
    use crate::store::{Asset, CreateOutcome, MemoryStore, NewAccount};
    use anyhow::{Result, bail};
    use secrecy::SecretString;
    use uuid::Uuid;

    fn config() -> AuthConfig {
        AuthConfig::new(
            SecretString::from("access-secret"),
            SecretString::from("refresh-secret"),
        )
        .with_access_token_ttl_seconds(60)
        .with_refresh_token_ttl_seconds(600)
    }

    async fn seeded() -> Result<(AuthGuard, Claims)> {
        let store = Arc::new(MemoryStore::new());
        let outcome = store
            .create(NewAccount {
                username: "alice".to_string(),
                email: "alice@x.com".to_string(),
                full_name: "Alice Liddell".to_string(),
                password_hash: "digest".to_string(),
                avatar: Asset {
                    url: "memory://media/a".to_string(),
                    id: "a".to_string(),
                },
                cover_image: None,
            })
            .await?;
        let CreateOutcome::Created(account) = outcome else {
            bail!("seed account conflicted");
        };
        Ok((AuthGuard::new(&config(), store), account.claims()))
    }

    #[tokio::test]
    async fn valid_access_token_resolves_account() -> Result<()> {
        let (guard, claims) = seeded().await?;
        let token = TokenIssuer::new(&config()).issue_access(&claims, unix_now())?;
        let account = guard.authenticate(Some(&token)).await?;
        assert_eq!(account.id, claims.account_id);
        assert_eq!(account.username, "alice");
        Ok(())
    }

    #[tokio::test]
    async fn rejects_missing_forged_expired_and_refresh_tokens() -> Result<()> {
        let (guard, claims) = seeded().await?;
        let now = unix_now();

        let forged = sign(
            TokenKind::Access,
            &claims,
            &SecretString::from("wrong-secret"),
            60,
            now,
        )?;
        let expired = TokenIssuer::new(&config()).issue_access(&claims, now - 120)?;
        let refresh = TokenIssuer::new(&config()).issue_refresh(&claims, now)?;

        for token in [
            None,
            Some(""),
            Some(forged.as_str()),
            Some(expired.as_str()),
            Some(refresh.as_str()),
        ] {
            assert!(matches!(
                guard.authenticate(token).await,
                Err(AuthError::Unauthorized(_))
            ));
        }
        Ok(())
    }

    #[tokio::test]
    async fn clock_drives_expiry() -> Result<()> {
        let (guard, claims) = seeded().await?;
        let token = TokenIssuer::new(&config()).issue_access(&claims, unix_now())?;
        let later = guard.with_clock(|| unix_now() + 61);
        assert!(matches!(
            later.authenticate(Some(&token)).await,
            Err(AuthError::Unauthorized(_))
        ));
        Ok(())
    }

    #[tokio::test]
    async fn unknown_account_is_unauthorized() -> Result<()> {
        let (guard, mut claims) = seeded().await?;
        claims.account_id = Uuid::now_v7();
        let token = TokenIssuer::new(&config()).issue_access(&claims, unix_now())?;
        assert!(matches!(
            guard.authenticate(Some(&token)).await,
            Err(AuthError::Unauthorized(_))
        ));
        Ok(())
    }
}
