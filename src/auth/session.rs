//! Login, refresh, logout and password change.
//!
//! Flow Overview:
//! 1) Login verifies the password, mints an access + refresh pair and stores the
//!    refresh token on the account, replacing whatever was there.
//! 2) Refresh accepts only the stored refresh token. The new token is written
//!    with a compare-and-swap so that two concurrent refreshes with the same
//!    token cannot both succeed.
//! 3) Logout clears the stored refresh token; outstanding access tokens live
//!    until they expire.
//! 4) Password change re-hashes and persists; it leaves the session untouched.

use anyhow::anyhow;
use std::sync::Arc;
use tracing::{debug, info, warn};
use uuid::Uuid;

use super::{
    config::AuthConfig,
    error::AuthError,
    password,
    token::{Claims, TokenError, TokenIssuer, TokenPair, TokenVerifier},
    utils::{blank_fields, normalize, valid_password},
};
use crate::store::{Account, AccountUpdate, CredentialStore, PublicAccount, UpdateOutcome};

/// Seconds since the Unix epoch.
pub type Clock = fn() -> i64;

pub(crate) fn unix_now() -> i64 {
    chrono::Utc::now().timestamp()
}

/// Successful login: the sanitized account plus a fresh token pair.
#[derive(Debug, Clone)]
pub struct LoginOutcome {
    pub account: PublicAccount,
    pub tokens: TokenPair,
}

#[derive(Clone)]
pub struct SessionManager {
    store: Arc<dyn CredentialStore>,
    issuer: TokenIssuer,
    verifier: TokenVerifier,
    clock: Clock,
}

impl SessionManager {
    #[must_use]
    pub fn new(config: &AuthConfig, store: Arc<dyn CredentialStore>) -> Self {
        Self {
            store,
            issuer: TokenIssuer::new(config),
            verifier: TokenVerifier::new(config),
            clock: unix_now,
        }
    }

    #[must_use]
    pub fn with_clock(mut self, clock: Clock) -> Self {
        self.clock = clock;
        self
    }

    fn mint(&self, claims: &Claims) -> Result<TokenPair, AuthError> {
        self.issuer
            .issue_pair(claims, (self.clock)())
            .map_err(|err| AuthError::Upstream(anyhow!(err).context("failed to mint tokens")))
    }

    async fn resolve(&self, identifier: &str) -> Result<Option<Account>, AuthError> {
        let account = if identifier.contains('@') {
            self.store.find_by_email(identifier).await?
        } else {
            self.store.find_by_username(identifier).await?
        };
        Ok(account)
    }

    /// Authenticate by username or email. An identifier containing `@` is
    /// matched against emails only, anything else against usernames only.
    ///
    /// # Errors
    /// - [`AuthError::Validation`] when the identifier or password is blank;
    /// - [`AuthError::NotFound`] when no account matches the identifier;
    /// - [`AuthError::BadCredentials`] when the password does not verify;
    /// - [`AuthError::Upstream`] on store or hashing failures.
    pub async fn login(&self, identifier: &str, password: &str) -> Result<LoginOutcome, AuthError> {
        self.login_with(Some(identifier), None, password).await
    }

    /// Like [`SessionManager::login`] with separate username and email fields:
    /// the username is tried first and the email is the fallback when it does
    /// not resolve to an account.
    ///
    /// # Errors
    /// Same as [`SessionManager::login`].
    pub async fn login_with(
        &self,
        username: Option<&str>,
        email: Option<&str>,
        password: &str,
    ) -> Result<LoginOutcome, AuthError> {
        let identifiers: Vec<String> = [username, email]
            .into_iter()
            .flatten()
            .filter(|value| !value.trim().is_empty())
            .map(normalize)
            .collect();
        if identifiers.is_empty() || password.trim().is_empty() {
            return Err(AuthError::validation("username or email and password are required"));
        }

        let mut found = None;
        for identifier in &identifiers {
            found = self.resolve(identifier).await?;
            if found.is_some() {
                break;
            }
        }
        let Some(account) = found else {
            debug!("Login for unknown identifier");
            return Err(AuthError::NotFound("user does not exist".to_string()));
        };

        let verified =
            password::verify_blocking(password.to_string(), account.password_hash.clone()).await?;
        if !verified {
            warn!("Login rejected for account {}: bad password", account.id);
            return Err(AuthError::BadCredentials);
        }

        let tokens = self.mint(&account.claims())?;
        let update = AccountUpdate {
            refresh_token: Some(Some(tokens.refresh_token.clone())),
            ..AccountUpdate::default()
        };
        match self.store.update(account.id, update).await? {
            UpdateOutcome::Updated(account) => {
                info!("Account {} logged in", account.id);
                Ok(LoginOutcome {
                    account: account.public(),
                    tokens,
                })
            }
            UpdateOutcome::NotFound => Err(AuthError::NotFound("user does not exist".to_string())),
            UpdateOutcome::Conflict => Err(AuthError::Upstream(anyhow!(
                "unexpected conflict while storing refresh token"
            ))),
        }
    }

    /// Rotate a refresh token into a new pair.
    ///
    /// # Errors
    /// - [`AuthError::Unauthorized`] when no token was presented;
    /// - [`AuthError::InvalidRefreshToken`] when it fails verification or names
    ///   an unknown account;
    /// - [`AuthError::ExpiredOrReusedRefresh`] when it is not the stored token,
    ///   including when a concurrent refresh rotated it first.
    pub async fn refresh(&self, incoming: Option<&str>) -> Result<TokenPair, AuthError> {
        let Some(incoming) = incoming.map(str::trim).filter(|token| !token.is_empty()) else {
            return Err(AuthError::unauthorized("unauthorized request"));
        };

        let claims = self
            .verifier
            .verify_refresh(incoming, (self.clock)())
            .map_err(|err| {
                match err {
                    TokenError::Expired => debug!("Refresh token expired"),
                    other => warn!("Refresh token rejected: {other}"),
                }
                AuthError::InvalidRefreshToken
            })?;

        let Some(account) = self.store.find_by_id(claims.account_id).await? else {
            warn!("Refresh token names unknown account {}", claims.account_id);
            return Err(AuthError::InvalidRefreshToken);
        };

        if account.refresh_token.as_deref() != Some(incoming) {
            warn!("Stale refresh token presented for account {}", account.id);
            return Err(AuthError::ExpiredOrReusedRefresh);
        }

        // Claims come from the current account, not the presented token, so a
        // renamed account gets fresh claims on its next refresh.
        let tokens = self.mint(&account.claims())?;
        let swapped = self
            .store
            .swap_refresh_token(account.id, incoming, &tokens.refresh_token)
            .await?;
        if !swapped {
            warn!("Refresh token for account {} rotated concurrently", account.id);
            return Err(AuthError::ExpiredOrReusedRefresh);
        }

        debug!("Rotated refresh token for account {}", account.id);
        Ok(tokens)
    }

    /// Clear the stored refresh token. Idempotent.
    ///
    /// # Errors
    /// Returns [`AuthError::Upstream`] on store failures.
    pub async fn logout(&self, account_id: Uuid) -> Result<(), AuthError> {
        let update = AccountUpdate {
            refresh_token: Some(None),
            ..AccountUpdate::default()
        };
        match self.store.update(account_id, update).await? {
            UpdateOutcome::Updated(_) => info!("Account {account_id} logged out"),
            UpdateOutcome::NotFound => debug!("Logout for missing account {account_id}"),
            UpdateOutcome::Conflict => {
                return Err(AuthError::Upstream(anyhow!(
                    "unexpected conflict while clearing refresh token"
                )));
            }
        }
        Ok(())
    }

    /// Replace the password after checking the current one.
    ///
    /// # Errors
    /// - [`AuthError::Validation`] when a field is blank or the new password
    ///   does not meet the password policy;
    /// - [`AuthError::SamePassword`] when old and new are identical;
    /// - [`AuthError::BadCredentials`] when the old password does not verify;
    /// - [`AuthError::Unauthorized`] when the account no longer exists.
    pub async fn change_password(
        &self,
        account_id: Uuid,
        old_password: &str,
        new_password: &str,
    ) -> Result<(), AuthError> {
        let blank = blank_fields(&[
            ("oldPassword", Some(old_password)),
            ("newPassword", Some(new_password)),
        ]);
        if !blank.is_empty() {
            return Err(AuthError::validation(format!(
                "missing required fields: {}",
                blank.join(", ")
            )));
        }
        if old_password == new_password {
            return Err(AuthError::SamePassword);
        }

        let Some(account) = self.store.find_by_id(account_id).await? else {
            return Err(AuthError::unauthorized("invalid access token"));
        };
        let verified =
            password::verify_blocking(old_password.to_string(), account.password_hash).await?;
        if !verified {
            warn!("Password change rejected for account {account_id}: bad password");
            return Err(AuthError::BadCredentials);
        }
        if !valid_password(new_password) {
            return Err(AuthError::validation(
                "password must be at least 8 characters with a letter, a digit and one of !#$%^*_",
            ));
        }

        let password_hash = password::hash_blocking(new_password.to_string()).await?;
        let update = AccountUpdate {
            password_hash: Some(password_hash),
            ..AccountUpdate::default()
        };
        match self.store.update(account_id, update).await? {
            UpdateOutcome::Updated(_) => {
                info!("Account {account_id} changed password");
                Ok(())
            }
            UpdateOutcome::NotFound => Err(AuthError::unauthorized("invalid access token")),
            UpdateOutcome::Conflict => Err(AuthError::Upstream(anyhow!(
                "unexpected conflict while storing password"
            ))),
        }
    }
}
