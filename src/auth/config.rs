//! Token secrets, lifetimes and cookie policy.
//!
//! Built once at startup from CLI/env arguments and shared by reference; nothing
//! in the auth core reads the process environment at call time.

use anyhow::{Result, bail};
use secrecy::{ExposeSecret, SecretString};

const DEFAULT_ACCESS_TOKEN_TTL_SECONDS: i64 = 15 * 60;
const DEFAULT_REFRESH_TOKEN_TTL_SECONDS: i64 = 10 * 24 * 60 * 60;

#[derive(Clone, Debug)]
pub struct AuthConfig {
    access_token_secret: SecretString,
    refresh_token_secret: SecretString,
    access_token_ttl_seconds: i64,
    refresh_token_ttl_seconds: i64,
    cookie_secure: bool,
}

impl AuthConfig {
    #[must_use]
    pub fn new(access_token_secret: SecretString, refresh_token_secret: SecretString) -> Self {
        Self {
            access_token_secret,
            refresh_token_secret,
            access_token_ttl_seconds: DEFAULT_ACCESS_TOKEN_TTL_SECONDS,
            refresh_token_ttl_seconds: DEFAULT_REFRESH_TOKEN_TTL_SECONDS,
            cookie_secure: true,
        }
    }

    #[must_use]
    pub fn with_access_token_ttl_seconds(mut self, seconds: i64) -> Self {
        self.access_token_ttl_seconds = seconds;
        self
    }

    #[must_use]
    pub fn with_refresh_token_ttl_seconds(mut self, seconds: i64) -> Self {
        self.refresh_token_ttl_seconds = seconds;
        self
    }

    #[must_use]
    pub fn with_cookie_secure(mut self, secure: bool) -> Self {
        self.cookie_secure = secure;
        self
    }

    /// Reject configurations that would mint unusable or interchangeable tokens.
    ///
    /// # Errors
    /// Returns an error if a secret is empty or shared between both kinds, a TTL
    /// is not positive, or the access TTL is not shorter than the refresh TTL.
    pub fn validate(&self) -> Result<()> {
        if self.access_token_secret.expose_secret().is_empty() {
            bail!("access token secret must not be empty");
        }
        if self.refresh_token_secret.expose_secret().is_empty() {
            bail!("refresh token secret must not be empty");
        }
        if self.access_token_secret.expose_secret() == self.refresh_token_secret.expose_secret() {
            bail!("access and refresh token secrets must differ");
        }
        if self.access_token_ttl_seconds <= 0 || self.refresh_token_ttl_seconds <= 0 {
            bail!("token TTLs must be positive");
        }
        if self.access_token_ttl_seconds >= self.refresh_token_ttl_seconds {
            bail!(
                "access token TTL ({}s) must be shorter than refresh token TTL ({}s)",
                self.access_token_ttl_seconds,
                self.refresh_token_ttl_seconds
            );
        }
        Ok(())
    }

    pub(crate) fn access_token_secret(&self) -> &SecretString {
        &self.access_token_secret
    }

    pub(crate) fn refresh_token_secret(&self) -> &SecretString {
        &self.refresh_token_secret
    }

    #[must_use]
    pub fn access_token_ttl_seconds(&self) -> i64 {
        self.access_token_ttl_seconds
    }

    #[must_use]
    pub fn refresh_token_ttl_seconds(&self) -> i64 {
        self.refresh_token_ttl_seconds
    }

    #[must_use]
    pub fn cookie_secure(&self) -> bool {
        self.cookie_secure
    }
}
