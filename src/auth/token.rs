//! HS256 access and refresh tokens.
//!
//! Tokens are compact JWTs: `base64url(header).base64url(payload).base64url(mac)`.
//! Access and refresh tokens carry the same claim set and are told apart by the
//! secret that signs them and by the `typ` field of the payload. Every token
//! carries a ULID `jti`, so two tokens minted for the same account within the
//! same second still differ.

use base64ct::{Base64UrlUnpadded, Encoding};
use hmac::{Hmac, Mac};
use secrecy::{ExposeSecret, SecretString};
use serde::{Deserialize, Serialize};
use sha2::Sha256;
use thiserror::Error;
use ulid::Ulid;
use uuid::Uuid;

use super::config::AuthConfig;

type HmacSha256 = Hmac<Sha256>;

const ALGORITHM: &str = "HS256";

#[derive(Debug, Error)]
pub enum TokenError {
    #[error("token expired")]
    Expired,
    #[error("invalid signature")]
    InvalidSignature,
    #[error("malformed token")]
    Malformed,
    #[error("invalid json")]
    Json(#[from] serde_json::Error),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TokenKind {
    Access,
    Refresh,
}

/// Identity attributes embedded in both token kinds.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Claims {
    #[serde(rename = "sub")]
    pub account_id: Uuid,
    pub email: String,
    pub username: String,
    #[serde(rename = "name")]
    pub full_name: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
struct TokenHeader {
    alg: String,
    typ: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
struct TokenPayload {
    #[serde(flatten)]
    claims: Claims,
    typ: TokenKind,
    iat: i64,
    exp: i64,
    jti: String,
}

/// Freshly minted access + refresh tokens.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, utoipa::ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct TokenPair {
    pub access_token: String,
    pub refresh_token: String,
}

fn b64e_json<T: Serialize>(value: &T) -> Result<String, TokenError> {
    let json = serde_json::to_vec(value)?;
    Ok(Base64UrlUnpadded::encode_string(&json))
}

fn b64d_json<T: for<'de> Deserialize<'de>>(s: &str) -> Result<T, TokenError> {
    let bytes = Base64UrlUnpadded::decode_vec(s).map_err(|_| TokenError::Malformed)?;
    serde_json::from_slice(&bytes).map_err(|_| TokenError::Malformed)
}

fn mac(secret: &SecretString, signing_input: &str) -> Result<HmacSha256, TokenError> {
    let mut mac = HmacSha256::new_from_slice(secret.expose_secret().as_bytes())
        .map_err(|_| TokenError::Malformed)?;
    mac.update(signing_input.as_bytes());
    Ok(mac)
}

/// Sign a token of `kind` for `claims`, valid for `ttl_seconds` from `now_unix_seconds`.
///
/// # Errors
/// Returns an error if the header or payload cannot be encoded.
pub fn sign(
    kind: TokenKind,
    claims: &Claims,
    secret: &SecretString,
    ttl_seconds: i64,
    now_unix_seconds: i64,
) -> Result<String, TokenError> {
    let header = TokenHeader {
        alg: ALGORITHM.to_string(),
        typ: "JWT".to_string(),
    };
    let payload = TokenPayload {
        claims: claims.clone(),
        typ: kind,
        iat: now_unix_seconds,
        exp: now_unix_seconds.saturating_add(ttl_seconds),
        jti: Ulid::new().to_string(),
    };

    let signing_input = format!("{}.{}", b64e_json(&header)?, b64e_json(&payload)?);
    let signature = mac(secret, &signing_input)?.finalize().into_bytes();
    let signature_b64 = Base64UrlUnpadded::encode_string(&signature);

    Ok(format!("{signing_input}.{signature_b64}"))
}

/// Verify a token of `kind` and return its claims.
///
/// The MAC is checked before any part of the token is decoded, so a tampered
/// token always fails with [`TokenError::InvalidSignature`] rather than with an
/// error derived from attacker-controlled content.
///
/// # Errors
/// - [`TokenError::Malformed`] if the token is not three base64url segments, or
///   its (authentic) header or payload is not what this service mints;
/// - [`TokenError::InvalidSignature`] if the MAC does not match `secret`;
/// - [`TokenError::Expired`] if `exp` is not after `now_unix_seconds`.
pub fn verify(
    token: &str,
    kind: TokenKind,
    secret: &SecretString,
    now_unix_seconds: i64,
) -> Result<Claims, TokenError> {
    let mut parts = token.split('.');
    let header_b64 = parts.next().ok_or(TokenError::Malformed)?;
    let payload_b64 = parts.next().ok_or(TokenError::Malformed)?;
    let signature_b64 = parts.next().ok_or(TokenError::Malformed)?;
    if parts.next().is_some() || header_b64.is_empty() || payload_b64.is_empty() {
        return Err(TokenError::Malformed);
    }

    let signature =
        Base64UrlUnpadded::decode_vec(signature_b64).map_err(|_| TokenError::Malformed)?;
    mac(secret, &format!("{header_b64}.{payload_b64}"))?
        .verify_slice(&signature)
        .map_err(|_| TokenError::InvalidSignature)?;

    let header: TokenHeader = b64d_json(header_b64)?;
    if header.alg != ALGORITHM {
        return Err(TokenError::Malformed);
    }

    let payload: TokenPayload = b64d_json(payload_b64)?;
    if payload.typ != kind {
        return Err(TokenError::Malformed);
    }
    if payload.exp <= now_unix_seconds {
        return Err(TokenError::Expired);
    }

    Ok(payload.claims)
}

/// Mints access and refresh tokens with the configured secrets and lifetimes.
#[derive(Clone, Debug)]
pub struct TokenIssuer {
    access_secret: SecretString,
    access_ttl_seconds: i64,
    refresh_secret: SecretString,
    refresh_ttl_seconds: i64,
}

impl TokenIssuer {
    #[must_use]
    pub fn new(config: &AuthConfig) -> Self {
        Self {
            access_secret: config.access_token_secret().clone(),
            access_ttl_seconds: config.access_token_ttl_seconds(),
            refresh_secret: config.refresh_token_secret().clone(),
            refresh_ttl_seconds: config.refresh_token_ttl_seconds(),
        }
    }

    /// # Errors
    /// Returns an error if the token cannot be encoded.
    pub fn issue_access(
        &self,
        claims: &Claims,
        now_unix_seconds: i64,
    ) -> Result<String, TokenError> {
        sign(
            TokenKind::Access,
            claims,
            &self.access_secret,
            self.access_ttl_seconds,
            now_unix_seconds,
        )
    }

    /// # Errors
    /// Returns an error if the token cannot be encoded.
    pub fn issue_refresh(
        &self,
        claims: &Claims,
        now_unix_seconds: i64,
    ) -> Result<String, TokenError> {
        sign(
            TokenKind::Refresh,
            claims,
            &self.refresh_secret,
            self.refresh_ttl_seconds,
            now_unix_seconds,
        )
    }

    /// # Errors
    /// Returns an error if either token cannot be encoded.
    pub fn issue_pair(
        &self,
        claims: &Claims,
        now_unix_seconds: i64,
    ) -> Result<TokenPair, TokenError> {
        Ok(TokenPair {
            access_token: self.issue_access(claims, now_unix_seconds)?,
            refresh_token: self.issue_refresh(claims, now_unix_seconds)?,
        })
    }
}

/// Verifies tokens minted by a [`TokenIssuer`] built from the same config.
#[derive(Clone, Debug)]
pub struct TokenVerifier {
    access_secret: SecretString,
    refresh_secret: SecretString,
}

impl TokenVerifier {
    #[must_use]
    pub fn new(config: &AuthConfig) -> Self {
        Self {
            access_secret: config.access_token_secret().clone(),
            refresh_secret: config.refresh_token_secret().clone(),
        }
    }

    /// # Errors
    /// See [`verify`].
    pub fn verify_access(&self, token: &str, now_unix_seconds: i64) -> Result<Claims, TokenError> {
        verify(token, TokenKind::Access, &self.access_secret, now_unix_seconds)
    }

    /// # Errors
    /// See [`verify`].
    pub fn verify_refresh(&self, token: &str, now_unix_seconds: i64) -> Result<Claims, TokenError> {
        verify(
            token,
            TokenKind::Refresh,
            &self.refresh_secret,
            now_unix_seconds,
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const NOW: i64 = 1_700_000_000;

    fn claims() -> Claims {
        Claims {
            account_id: Uuid::nil(),
            email: "alice@x.com".to_string(),
            username: "alice".to_string(),
            full_name: "Alice Liddell".to_string(),
        }
    }

    fn config() -> AuthConfig {
        AuthConfig::new(
            SecretString::from("access-secret"),
            SecretString::from("refresh-secret"),
        )
        .with_access_token_ttl_seconds(60)
        .with_refresh_token_ttl_seconds(600)
    }

    #[test]
    fn access_token_round_trips() -> Result<(), TokenError> {
        let config = config();
        let token = TokenIssuer::new(&config).issue_access(&claims(), NOW)?;
        let verified = TokenVerifier::new(&config).verify_access(&token, NOW + 30)?;
        assert_eq!(verified, claims());
        Ok(())
    }

    #[test]
    fn tokens_differ_within_the_same_second() -> Result<(), TokenError> {
        let issuer = TokenIssuer::new(&config());
        let first = issuer.issue_pair(&claims(), NOW)?;
        let second = issuer.issue_pair(&claims(), NOW)?;
        assert_ne!(first.access_token, second.access_token);
        assert_ne!(first.refresh_token, second.refresh_token);
        Ok(())
    }

    #[test]
    fn expiry_is_enforced_per_kind() -> Result<(), TokenError> {
        let config = config();
        let pair = TokenIssuer::new(&config).issue_pair(&claims(), NOW)?;
        let verifier = TokenVerifier::new(&config);

        assert!(matches!(
            verifier.verify_access(&pair.access_token, NOW + 60),
            Err(TokenError::Expired)
        ));
        assert!(verifier.verify_refresh(&pair.refresh_token, NOW + 60).is_ok());
        assert!(matches!(
            verifier.verify_refresh(&pair.refresh_token, NOW + 600),
            Err(TokenError::Expired)
        ));
        Ok(())
    }

    #[test]
    fn wrong_secret_is_invalid_signature() -> Result<(), TokenError> {
        let token = sign(
            TokenKind::Access,
            &claims(),
            &SecretString::from("someone-else"),
            60,
            NOW,
        )?;
        let result = TokenVerifier::new(&config()).verify_access(&token, NOW);
        assert!(matches!(result, Err(TokenError::InvalidSignature)));
        Ok(())
    }

    #[test]
    fn expired_and_forged_reports_signature_first() -> Result<(), TokenError> {
        let token = sign(
            TokenKind::Access,
            &claims(),
            &SecretString::from("someone-else"),
            60,
            NOW - 3600,
        )?;
        let result = TokenVerifier::new(&config()).verify_access(&token, NOW);
        assert!(matches!(result, Err(TokenError::InvalidSignature)));
        Ok(())
    }

    #[test]
    fn tampered_payload_is_invalid_signature() -> Result<(), TokenError> {
        let config = config();
        let token = TokenIssuer::new(&config).issue_access(&claims(), NOW)?;
        let mut parts: Vec<&str> = token.split('.').collect();
        let mut forged_claims = claims();
        forged_claims.username = "mallory".to_string();
        let forged = b64e_json(&TokenPayload {
            claims: forged_claims,
            typ: TokenKind::Access,
            iat: NOW,
            exp: NOW + 60,
            jti: "forged".to_string(),
        })?;
        parts[1] = &forged;
        let result = TokenVerifier::new(&config).verify_access(&parts.join("."), NOW);
        assert!(matches!(result, Err(TokenError::InvalidSignature)));
        Ok(())
    }

    #[test]
    fn refresh_token_is_not_an_access_token() -> Result<(), TokenError> {
        let config = config();
        let pair = TokenIssuer::new(&config).issue_pair(&claims(), NOW)?;
        let verifier = TokenVerifier::new(&config);
        assert!(matches!(
            verifier.verify_access(&pair.refresh_token, NOW),
            Err(TokenError::InvalidSignature)
        ));

        // Even with a shared secret the payload kind keeps them apart.
        let shared = SecretString::from("shared");
        let refresh = sign(TokenKind::Refresh, &claims(), &shared, 60, NOW)?;
        assert!(matches!(
            verify(&refresh, TokenKind::Access, &shared, NOW),
            Err(TokenError::Malformed)
        ));
        Ok(())
    }

    #[test]
    fn garbage_is_malformed() {
        let verifier = TokenVerifier::new(&config());
        for token in ["", "abc", "a.b", "a.b.c.d", "..", "a.b.!!!"] {
            assert!(
                matches!(
                    verifier.verify_access(token, NOW),
                    Err(TokenError::Malformed)
                ),
                "expected malformed for {token:?}"
            );
        }
    }
}
