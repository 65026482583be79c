//! Token cookies and bearer extraction.

use axum::http::{
    HeaderMap, HeaderValue,
    header::{AUTHORIZATION, COOKIE, InvalidHeaderValue, SET_COOKIE},
};

use crate::auth::{AuthConfig, TokenPair};

pub(crate) const ACCESS_COOKIE_NAME: &str = "accessToken";
pub(crate) const REFRESH_COOKIE_NAME: &str = "refreshToken";

/// Build an `HttpOnly` cookie carrying `token` for `max_age` seconds.
fn token_cookie(
    name: &str,
    token: &str,
    max_age: i64,
    secure: bool,
) -> Result<HeaderValue, InvalidHeaderValue> {
    let mut cookie = format!("{name}={token}; Path=/; HttpOnly; SameSite=Lax; Max-Age={max_age}");
    if secure {
        cookie.push_str("; Secure");
    }
    HeaderValue::from_str(&cookie)
}

fn clear_cookie(name: &str, secure: bool) -> Result<HeaderValue, InvalidHeaderValue> {
    token_cookie(name, "", 0, secure)
}

/// `Set-Cookie` headers for a freshly minted pair.
pub(crate) fn session_cookies(
    config: &AuthConfig,
    tokens: &TokenPair,
) -> Result<HeaderMap, InvalidHeaderValue> {
    let secure = config.cookie_secure();
    let mut headers = HeaderMap::new();
    headers.append(
        SET_COOKIE,
        token_cookie(
            ACCESS_COOKIE_NAME,
            &tokens.access_token,
            config.access_token_ttl_seconds(),
            secure,
        )?,
    );
    headers.append(
        SET_COOKIE,
        token_cookie(
            REFRESH_COOKIE_NAME,
            &tokens.refresh_token,
            config.refresh_token_ttl_seconds(),
            secure,
        )?,
    );
    Ok(headers)
}

/// `Set-Cookie` headers expiring both token cookies.
pub(crate) fn cleared_cookies(config: &AuthConfig) -> HeaderMap {
    let secure = config.cookie_secure();
    let mut headers = HeaderMap::new();
    for name in [ACCESS_COOKIE_NAME, REFRESH_COOKIE_NAME] {
        if let Ok(cookie) = clear_cookie(name, secure) {
            headers.append(SET_COOKIE, cookie);
        }
    }
    headers
}

pub(crate) fn extract_cookie(headers: &HeaderMap, name: &str) -> Option<String> {
    for header in headers.get_all(COOKIE) {
        let Ok(value) = header.to_str() else {
            continue;
        };
        for pair in value.split(';') {
            let mut parts = pair.trim().splitn(2, '=');
            let (Some(key), Some(val)) = (parts.next(), parts.next()) else {
                continue;
            };
            let val = val.trim();
            if key.trim() == name && !val.is_empty() {
                return Some(val.to_string());
            }
        }
    }
    None
}

pub(crate) fn extract_bearer_token(headers: &HeaderMap) -> Option<String> {
    let value = headers.get(AUTHORIZATION)?.to_str().ok()?;
    let trimmed = value.trim();
    let token = trimmed
        .strip_prefix("Bearer ")
        .or_else(|| trimmed.strip_prefix("bearer "))?
        .trim();
    if token.is_empty() {
        None
    } else {
        Some(token.to_string())
    }
}

/// Access token from the cookie, falling back to the `Authorization` header.
pub(crate) fn extract_access_token(headers: &HeaderMap) -> Option<String> {
    extract_cookie(headers, ACCESS_COOKIE_NAME).or_else(|| extract_bearer_token(headers))
}

#[cfg(test)]
mod tests {
    use super::*;
    use secrecy::SecretString;

    fn config() -> AuthConfig {
        AuthConfig::new(SecretString::from("a"), SecretString::from("r"))
            .with_access_token_ttl_seconds(60)
            .with_refresh_token_ttl_seconds(600)
    }

    fn cookies(headers: &HeaderMap) -> Vec<String> {
        headers
            .get_all(SET_COOKIE)
            .iter()
            .filter_map(|v| v.to_str().ok())
            .map(str::to_string)
            .collect()
    }

    #[test]
    fn session_cookies_are_http_only_and_secure() -> Result<(), InvalidHeaderValue> {
        let tokens = TokenPair {
            access_token: "acc".to_string(),
            refresh_token: "ref".to_string(),
        };
        let headers = session_cookies(&config(), &tokens)?;
        let got = cookies(&headers);
        assert_eq!(
            got,
            vec![
                "accessToken=acc; Path=/; HttpOnly; SameSite=Lax; Max-Age=60; Secure",
                "refreshToken=ref; Path=/; HttpOnly; SameSite=Lax; Max-Age=600; Secure",
            ]
        );

        let insecure = config().with_cookie_secure(false);
        let headers = session_cookies(&insecure, &tokens)?;
        assert!(cookies(&headers).iter().all(|c| !c.contains("Secure")));
        Ok(())
    }

    #[test]
    fn cleared_cookies_expire_both() {
        let cleared = cookies(&cleared_cookies(&config()));
        assert_eq!(cleared.len(), 2);
        assert!(cleared.iter().all(|c| c.contains("Max-Age=0")));
        assert!(cleared[0].starts_with("accessToken=;"));
        assert!(cleared[1].starts_with("refreshToken=;"));
    }

    #[test]
    fn cookie_wins_over_bearer() {
        let mut headers = HeaderMap::new();
        headers.insert(AUTHORIZATION, HeaderValue::from_static("Bearer header-token"));
        assert_eq!(
            extract_access_token(&headers).as_deref(),
            Some("header-token")
        );

        headers.insert(
            COOKIE,
            HeaderValue::from_static("theme=dark; accessToken=cookie-token; refreshToken=r"),
        );
        assert_eq!(
            extract_access_token(&headers).as_deref(),
            Some("cookie-token")
        );
        assert_eq!(
            extract_cookie(&headers, REFRESH_COOKIE_NAME).as_deref(),
            Some("r")
        );
    }

    #[test]
    fn empty_or_malformed_credentials_are_absent() {
        let mut headers = HeaderMap::new();
        headers.insert(COOKIE, HeaderValue::from_static("accessToken=; broken"));
        headers.insert(AUTHORIZATION, HeaderValue::from_static("Basic abc"));
        assert!(extract_access_token(&headers).is_none());

        headers.insert(AUTHORIZATION, HeaderValue::from_static("bearer   "));
        assert!(extract_access_token(&headers).is_none());
    }
}
