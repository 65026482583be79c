//! Small helpers for registration and account input validation.

use regex::Regex;

/// Characters of which a password must contain at least one.
const PASSWORD_SYMBOLS: &[char] = &['!', '#', '$', '%', '^', '*', '_'];
const PASSWORD_MIN_LEN: usize = 8;
const USERNAME_MIN_LENGTH: usize = 3;
const USERNAME_MAX_LENGTH: usize = 32;

/// Normalize a username or email for lookup/uniqueness checks.
pub(crate) fn normalize(value: &str) -> String {
    value.trim().to_lowercase()
}

/// Lowercase letters, digits, `_` and `-`, starting with a letter or digit.
/// Keeps usernames disjoint from emails so a login identifier resolves to at
/// most one account.
pub(crate) fn valid_username(username_normalized: &str) -> bool {
    let length = username_normalized.len();
    if !(USERNAME_MIN_LENGTH..=USERNAME_MAX_LENGTH).contains(&length) {
        return false;
    }
    Regex::new(r"^[a-z0-9][a-z0-9_-]*$").is_ok_and(|regex| regex.is_match(username_normalized))
}

/// Basic email format check on already-normalized input.
pub(crate) fn valid_email(email_normalized: &str) -> bool {
    Regex::new(r"^[^@\s]+@[^@\s]+\.[^@\s]+$").is_ok_and(|regex| regex.is_match(email_normalized))
}

/// Password policy: no whitespace, at least eight characters, and at least one
/// letter, one digit and one symbol from [`PASSWORD_SYMBOLS`].
pub(crate) fn valid_password(password: &str) -> bool {
    password.chars().count() >= PASSWORD_MIN_LEN
        && !password.chars().any(char::is_whitespace)
        && password.chars().any(|c| c.is_ascii_alphabetic())
        && password.chars().any(|c| c.is_ascii_digit())
        && password.chars().any(|c| PASSWORD_SYMBOLS.contains(&c))
}

/// Names of the fields whose value is missing or blank, in input order.
pub(crate) fn blank_fields<'a>(fields: &[(&'a str, Option<&str>)]) -> Vec<&'a str> {
    fields
        .iter()
        .filter(|(_, value)| value.is_none_or(|v| v.trim().is_empty()))
        .map(|(name, _)| *name)
        .collect()
}
