//! Admin gate: a static token presented as a Bearer header or a cookie

use crate::config::ServerConfig;
use hyper::header::{HeaderMap, AUTHORIZATION, COOKIE};

/// Lifetime of the admin cookie set by a successful login
const COOKIE_MAX_AGE_SECS: u64 = 12 * 60 * 60;

/// Outcome of checking a request against the admin token
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AdminAccess {
    /// No admin token configured; the admin surface does not exist
    Disabled,
    Denied,
    Granted,
}

/// Compares two secrets without short-circuiting on the first mismatch
pub fn constant_time_eq(a: &[u8], b: &[u8]) -> bool {
    if a.len() != b.len() {
        return false;
    }
    a.iter().zip(b).fold(0u8, |acc, (x, y)| acc | (x ^ y)) == 0
}

fn bearer_token(headers: &HeaderMap) -> Option<&str> {
    headers
        .get(AUTHORIZATION)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.strip_prefix("Bearer "))
        .map(str::trim)
}

/// Value of cookie `name` across every Cookie header
pub fn cookie_value<'a>(headers: &'a HeaderMap, name: &str) -> Option<&'a str> {
    headers
        .get_all(COOKIE)
        .iter()
        .filter_map(|v| v.to_str().ok())
        .flat_map(|v| v.split(';'))
        .filter_map(|pair| pair.trim().split_once('='))
        .find(|(key, _)| *key == name)
        .map(|(_, value)| value)
}

/// Checks a presented token against the configured one
pub fn check_token(config: &ServerConfig, presented: &str) -> AdminAccess {
    match config.admin_token.as_deref() {
        None => AdminAccess::Disabled,
        Some(expected) if constant_time_eq(expected.as_bytes(), presented.as_bytes()) => {
            AdminAccess::Granted
        }
        Some(_) => AdminAccess::Denied,
    }
}

/// Checks request headers for admin credentials
pub fn authorize(config: &ServerConfig, headers: &HeaderMap) -> AdminAccess {
    if config.admin_token.is_none() {
        return AdminAccess::Disabled;
    }
    let presented = bearer_token(headers).or_else(|| cookie_value(headers, &config.admin_cookie));
    match presented {
        Some(token) => check_token(config, token),
        None => AdminAccess::Denied,
    }
}

/// Set-Cookie value for a logged-in admin
pub fn login_cookie(config: &ServerConfig, token: &str) -> String {
    format!(
        "{}={}; Path=/; HttpOnly; SameSite=Strict; Max-Age={}",
        config.admin_cookie, token, COOKIE_MAX_AGE_SECS
    )
}

/// Set-Cookie value that clears the admin cookie
pub fn logout_cookie(config: &ServerConfig) -> String {
    format!(
        "{}=; Path=/; HttpOnly; SameSite=Strict; Max-Age=0",
        config.admin_cookie
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use hyper::header::HeaderValue;

    const TOKEN: &str = "0123456789abcdef";

    fn config(token: Option<&str>) -> ServerConfig {
        ServerConfig {
            admin_token: token.map(String::from),
            ..ServerConfig::default()
        }
    }

    #[test]
    fn test_constant_time_eq() {
        assert!(constant_time_eq(b"abc", b"abc"));
        assert!(!constant_time_eq(b"abc", b"abd"));
        assert!(!constant_time_eq(b"abc", b"abcd"));
    }

    #[test]
    fn test_disabled_without_token() {
        let mut headers = HeaderMap::new();
        headers.insert(AUTHORIZATION, HeaderValue::from_static("Bearer anything"));
        assert_eq!(authorize(&config(None), &headers), AdminAccess::Disabled);
    }

    #[test]
    fn test_bearer_and_cookie() {
        let cfg = config(Some(TOKEN));
        let mut headers = HeaderMap::new();
        assert_eq!(authorize(&cfg, &headers), AdminAccess::Denied);

        headers.insert(
            AUTHORIZATION,
            HeaderValue::from_str(&format!("Bearer {TOKEN}")).expect("header"),
        );
        assert_eq!(authorize(&cfg, &headers), AdminAccess::Granted);

        let mut headers = HeaderMap::new();
        headers.insert(
            COOKIE,
            HeaderValue::from_str(&format!("theme=dark; vantage_admin={TOKEN}")).expect("header"),
        );
        assert_eq!(authorize(&cfg, &headers), AdminAccess::Granted);

        let mut headers = HeaderMap::new();
        headers.insert(COOKIE, HeaderValue::from_static("vantage_admin=wrong"));
        assert_eq!(authorize(&cfg, &headers), AdminAccess::Denied);
    }

    #[test]
    fn test_cookie_strings() {
        let cfg = config(Some(TOKEN));
        assert!(login_cookie(&cfg, TOKEN).starts_with("vantage_admin=0123456789abcdef; "));
        assert!(logout_cookie(&cfg).contains("Max-Age=0"));
    }
}
