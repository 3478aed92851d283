//! Refresh token cookie helpers.

use axum::http::{header, HeaderMap, HeaderValue};
use std::time::Duration;

pub const REFRESH_COOKIE_NAME: &str = "refresh_token";

/// Path the refresh cookie is scoped to. Covers refresh and logout.
pub const REFRESH_COOKIE_PATH: &str = "/auth";

/// Build the `Set-Cookie` value carrying a refresh token.
pub fn build_set_cookie(token: &str, max_age: Duration, secure: bool) -> String {
    let mut cookie = format!(
        "{REFRESH_COOKIE_NAME}={token}; Path={REFRESH_COOKIE_PATH}; Max-Age={}; HttpOnly; SameSite=Lax",
        max_age.as_secs()
    );
    if secure {
        cookie.push_str("; Secure");
    }
    cookie
}

/// Build the `Set-Cookie` value that removes the refresh cookie.
pub fn build_clear_cookie(secure: bool) -> String {
    build_set_cookie("", Duration::ZERO, secure)
}

/// Convert a cookie string into a header value.
///
/// Tokens are base64url and the attributes are ASCII, so this only fails on
/// a corrupted token.
pub fn to_header_value(cookie: &str) -> Option<HeaderValue> {
    HeaderValue::from_str(cookie).ok()
}

/// Read a cookie by name from the `Cookie` headers.
pub fn get_cookie<'a>(headers: &'a HeaderMap, name: &str) -> Option<&'a str> {
    headers
        .get_all(header::COOKIE)
        .iter()
        .filter_map(|value| value.to_str().ok())
        .flat_map(|value| value.split(';'))
        .filter_map(|pair| pair.trim().split_once('='))
        .find(|(key, _)| *key == name)
        .map(|(_, value)| value.trim())
        .filter(|value| !value.is_empty())
}
