//! Double-submit CSRF cookie helpers.

use axum::http::HeaderMap;
use axum::http::header::COOKIE;
use uuid::Uuid;

pub const CSRF_COOKIE: &str = "board_csrf";
pub const CSRF_HEADER: &str = "x-board-csrf";

/// Cookie lifetime in seconds (24 h).
pub const CSRF_MAX_AGE: u64 = 86_400;

/// Finds a cookie value across all `Cookie` headers.
pub fn cookie_value<'a>(headers: &'a HeaderMap, name: &str) -> Option<&'a str> {
    headers
        .get_all(COOKIE)
        .iter()
        .filter_map(|v| v.to_str().ok())
        .flat_map(|v| v.split(';'))
        .filter_map(|pair| pair.trim().split_once('='))
        .find(|(k, _)| *k == name)
        .map(|(_, v)| v.trim())
}

/// Builds the `Set-Cookie` value for a CSRF token.
///
/// The cookie is readable from scripts so the page can echo it back in
/// the `X-Board-Csrf` header.
pub fn issue_cookie(token: &str, secure: bool) -> String {
    let mut cookie = format!("{CSRF_COOKIE}={token}; Path=/; Max-Age={CSRF_MAX_AGE}; SameSite=Lax");
    if secure {
        cookie.push_str("; Secure");
    }
    cookie
}

pub fn new_token() -> String {
    Uuid::new_v4().to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::HeaderValue;

    #[test]
    fn finds_cookie_among_others() {
        let mut headers = HeaderMap::new();
        headers.insert(COOKIE, HeaderValue::from_static("theme=dark; board_csrf=abc ; x=1"));
        assert_eq!(cookie_value(&headers, CSRF_COOKIE), Some("abc"));
        assert_eq!(cookie_value(&headers, "missing"), None);
    }

    #[test]
    fn searches_every_cookie_header() {
        let mut headers = HeaderMap::new();
        headers.append(COOKIE, HeaderValue::from_static("a=1"));
        headers.append(COOKIE, HeaderValue::from_static("board_csrf=zz"));
        assert_eq!(cookie_value(&headers, CSRF_COOKIE), Some("zz"));
    }

    #[test]
    fn cookie_attributes() {
        let plain = issue_cookie("t", false);
        assert_eq!(plain, "board_csrf=t; Path=/; Max-Age=86400; SameSite=Lax");
        assert!(!plain.contains("HttpOnly"));
        assert!(issue_cookie("t", true).ends_with("; Secure"));
    }

    #[test]
    fn tokens_are_unique() {
        assert_ne!(new_token(), new_token());
    }
}
