//! `GET /messages` and `POST /messages`.

use axum::Json;
use axum::body::Bytes;
use axum::extract::{Query, State};
use axum::http::{HeaderMap, HeaderValue, StatusCode, header};
use axum::response::{IntoResponse, Response};
use board_service::MAX_LIST_LIMIT;
use board_service::gate::SubmitRequest;
use board_service::types::Post;
use serde::{Deserialize, Serialize};

use crate::csrf::{CSRF_COOKIE, CSRF_HEADER, cookie_value, issue_cookie, new_token};
use crate::error::ApiError;
use crate::state::AppState;

/// Key used when no forwarding header identifies the client.
const UNKNOWN_CLIENT: &str = "unknown";

#[derive(Debug, Deserialize)]
pub struct ListParams {
    pub limit: Option<usize>,
}

#[derive(Serialize)]
pub struct ListResponse {
    pub messages: Vec<Post>,
}

#[derive(Serialize)]
pub struct CreatedResponse {
    pub message: Post,
}

/// Lists the newest posts and hands out (or renews) the CSRF cookie.
pub async fn list_messages(
    State(state): State<AppState>,
    Query(params): Query<ListParams>,
    headers: HeaderMap,
) -> Result<Response, ApiError> {
    let messages = state
        .recent(params.limit.unwrap_or(MAX_LIST_LIMIT))
        .await?;

    let cookie = cookie_value(&headers, CSRF_COOKIE)
        .filter(|t| !t.is_empty())
        .and_then(|t| HeaderValue::from_str(&issue_cookie(t, state.secure_cookie())).ok())
        .or_else(|| HeaderValue::from_str(&issue_cookie(&new_token(), state.secure_cookie())).ok());

    let mut response = Json(ListResponse { messages }).into_response();
    let headers = response.headers_mut();
    headers.insert(header::CACHE_CONTROL, HeaderValue::from_static("no-store"));
    if let Some(cookie) = cookie {
        headers.insert(header::SET_COOKIE, cookie);
    }
    Ok(response)
}

/// Runs the write gate over the raw request and stores the post.
///
/// The body is taken as raw bytes so content-type and schema errors are
/// reported in gate order rather than by an extractor.
pub async fn create_message(
    State(state): State<AppState>,
    headers: HeaderMap,
    body: Bytes,
) -> Result<impl IntoResponse, ApiError> {
    let client_key = client_key(&headers);
    let req = SubmitRequest {
        origin: header_str(&headers, header::ORIGIN.as_str()),
        referer: header_str(&headers, header::REFERER.as_str()),
        sec_fetch_site: header_str(&headers, "sec-fetch-site"),
        requested_with: header_str(&headers, "x-requested-with"),
        user_agent: header_str(&headers, header::USER_AGENT.as_str()),
        csrf_header: header_str(&headers, CSRF_HEADER),
        csrf_cookie: cookie_value(&headers, CSRF_COOKIE),
        client_key,
        content_type: header_str(&headers, header::CONTENT_TYPE.as_str()),
        body: &body,
    };

    let message = state.submit(&req).await?;
    Ok((StatusCode::CREATED, Json(CreatedResponse { message })))
}

/// Client key for rate limiting: first `X-Forwarded-For` hop, then
/// `X-Real-IP`, then a shared `"unknown"` bucket.
pub fn client_key(headers: &HeaderMap) -> &str {
    if let Some(xff) = header_str(headers, "x-forwarded-for") {
        return xff
            .split(',')
            .next()
            .map(str::trim)
            .filter(|hop| !hop.is_empty())
            .unwrap_or(UNKNOWN_CLIENT);
    }
    header_str(headers, "x-real-ip").unwrap_or(UNKNOWN_CLIENT)
}

fn header_str<'a>(headers: &'a HeaderMap, name: &str) -> Option<&'a str> {
    headers.get(name).and_then(|v| v.to_str().ok())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn headers(pairs: &[(&'static str, &'static str)]) -> HeaderMap {
        let mut map = HeaderMap::new();
        for (k, v) in pairs {
            map.insert(*k, HeaderValue::from_static(v));
        }
        map
    }

    #[test]
    fn client_key_prefers_first_forwarded_hop() {
        let h = headers(&[
            ("x-forwarded-for", " 203.0.113.7 , 10.0.0.1"),
            ("x-real-ip", "198.51.100.2"),
        ]);
        assert_eq!(client_key(&h), "203.0.113.7");
    }

    #[test]
    fn client_key_falls_back_to_real_ip() {
        let h = headers(&[("x-real-ip", "198.51.100.2")]);
        assert_eq!(client_key(&h), "198.51.100.2");
    }

    #[test]
    fn client_key_defaults_to_unknown() {
        assert_eq!(client_key(&HeaderMap::new()), "unknown");
        assert_eq!(client_key(&headers(&[("x-forwarded-for", " ,1.2.3.4")])), "unknown");
    }
}
