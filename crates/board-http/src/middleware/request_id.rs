//! Tags each request with an ID that ends up in logs and on the response.

use axum::extract::Request;
use axum::http::{HeaderName, HeaderValue};
use axum::middleware::Next;
use axum::response::Response;
use tracing::Instrument;
use uuid::Uuid;

pub static X_REQUEST_ID: HeaderName = HeaderName::from_static("x-request-id");

/// Longest caller-supplied ID that is echoed back.
const MAX_ID_LEN: usize = 64;

/// Caller IDs are reused only if they are short and log-safe.
fn acceptable(id: &str) -> bool {
    (1..=MAX_ID_LEN).contains(&id.len())
        && id
            .bytes()
            .all(|b| b.is_ascii_alphanumeric() || matches!(b, b'-' | b'_' | b'.'))
}

fn request_id_for(req: &Request) -> HeaderValue {
    req.headers()
        .get(&X_REQUEST_ID)
        .filter(|v| v.to_str().is_ok_and(acceptable))
        .cloned()
        .unwrap_or_else(|| {
            HeaderValue::try_from(Uuid::new_v4().to_string())
                .unwrap_or_else(|_| HeaderValue::from_static("unknown"))
        })
}

/// Sets `X-Request-Id` on the request and the response.
///
/// A well-formed incoming ID is kept, anything else is replaced by a UUID v4.
/// Handlers run inside a `request` span carrying the ID, method and path.
pub async fn request_id_middleware(mut req: Request, next: Next) -> Response {
    let id = request_id_for(&req);
    req.headers_mut().insert(X_REQUEST_ID.clone(), id.clone());

    let span = tracing::info_span!(
        "request",
        request_id = id.to_str().unwrap_or_default(),
        method = %req.method(),
        path = req.uri().path(),
    );
    let mut response = next.run(req).instrument(span).await;
    response.headers_mut().insert(X_REQUEST_ID.clone(), id);
    response
}
