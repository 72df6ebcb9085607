//! Board HTTP: REST transport adapter for the board server.
//!
//! Provides:
//! - `GET /messages` (newest posts plus the CSRF cookie)
//! - `POST /messages` (write gate, then store)
//! - `GET /messages/feed` (server-sent change events)
//! - `/health` and `/metrics`
//! - Request-ID middleware

pub mod csrf;
pub mod error;
pub mod middleware;
pub mod routes;
pub mod state;

use std::future::Future;

use axum::Router;
use axum::routing::get;
use tokio::net::TcpListener;
use tower_http::compression::CompressionLayer;
use tower_http::trace::TraceLayer;

pub use error::{ApiError, ErrorBody};
pub use state::AppState;

/// Builds the HTTP API router.
pub fn router(state: AppState) -> Router {
    Router::new()
        .route(
            "/messages",
            get(routes::messages::list_messages).post(routes::messages::create_message),
        )
        .route("/messages/feed", get(routes::feed::message_feed))
        .route("/health", get(routes::system::health))
        .route("/metrics", get(routes::system::metrics_endpoint))
        .layer(CompressionLayer::new())
        .layer(TraceLayer::new_for_http())
        .layer(axum::middleware::from_fn(
            middleware::request_id::request_id_middleware,
        ))
        .with_state(state)
}

/// Serves the router on `listener` until `shutdown` resolves.
pub async fn serve(
    listener: TcpListener,
    state: AppState,
    shutdown: impl Future<Output = ()> + Send + 'static,
) -> std::io::Result<()> {
    axum::serve(listener, router(state))
        .with_graceful_shutdown(shutdown)
        .await
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use axum::body::Body;
    use axum::http::{Request, StatusCode, header};
    use board_service::ServiceConfig;
    use tower::ServiceExt;

    use super::*;

    fn app() -> Router {
        router(AppState::new_in_memory(&ServiceConfig {
            global_cooldown: Duration::ZERO,
            min_interval: Duration::ZERO,
            ..ServiceConfig::default()
        }))
    }

    #[tokio::test]
    async fn list_sets_csrf_cookie_and_request_id() {
        let resp = app()
            .oneshot(Request::get("/messages").body(Body::empty()).unwrap())
            .await
            .unwrap();

        assert_eq!(resp.status(), StatusCode::OK);
        let cookie = resp.headers()[header::SET_COOKIE].to_str().unwrap();
        assert!(cookie.starts_with("board_csrf="));
        assert!(resp.headers().contains_key("x-request-id"));
    }

    #[tokio::test]
    async fn request_id_is_propagated() {
        let resp = app()
            .oneshot(
                Request::get("/health")
                    .header("x-request-id", "abc-123")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(resp.headers()["x-request-id"], "abc-123");
    }

    #[tokio::test]
    async fn post_without_origin_is_forbidden() {
        let resp = app()
            .oneshot(
                Request::post("/messages")
                    .header(header::CONTENT_TYPE, "application/json")
                    .body(Body::from(r#"{"author":"a","body":"b"}"#))
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(resp.status(), StatusCode::FORBIDDEN);
    }

    #[tokio::test]
    async fn lagging_feed_stream_is_closed() {
        let state = AppState::new_in_memory(&ServiceConfig::default());
        let resp = router(state.clone())
            .oneshot(Request::get("/messages/feed").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(resp.status(), StatusCode::OK);

        // More inserts than the feed buffers, before the client reads any.
        for i in 0..300 {
            state.store().insert("a", &format!("n{i}")).await.unwrap();
        }

        let body = tokio::time::timeout(
            Duration::from_secs(5),
            axum::body::to_bytes(resp.into_body(), usize::MAX),
        )
        .await
        .expect("stream should end after lagging")
        .unwrap();
        assert!(body.is_empty());
        assert_eq!(state.metrics().feed_dropped(), 44);
    }

    #[tokio::test]
    async fn metrics_are_plain_text() {
        let resp = app()
            .oneshot(Request::get("/metrics").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(resp.status(), StatusCode::OK);
        assert!(
            resp.headers()[header::CONTENT_TYPE]
                .to_str()
                .unwrap()
                .starts_with("text/plain")
        );
    }
}
