//! HTTP mapping for service errors.

use axum::Json;
use axum::http::{HeaderValue, StatusCode, header};
use axum::response::{IntoResponse, Response};
use board_service::error::{ErrorKind, ServiceError};
use serde::Serialize;

/// Message shown to clients when the store fails. The detail is logged.
const STORE_FAILURE: &str = "Failed to save message";

/// API error returned by the HTTP handlers.
#[derive(Debug, thiserror::Error)]
#[error(transparent)]
pub struct ApiError(#[from] pub ServiceError);

#[derive(Debug, Serialize)]
pub struct ErrorBody {
    /// Human-readable message (e.g. "Duplicate content").
    pub(crate) error: String,
    /// Machine code (e.g. "duplicate", "rate_limited").
    pub(crate) code: &'static str,
}

impl ApiError {
    pub fn status(&self) -> StatusCode {
        match &self.0 {
            ServiceError::Disabled => StatusCode::SERVICE_UNAVAILABLE,
            ServiceError::Forbidden | ServiceError::CsrfRequired => StatusCode::FORBIDDEN,
            ServiceError::Cooldown { .. } | ServiceError::RateLimited { .. } => {
                StatusCode::TOO_MANY_REQUESTS
            }
            ServiceError::UnsupportedMediaType => StatusCode::UNSUPPORTED_MEDIA_TYPE,
            ServiceError::Invalid(_)
            | ServiceError::BotDetected
            | ServiceError::LinksNotAllowed => StatusCode::BAD_REQUEST,
            ServiceError::Duplicate => StatusCode::CONFLICT,
            ServiceError::Store(_) | ServiceError::Misconfigured => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status();
        let message = match self.0.kind() {
            ErrorKind::Store => {
                tracing::error!(error = %self.0, "store failure");
                STORE_FAILURE.to_string()
            }
            _ => self.0.to_string(),
        };

        let body = ErrorBody {
            error: message,
            code: self.0.code(),
        };
        let mut response = (status, Json(body)).into_response();

        if let Some(secs) = self.0.retry_after_secs() {
            response
                .headers_mut()
                .insert(header::RETRY_AFTER, HeaderValue::from(secs));
        }
        response
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn statuses_follow_gate_order() {
        let cases = [
            (ServiceError::Disabled, 503),
            (ServiceError::Forbidden, 403),
            (ServiceError::CsrfRequired, 403),
            (ServiceError::Cooldown { retry_after_secs: 1 }, 429),
            (ServiceError::RateLimited { retry_after_secs: 9 }, 429),
            (ServiceError::UnsupportedMediaType, 415),
            (ServiceError::Invalid("author must not be empty".into()), 400),
            (ServiceError::BotDetected, 400),
            (ServiceError::LinksNotAllowed, 400),
            (ServiceError::Duplicate, 409),
            (ServiceError::Store("boom".into()), 500),
            (ServiceError::Misconfigured, 500),
        ];
        for (err, status) in cases {
            assert_eq!(ApiError(err).status().as_u16(), status);
        }
    }

    #[test]
    fn rate_limited_carries_retry_after() {
        let resp = ApiError(ServiceError::RateLimited { retry_after_secs: 42 }).into_response();
        assert_eq!(resp.status(), StatusCode::TOO_MANY_REQUESTS);
        assert_eq!(resp.headers()[header::RETRY_AFTER], "42");
    }

    #[test]
    fn other_errors_have_no_retry_after() {
        let resp = ApiError(ServiceError::Duplicate).into_response();
        assert!(resp.headers().get(header::RETRY_AFTER).is_none());
    }
}
