//! Service-layer error types.
//!
//! `ServiceError` is transport-agnostic. The HTTP crate maps each variant to
//! a status code and JSON body; metrics use [`ServiceError::code`] as label.

/// Every machine-readable error code, in metrics rendering order.
pub const ALL_CODES: [&str; 12] = [
    "posting_disabled",
    "forbidden",
    "csrf_required",
    "cooldown",
    "rate_limited",
    "unsupported_media_type",
    "invalid_payload",
    "bot_detected",
    "links_not_allowed",
    "duplicate",
    "store_error",
    "misconfigured",
];

/// Broad failure class, used to decide how a failure is surfaced.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    /// Bad input or a bot signature. Reported immediately, never retried.
    Client,
    /// Throttled. The caller should back off and resubmit.
    RateExceeded,
    /// The store failed. Detail stays in server logs.
    Store,
    /// Deployment problem (missing store credentials, disabled posting).
    Misconfiguration,
}

/// Service error shared across transports.
#[derive(Debug, thiserror::Error)]
pub enum ServiceError {
    /// Posting is switched off by configuration.
    #[error("Posting disabled")]
    Disabled,

    /// Disallowed origin, non-browser request or blocked user agent.
    #[error("Forbidden")]
    Forbidden,

    /// CSRF header missing or different from the cookie token.
    #[error("CSRF required")]
    CsrfRequired,

    /// Process-wide cooldown has not elapsed.
    #[error("Please wait a moment")]
    Cooldown { retry_after_secs: u64 },

    /// Per-client rate limit exceeded.
    #[error("Too Many Requests. Slow down.")]
    RateLimited { retry_after_secs: u64 },

    /// Request body is not JSON.
    #[error("Unsupported Content-Type")]
    UnsupportedMediaType,

    /// Payload failed schema validation.
    #[error("{0}")]
    Invalid(String),

    /// Honeypot field was filled in.
    #[error("Bot detected")]
    BotDetected,

    /// Body contains a link while link blocking is on.
    #[error("Links are not allowed")]
    LinksNotAllowed,

    /// Same normalized body was posted recently.
    #[error("Duplicate content")]
    Duplicate,

    /// Store call failed.
    #[error("store error: {0}")]
    Store(String),

    /// Store credentials are missing.
    #[error("Server is misconfigured")]
    Misconfigured,
}

impl ServiceError {
    /// Stable machine-readable code for this error.
    pub fn code(&self) -> &'static str {
        match self {
            Self::Disabled => "posting_disabled",
            Self::Forbidden => "forbidden",
            Self::CsrfRequired => "csrf_required",
            Self::Cooldown { .. } => "cooldown",
            Self::RateLimited { .. } => "rate_limited",
            Self::UnsupportedMediaType => "unsupported_media_type",
            Self::Invalid(_) => "invalid_payload",
            Self::BotDetected => "bot_detected",
            Self::LinksNotAllowed => "links_not_allowed",
            Self::Duplicate => "duplicate",
            Self::Store(_) => "store_error",
            Self::Misconfigured => "misconfigured",
        }
    }

    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::Cooldown { .. } | Self::RateLimited { .. } => ErrorKind::RateExceeded,
            Self::Store(_) => ErrorKind::Store,
            Self::Disabled | Self::Misconfigured => ErrorKind::Misconfiguration,
            _ => ErrorKind::Client,
        }
    }

    /// Seconds the client should wait before retrying, for throttling errors.
    pub fn retry_after_secs(&self) -> Option<u64> {
        match self {
            Self::Cooldown { retry_after_secs } | Self::RateLimited { retry_after_secs } => {
                Some(*retry_after_secs)
            }
            _ => None,
        }
    }
}
