//! Admission gate for new posts.
//!
//! [`RequestGate::admit`] runs every check in a fixed order and stops at the
//! first failure:
//!
//! 1. posting enabled
//! 2. origin / referer allow-list
//! 3. browser fetch heuristic
//! 4. user-agent blocklist
//! 5. CSRF token
//! 6. global cooldown
//! 7. per-client rate limit
//! 8. content type
//! 9. payload schema
//! 10. honeypot
//! 11. link policy
//! 12. duplicate body
//!
//! Steps 6, 7 and 12 record state when they pass. A later rejection does not
//! undo that.

use std::collections::HashSet;
use std::sync::LazyLock;
use std::time::Instant;

use regex::Regex;
use serde::Deserialize;
use subtle::ConstantTimeEq;
use url::Url;

use crate::ServiceConfig;
use crate::cooldown::GlobalCooldown;
use crate::duplicate::DuplicateSuppressor;
use crate::error::ServiceError;
use crate::rate_limit::{RateLimiter, ceil_secs};
use crate::types::{AUTHOR_MAX_CHARS, BODY_MAX_CHARS, NewPost};

/// Common automation tools, matched anywhere in the user agent.
static BLOCKED_AGENT: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)curl|wget|powershell|httpie|postman|insomnia|python-requests|libwww|okhttp")
        .expect("user-agent pattern is valid")
});

/// A scheme or `www.` followed by at least one non-space character.
static URL_PATTERN: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)(https?://|www\.)\S+").expect("link pattern is valid")
});

/// Header and body values of a posting request, extracted by the transport.
#[derive(Debug, Clone, Copy, Default)]
pub struct SubmitRequest<'a> {
    pub origin: Option<&'a str>,
    pub referer: Option<&'a str>,
    pub sec_fetch_site: Option<&'a str>,
    pub requested_with: Option<&'a str>,
    pub user_agent: Option<&'a str>,
    pub csrf_header: Option<&'a str>,
    pub csrf_cookie: Option<&'a str>,
    /// Resolved client key (forwarded IP or `"unknown"`).
    pub client_key: &'a str,
    pub content_type: Option<&'a str>,
    pub body: &'a [u8],
}

/// JSON body of a posting request.
#[derive(Debug, Deserialize)]
pub struct SubmitPayload {
    pub author: String,
    pub body: String,
    /// Honeypot. Humans never see this field.
    #[serde(default)]
    pub hp: Option<String>,
}

/// Composes every posting check into one admission decision.
pub struct RequestGate {
    post_enabled: bool,
    allowed_origins: HashSet<String>,
    block_urls: bool,
    cooldown: GlobalCooldown,
    rate_limiter: RateLimiter,
    duplicates: DuplicateSuppressor,
}

impl RequestGate {
    pub fn new(config: &ServiceConfig) -> Self {
        let allowed_origins = config
            .allowed_origins
            .iter()
            .map(|o| o.trim().trim_end_matches('/').to_string())
            .filter(|o| !o.is_empty())
            .collect();

        Self {
            post_enabled: config.post_enabled,
            allowed_origins,
            block_urls: config.block_urls,
            cooldown: GlobalCooldown::new(config.global_cooldown),
            rate_limiter: RateLimiter::new(
                config.rate_limit,
                config.rate_limit_window,
                config.min_interval,
            ),
            duplicates: DuplicateSuppressor::new(config.duplicate_window),
        }
    }

    pub fn post_enabled(&self) -> bool {
        self.post_enabled
    }

    pub fn rate_limiter(&self) -> &RateLimiter {
        &self.rate_limiter
    }

    pub fn duplicates(&self) -> &DuplicateSuppressor {
        &self.duplicates
    }

    pub fn admit(&self, req: &SubmitRequest<'_>) -> Result<NewPost, ServiceError> {
        self.admit_at(req, Instant::now())
    }

    /// Runs all checks as of `now` and returns the validated post on success.
    pub fn admit_at(&self, req: &SubmitRequest<'_>, now: Instant) -> Result<NewPost, ServiceError> {
        if !self.post_enabled {
            return Err(ServiceError::Disabled);
        }
        if !origin_allowed(&self.allowed_origins, req.origin, req.referer)
            || !is_browser_fetch(req.sec_fetch_site, req.requested_with)
            || user_agent_blocked(req.user_agent)
        {
            return Err(ServiceError::Forbidden);
        }
        if !csrf_matches(req.csrf_header, req.csrf_cookie) {
            return Err(ServiceError::CsrfRequired);
        }

        if let Err(wait) = self.cooldown.try_acquire_at(now) {
            return Err(ServiceError::Cooldown {
                retry_after_secs: ceil_secs(wait).max(1),
            });
        }
        let decision = self.rate_limiter.check_at(req.client_key, now);
        if !decision.allowed {
            return Err(ServiceError::RateLimited {
                retry_after_secs: decision.retry_after_secs,
            });
        }

        if !req
            .content_type
            .is_some_and(|ct| ct.to_ascii_lowercase().contains("application/json"))
        {
            return Err(ServiceError::UnsupportedMediaType);
        }

        let post = parse_payload(req.body)?;

        if self.block_urls && contains_url(&post.body) {
            return Err(ServiceError::LinksNotAllowed);
        }
        if self.duplicates.is_duplicate_at(&post.body, now) {
            return Err(ServiceError::Duplicate);
        }

        Ok(post)
    }
}

/// Accepts when `Origin` is allow-listed, or else when the origin of
/// `Referer` is.
pub fn origin_allowed(allowed: &HashSet<String>, origin: Option<&str>, referer: Option<&str>) -> bool {
    if origin.is_some_and(|o| allowed.contains(o)) {
        return true;
    }
    referer
        .and_then(|r| Url::parse(r).ok())
        .map(|u| u.origin().ascii_serialization())
        .is_some_and(|o| allowed.contains(&o))
}

pub fn is_browser_fetch(sec_fetch_site: Option<&str>, requested_with: Option<&str>) -> bool {
    matches!(sec_fetch_site, Some("same-origin" | "same-site"))
        || requested_with == Some("XMLHttpRequest")
}

/// Heuristic only: any client can send a browser user agent.
pub fn user_agent_blocked(user_agent: Option<&str>) -> bool {
    user_agent.is_some_and(|ua| BLOCKED_AGENT.is_match(ua))
}

/// Both tokens present, non-empty and byte-for-byte equal.
pub fn csrf_matches(header: Option<&str>, cookie: Option<&str>) -> bool {
    match (header, cookie) {
        (Some(h), Some(c)) if !h.is_empty() && !c.is_empty() => {
            h.len() == c.len() && bool::from(h.as_bytes().ct_eq(c.as_bytes()))
        }
        _ => false,
    }
}

pub fn contains_url(text: &str) -> bool {
    URL_PATTERN.is_match(text)
}

/// Parses and validates the JSON body, honeypot included.
///
/// Lengths are counted in characters on the submitted strings, which are
/// stored as sent. Only the honeypot is trimmed.
pub fn parse_payload(body: &[u8]) -> Result<NewPost, ServiceError> {
    let payload: SubmitPayload = serde_json::from_slice(body)
        .map_err(|e| ServiceError::Invalid(format!("Invalid payload: {e}")))?;

    check_length("author", &payload.author, AUTHOR_MAX_CHARS)?;
    check_length("body", &payload.body, BODY_MAX_CHARS)?;

    if payload.hp.as_deref().is_some_and(|hp| !hp.trim().is_empty()) {
        return Err(ServiceError::BotDetected);
    }

    Ok(NewPost {
        author: payload.author,
        body: payload.body,
    })
}

fn check_length(field: &str, value: &str, max: usize) -> Result<(), ServiceError> {
    let len = value.chars().count();
    if len == 0 {
        return Err(ServiceError::Invalid(format!("{field} must not be empty")));
    }
    if len > max {
        return Err(ServiceError::Invalid(format!(
            "{field} must be at most {max} characters"
        )));
    }
    Ok(())
}
