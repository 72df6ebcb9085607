//! HTTP access to `/messages`.

use async_trait::async_trait;
use board_service::types::Post;
use parking_lot::Mutex;
use reqwest::StatusCode;
use reqwest::header::{self, HeaderMap};
use serde::{Deserialize, Serialize};
use url::Url;

use crate::error::ClientError;

const CSRF_COOKIE: &str = "board_csrf";
const CSRF_HEADER: &str = "x-board-csrf";
const USER_AGENT: &str = concat!("board-client/", env!("CARGO_PKG_VERSION"));

/// Result of a submission the server answered.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SubmitOutcome {
    Ok {
        post: Post,
    },
    Error {
        message: String,
        status: u16,
        /// Seconds from `Retry-After`, on throttling responses.
        retry_after: Option<u64>,
    },
}

/// Read and write operations a board client needs.
#[async_trait]
pub trait BoardEndpoint: Send + Sync + 'static {
    /// Newest `limit` posts, newest first.
    async fn list(&self, limit: usize) -> Result<Vec<Post>, ClientError>;

    async fn submit(&self, author: &str, body: &str) -> Result<SubmitOutcome, ClientError>;
}

#[derive(Deserialize)]
struct ListResponse {
    messages: Vec<Post>,
}

#[derive(Deserialize)]
struct CreatedResponse {
    message: Post,
}

#[derive(Deserialize)]
struct ErrorResponse {
    error: String,
}

#[derive(Serialize)]
struct SubmitBody<'a> {
    author: &'a str,
    body: &'a str,
}

/// reqwest-backed client for one board server.
///
/// Behaves like the page a browser would load: it picks up the CSRF cookie
/// from list responses and echoes it on submit.
pub struct BoardApi {
    client: reqwest::Client,
    base: Url,
    origin: String,
    csrf: Mutex<Option<String>>,
}

impl BoardApi {
    /// Creates a client for `base_url`, sending that URL's origin as `Origin`.
    pub fn new(base_url: &str) -> Result<Self, ClientError> {
        let base = Url::parse(base_url)?;
        let origin = base.origin().ascii_serialization();
        let client = reqwest::Client::builder().user_agent(USER_AGENT).build()?;
        Ok(Self {
            client,
            base,
            origin,
            csrf: Mutex::new(None),
        })
    }

    /// Overrides the `Origin` header (the page origin, when the API lives
    /// elsewhere).
    #[must_use]
    pub fn with_origin(mut self, origin: impl Into<String>) -> Self {
        self.origin = origin.into();
        self
    }

    pub fn base_url(&self) -> &Url {
        &self.base
    }

    pub fn http_client(&self) -> &reqwest::Client {
        &self.client
    }

    /// Current CSRF token, once a list call has delivered one.
    pub fn csrf_token(&self) -> Option<String> {
        self.csrf.lock().clone()
    }

    pub fn messages_url(&self) -> Result<Url, ClientError> {
        Ok(self.base.join("messages")?)
    }

    pub fn feed_url(&self) -> Result<Url, ClientError> {
        Ok(self.base.join("messages/feed")?)
    }

    fn remember_csrf(&self, headers: &HeaderMap) {
        if let Some(token) = csrf_from_set_cookie(headers) {
            *self.csrf.lock() = Some(token);
        }
    }

    async fn ensure_csrf(&self) -> Result<String, ClientError> {
        if let Some(token) = self.csrf_token() {
            return Ok(token);
        }
        self.list(1).await?;
        self.csrf_token().ok_or_else(|| ClientError::Status {
            status: StatusCode::OK.as_u16(),
            message: "server did not issue a CSRF cookie".to_string(),
        })
    }
}

#[async_trait]
impl BoardEndpoint for BoardApi {
    async fn list(&self, limit: usize) -> Result<Vec<Post>, ClientError> {
        let mut url = self.messages_url()?;
        url.query_pairs_mut()
            .append_pair("limit", &limit.to_string());

        let mut req = self.client.get(url);
        if let Some(token) = self.csrf_token() {
            req = req.header(header::COOKIE, format!("{CSRF_COOKIE}={token}"));
        }
        let resp = req.send().await?;

        let status = resp.status();
        if !status.is_success() {
            return Err(ClientError::Status {
                status: status.as_u16(),
                message: error_message(resp).await,
            });
        }
        self.remember_csrf(resp.headers());
        Ok(resp.json::<ListResponse>().await?.messages)
    }

    async fn submit(&self, author: &str, body: &str) -> Result<SubmitOutcome, ClientError> {
        let token = self.ensure_csrf().await?;
        let resp = self
            .client
            .post(self.messages_url()?)
            .header(header::ORIGIN, &self.origin)
            .header("x-requested-with", "XMLHttpRequest")
            .header(header::COOKIE, format!("{CSRF_COOKIE}={token}"))
            .header(CSRF_HEADER, &token)
            .json(&SubmitBody { author, body })
            .send()
            .await?;

        let status = resp.status();
        if status == StatusCode::CREATED {
            let created = resp.json::<CreatedResponse>().await?;
            return Ok(SubmitOutcome::Ok {
                post: created.message,
            });
        }

        let retry_after = resp
            .headers()
            .get(header::RETRY_AFTER)
            .and_then(|v| v.to_str().ok())
            .and_then(|v| v.trim().parse().ok());
        Ok(SubmitOutcome::Error {
            message: error_message(resp).await,
            status: status.as_u16(),
            retry_after,
        })
    }
}

/// Pulls the `board_csrf` value out of `Set-Cookie` headers.
fn csrf_from_set_cookie(headers: &HeaderMap) -> Option<String> {
    headers
        .get_all(header::SET_COOKIE)
        .iter()
        .filter_map(|v| v.to_str().ok())
        .filter_map(|v| v.split(';').next())
        .filter_map(|pair| pair.trim().split_once('='))
        .find(|(name, value)| *name == CSRF_COOKIE && !value.is_empty())
        .map(|(_, value)| value.to_string())
}

async fn error_message(resp: reqwest::Response) -> String {
    let status = resp.status();
    let text = resp.text().await.unwrap_or_default();
    serde_json::from_str::<ErrorResponse>(&text)
        .map(|e| e.error)
        .unwrap_or_else(|_| format!("Request failed ({})", status.as_u16()))
}
