//! Remote table behind a PostgREST-compatible API (e.g. a hosted Postgres).

use async_trait::async_trait;
use reqwest::StatusCode;
use serde::Deserialize;
use url::Url;

use super::{BoardStore, ChangeFeed, Subscription};
use crate::error::ServiceError;
use crate::types::{ChangeEvent, NewPost, Post};

/// Posts stored in a remote `{base}/rest/v1/{table}` resource.
///
/// The change feed only carries inserts made through this process; other
/// writers become visible to readers through a list re-fetch.
pub struct RestStore {
    client: reqwest::Client,
    endpoint: Url,
    api_key: String,
    feed: ChangeFeed,
}

/// Error body returned by PostgREST.
#[derive(Deserialize)]
struct RestError {
    message: Option<String>,
}

impl RestStore {
    pub fn new(base_url: &str, api_key: &str, table: &str) -> Result<Self, ServiceError> {
        let base = Url::parse(base_url)
            .map_err(|e| ServiceError::Store(format!("invalid store url {base_url:?}: {e}")))?;
        let endpoint = base
            .join(&format!("rest/v1/{table}"))
            .map_err(|e| ServiceError::Store(format!("invalid store table {table:?}: {e}")))?;

        Ok(Self {
            client: reqwest::Client::new(),
            endpoint,
            api_key: api_key.to_string(),
            feed: ChangeFeed::new(),
        })
    }

    pub fn endpoint(&self) -> &Url {
        &self.endpoint
    }

    fn list_url(&self, limit: usize) -> Url {
        let mut url = self.endpoint.clone();
        url.query_pairs_mut()
            .append_pair("select", "*")
            .append_pair("order", "created_at.desc")
            .append_pair("limit", &limit.to_string());
        url
    }

    fn request(&self, method: reqwest::Method, url: Url) -> reqwest::RequestBuilder {
        self.client
            .request(method, url)
            .header("apikey", &self.api_key)
            .bearer_auth(&self.api_key)
    }

    async fn rows(resp: reqwest::Response) -> Result<Vec<Post>, ServiceError> {
        let status = resp.status();
        if !status.is_success() {
            return Err(status_error(status, resp).await);
        }
        resp.json::<Vec<Post>>()
            .await
            .map_err(|e| ServiceError::Store(format!("unreadable rows: {e}")))
    }
}

#[async_trait]
impl BoardStore for RestStore {
    async fn insert(&self, author: &str, body: &str) -> Result<Post, ServiceError> {
        let row = NewPost {
            author: author.to_string(),
            body: body.to_string(),
        };
        let resp = self
            .request(reqwest::Method::POST, self.endpoint.clone())
            .header("Prefer", "return=representation")
            .json(&row)
            .send()
            .await
            .map_err(|e| ServiceError::Store(e.to_string()))?;

        let post = Self::rows(resp)
            .await?
            .into_iter()
            .next()
            .ok_or_else(|| ServiceError::Store("insert returned no row".to_string()))?;

        self.feed.publish(ChangeEvent::Insert(post.clone()));
        Ok(post)
    }

    async fn list(&self, limit: usize) -> Result<Vec<Post>, ServiceError> {
        let resp = self
            .request(reqwest::Method::GET, self.list_url(limit))
            .send()
            .await
            .map_err(|e| ServiceError::Store(e.to_string()))?;
        Self::rows(resp).await
    }

    fn subscribe(&self) -> Subscription {
        self.feed.subscribe()
    }
}

async fn status_error(status: StatusCode, resp: reqwest::Response) -> ServiceError {
    let text = resp.text().await.unwrap_or_default();
    let detail = serde_json::from_str::<RestError>(&text)
        .ok()
        .and_then(|e| e.message)
        .unwrap_or(text);
    ServiceError::Store(format!("{status}: {detail}"))
}
