//! Board Service: core logic for the message board server.
//!
//! This crate contains everything that does not depend on a transport:
//! the admission gate (origin, CSRF, cooldown, rate limit, payload checks,
//! duplicate suppression), the store contract and its implementations,
//! the change feed, and metrics.
//!
//! The HTTP crate (`board-http`) extracts request values and delegates
//! to [`ServiceState`].
//!
//! No axum and no HTTP types in here.

pub mod cooldown;
pub mod duplicate;
pub mod error;
pub mod gate;
pub mod metrics;
pub mod rate_limit;
pub mod store;
pub mod types;

use std::sync::Arc;
use std::time::{Duration, Instant};

use error::ServiceError;
use gate::{RequestGate, SubmitRequest};
use metrics::Metrics;
use store::{BoardStore, Lagged, MemoryStore, Subscription};
use types::{ChangeEvent, Post};

/// Largest number of posts returned by one list call.
pub const MAX_LIST_LIMIT: usize = 50;

/// Configuration subset relevant to the service layer.
///
/// Transport and process config (bind address, cookie flags, logging) stays
/// in the binary crate's `Config` struct.
#[derive(Debug, Clone)]
pub struct ServiceConfig {
    pub post_enabled: bool,
    /// Requests per window and client key. `0` drops the window count but
    /// keeps `min_interval`.
    pub rate_limit: u64,
    pub rate_limit_window: Duration,
    pub min_interval: Duration,
    pub global_cooldown: Duration,
    pub duplicate_window: Duration,
    pub block_urls: bool,
    pub allowed_origins: Vec<String>,
}

impl Default for ServiceConfig {
    fn default() -> Self {
        Self {
            post_enabled: true,
            rate_limit: 6,
            rate_limit_window: Duration::from_secs(60),
            min_interval: Duration::from_secs(8),
            global_cooldown: Duration::from_millis(1500),
            duplicate_window: Duration::from_secs(15 * 60),
            block_urls: true,
            allowed_origins: vec!["http://localhost:3000".to_string()],
        }
    }
}

/// Shared service state, cloneable across all transport handlers.
///
/// Built once at startup and handed to the transport; nothing in this crate
/// is a process global.
#[derive(Clone)]
pub struct ServiceState {
    inner: Arc<Inner>,
}

struct Inner {
    gate: RequestGate,
    store: Arc<dyn BoardStore>,
    metrics: Metrics,
    start_time: Instant,
}

impl ServiceState {
    /// Creates a new service state over the given store.
    pub fn new(config: &ServiceConfig, store: Arc<dyn BoardStore>) -> Self {
        Self {
            inner: Arc::new(Inner {
                gate: RequestGate::new(config),
                store,
                metrics: Metrics::new(),
                start_time: Instant::now(),
            }),
        }
    }

    /// Creates a state backed by a fresh [`MemoryStore`].
    pub fn new_in_memory(config: &ServiceConfig) -> Self {
        Self::new(config, Arc::new(MemoryStore::new()))
    }

    // --- Accessors ---

    pub fn gate(&self) -> &RequestGate {
        &self.inner.gate
    }

    pub fn store(&self) -> &dyn BoardStore {
        self.inner.store.as_ref()
    }

    pub fn metrics(&self) -> &Metrics {
        &self.inner.metrics
    }

    pub fn posting_enabled(&self) -> bool {
        self.inner.gate.post_enabled()
    }

    pub fn uptime_secs(&self) -> u64 {
        self.inner.start_time.elapsed().as_secs()
    }

    // --- Operations ---

    /// Runs the admission gate and, if it passes, writes the post.
    pub async fn submit(&self, req: &SubmitRequest<'_>) -> Result<Post, ServiceError> {
        let new_post = match self.gate().admit(req) {
            Ok(p) => p,
            Err(e) => {
                tracing::debug!(client = req.client_key, reason = e.code(), "post rejected");
                self.metrics().record_error(&e);
                return Err(e);
            }
        };

        match self.store().insert(&new_post.author, &new_post.body).await {
            Ok(post) => {
                tracing::info!(id = %post.id, client = req.client_key, "post accepted");
                self.metrics().record_accepted();
                Ok(post)
            }
            Err(e) => {
                tracing::error!(error = %e, "store insert failed");
                self.metrics().record_error(&e);
                Err(e)
            }
        }
    }

    /// Newest posts first, at most [`MAX_LIST_LIMIT`].
    pub async fn recent(&self, limit: usize) -> Result<Vec<Post>, ServiceError> {
        let limit = limit.clamp(1, MAX_LIST_LIMIT);
        self.store().list(limit).await.inspect_err(|e| {
            tracing::error!(error = %e, "store list failed");
        })
    }

    /// Opens a change feed subscription that is counted in metrics.
    pub fn subscribe(&self) -> FeedSubscription {
        self.metrics().feed_opened();
        FeedSubscription {
            subscription: self.store().subscribe(),
            state: self.clone(),
        }
    }

    // --- Maintenance ---

    /// Drops expired rate-limit entries. Returns the count removed.
    pub fn sweep(&self) -> usize {
        self.gate().rate_limiter().sweep()
    }
}

/// A change feed subscription tied to the service metrics.
pub struct FeedSubscription {
    subscription: Subscription,
    state: ServiceState,
}

impl FeedSubscription {
    /// See [`Subscription::next`].
    pub async fn next(&mut self) -> Option<Result<ChangeEvent, Lagged>> {
        let next = self.subscription.next().await;
        if let Some(Err(Lagged(skipped))) = next {
            self.state.metrics().feed_lagged(skipped);
        }
        next
    }
}

impl Drop for FeedSubscription {
    fn drop(&mut self) {
        self.state.metrics().feed_closed();
    }
}
