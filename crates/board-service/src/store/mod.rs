//! The durable post log, behind an insert / list / subscribe contract.
//!
//! Consistency expected from every implementation:
//! - `insert` is atomic and returns the persisted row, with the id and
//!   `created_at` assigned by the store;
//! - `list` reflects every earlier successful insert made through it;
//! - `subscribe` delivers inserts at least once. Order under concurrent
//!   writers is not guaranteed, so readers sort by `created_at`. A reader
//!   that falls too far behind is told so with [`Lagged`] and must re-list.

mod memory;
mod rest;

pub use memory::MemoryStore;
pub use rest::RestStore;

use async_trait::async_trait;
use tokio::sync::broadcast;

use crate::error::ServiceError;
use crate::types::{ChangeEvent, Post};

/// Buffered change events per subscriber before it starts lagging.
const FEED_CAPACITY: usize = 256;

/// Persistence contract for board posts.
#[async_trait]
pub trait BoardStore: Send + Sync {
    async fn insert(&self, author: &str, body: &str) -> Result<Post, ServiceError>;

    /// Newest `limit` posts, newest first.
    async fn list(&self, limit: usize) -> Result<Vec<Post>, ServiceError>;

    /// Opens a change feed. Dropping the subscription unsubscribes.
    fn subscribe(&self) -> Subscription;
}

/// Fan-out sender shared by store implementations.
#[derive(Clone)]
pub struct ChangeFeed {
    tx: broadcast::Sender<ChangeEvent>,
}

impl Default for ChangeFeed {
    fn default() -> Self {
        Self::new()
    }
}

impl ChangeFeed {
    pub fn new() -> Self {
        let (tx, _) = broadcast::channel(FEED_CAPACITY);
        Self { tx }
    }

    /// Publishes a change. Having no subscribers is not an error.
    pub fn publish(&self, event: ChangeEvent) {
        let _ = self.tx.send(event);
    }

    pub fn subscribe(&self) -> Subscription {
        Subscription {
            rx: self.tx.subscribe(),
        }
    }

    pub fn subscriber_count(&self) -> usize {
        self.tx.receiver_count()
    }
}

/// The subscriber fell behind and this many events were dropped for it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
#[error("change feed lagged by {0} events")]
pub struct Lagged(pub u64);

/// A live change feed subscription.
pub struct Subscription {
    rx: broadcast::Receiver<ChangeEvent>,
}

impl Subscription {
    /// Waits for the next change. Returns `None` once the store is gone.
    ///
    /// `Some(Err(Lagged))` means events were lost. The subscription stays
    /// usable, but the caller has a gap and should take a fresh snapshot.
    pub async fn next(&mut self) -> Option<Result<ChangeEvent, Lagged>> {
        match self.rx.recv().await {
            Ok(event) => Some(Ok(event)),
            Err(broadcast::error::RecvError::Lagged(skipped)) => {
                tracing::warn!(skipped, "change feed subscriber lagged");
                Some(Err(Lagged(skipped)))
            }
            Err(broadcast::error::RecvError::Closed) => None,
        }
    }
}

/// Stand-in used when the remote store has no credentials.
///
/// Every call fails the same way, so a broken deployment is obvious instead
/// of half-working.
#[derive(Default)]
pub struct UnconfiguredStore {
    feed: ChangeFeed,
}

#[async_trait]
impl BoardStore for UnconfiguredStore {
    async fn insert(&self, _author: &str, _body: &str) -> Result<Post, ServiceError> {
        Err(ServiceError::Misconfigured)
    }

    async fn list(&self, _limit: usize) -> Result<Vec<Post>, ServiceError> {
        Err(ServiceError::Misconfigured)
    }

    fn subscribe(&self) -> Subscription {
        self.feed.subscribe()
    }
}
