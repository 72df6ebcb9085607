//! In-process post log. The default store.

use async_trait::async_trait;
use chrono::Utc;
use parking_lot::RwLock;
use uuid::Uuid;

use super::{BoardStore, ChangeFeed, Subscription};
use crate::error::ServiceError;
use crate::types::{ChangeEvent, Post};

/// Append-only in-memory store with a broadcast change feed.
#[derive(Default)]
pub struct MemoryStore {
    posts: RwLock<Vec<Post>>,
    feed: ChangeFeed,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.posts.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[async_trait]
impl BoardStore for MemoryStore {
    async fn insert(&self, author: &str, body: &str) -> Result<Post, ServiceError> {
        let mut posts = self.posts.write();

        // Wall clocks can step backwards; keep insertion order monotonic.
        let now = Utc::now();
        let created_at = posts.last().map_or(now, |prev| prev.created_at.max(now));

        let post = Post {
            id: Uuid::new_v4().to_string(),
            author: author.to_string(),
            body: body.to_string(),
            created_at,
        };
        posts.push(post.clone());
        // Published under the write lock so the feed order matches the log.
        self.feed.publish(ChangeEvent::Insert(post.clone()));

        Ok(post)
    }

    async fn list(&self, limit: usize) -> Result<Vec<Post>, ServiceError> {
        let posts = self.posts.read();
        Ok(posts.iter().rev().take(limit).cloned().collect())
    }

    fn subscribe(&self) -> Subscription {
        self.feed.subscribe()
    }
}
