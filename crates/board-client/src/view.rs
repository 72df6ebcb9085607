//! Local, ordered view of the board.

use board_service::types::{ChangeEvent, Post};

use crate::feed::FeedUpdate;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ViewState {
    /// No snapshot has arrived yet.
    Loading,
    Ready,
}

/// Posts sorted by `created_at` (oldest first), unique by id.
#[derive(Debug)]
pub struct BoardView {
    state: ViewState,
    posts: Vec<Post>,
    last_seq: Option<u64>,
}

impl Default for BoardView {
    fn default() -> Self {
        Self::new()
    }
}

impl BoardView {
    pub fn new() -> Self {
        Self {
            state: ViewState::Loading,
            posts: Vec::new(),
            last_seq: None,
        }
    }

    pub fn state(&self) -> ViewState {
        self.state
    }

    pub fn posts(&self) -> &[Post] {
        &self.posts
    }

    pub fn len(&self) -> usize {
        self.posts.len()
    }

    pub fn is_empty(&self) -> bool {
        self.posts.is_empty()
    }

    /// Applies a feed update. Returns `false` when it was ignored.
    pub fn apply(&mut self, update: FeedUpdate) -> bool {
        match update {
            FeedUpdate::Snapshot { seq, posts } => self.apply_snapshot(seq, posts),
            FeedUpdate::Change(change) => {
                self.apply_change(change);
                true
            }
        }
    }

    /// Replaces the view with a list response, unless a newer one was
    /// already applied.
    pub fn apply_snapshot(&mut self, seq: u64, mut posts: Vec<Post>) -> bool {
        if self.last_seq.is_some_and(|last| seq <= last) {
            tracing::debug!(seq, "dropping stale snapshot");
            return false;
        }
        self.last_seq = Some(seq);

        posts.sort_by(|a, b| {
            a.created_at
                .cmp(&b.created_at)
                .then_with(|| a.id.cmp(&b.id))
        });
        let mut seen = std::collections::HashSet::new();
        posts.retain(|p| seen.insert(p.id.clone()));

        self.posts = posts;
        self.state = ViewState::Ready;
        true
    }

    pub fn apply_change(&mut self, change: ChangeEvent) {
        match change {
            ChangeEvent::Insert(post) | ChangeEvent::Update(post) => self.upsert(post),
            ChangeEvent::Delete { id } => self.posts.retain(|p| p.id != id),
        }
    }

    /// Inserts `post` in order, replacing any post with the same id.
    pub fn upsert(&mut self, post: Post) {
        self.posts.retain(|p| p.id != post.id);
        let at = self.posts.partition_point(|p| {
            (&p.created_at, &p.id) <= (&post.created_at, &post.id)
        });
        self.posts.insert(at, post);
    }
}
