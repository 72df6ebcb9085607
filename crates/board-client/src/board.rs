//! Submission flow: draft, banner and view, as a page would hold them.

use std::sync::Arc;

use board_service::types::Post;
use tokio::sync::mpsc;

use crate::api::{BoardEndpoint, SubmitOutcome};
use crate::feed::{ChangeFeed, FeedHandle, FeedUpdate};
use crate::view::BoardView;

/// What to do with the post the server returns on success.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SubmitMode {
    /// Wait for the change feed to deliver it.
    #[default]
    AwaitFeed,
    /// Insert it into the view right away.
    AppendLocally,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Draft {
    pub author: String,
    pub body: String,
}

pub struct BoardClient<E: BoardEndpoint> {
    endpoint: Arc<E>,
    mode: SubmitMode,
    view: BoardView,
    draft: Draft,
    banner: Option<String>,
}

impl<E: BoardEndpoint> BoardClient<E> {
    pub fn new(endpoint: Arc<E>, mode: SubmitMode) -> Self {
        Self {
            endpoint,
            mode,
            view: BoardView::new(),
            draft: Draft::default(),
            banner: None,
        }
    }

    pub fn endpoint(&self) -> &Arc<E> {
        &self.endpoint
    }

    pub fn view(&self) -> &BoardView {
        &self.view
    }

    pub fn draft(&self) -> &Draft {
        &self.draft
    }

    pub fn draft_mut(&mut self) -> &mut Draft {
        &mut self.draft
    }

    /// Last submission error, until dismissed or replaced.
    pub fn banner(&self) -> Option<&str> {
        self.banner.as_deref()
    }

    pub fn dismiss_banner(&mut self) {
        self.banner = None;
    }

    /// Subscribes `feed` and returns the receiving end for [`Self::apply`].
    pub fn connect(
        &self,
        feed: &dyn ChangeFeed,
    ) -> (FeedHandle, mpsc::UnboundedReceiver<FeedUpdate>) {
        let (tx, rx) = mpsc::unbounded_channel();
        (feed.subscribe(tx), rx)
    }

    pub fn apply(&mut self, update: FeedUpdate) -> bool {
        self.view.apply(update)
    }

    /// Posts the current draft.
    ///
    /// Blank fields are not sent. On success the body is cleared and the
    /// author kept; on failure the banner is set and the draft left alone.
    pub async fn submit(&mut self) -> Option<Post> {
        let author = self.draft.author.trim();
        let body = self.draft.body.trim();
        if author.is_empty() || body.is_empty() {
            return None;
        }

        let outcome = self.endpoint.submit(author, body).await;
        match outcome {
            Ok(SubmitOutcome::Ok { post }) => {
                self.banner = None;
                self.draft.body.clear();
                if self.mode == SubmitMode::AppendLocally {
                    self.view.upsert(post.clone());
                }
                Some(post)
            }
            Ok(SubmitOutcome::Error {
                message,
                retry_after,
                ..
            }) => {
                self.banner = Some(match retry_after {
                    Some(secs) => format!("{message} (retry in {secs}s)"),
                    None => message,
                });
                None
            }
            Err(e) => {
                tracing::warn!(error = %e, "submit failed");
                self.banner = Some(e.to_string());
                None
            }
        }
    }
}
