//! Change feeds: how a client learns about new posts.
//!
//! Two implementations share one contract. [`PollFeed`] re-fetches the list
//! on a timer; [`PushFeed`] follows the server's event stream. Either way
//! the consumer receives [`FeedUpdate`]s on a channel and stops them by
//! dropping the returned [`FeedHandle`].

use std::sync::Arc;
use std::time::Duration;

use board_service::types::{ChangeEvent, DeletedPost, Post};
use futures_util::StreamExt;
use tokio::sync::mpsc::UnboundedSender;
use tokio::task::{JoinHandle, JoinSet};
use tokio::time::MissedTickBehavior;

use crate::api::{BoardApi, BoardEndpoint};
use crate::error::ClientError;

/// Default delay between two list polls.
pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_secs(4);

/// Delay before reconnecting a dropped event stream.
const RECONNECT_DELAY: Duration = Duration::from_secs(1);

/// Posts requested per snapshot.
const SNAPSHOT_LIMIT: usize = 50;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FeedUpdate {
    /// Full list as of request `seq`. Higher sequence numbers are newer.
    Snapshot { seq: u64, posts: Vec<Post> },
    Change(ChangeEvent),
}

pub trait ChangeFeed: Send + Sync {
    /// Starts delivering updates to `tx` until the handle is dropped.
    fn subscribe(&self, tx: UnboundedSender<FeedUpdate>) -> FeedHandle;
}

/// Running feed. Dropping it unsubscribes.
pub struct FeedHandle {
    task: JoinHandle<()>,
}

impl FeedHandle {
    pub fn cancel(self) {
        drop(self);
    }

    pub fn is_finished(&self) -> bool {
        self.task.is_finished()
    }
}

impl Drop for FeedHandle {
    fn drop(&mut self) {
        self.task.abort();
    }
}

// ---------------------------------------------------------------------------
// Polling
// ---------------------------------------------------------------------------

/// Re-fetches the newest posts on a fixed interval.
///
/// Every poll runs as its own task, so a slow response never delays the
/// next one. Responses may arrive out of order; their sequence numbers let
/// the view drop stale ones.
pub struct PollFeed {
    endpoint: Arc<dyn BoardEndpoint>,
    interval: Duration,
}

impl PollFeed {
    pub fn new(endpoint: Arc<dyn BoardEndpoint>) -> Self {
        Self {
            endpoint,
            interval: DEFAULT_POLL_INTERVAL,
        }
    }

    #[must_use]
    pub fn with_interval(mut self, interval: Duration) -> Self {
        self.interval = interval;
        self
    }
}

impl ChangeFeed for PollFeed {
    fn subscribe(&self, tx: UnboundedSender<FeedUpdate>) -> FeedHandle {
        let endpoint = Arc::clone(&self.endpoint);
        let interval = self.interval;

        let task = tokio::spawn(async move {
            let mut ticker = tokio::time::interval(interval);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
            // Aborting this task drops the set, which aborts in-flight polls.
            let mut polls = JoinSet::new();
            let mut seq = 0u64;

            loop {
                ticker.tick().await;
                if tx.is_closed() {
                    break;
                }
                while polls.try_join_next().is_some() {}

                seq += 1;
                let endpoint = Arc::clone(&endpoint);
                let tx = tx.clone();
                polls.spawn(async move {
                    match endpoint.list(SNAPSHOT_LIMIT).await {
                        Ok(posts) => {
                            let _ = tx.send(FeedUpdate::Snapshot { seq, posts });
                        }
                        Err(e) => tracing::warn!(error = %e, seq, "poll failed"),
                    }
                });
            }
        });

        FeedHandle { task }
    }
}

// ---------------------------------------------------------------------------
// Push
// ---------------------------------------------------------------------------

/// Follows `GET /messages/feed`.
///
/// After each (re)connect it sends a fresh snapshot, so events missed while
/// disconnected are recovered.
pub struct PushFeed {
    api: Arc<BoardApi>,
}

impl PushFeed {
    pub fn new(api: Arc<BoardApi>) -> Self {
        Self { api }
    }
}

impl ChangeFeed for PushFeed {
    fn subscribe(&self, tx: UnboundedSender<FeedUpdate>) -> FeedHandle {
        let api = Arc::clone(&self.api);

        let task = tokio::spawn(async move {
            let mut seq = 0u64;
            while !tx.is_closed() {
                seq += 1;
                if let Err(e) = follow(&api, seq, &tx).await {
                    tracing::warn!(error = %e, "feed connection lost");
                }
                tokio::time::sleep(RECONNECT_DELAY).await;
            }
        });

        FeedHandle { task }
    }
}

/// Runs one feed connection until the server closes it or `tx` goes away.
async fn follow(
    api: &BoardApi,
    seq: u64,
    tx: &UnboundedSender<FeedUpdate>,
) -> Result<(), ClientError> {
    let resp = api
        .http_client()
        .get(api.feed_url()?)
        .header(reqwest::header::ACCEPT, "text/event-stream")
        .send()
        .await?
        .error_for_status()?;

    // Subscribed from here on, so the snapshot cannot miss anything.
    let posts = api.list(SNAPSHOT_LIMIT).await?;
    if tx.send(FeedUpdate::Snapshot { seq, posts }).is_err() {
        return Ok(());
    }

    let mut decoder = SseDecoder::default();
    let mut chunks = resp.bytes_stream();
    while let Some(chunk) = chunks.next().await {
        for message in decoder.push(&chunk?) {
            let change = match decode_change(&message) {
                Ok(change) => change,
                Err(e) => {
                    tracing::warn!(error = %e, "skipping feed event");
                    continue;
                }
            };
            if tx.send(FeedUpdate::Change(change)).is_err() {
                return Ok(());
            }
        }
    }
    Ok(())
}

/// One dispatched server-sent event.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SseMessage {
    pub event: String,
    pub data: String,
}

/// Incremental `text/event-stream` parser.
///
/// Only `event` and `data` fields are interpreted. Comment lines (used as
/// keep-alives) are ignored.
#[derive(Debug, Default)]
pub struct SseDecoder {
    buf: Vec<u8>,
    event: Option<String>,
    data: Vec<String>,
}

impl SseDecoder {
    /// Feeds a chunk and returns every event it completes.
    pub fn push(&mut self, chunk: &[u8]) -> Vec<SseMessage> {
        self.buf.extend_from_slice(chunk);
        let mut out = Vec::new();

        while let Some(pos) = self.buf.iter().position(|b| *b == b'\n') {
            let raw: Vec<u8> = self.buf.drain(..=pos).collect();
            let line = String::from_utf8_lossy(&raw);
            let line = line.trim_end_matches(['\n', '\r']);

            if line.is_empty() {
                if !self.data.is_empty() {
                    out.push(SseMessage {
                        event: self.event.take().unwrap_or_else(|| "message".to_string()),
                        data: self.data.join("\n"),
                    });
                }
                self.event = None;
                self.data.clear();
                continue;
            }
            if line.starts_with(':') {
                continue;
            }

            let (field, value) = line.split_once(':').unwrap_or((line, ""));
            let value = value.strip_prefix(' ').unwrap_or(value);
            match field {
                "event" => self.event = Some(value.to_string()),
                "data" => self.data.push(value.to_string()),
                _ => {}
            }
        }
        out
    }
}

/// Turns a feed event into a [`ChangeEvent`].
pub fn decode_change(message: &SseMessage) -> Result<ChangeEvent, ClientError> {
    let bad = |e: serde_json::Error| ClientError::Decode(format!("{}: {e}", message.event));
    match message.event.as_str() {
        "insert" => Ok(ChangeEvent::Insert(
            serde_json::from_str::<Post>(&message.data).map_err(bad)?,
        )),
        "update" => Ok(ChangeEvent::Update(
            serde_json::from_str::<Post>(&message.data).map_err(bad)?,
        )),
        "delete" => {
            let deleted = serde_json::from_str::<DeletedPost>(&message.data).map_err(bad)?;
            Ok(ChangeEvent::Delete { id: deleted.id })
        }
        other => Err(ClientError::Decode(format!("unknown event {other:?}"))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn decodes_events_across_chunks() {
        let mut decoder = SseDecoder::default();
        assert!(decoder.push(b"event: insert\nda").is_empty());
        let out = decoder.push(b"ta: {\"a\":1}\n\n");
        assert_eq!(
            out,
            vec![SseMessage {
                event: "insert".into(),
                data: "{\"a\":1}".into(),
            }]
        );
    }

    #[test]
    fn skips_keep_alive_comments_and_handles_crlf() {
        let mut decoder = SseDecoder::default();
        let out = decoder.push(b":\n\n: ping\r\nevent: delete\r\ndata: {\"id\":\"7\"}\r\n\r\n");
        assert_eq!(out.len(), 1);
        assert_eq!(out[0].event, "delete");
    }

    #[test]
    fn decodes_change_events() {
        let insert = SseMessage {
            event: "insert".into(),
            data: r#"{"id":"1","author":"a","body":"b","created_at":"2025-01-01T00:00:00Z"}"#
                .into(),
        };
        assert!(matches!(decode_change(&insert), Ok(ChangeEvent::Insert(p)) if p.id == "1"));

        let delete = SseMessage {
            event: "delete".into(),
            data: r#"{"id":42}"#.into(),
        };
        assert_eq!(
            decode_change(&delete).unwrap(),
            ChangeEvent::Delete { id: "42".into() }
        );

        let unknown = SseMessage {
            event: "truncate".into(),
            data: "{}".into(),
        };
        assert!(decode_change(&unknown).is_err());
    }
}
