//! `GET /messages/feed`: change events as server-sent events.

use std::convert::Infallible;
use std::time::Duration;

use axum::extract::State;
use axum::response::sse::{Event, KeepAlive, Sse};
use board_service::types::{ChangeEvent, DeletedPost};
use futures_util::Stream;

use crate::state::AppState;

const KEEP_ALIVE: Duration = Duration::from_secs(15);

/// Streams `insert`, `update` and `delete` events until the client leaves.
///
/// If the subscriber lags the stream ends, so the client reconnects and
/// starts again from a fresh list instead of silently missing posts.
pub async fn message_feed(
    State(state): State<AppState>,
) -> Sse<impl Stream<Item = Result<Event, Infallible>>> {
    let mut subscription = state.subscribe();
    tracing::debug!("feed subscriber connected");

    let stream = async_stream::stream! {
        while let Some(next) = subscription.next().await {
            let change = match next {
                Ok(change) => change,
                Err(lag) => {
                    tracing::warn!(error = %lag, "closing lagged feed stream");
                    break;
                }
            };
            match encode(&change) {
                Ok(event) => yield Ok(event),
                Err(e) => tracing::warn!(error = %e, "failed to encode change event"),
            }
        }
    };

    Sse::new(stream).keep_alive(KeepAlive::new().interval(KEEP_ALIVE))
}

fn encode(change: &ChangeEvent) -> Result<Event, axum::Error> {
    let event = Event::default().event(change.kind());
    match change {
        ChangeEvent::Insert(post) | ChangeEvent::Update(post) => event.json_data(post),
        ChangeEvent::Delete { id } => event.json_data(DeletedPost { id: id.clone() }),
    }
}
