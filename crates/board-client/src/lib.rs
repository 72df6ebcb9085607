//! Board Client: the read and submit side of the message board.
//!
//! - [`api::BoardApi`]: list and submit over HTTP, with the CSRF cookie
//!   handled the way a browser page would
//! - [`feed`]: polling and push change feeds behind one trait
//! - [`view::BoardView`]: ordered, de-duplicated local copy of the board
//! - [`board::BoardClient`]: draft, error banner and submit flow

pub mod api;
pub mod board;
pub mod error;
pub mod feed;
pub mod view;

pub use api::{BoardApi, BoardEndpoint, SubmitOutcome};
pub use board::{BoardClient, Draft, SubmitMode};
pub use error::ClientError;
pub use feed::{ChangeFeed, FeedHandle, FeedUpdate, PollFeed, PushFeed};
pub use view::{BoardView, ViewState};
