//! Client-side error types.

/// Failure to talk to the board server at all.
///
/// Gate rejections are not errors at this level; they come back as
/// [`SubmitOutcome::Error`](crate::api::SubmitOutcome::Error).
#[derive(Debug, thiserror::Error)]
pub enum ClientError {
    #[error("request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("invalid url: {0}")]
    Url(#[from] url::ParseError),

    /// The server answered a read with a non-success status.
    #[error("server returned {status}: {message}")]
    Status { status: u16, message: String },

    /// A feed event could not be decoded.
    #[error("bad feed event: {0}")]
    Decode(String),
}
