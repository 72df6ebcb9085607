//! Transport-agnostic board types shared by the store, the HTTP layer and
//! the client.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Deserializer, Serialize};

/// Maximum author length, in characters.
pub const AUTHOR_MAX_CHARS: usize = 24;

/// Maximum body length, in characters.
pub const BODY_MAX_CHARS: usize = 500;

/// A persisted board post. Immutable once created.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Post {
    /// Store-assigned identifier. Remote stores may use integer keys.
    #[serde(deserialize_with = "opaque_id")]
    pub id: String,
    pub author: String,
    pub body: String,
    pub created_at: DateTime<Utc>,
}

/// An admitted post that has not reached the store yet.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct NewPost {
    pub author: String,
    pub body: String,
}

/// A change to the post log, as delivered by a change feed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ChangeEvent {
    Insert(Post),
    Update(Post),
    Delete { id: String },
}

impl ChangeEvent {
    /// Event name used on the wire (`insert`, `update`, `delete`).
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Insert(_) => "insert",
            Self::Update(_) => "update",
            Self::Delete { .. } => "delete",
        }
    }

    /// Identifier of the post this change concerns.
    pub fn post_id(&self) -> &str {
        match self {
            Self::Insert(post) | Self::Update(post) => &post.id,
            Self::Delete { id } => id,
        }
    }
}

/// Payload of a `delete` change event.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DeletedPost {
    #[serde(deserialize_with = "opaque_id")]
    pub id: String,
}

fn opaque_id<'de, D>(deserializer: D) -> Result<String, D::Error>
where
    D: Deserializer<'de>,
{
    match serde_json::Value::deserialize(deserializer)? {
        serde_json::Value::String(s) => Ok(s),
        serde_json::Value::Number(n) => Ok(n.to_string()),
        other => Err(serde::de::Error::custom(format!(
            "expected string or number id, got {other}"
        ))),
    }
}
