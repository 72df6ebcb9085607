//! HTTP route handlers.

pub mod feed;
pub mod messages;
pub mod system;
