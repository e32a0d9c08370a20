//! Telegram bot handler tree configuration
//!
//! The dispatcher schema is built from one branch per update kind:
//! commands, video/document uploads and encode button presses.

mod callbacks;
mod commands;
mod schema;
mod types;
mod uploads;

pub use schema::schema;
pub use types::{sender_id, user_id, HandlerDeps, HandlerError};
