//! Handler types and dependencies

use std::sync::Arc;

use teloxide::types::{Message, User};

use crate::encode::FfmpegRunner;
use crate::storage::DbPool;
use crate::workflow::EncodeService;

/// Error type for handlers
pub type HandlerError = Box<dyn std::error::Error + Send + Sync + 'static>;

/// Dependencies required by handlers
///
/// Built once in `main` and cloned into every branch of the handler tree.
#[derive(Clone)]
pub struct HandlerDeps {
    pub db_pool: Arc<DbPool>,
    pub service: Arc<EncodeService<FfmpegRunner>>,
}

impl HandlerDeps {
    /// Create new handler dependencies
    pub fn new(db_pool: Arc<DbPool>, service: Arc<EncodeService<FfmpegRunner>>) -> Self {
        Self { db_pool, service }
    }
}

/// Telegram user id as stored in the database.
pub fn user_id(user: &User) -> i64 {
    i64::try_from(user.id.0).unwrap_or(0)
}

/// Sender of a message, falling back to the chat id for anonymous posts.
pub fn sender_id(msg: &Message) -> i64 {
    msg.from.as_ref().map(user_id).unwrap_or(msg.chat.id.0)
}
