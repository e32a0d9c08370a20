//! Encodebot - Telegram bot that re-encodes uploaded videos with ffmpeg
//!
//! Users send a video or a video document, the bot stages it locally and
//! answers with an "Encode Video" button. Pressing it runs ffmpeg through a
//! fallback chain of profiles and sends the 480p result back.
//!
//! # Module Structure
//!
//! - `core`: configuration, errors, logging, upload validation
//! - `storage`: SQLite user store
//! - `transfer`: button tokens for staged files
//! - `progress`: throttled status messages
//! - `encode`: ffmpeg profiles, runner and fallback pipeline
//! - `workflow`: stage -> claim -> encode -> deliver
//! - `telegram`: bot setup and handlers

pub mod cli;
pub mod core;
pub mod encode;
pub mod messages;
pub mod progress;
pub mod storage;
pub mod telegram;
pub mod transfer;
pub mod workflow;

// Re-export commonly used types for convenience
pub use crate::core::{config, AppError, AppResult};
pub use storage::{create_pool, get_connection, DbConnection, DbPool};
pub use transfer::{TransferToken, TransferTracker};
pub use workflow::{EncodeService, Workspace};
