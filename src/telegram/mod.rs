//! Telegram bot integration and handlers

pub mod bot;
pub mod files;
pub mod handlers;
pub mod status;

pub use bot::{create_bot, setup_bot_commands, Command};
pub use handlers::{schema, HandlerDeps, HandlerError};

/// Bot type used across the crate
pub type Bot = teloxide::Bot;
