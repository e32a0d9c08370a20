//! Command handler implementations (/start, /encode, /help, /status)

use teloxide::prelude::*;
use teloxide::types::{InlineKeyboardButton, InlineKeyboardMarkup, InputFile, Message};

use super::types::{sender_id, HandlerDeps, HandlerError};
use crate::core::config;
use crate::messages;
use crate::storage::db;
use crate::storage::get_connection;
use crate::telegram::Bot;

/// Handle /start command
///
/// Registers the sender (idempotent) and replies with the welcome text and
/// navigation buttons, as a photo caption when `START_PIC` is set.
pub(super) async fn handle_start_command(bot: &Bot, msg: &Message, deps: &HandlerDeps) -> Result<(), HandlerError> {
    let user_id = sender_id(msg);
    let first_name = msg.from.as_ref().map(|u| u.first_name.clone()).unwrap_or_default();

    match get_connection(&deps.db_pool) {
        Ok(conn) => match db::ensure_user(&conn, user_id, Some(first_name.as_str())) {
            Ok(true) => log::info!("New user registered: {}", user_id),
            Ok(false) => {}
            Err(e) => log::error!("Failed to register user {}: {}", user_id, e),
        },
        Err(e) => log::error!("Failed to get DB connection: {}", e),
    }

    let text = messages::welcome(&first_name);
    let keyboard = start_keyboard();

    if let Some(pic) = config::START_PIC.as_deref() {
        let photo = match url::Url::parse(pic) {
            Ok(url) => InputFile::url(url),
            Err(_) => InputFile::file_id(teloxide::types::FileId(pic.to_string())),
        };
        match bot
            .send_photo(msg.chat.id, photo)
            .caption(text.clone())
            .reply_markup(keyboard.clone())
            .await
        {
            Ok(_) => return Ok(()),
            Err(e) => log::warn!("Failed to send start photo: {}, falling back to text", e),
        }
    }

    bot.send_message(msg.chat.id, text).reply_markup(keyboard).await?;
    Ok(())
}

/// Navigation buttons under the welcome message.
///
/// A button whose URL does not parse is left out.
pub(super) fn start_keyboard() -> InlineKeyboardMarkup {
    let buttons: Vec<InlineKeyboardButton> = [
        ("📢 Updates", config::UPDATES_URL.as_str()),
        ("💬 Support", config::SUPPORT_URL.as_str()),
    ]
    .into_iter()
    .filter_map(|(label, link)| match url::Url::parse(link) {
        Ok(url) => Some(InlineKeyboardButton::url(label, url)),
        Err(e) => {
            log::warn!("Skipping {} button with invalid URL {}: {}", label, link, e);
            None
        }
    })
    .collect();

    InlineKeyboardMarkup::new(vec![buttons])
}

/// Handle /encode and /help commands
pub(super) async fn handle_help_command(bot: &Bot, msg: &Message) -> Result<(), HandlerError> {
    bot.send_message(msg.chat.id, messages::help()).await?;
    Ok(())
}

/// Handle /status command
pub(super) async fn handle_status_command(bot: &Bot, msg: &Message, deps: &HandlerDeps) -> Result<(), HandlerError> {
    let (staged, encoded) = deps.service.workspace().file_counts();
    bot.send_message(msg.chat.id, messages::status(staged, encoded)).await?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_start_keyboard_has_navigation_buttons() {
        let keyboard = start_keyboard();
        assert_eq!(keyboard.inline_keyboard.len(), 1);
        assert_eq!(keyboard.inline_keyboard[0].len(), 2);
        assert_eq!(keyboard.inline_keyboard[0][0].text, "📢 Updates");
    }
}
