//! Status message backed by a Telegram message

use async_trait::async_trait;
use teloxide::prelude::*;
use teloxide::types::MessageId;

use super::Bot;
use crate::core::error::AppResult;
use crate::progress::StatusSink;

/// One editable message in a chat.
#[derive(Clone)]
pub struct TelegramStatus {
    bot: Bot,
    chat_id: ChatId,
    message_id: MessageId,
}

impl TelegramStatus {
    pub fn new(bot: Bot, chat_id: ChatId, message_id: MessageId) -> Self {
        Self {
            bot,
            chat_id,
            message_id,
        }
    }

    /// Sends `text` as a new message and wraps it.
    pub async fn send(bot: &Bot, chat_id: ChatId, text: &str) -> ResponseResult<Self> {
        let msg = bot.send_message(chat_id, text).await?;
        Ok(Self::new(bot.clone(), chat_id, msg.id))
    }

    pub fn chat_id(&self) -> ChatId {
        self.chat_id
    }

    pub fn message_id(&self) -> MessageId {
        self.message_id
    }
}

#[async_trait]
impl StatusSink for TelegramStatus {
    async fn render(&self, text: String) -> AppResult<()> {
        match self.bot.edit_message_text(self.chat_id, self.message_id, text).await {
            Ok(_) => Ok(()),
            // Same text twice in a row is not a failure
            Err(teloxide::RequestError::Api(teloxide::ApiError::MessageNotModified)) => Ok(()),
            Err(e) => Err(e.into()),
        }
    }

    async fn remove(&self) -> AppResult<()> {
        self.bot.delete_message(self.chat_id, self.message_id).await?;
        Ok(())
    }
}
