//! Encode button handler

use teloxide::dispatching::{UpdateFilterExt, UpdateHandler};
use teloxide::prelude::*;
use teloxide::types::CallbackQuery;

use super::types::{user_id, HandlerDeps, HandlerError};
use crate::messages;
use crate::progress::{render_quietly, StatusSink};
use crate::telegram::files::TelegramDelivery;
use crate::telegram::status::TelegramStatus;
use crate::telegram::Bot;
use crate::transfer::{TakeError, TransferToken};
use crate::workflow::JobOutcome;

/// Token carried by an encode button payload (`encode_<token>`).
pub(super) fn parse_encode_callback(data: &str) -> Option<TransferToken> {
    data.strip_prefix(messages::ENCODE_CALLBACK_PREFIX)
        .filter(|token| !token.is_empty())
        .map(TransferToken::from_raw)
}

/// Replaces the button message with the re-upload hint; a failed edit is only logged.
pub(super) async fn show_file_not_found(status: &dyn StatusSink) {
    render_quietly(status, messages::FILE_NOT_FOUND.to_string()).await;
}

/// Handler for encode button presses
pub(super) fn encode_callback_handler(deps: HandlerDeps) -> UpdateHandler<HandlerError> {
    Update::filter_callback_query()
        .filter(|q: CallbackQuery| {
            q.data
                .as_deref()
                .map(|d| d.starts_with(messages::ENCODE_CALLBACK_PREFIX))
                .unwrap_or(false)
        })
        .endpoint(move |bot: Bot, q: CallbackQuery| {
            let deps = deps.clone();
            async move { handle_encode_callback(bot, q, deps).await }
        })
}

async fn handle_encode_callback(bot: Bot, q: CallbackQuery, deps: HandlerDeps) -> Result<(), HandlerError> {
    let callback_id = q.id.clone();
    let token = q.data.as_deref().and_then(parse_encode_callback);
    let target = q.message.as_ref().map(|m| (m.chat().id, m.id()));

    let (Some(token), Some((chat_id, message_id))) = (token, target) else {
        bot.answer_callback_query(callback_id).await?;
        return Ok(());
    };

    let presser = user_id(&q.from);
    let record = match deps.service.claim(&token, presser) {
        Ok(record) => record,
        Err(TakeError::NotOwner) => {
            log::warn!("User {} pressed encode on token {} they do not own", presser, token);
            bot.answer_callback_query(callback_id)
                .text(messages::NOT_YOUR_FILE)
                .show_alert(true)
                .await?;
            return Ok(());
        }
        Err(TakeError::NotFound) => {
            bot.answer_callback_query(callback_id).await?;
            show_file_not_found(&TelegramStatus::new(bot, chat_id, message_id)).await;
            return Ok(());
        }
    };

    bot.answer_callback_query(callback_id)
        .text(messages::ENCODE_STARTING)
        .await?;

    let status = TelegramStatus::new(bot.clone(), chat_id, message_id);
    let delivery = TelegramDelivery::new(bot, chat_id);
    let service = deps.service.clone();

    tokio::spawn(async move {
        match service.encode_and_deliver(&record, &status, &delivery).await {
            JobOutcome::Delivered(report) => log::info!(
                "Job for user {} finished with {} profile after {} attempt(s)",
                record.owner_id,
                report.profile,
                report.attempts
            ),
            JobOutcome::InputMissing => log::warn!("Job for user {} had no input", record.owner_id),
            JobOutcome::EncodeFailed(failure) => log::warn!("Job for user {} failed: {}", record.owner_id, failure),
            JobOutcome::DeliveryFailed { error, .. } => {
                log::warn!("Job for user {} not delivered: {}", record.owner_id, error)
            }
        }
    });

    Ok(())
}
