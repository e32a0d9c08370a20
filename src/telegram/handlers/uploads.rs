//! Video upload handler: validate, stage, offer the encode button

use teloxide::dispatching::{UpdateFilterExt, UpdateHandler};
use teloxide::prelude::*;
use teloxide::types::{InlineKeyboardButton, InlineKeyboardMarkup, Message};

use super::types::{sender_id, HandlerDeps, HandlerError};
use crate::core::validation::{UploadKind, UploadRequest};
use crate::messages;
use crate::progress::render_quietly;
use crate::storage::db;
use crate::storage::get_connection;
use crate::telegram::files::TelegramFile;
use crate::telegram::status::TelegramStatus;
use crate::telegram::Bot;
use crate::transfer::TransferToken;

/// File metadata extracted from a video or document message.
#[derive(Debug, Clone)]
pub(super) struct IncomingFile {
    pub file_id: String,
    pub request: UploadRequest,
}

/// Extracts the attached video or document, if any.
pub(super) fn incoming_file(msg: &Message) -> Option<IncomingFile> {
    if let Some(video) = msg.video() {
        return Some(IncomingFile {
            file_id: video.file.id.0.clone(),
            request: UploadRequest {
                kind: UploadKind::Video,
                file_name: video.file_name.clone(),
                declared_size: u64::from(video.file.size),
            },
        });
    }
    msg.document().map(|doc| IncomingFile {
        file_id: doc.file.id.0.clone(),
        request: UploadRequest {
            kind: UploadKind::Document,
            file_name: doc.file_name.clone(),
            declared_size: u64::from(doc.file.size),
        },
    })
}

/// Single "Encode Video" button carrying `encode_<token>`.
pub(super) fn encode_keyboard(token: &TransferToken) -> InlineKeyboardMarkup {
    InlineKeyboardMarkup::new(vec![vec![InlineKeyboardButton::callback(
        messages::ENCODE_BUTTON,
        messages::encode_callback_data(token.as_str()),
    )]])
}

/// Handler for video and document messages
pub(super) fn upload_handler(deps: HandlerDeps) -> UpdateHandler<HandlerError> {
    Update::filter_message()
        .filter(|msg: Message| msg.video().is_some() || msg.document().is_some())
        .endpoint(move |bot: Bot, msg: Message| {
            let deps = deps.clone();
            async move { handle_upload(bot, msg, deps).await }
        })
}

async fn handle_upload(bot: Bot, msg: Message, deps: HandlerDeps) -> Result<(), HandlerError> {
    let chat_id = msg.chat.id;
    let user_id = sender_id(&msg);

    let registered = match get_connection(&deps.db_pool) {
        Ok(conn) => match db::get_user(&conn, user_id) {
            Ok(user) => user.is_some(),
            Err(e) => {
                log::error!("Failed to get user {}: {}", user_id, e);
                false
            }
        },
        Err(e) => {
            log::error!("Failed to get DB connection: {}", e);
            bot.send_message(chat_id, messages::INTERNAL_ERROR).await?;
            return Ok(());
        }
    };
    if !registered {
        bot.send_message(chat_id, messages::START_FIRST).await?;
        return Ok(());
    }

    let Some(incoming) = incoming_file(&msg) else {
        return Ok(());
    };

    let file_name = match deps
        .service
        .check_upload(&incoming.request, chrono::Utc::now().timestamp())
    {
        Ok(name) => name,
        Err(rejection) => {
            log::info!("Rejected upload from {}: {:?}", user_id, rejection);
            bot.send_message(chat_id, rejection.to_string()).await?;
            return Ok(());
        }
    };

    let status = TelegramStatus::send(&bot, chat_id, messages::DOWNLOAD_STARTING).await?;

    // Staging can take minutes; keep the dispatcher free for this chat
    tokio::spawn(async move {
        let fetcher = TelegramFile::new(
            bot.clone(),
            incoming.file_id,
            file_name.clone(),
            incoming.request.declared_size,
        );
        match deps.service.stage(user_id, &file_name, &fetcher, &status).await {
            Ok(staged) => {
                let result = bot
                    .edit_message_text(
                        chat_id,
                        status.message_id(),
                        messages::download_complete(&staged.file_name, staged.size),
                    )
                    .reply_markup(encode_keyboard(&staged.token))
                    .await;
                if let Err(e) = result {
                    log::warn!("Failed to show encode button for {}: {}", staged.file_name, e);
                }
            }
            Err(e) => render_quietly(&status, messages::download_failed(&e)).await,
        }
    });

    Ok(())
}
