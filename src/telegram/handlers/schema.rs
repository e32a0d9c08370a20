//! Dispatcher schema and handler chain builders

use teloxide::dispatching::{HandlerExt, UpdateFilterExt, UpdateHandler};
use teloxide::prelude::*;
use teloxide::types::Message;

use super::callbacks::encode_callback_handler;
use super::commands::{handle_help_command, handle_start_command, handle_status_command};
use super::types::{HandlerDeps, HandlerError};
use super::uploads::upload_handler;
use crate::telegram::bot::Command;
use crate::telegram::Bot;

/// Creates the main dispatcher schema for the Telegram bot.
///
/// # Arguments
/// * `deps` - Handler dependencies (database pool, encode service)
///
/// # Returns
/// The complete handler tree for the bot
pub fn schema(deps: HandlerDeps) -> UpdateHandler<HandlerError> {
    let deps_commands = deps.clone();
    let deps_uploads = deps.clone();
    let deps_callback = deps;

    dptree::entry()
        .branch(command_handler(deps_commands))
        .branch(upload_handler(deps_uploads))
        .branch(encode_callback_handler(deps_callback))
}

/// Handler for bot commands
fn command_handler(deps: HandlerDeps) -> UpdateHandler<HandlerError> {
    Update::filter_message().branch(dptree::entry().filter_command::<Command>().endpoint(
        move |bot: Bot, msg: Message, cmd: Command| {
            let deps = deps.clone();
            async move {
                log::info!("Received command: {:?} from chat {}", cmd, msg.chat.id);

                match cmd {
                    Command::Start => handle_start_command(&bot, &msg, &deps).await?,
                    Command::Encode | Command::Help => handle_help_command(&bot, &msg).await?,
                    Command::Status => handle_status_command(&bot, &msg, &deps).await?,
                }
                Ok(())
            }
        },
    ))
}
