//! Bot initialization
//!
//! This module contains:
//! - Command enum definition
//! - Bot instance creation
//! - Command menu registration

use reqwest::ClientBuilder;
use teloxide::prelude::*;
use teloxide::utils::command::BotCommands;

use super::Bot;
use crate::core::config;

/// Bot commands enum with descriptions
#[derive(BotCommands, Clone, Debug, PartialEq, Eq)]
#[command(rename_rule = "lowercase", description = "Available commands:")]
pub enum Command {
    #[command(description = "register and show the welcome message")]
    Start,
    #[command(description = "how to encode a video")]
    Encode,
    #[command(description = "how to encode a video")]
    Help,
    #[command(description = "files waiting and encoded, encoding format")]
    Status,
}

/// Creates a Bot instance with custom or default API URL
///
/// A local Bot API server (`BOT_API_URL`) is needed for files over 20 MB.
///
/// # Returns
/// * `Ok(Bot)` - Successfully created bot instance
/// * `Err(anyhow::Error)` - Failed to create bot (invalid URL, client build failure)
pub fn create_bot() -> anyhow::Result<Bot> {
    let client = ClientBuilder::new().timeout(config::network::timeout()).build()?;
    let bot = Bot::with_client(config::BOT_TOKEN.as_str(), client);

    let bot = match config::BOT_API_URL.as_deref() {
        Some(bot_api_url) => {
            log::info!("Using custom Bot API URL: {}", bot_api_url);
            let url = url::Url::parse(bot_api_url).map_err(|e| anyhow::anyhow!("Invalid BOT_API_URL: {}", e))?;
            bot.set_api_url(url)
        }
        None => bot,
    };

    Ok(bot)
}

/// Sets up bot commands in Telegram UI
///
/// # Returns
/// * `Ok(())` - Commands set successfully
/// * `Err(RequestError)` - Failed to set commands
pub async fn setup_bot_commands(bot: &Bot) -> Result<(), teloxide::RequestError> {
    bot.set_my_commands(Command::bot_commands()).await?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_command_descriptions() {
        let command_list = format!("{}", Command::descriptions());

        assert!(command_list.contains("Available commands"));
        assert!(command_list.contains("/start"));
        assert!(command_list.contains("/encode"));
        assert!(command_list.contains("/help"));
        assert!(command_list.contains("/status"));
    }

    #[test]
    fn test_command_parsing() {
        assert_eq!(Command::parse("/status", "encodebot").ok(), Some(Command::Status));
        assert_eq!(Command::parse("/help", "encodebot").ok(), Some(Command::Help));
        assert!(Command::parse("/unknown", "encodebot").is_err());
    }

    #[test]
    fn test_menu_lists_every_command() {
        let names: Vec<String> = Command::bot_commands().into_iter().map(|c| c.command).collect();
        assert_eq!(names.len(), 4);
        assert!(names.iter().any(|n| n.ends_with("encode")));
    }
}
