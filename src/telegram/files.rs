//! File transfer to and from Telegram
//!
//! Inbound files are streamed over HTTP from the Bot API file endpoint, or
//! copied straight from disk when a local Bot API server on the same host
//! hands back an absolute path. Outbound videos are uploaded through a
//! counting reader so the upload can be narrated.

use async_trait::async_trait;
use std::path::Path;
use teloxide::prelude::*;
use teloxide::types::{FileId, InputFile};
use tokio::io::AsyncWriteExt;
use tokio::time::Instant;
use url::Url;

use super::Bot;
use crate::core::config;
use crate::core::error::{AppError, AppResult};
use crate::progress::{ProgressReader, ProgressReporter, TransferCounter, TransferStatus};
use crate::workflow::{FileFetcher, VideoDelivery};

/// Data root of the official `telegram-bot-api` server image.
const LOCAL_BOT_API_ROOT: &str = "/var/lib/telegram-bot-api/";

/// A document or video attached to an incoming message.
pub struct TelegramFile {
    bot: Bot,
    file_id: String,
    /// Name shown in progress messages
    display_name: String,
    /// Size declared in the message, used when `getFile` reports none
    declared_size: u64,
}

impl TelegramFile {
    pub fn new(bot: Bot, file_id: impl Into<String>, display_name: impl Into<String>, declared_size: u64) -> Self {
        Self {
            bot,
            file_id: file_id.into(),
            display_name: display_name.into(),
            declared_size,
        }
    }
}

#[async_trait]
impl FileFetcher for TelegramFile {
    async fn fetch(&self, dest: &Path, reporter: &mut ProgressReporter<'_>) -> AppResult<u64> {
        let file = self.bot.get_file(FileId(self.file_id.clone())).await?;
        let total = if file.size > 0 {
            u64::from(file.size)
        } else {
            self.declared_size
        };
        log::info!("Fetching {} ({} bytes) from {}", self.display_name, total, file.path);

        let local = Path::new(&file.path);
        if local.is_absolute() && tokio::fs::try_exists(local).await.unwrap_or(false) {
            let copied = tokio::fs::copy(local, dest).await?;
            log::info!("Copied {} from local Bot API storage", self.display_name);
            return Ok(copied);
        }

        let url = build_file_url(&self.bot.api_url(), self.bot.token(), &file.path)?;
        let client = reqwest::Client::builder()
            .timeout(config::network::timeout())
            .build()?;
        let mut resp = client.get(url).send().await?.error_for_status()?;

        let mut dst = tokio::fs::File::create(dest).await?;
        let mut current: u64 = 0;
        while let Some(chunk) = resp.chunk().await? {
            dst.write_all(&chunk).await?;
            current += chunk.len() as u64;
            reporter
                .report(Instant::now(), || {
                    TransferStatus::Downloading {
                        file_name: self.display_name.clone(),
                        current,
                        total,
                    }
                    .to_message()
                })
                .await;
        }
        dst.flush().await?;

        Ok(current)
    }
}

/// Builds `<base>/file/bot<token>/<path>` for the Bot API file endpoint.
///
/// Paths returned by a local Bot API server are absolute inside its data
/// root; that root is stripped.
pub fn build_file_url(base: &Url, token: &str, file_path: &str) -> AppResult<Url> {
    let relative = file_path.strip_prefix(LOCAL_BOT_API_ROOT).unwrap_or(file_path);

    let mut url = base.clone();
    {
        let mut segments = url
            .path_segments_mut()
            .map_err(|_| AppError::Validation("Bot API URL cannot be a base URL".to_string()))?;
        segments.pop_if_empty();
        segments.push("file");
        segments.push(&format!("bot{}", token));
        for seg in relative.split('/').filter(|s| !s.is_empty()) {
            segments.push(seg);
        }
    }
    Ok(url)
}

/// Uploads finished videos to one chat.
pub struct TelegramDelivery {
    bot: Bot,
    chat_id: ChatId,
}

impl TelegramDelivery {
    pub fn new(bot: Bot, chat_id: ChatId) -> Self {
        Self { bot, chat_id }
    }
}

#[async_trait]
impl VideoDelivery for TelegramDelivery {
    async fn deliver(&self, path: &Path, caption: String, counter: TransferCounter) -> AppResult<()> {
        let file = tokio::fs::File::open(path).await?;
        let mut input = InputFile::read(ProgressReader::new(file, counter));
        if let Some(name) = path.file_name().and_then(|n| n.to_str()) {
            input = input.file_name(name.to_string());
        }

        self.bot
            .send_video(self.chat_id, input)
            .caption(caption)
            .supports_streaming(true)
            .await?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_file_url_official_api() {
        let base = Url::parse("https://api.telegram.org").unwrap();
        let url = build_file_url(&base, "123:ABC", "videos/file_1.mp4").unwrap();
        assert_eq!(url.as_str(), "https://api.telegram.org/file/bot123:ABC/videos/file_1.mp4");
    }

    #[test]
    fn test_file_url_strips_local_server_root() {
        let base = Url::parse("http://localhost:8081/").unwrap();
        let url = build_file_url(&base, "123:ABC", "/var/lib/telegram-bot-api/123:ABC/videos/file_1.mp4").unwrap();
        assert_eq!(
            url.as_str(),
            "http://localhost:8081/file/bot123:ABC/123:ABC/videos/file_1.mp4"
        );
    }

    #[test]
    fn test_file_url_rejects_non_base_url() {
        let base = Url::parse("mailto:bot@example.com").unwrap();
        assert!(build_file_url(&base, "t", "videos/a.mp4").is_err());
    }
}
