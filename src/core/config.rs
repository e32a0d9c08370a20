//! Configuration values for the bot.
//!
//! Environment-backed values are read once on first access. Call
//! `dotenvy::dotenv()` before touching any of them.

use once_cell::sync::Lazy;
use std::env;
use std::path::PathBuf;
use std::time::Duration;

/// Bot token
/// Read from BOT_TOKEN or TELOXIDE_TOKEN environment variable
pub static BOT_TOKEN: Lazy<String> = Lazy::new(|| {
    env::var("BOT_TOKEN")
        .or_else(|_| env::var("TELOXIDE_TOKEN"))
        .unwrap_or_else(|_| String::new())
});

/// Custom Bot API server URL (required for files larger than 20 MB)
/// Read from BOT_API_URL environment variable
pub static BOT_API_URL: Lazy<Option<String>> = Lazy::new(|| env::var("BOT_API_URL").ok().filter(|s| !s.is_empty()));

/// Database file path
/// Read from DATABASE_PATH environment variable
/// Default: database.sqlite
pub static DATABASE_PATH: Lazy<String> =
    Lazy::new(|| env::var("DATABASE_PATH").unwrap_or_else(|_| "database.sqlite".to_string()));

/// Log file path
/// Read from LOG_FILE_PATH environment variable
/// Default: app.log
pub static LOG_FILE_PATH: Lazy<String> =
    Lazy::new(|| env::var("LOG_FILE_PATH").unwrap_or_else(|_| "app.log".to_string()));

/// Directory for staged inbound files
/// Read from DOWNLOADS_DIR environment variable, supports tilde (~) expansion
/// Default: downloads
pub static DOWNLOADS_DIR: Lazy<PathBuf> = Lazy::new(|| expand_dir("DOWNLOADS_DIR", "downloads"));

/// Directory for completed encodes awaiting delivery
/// Read from ENCODED_DIR environment variable, supports tilde (~) expansion
/// Default: encoded
pub static ENCODED_DIR: Lazy<PathBuf> = Lazy::new(|| expand_dir("ENCODED_DIR", "encoded"));

/// ffmpeg binary
/// Read from FFMPEG_BIN environment variable or defaults to "ffmpeg"
pub static FFMPEG_BIN: Lazy<String> = Lazy::new(|| env::var("FFMPEG_BIN").unwrap_or_else(|_| "ffmpeg".to_string()));

/// Welcome text for /start. `{first}` is replaced with the user's first name.
pub static START_MSG: Lazy<String> = Lazy::new(|| {
    env::var("START_MSG").unwrap_or_else(|_| {
        "👋 Hello {first}!\n\nSend me a video and I will re-encode it to 480p H.264.\nUse /encode to see how it works."
            .to_string()
    })
});

/// Optional photo (URL or Telegram file id) sent with the welcome text
pub static START_PIC: Lazy<Option<String>> = Lazy::new(|| env::var("START_PIC").ok().filter(|s| !s.is_empty()));

/// Link behind the "Updates" button of the welcome message
pub static UPDATES_URL: Lazy<String> =
    Lazy::new(|| env::var("UPDATES_URL").unwrap_or_else(|_| "https://t.me/telegram".to_string()));

/// Link behind the "Support" button of the welcome message
pub static SUPPORT_URL: Lazy<String> =
    Lazy::new(|| env::var("SUPPORT_URL").unwrap_or_else(|_| "https://t.me/BotSupport".to_string()));

fn expand_dir(var: &str, default: &str) -> PathBuf {
    let raw = env::var(var).unwrap_or_else(|_| default.to_string());
    PathBuf::from(shellexpand::tilde(&raw).into_owned())
}

/// Transfer token bookkeeping
pub mod transfer {
    use super::Duration;

    /// Staged files not encoded within this window must be uploaded again
    pub const RETENTION_SECS: u64 = 60 * 60;

    /// Upper bound on tracked tokens; the oldest insertion is evicted first
    pub const MAX_TRACKED: usize = 1024;

    /// Period of the background sweep task
    pub const SWEEP_INTERVAL_SECS: u64 = 5 * 60;

    /// Token length in hex characters
    pub const TOKEN_LEN: usize = 8;

    pub fn retention() -> Duration {
        Duration::from_secs(RETENTION_SECS)
    }

    pub fn sweep_interval() -> Duration {
        Duration::from_secs(SWEEP_INTERVAL_SECS)
    }
}

/// Progress reporting cadence
pub mod progress {
    use super::Duration;

    /// Minimum time between two status edits of the same message
    pub const REPORT_INTERVAL_SECS: u64 = 20;

    /// How often background monitors wake up to check whether a report is due
    pub const MONITOR_TICK_SECS: u64 = 5;

    pub fn report_interval() -> Duration {
        Duration::from_secs(REPORT_INTERVAL_SECS)
    }

    pub fn monitor_tick() -> Duration {
        Duration::from_secs(MONITOR_TICK_SECS)
    }
}

/// Inbound upload limits
pub mod upload {
    /// Largest accepted declared file size (2 GiB)
    pub const MAX_FILE_SIZE: u64 = 2 * 1024 * 1024 * 1024;

    /// Extensions accepted for generic documents; native videos skip this check
    pub const ALLOWED_EXTENSIONS: &[&str] = &["mp4", "mkv", "avi", "mov", "wmv", "flv"];
}

/// Encoder settings
pub mod encode {
    use super::Duration;

    /// Target frame size
    pub const TARGET_WIDTH: u32 = 854;
    pub const TARGET_HEIGHT: u32 = 480;

    /// x264 constant rate factor
    pub const CRF: u8 = 30;

    /// Number of trailing characters of ffmpeg stderr shown to the user
    pub const ERROR_TAIL_CHARS: usize = 500;

    /// Hard limit for a single ffmpeg attempt
    pub const TIMEOUT_SECS: u64 = 3 * 60 * 60;

    pub fn timeout() -> Duration {
        Duration::from_secs(TIMEOUT_SECS)
    }
}

/// Network configuration
pub mod network {
    use super::Duration;

    /// Request timeout for Bot API calls (in seconds)
    /// Large so that multi-gigabyte uploads through a local Bot API server finish
    pub const REQUEST_TIMEOUT_SECS: u64 = 900;

    pub fn timeout() -> Duration {
        Duration::from_secs(REQUEST_TIMEOUT_SECS)
    }
}

/// Dispatcher restart policy
pub mod retry {
    use super::Duration;

    /// Maximum number of retries for dispatcher reconnection
    pub const MAX_DISPATCHER_RETRIES: u32 = 5;

    /// Delay between dispatcher retry attempts (in seconds)
    pub const DISPATCHER_RETRY_DELAY_SECS: u64 = 5;

    pub fn dispatcher_delay() -> Duration {
        Duration::from_secs(DISPATCHER_RETRY_DELAY_SECS)
    }
}
