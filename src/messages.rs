//! User-facing texts. All of them are sent as plain text.

use crate::core::config;
use crate::core::utils::bytes_to_mb;
use crate::encode::EncodeReport;

pub const START_FIRST: &str = "❌ Please start the bot first using /start";
pub const FILE_NOT_FOUND: &str = "❌ File not found! Please upload again.";
pub const NOT_YOUR_FILE: &str = "❌ This is not your file!";
pub const DOWNLOAD_STARTING: &str = "📥 Starting download...";
pub const ENCODE_STARTING: &str = "🎬 Starting encoding...";
pub const ENCODE_STARTED: &str = "🎬 Encoding Started...\n⏳ Please wait...";
pub const INTERNAL_ERROR: &str = "❌ Something went wrong. Please try again later.";
pub const ENCODE_BUTTON: &str = "🎬 Encode Video";

/// Callback payload prefix of the encode button.
pub const ENCODE_CALLBACK_PREFIX: &str = "encode_";

/// Welcome text: `START_MSG` with `{first}` replaced by the user's first name.
pub fn welcome(first_name: &str) -> String {
    config::START_MSG.replace("{first}", first_name)
}

pub fn help() -> String {
    format!(
        "🎬 How to use encode:\n\n\
         1️⃣ Send me a video file\n\
         2️⃣ Wait for download to complete\n\
         3️⃣ Click the '{}' button\n\
         4️⃣ Wait for encoding to finish\n\
         5️⃣ Download your encoded video!\n\n\
         Supported formats: {}",
        ENCODE_BUTTON.trim_start_matches("🎬 "),
        config::upload::ALLOWED_EXTENSIONS
            .iter()
            .map(|ext| ext.to_uppercase())
            .collect::<Vec<_>>()
            .join(", ")
    )
}

pub fn status(staged: usize, encoded: usize) -> String {
    format!(
        "📊 Bot Status:\n\n\
         📥 Files in queue: {}\n\
         📤 Encoded files: {}\n\
         🎬 Encoding format: {}x{} (480p)\n\
         🔧 Codec: H.264 (libx264)\n\
         🎵 Audio: AAC",
        staged,
        encoded,
        config::encode::TARGET_WIDTH,
        config::encode::TARGET_HEIGHT
    )
}

pub fn download_complete(file_name: &str, size: u64) -> String {
    format!(
        "✅ Download Complete!\n📁 File: {}\n💾 Size: {:.1} MB\n\nClick below to start encoding:",
        file_name,
        bytes_to_mb(size)
    )
}

pub fn download_failed(error: &impl std::fmt::Display) -> String {
    format!("❌ Download failed: {}", error)
}

/// Elapsed time, sizes, compression and the profile that produced the output.
pub fn encode_summary(report: &EncodeReport) -> String {
    format!(
        "✅ Encoding Complete!\n\
         ⏱️ Time taken: {}s\n\
         📁 Original: {:.1} MB\n\
         📁 Encoded: {:.1} MB\n\
         📉 Compression: {:.1}%\n\
         🔧 Profile: {}",
        report.elapsed.as_secs(),
        bytes_to_mb(report.input_size),
        bytes_to_mb(report.output_size),
        report.compression_percent(),
        report.profile
    )
}

pub fn encode_complete(report: &EncodeReport) -> String {
    format!("{}\n\n📤 Uploading...", encode_summary(report))
}

/// Caption attached to the delivered video.
pub fn encoded_caption(report: &EncodeReport) -> String {
    format!(
        "✅ Encoding Complete!\n⏱️ Time: {}s\n📉 Compression: {:.1}%",
        report.elapsed.as_secs(),
        report.compression_percent()
    )
}

pub fn encode_failed(error_tail: &str) -> String {
    format!("❌ Encoding Failed!\n\n{}", error_tail)
}

pub fn upload_failed(error: &impl std::fmt::Display) -> String {
    format!("❌ Upload failed: {}", error)
}

/// Encode button payload for `token`.
pub fn encode_callback_data(token: &str) -> String {
    format!("{}{}", ENCODE_CALLBACK_PREFIX, token)
}
