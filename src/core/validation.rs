//! Inbound upload validation
//!
//! Decides whether an uploaded file may be staged, before anything touches
//! the filesystem:
//! - documents must carry a video extension from the allow-list
//! - native videos are accepted regardless of their declared name
//! - nothing larger than the size limit is accepted

use thiserror::Error;

use crate::core::config;
use crate::core::utils::{escape_filename, file_extension};

/// How the file arrived from the messaging transport
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UploadKind {
    /// A native video message
    Video,
    /// A generic document attachment
    Document,
}

/// Upload metadata as declared by the sender
#[derive(Debug, Clone)]
pub struct UploadRequest {
    pub kind: UploadKind,
    pub file_name: Option<String>,
    pub declared_size: u64,
}

/// Reasons an upload is refused. Each maps to one user-visible reply.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum UploadRejection {
    #[error("❌ Please send a valid video file!")]
    UnsupportedExtension,

    #[error("❌ File size too large! Maximum 2GB allowed.")]
    TooLarge { size: u64, limit: u64 },
}

/// Validates an upload and returns the file name it will be staged under.
///
/// `now_unix` names native videos (`video_<now_unix>.mp4`), whose declared
/// names are not trusted.
///
/// # Examples
/// ```
/// use encodebot::core::validation::{validate_upload, UploadKind, UploadRequest};
///
/// let req = UploadRequest { kind: UploadKind::Document, file_name: Some("clip.mkv".into()), declared_size: 10 };
/// assert_eq!(validate_upload(&req, 0).unwrap(), "clip.mkv");
///
/// let req = UploadRequest { kind: UploadKind::Document, file_name: Some("notes.txt".into()), declared_size: 10 };
/// assert!(validate_upload(&req, 0).is_err());
/// ```
pub fn validate_upload(request: &UploadRequest, now_unix: i64) -> Result<String, UploadRejection> {
    let staged_name = match request.kind {
        UploadKind::Video => format!("video_{}.mp4", now_unix),
        UploadKind::Document => {
            let name = request
                .file_name
                .as_deref()
                .filter(|n| !n.trim().is_empty())
                .ok_or(UploadRejection::UnsupportedExtension)?;
            if !is_allowed_extension(name) {
                return Err(UploadRejection::UnsupportedExtension);
            }
            escape_filename(name)
        }
    };

    if request.declared_size > config::upload::MAX_FILE_SIZE {
        return Err(UploadRejection::TooLarge {
            size: request.declared_size,
            limit: config::upload::MAX_FILE_SIZE,
        });
    }

    Ok(staged_name)
}

/// Checks a file name against the video extension allow-list (case-insensitive).
pub fn is_allowed_extension(name: &str) -> bool {
    file_extension(name)
        .map(|ext| config::upload::ALLOWED_EXTENSIONS.contains(&ext.as_str()))
        .unwrap_or(false)
}
