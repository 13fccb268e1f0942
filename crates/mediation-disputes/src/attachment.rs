//! # File Attachments
//!
//! Uploaded files hang off exactly one parent: a dispute or a comment.
//! [`AttachmentOwner`] makes that exclusivity a type-level fact instead of
//! two nullable foreign keys.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use mediation_core::{CommentId, DisputeId, FileId, UserId};

use crate::error::DisputeError;

/// Maximum length of an uploaded file name, in characters.
pub const MAX_FILE_NAME_LENGTH: usize = 255;

/// The record a file is attached to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(tag = "kind", content = "id", rename_all = "snake_case")]
pub enum AttachmentOwner {
    /// Attached to a dispute.
    Dispute(DisputeId),
    /// Attached to a comment.
    Comment(CommentId),
}

impl AttachmentOwner {
    /// Stored discriminator: `dispute` or `comment`.
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Dispute(_) => "dispute",
            Self::Comment(_) => "comment",
        }
    }
}

/// An uploaded file.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FileAttachment {
    /// Unique identifier.
    pub id: FileId,
    /// Parent record.
    pub owner: AttachmentOwner,
    /// Client-supplied file name.
    pub file_name: String,
    /// MIME type as sent by the client.
    pub content_type: String,
    /// Size in bytes.
    pub size: usize,
    /// Uploader.
    pub uploaded_by: UserId,
    /// Upload time.
    pub created_at: DateTime<Utc>,
    /// File contents. Served by the download endpoint only.
    #[serde(skip)]
    pub data: Vec<u8>,
}

impl FileAttachment {
    /// Validate an upload and wrap it as an attachment.
    ///
    /// # Errors
    ///
    /// - [`DisputeError::InvalidFileName`] if the name is empty, too long,
    ///   a dot path, or contains `/`, `\` or a control character
    /// - [`DisputeError::EmptyFile`] for a zero-byte body
    /// - [`DisputeError::FileTooLarge`] above `max_size`
    pub fn new(
        owner: AttachmentOwner,
        file_name: &str,
        content_type: Option<&str>,
        data: Vec<u8>,
        uploaded_by: UserId,
        max_size: usize,
    ) -> Result<Self, DisputeError> {
        let file_name = file_name.trim();
        if file_name.is_empty()
            || file_name.chars().count() > MAX_FILE_NAME_LENGTH
            || file_name == "."
            || file_name == ".."
            || file_name
                .chars()
                .any(|c| c == '/' || c == '\\' || c.is_control())
        {
            return Err(DisputeError::InvalidFileName);
        }
        if data.is_empty() {
            return Err(DisputeError::EmptyFile);
        }
        if data.len() > max_size {
            return Err(DisputeError::FileTooLarge {
                max: max_size,
                actual: data.len(),
            });
        }

        Ok(Self {
            id: FileId::new(),
            owner,
            file_name: file_name.to_string(),
            content_type: content_type
                .filter(|ct| !ct.is_empty())
                .unwrap_or("application/octet-stream")
                .to_string(),
            size: data.len(),
            uploaded_by,
            created_at: Utc::now(),
            data,
        })
    }
}
