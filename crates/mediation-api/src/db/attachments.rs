//! File attachment persistence operations.
//!
//! The owner is stored as two nullable foreign keys with a CHECK that
//! exactly one is set; [`AttachmentOwner`] is rebuilt from whichever is
//! present.

use chrono::{DateTime, Utc};
use sqlx::PgPool;
use uuid::Uuid;

use mediation_core::{CommentId, DisputeId, FileId, UserId};
use mediation_disputes::{AttachmentOwner, FileAttachment};

use super::{decode_error, invalid_column};

/// Insert a new attachment, bytes included.
pub async fn insert(pool: &PgPool, file: &FileAttachment) -> Result<(), sqlx::Error> {
    let (dispute_id, comment_id) = match file.owner {
        AttachmentOwner::Dispute(id) => (Some(*id.as_uuid()), None),
        AttachmentOwner::Comment(id) => (None, Some(*id.as_uuid())),
    };
    let size = i64::try_from(file.size).map_err(|e| sqlx::Error::Encode(Box::new(e)))?;

    sqlx::query(
        "INSERT INTO attachments (id, dispute_id, comment_id, file_name, content_type, size, data, uploaded_by, created_at)
         VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9)",
    )
    .bind(file.id.as_uuid())
    .bind(dispute_id)
    .bind(comment_id)
    .bind(&file.file_name)
    .bind(&file.content_type)
    .bind(size)
    .bind(&file.data)
    .bind(file.uploaded_by.as_uuid())
    .bind(file.created_at)
    .execute(pool)
    .await?;

    Ok(())
}

/// Load all attachments from the database into the in-memory store on startup.
pub async fn load_all(pool: &PgPool) -> Result<Vec<FileAttachment>, sqlx::Error> {
    let rows = sqlx::query_as::<_, AttachmentRow>(
        "SELECT id, dispute_id, comment_id, file_name, content_type, size, data, uploaded_by, created_at
         FROM attachments ORDER BY created_at",
    )
    .fetch_all(pool)
    .await?;

    rows.into_iter().map(AttachmentRow::into_record).collect()
}

/// Internal row type for SQLx mapping.
#[derive(sqlx::FromRow)]
struct AttachmentRow {
    id: Uuid,
    dispute_id: Option<Uuid>,
    comment_id: Option<Uuid>,
    file_name: String,
    content_type: String,
    size: i64,
    data: Vec<u8>,
    uploaded_by: Uuid,
    created_at: DateTime<Utc>,
}

impl AttachmentRow {
    fn into_record(self) -> Result<FileAttachment, sqlx::Error> {
        let owner = match (self.dispute_id, self.comment_id) {
            (Some(id), None) => AttachmentOwner::Dispute(DisputeId::from_uuid(id)),
            (None, Some(id)) => AttachmentOwner::Comment(CommentId::from_uuid(id)),
            _ => return Err(invalid_column("attachments.owner", &self.id.to_string())),
        };
        Ok(FileAttachment {
            id: FileId::from_uuid(self.id),
            owner,
            file_name: self.file_name,
            content_type: self.content_type,
            size: usize::try_from(self.size).map_err(decode_error)?,
            data: self.data,
            uploaded_by: UserId::from_uuid(self.uploaded_by),
            created_at: self.created_at,
        })
    }
}
