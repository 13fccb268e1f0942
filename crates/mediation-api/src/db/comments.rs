//! Comment persistence operations. Comments are immutable once written.

use chrono::{DateTime, Utc};
use sqlx::PgPool;
use uuid::Uuid;

use mediation_core::{CommentId, DisputeId, UserId};
use mediation_disputes::Comment;

/// Insert a new comment.
pub async fn insert(pool: &PgPool, comment: &Comment) -> Result<(), sqlx::Error> {
    sqlx::query(
        "INSERT INTO comments (id, sender_id, dispute_id, content, created_at)
         VALUES ($1, $2, $3, $4, $5)",
    )
    .bind(comment.id.as_uuid())
    .bind(comment.sender.as_uuid())
    .bind(comment.dispute.as_uuid())
    .bind(&comment.content)
    .bind(comment.created_at)
    .execute(pool)
    .await?;

    Ok(())
}

/// Load all comments from the database into the in-memory store on startup.
pub async fn load_all(pool: &PgPool) -> Result<Vec<Comment>, sqlx::Error> {
    let rows = sqlx::query_as::<_, CommentRow>(
        "SELECT id, sender_id, dispute_id, content, created_at FROM comments ORDER BY created_at",
    )
    .fetch_all(pool)
    .await?;

    Ok(rows.into_iter().map(CommentRow::into_record).collect())
}

/// Internal row type for SQLx mapping.
#[derive(sqlx::FromRow)]
struct CommentRow {
    id: Uuid,
    sender_id: Uuid,
    dispute_id: Uuid,
    content: String,
    created_at: DateTime<Utc>,
}

impl CommentRow {
    fn into_record(self) -> Comment {
        Comment {
            id: CommentId::from_uuid(self.id),
            sender: UserId::from_uuid(self.sender_id),
            content: self.content,
            dispute: DisputeId::from_uuid(self.dispute_id),
            created_at: self.created_at,
        }
    }
}
