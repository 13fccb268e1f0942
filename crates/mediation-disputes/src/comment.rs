//! Comments posted on a dispute by its participants. Immutable once created.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use mediation_core::{CommentId, DisputeId, FreeText, UserId};

/// A message in a dispute's thread.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Comment {
    /// Unique identifier.
    pub id: CommentId,
    /// Author.
    pub sender: UserId,
    /// Body text.
    pub content: String,
    /// The dispute this comment belongs to.
    pub dispute: DisputeId,
    /// Posting time.
    pub created_at: DateTime<Utc>,
}

impl Comment {
    /// Create a comment. Callers run
    /// [`crate::policy::check_comment_create`] first.
    pub fn new(sender: UserId, dispute: DisputeId, content: FreeText) -> Self {
        Self {
            id: CommentId::new(),
            sender,
            content: content.into_inner(),
            dispute,
            created_at: Utc::now(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn new_comment_keeps_trimmed_content() {
        let dispute = DisputeId::new();
        let comment = Comment::new(UserId::new(), dispute, FreeText::new("  hello ").unwrap());
        assert_eq!(comment.content, "hello");
        assert_eq!(comment.dispute, dispute);
    }
}
