//! # Dispute Error Types
//!
//! Structured error hierarchy for dispute, comment and attachment rules.
//! Every variant knows which request field it concerns ([`DisputeError::field`])
//! and whether it is an authorization refusal ([`DisputeError::is_forbidden`])
//! or a rule violation in an otherwise permitted request.

use thiserror::Error;

use mediation_core::{UserId, ValidationError};

/// Errors arising from dispute lifecycle and permission rules.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum DisputeError {
    /// The requester named themselves as an opponent.
    #[error("You cannot set yourself as an opponent.")]
    SelfOpponent,

    /// An opponent id does not name an existing user.
    #[error("User {0} does not exist.")]
    UnknownOpponent(UserId),

    /// The dispute is closed and accepts no further changes.
    #[error("Cannot update a closed dispute.")]
    Closed,

    /// A non-creator tried to change the description.
    #[error("Only the creator can change the description.")]
    DescriptionCreatorOnly,

    /// A non-mediator tried to change the status.
    #[error("Only a mediator can change the status.")]
    StatusMediatorOnly,

    /// A mediator tried to change the opponent list.
    #[error("Mediator cannot change opponent.")]
    MediatorOpponent,

    /// The creator tried to modify a dispute after mediation started.
    #[error("Creator cannot make changes once mediation has started.")]
    CreatorLocked,

    /// The requested status is not a known lifecycle status.
    #[error("\"{0}\" is not a valid status.")]
    UnknownStatus(String),

    /// The requested status change is not a legal lifecycle transition.
    #[error("Cannot change status from {from} to {to}.")]
    InvalidTransition {
        /// Current status name.
        from: &'static str,
        /// Requested status name.
        to: &'static str,
    },

    /// A free-text field failed validation.
    #[error("{source}")]
    InvalidText {
        /// The field that failed (`description`, `content`).
        field: &'static str,
        /// The underlying validation failure.
        source: ValidationError,
    },

    /// A comment was posted on a closed dispute.
    #[error("Cannot add a comment to a closed dispute.")]
    CommentOnClosed,

    /// A file was attached to a closed dispute or one of its comments.
    #[error("Cannot attach files to a closed dispute.")]
    AttachToClosed,

    /// A closed dispute cannot be deleted.
    #[error("Cannot delete a closed dispute.")]
    DeleteClosed,

    /// Uploaded file is empty.
    #[error("The submitted file is empty.")]
    EmptyFile,

    /// Uploaded file exceeds the size limit.
    #[error("File size {actual} exceeds the limit of {max} bytes.")]
    FileTooLarge {
        /// Configured limit in bytes.
        max: usize,
        /// Size of the rejected upload.
        actual: usize,
    },

    /// File name is empty or contains a path separator.
    #[error("Invalid file name.")]
    InvalidFileName,

    /// Mediators may not delete disputes.
    #[error("Mediator cannot delete disputes.")]
    MediatorDelete,

    /// Only the creator may delete a dispute.
    #[error("You do not have permission to delete this dispute.")]
    DeleteForbidden,

    /// The actor has read-only access to the dispute.
    #[error("You do not have permission to modify this dispute.")]
    WriteForbidden,

    /// The actor may not see or post comments on this dispute.
    #[error("You do not have permission to comment on this dispute.")]
    CommentForbidden,

    /// The actor may not attach files here.
    #[error("You do not have permission to attach files here.")]
    AttachForbidden,
}

impl DisputeError {
    /// The request field this error is reported under. Errors that are not
    /// tied to a single field use `detail`.
    pub fn field(&self) -> &'static str {
        match self {
            Self::SelfOpponent | Self::UnknownOpponent(_) | Self::MediatorOpponent => "opponent",
            Self::DescriptionCreatorOnly => "description",
            Self::StatusMediatorOnly
            | Self::CreatorLocked
            | Self::UnknownStatus(_)
            | Self::InvalidTransition { .. } => "status",
            Self::InvalidText { field, .. } => *field,
            Self::EmptyFile | Self::FileTooLarge { .. } | Self::InvalidFileName => "file",
            Self::Closed
            | Self::CommentOnClosed
            | Self::AttachToClosed
            | Self::DeleteClosed
            | Self::MediatorDelete
            | Self::DeleteForbidden
            | Self::WriteForbidden
            | Self::CommentForbidden
            | Self::AttachForbidden => "detail",
        }
    }

    /// Whether this is an authorization refusal (HTTP 403) rather than a
    /// rule violation (HTTP 400).
    pub fn is_forbidden(&self) -> bool {
        matches!(
            self,
            Self::MediatorDelete
                | Self::DeleteForbidden
                | Self::WriteForbidden
                | Self::CommentForbidden
                | Self::AttachForbidden
        )
    }

    pub(crate) fn text(field: &'static str) -> impl FnOnce(ValidationError) -> Self {
        move |source| Self::InvalidText { field, source }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn field_keys() {
        assert_eq!(DisputeError::SelfOpponent.field(), "opponent");
        assert_eq!(DisputeError::Closed.field(), "detail");
        assert_eq!(DisputeError::CreatorLocked.field(), "status");
        let text = DisputeError::InvalidText {
            field: "content",
            source: ValidationError::TextTooShort { min: 3, actual: 0 },
        };
        assert_eq!(text.field(), "content");
    }

    #[test]
    fn forbidden_classification() {
        assert!(DisputeError::MediatorDelete.is_forbidden());
        assert!(DisputeError::WriteForbidden.is_forbidden());
        assert!(!DisputeError::Closed.is_forbidden());
        assert!(!DisputeError::StatusMediatorOnly.is_forbidden());
    }

    #[test]
    fn messages_are_client_facing() {
        assert_eq!(
            DisputeError::CommentOnClosed.to_string(),
            "Cannot add a comment to a closed dispute."
        );
        assert_eq!(
            DisputeError::InvalidTransition {
                from: "started",
                to: "not_started"
            }
            .to_string(),
            "Cannot change status from started to not_started."
        );
    }
}
