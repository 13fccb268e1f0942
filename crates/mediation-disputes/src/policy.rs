//! # Authorization Rules
//!
//! Pure predicates over an [`Actor`] and the records it wants to touch.
//! No I/O: existence lookups are passed in as closures, so the rule set is
//! exercised directly by unit and property tests.
//!
//! ## Access matrix
//!
//! | Operation            | Creator                  | Admitted opponent | Mediator        | Other |
//! |----------------------|--------------------------|-------------------|-----------------|-------|
//! | view dispute         | yes                      | yes               | yes             | no    |
//! | modify dispute       | while `not_started`      | no                | until closed    | no    |
//! | delete dispute       | until closed             | no                | no              | no    |
//! | read/post comments   | yes (post: until closed) | yes               | yes             | no    |
//! | attach to dispute    | while `not_started`      | no                | until closed    | no    |
//! | attach to comment    | own comments, until closed | own comments, until closed | own comments, until closed | no |
//!
//! An "admitted opponent" is a listed opponent on a dispute with
//! `add_opponent = true`. Admins have no dispute powers beyond a user's.

use mediation_core::UserId;

use crate::comment::Comment;
use crate::dispute::{Dispute, DisputeStatus};
use crate::error::DisputeError;
use crate::user::Actor;

/// Whether `actor` may see `dispute` at all. Disputes failing this check
/// are reported as not found.
pub fn can_view_dispute(actor: &Actor, dispute: &Dispute) -> bool {
    actor.is_mediator()
        || dispute.is_creator(&actor.id)
        || dispute.is_admitted_opponent(&actor.id)
}

/// Whether `actor` has write access to `dispute` (before field gates).
pub fn can_write_dispute(actor: &Actor, dispute: &Dispute) -> bool {
    actor.is_mediator() || dispute.is_creator(&actor.id)
}

/// Validate the opponent set of a new dispute filed by `actor`.
///
/// # Errors
///
/// - [`DisputeError::SelfOpponent`] if `actor` names themselves
/// - [`DisputeError::UnknownOpponent`] for the first id that
///   `user_exists` does not recognise
pub fn check_create<'a>(
    actor: &Actor,
    opponent: impl IntoIterator<Item = &'a UserId>,
    user_exists: impl Fn(&UserId) -> bool,
) -> Result<(), DisputeError> {
    let opponent: Vec<&UserId> = opponent.into_iter().collect();
    if opponent.iter().any(|id| **id == actor.id) {
        return Err(DisputeError::SelfOpponent);
    }
    if let Some(missing) = opponent.into_iter().find(|id| !user_exists(id)) {
        return Err(DisputeError::UnknownOpponent(*missing));
    }
    Ok(())
}

/// Check whether `actor` may delete `dispute`.
///
/// # Errors
///
/// - [`DisputeError::MediatorDelete`] for any mediator
/// - [`DisputeError::DeleteForbidden`] for anyone but the creator
/// - [`DisputeError::DeleteClosed`] once the dispute is closed
pub fn check_delete(actor: &Actor, dispute: &Dispute) -> Result<(), DisputeError> {
    if actor.is_mediator() {
        return Err(DisputeError::MediatorDelete);
    }
    if !dispute.is_creator(&actor.id) {
        return Err(DisputeError::DeleteForbidden);
    }
    if dispute.is_closed() {
        return Err(DisputeError::DeleteClosed);
    }
    Ok(())
}

/// Whether `actor` may read the comment thread of `dispute`.
pub fn can_access_comments(actor: &Actor, dispute: &Dispute) -> bool {
    dispute.is_creator(&actor.id) || dispute.is_admitted_opponent(&actor.id) || actor.is_mediator()
}

/// Check whether `actor` may post a comment on `dispute`.
///
/// # Errors
///
/// - [`DisputeError::CommentForbidden`] without comment access
/// - [`DisputeError::CommentOnClosed`] once the dispute is closed
pub fn check_comment_create(actor: &Actor, dispute: &Dispute) -> Result<(), DisputeError> {
    if !can_access_comments(actor, dispute) {
        return Err(DisputeError::CommentForbidden);
    }
    if dispute.is_closed() {
        return Err(DisputeError::CommentOnClosed);
    }
    Ok(())
}

/// Check whether `actor` may attach a file to `dispute`. Mirrors the
/// gates a PATCH by the same actor would pass.
///
/// # Errors
///
/// - [`DisputeError::AttachForbidden`] without write access
/// - [`DisputeError::AttachToClosed`] once the dispute is closed
/// - [`DisputeError::CreatorLocked`] for the creator after mediation started
pub fn can_attach_to_dispute(actor: &Actor, dispute: &Dispute) -> Result<(), DisputeError> {
    if !can_write_dispute(actor, dispute) {
        return Err(DisputeError::AttachForbidden);
    }
    if dispute.is_closed() {
        return Err(DisputeError::AttachToClosed);
    }
    if dispute.is_creator(&actor.id) && dispute.status != DisputeStatus::NotStarted {
        return Err(DisputeError::CreatorLocked);
    }
    Ok(())
}

/// Check whether `actor` may attach a file to `comment` on `dispute`.
///
/// # Errors
///
/// - [`DisputeError::AttachForbidden`] unless `actor` sent the comment
/// - [`DisputeError::AttachToClosed`] once the dispute is closed
pub fn can_attach_to_comment(
    actor: &Actor,
    comment: &Comment,
    dispute: &Dispute,
) -> Result<(), DisputeError> {
    if comment.sender != actor.id {
        return Err(DisputeError::AttachForbidden);
    }
    if dispute.is_closed() {
        return Err(DisputeError::AttachToClosed);
    }
    Ok(())
}
