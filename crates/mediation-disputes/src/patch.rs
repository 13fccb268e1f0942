//! # Dispute Partial Update
//!
//! [`apply_patch`] runs a PATCH body through an ordered sequence of gates
//! and returns the updated dispute. The first failing gate wins and the
//! input dispute is left untouched, so a caller holding a write lock can
//! swap the result in or discard it.
//!
//! ## Gate order
//!
//! 0. `opponent` naming the actor → [`DisputeError::SelfOpponent`]
//! 1. dispute closed → [`DisputeError::Closed`]
//! 2. `description` from a non-creator → [`DisputeError::DescriptionCreatorOnly`]
//! 3. `status` from a non-mediator → [`DisputeError::StatusMediatorOnly`]
//! 4. `opponent` from a mediator → [`DisputeError::MediatorOpponent`]
//! 5. creator acting after `not_started` → [`DisputeError::CreatorLocked`]
//! 6. field validation (text, opponent existence, status transition)
//! 7. `closed_at` stamped when the resulting status is `closed`, cleared otherwise
//!
//! Visibility and write access ([`crate::policy::can_view_dispute`],
//! [`crate::policy::can_write_dispute`]) are checked by the caller first.

use std::collections::BTreeSet;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use mediation_core::{FreeText, UserId};

use crate::dispute::{Dispute, DisputeStatus};
use crate::error::DisputeError;
use crate::policy;
use crate::user::Actor;

/// Fields a PATCH may carry. Absent fields are left unchanged.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DisputePatch {
    /// New description.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    /// Replacement opponent list.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub opponent: Option<Vec<UserId>>,
    /// Whether opponents are admitted.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub add_opponent: Option<bool>,
    /// New status name (`not_started`, `started`, `closed`).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub status: Option<String>,
}

impl DisputePatch {
    /// Whether the patch carries no fields.
    pub fn is_empty(&self) -> bool {
        self.description.is_none()
            && self.opponent.is_none()
            && self.add_opponent.is_none()
            && self.status.is_none()
    }
}

/// Apply `patch` to `dispute` on behalf of `actor`.
///
/// `user_exists` resolves opponent ids; `now` is the closing timestamp
/// used when the patch closes the dispute.
///
/// # Errors
///
/// The first failing gate's [`DisputeError`]; see the module docs for
/// the order.
pub fn apply_patch(
    dispute: &Dispute,
    actor: &Actor,
    patch: &DisputePatch,
    user_exists: impl Fn(&UserId) -> bool,
    now: DateTime<Utc>,
) -> Result<Dispute, DisputeError> {
    if let Some(opponent) = &patch.opponent {
        if opponent.contains(&actor.id) {
            return Err(DisputeError::SelfOpponent);
        }
    }

    if dispute.is_closed() {
        return Err(DisputeError::Closed);
    }
    let is_creator = dispute.is_creator(&actor.id);
    if !is_creator && patch.description.is_some() {
        return Err(DisputeError::DescriptionCreatorOnly);
    }
    if !actor.is_mediator() && patch.status.is_some() {
        return Err(DisputeError::StatusMediatorOnly);
    }
    if actor.is_mediator() && patch.opponent.is_some() {
        return Err(DisputeError::MediatorOpponent);
    }
    if is_creator && dispute.status != DisputeStatus::NotStarted {
        return Err(DisputeError::CreatorLocked);
    }

    let mut updated = dispute.clone();

    if let Some(description) = &patch.description {
        updated.description = FreeText::new(description.as_str())
            .map_err(DisputeError::text("description"))?
            .into_inner();
    }

    if let Some(opponent) = &patch.opponent {
        if opponent.contains(&dispute.creator) {
            return Err(DisputeError::SelfOpponent);
        }
        policy::check_create(actor, opponent.iter(), &user_exists)?;
        updated.opponent = opponent.iter().copied().collect::<BTreeSet<_>>();
    }

    if let Some(add_opponent) = patch.add_opponent {
        updated.add_opponent = add_opponent;
    }

    if let Some(status) = &patch.status {
        let target = DisputeStatus::parse(status)?;
        if !dispute.status.can_transition_to(target) {
            return Err(DisputeError::InvalidTransition {
                from: dispute.status.as_str(),
                to: target.as_str(),
            });
        }
        updated.status = target;
    }

    updated.closed_at = match (updated.status, dispute.closed_at) {
        (DisputeStatus::Closed, Some(existing)) => Some(existing),
        (DisputeStatus::Closed, None) => Some(now),
        _ => None,
    };

    Ok(updated)
}


#[cfg(test)]
mod proptests {
    use proptest::prelude::*;

    use super::*;
    use crate::user::Role;

    fn arb_status() -> impl Strategy<Value = DisputeStatus> {
        prop_oneof![
            Just(DisputeStatus::NotStarted),
            Just(DisputeStatus::Started),
            Just(DisputeStatus::Closed),
        ]
    }

    fn arb_status_name() -> impl Strategy<Value = String> {
        prop_oneof![
            Just("not_started".to_string()),
            Just("started".to_string()),
            Just("stated".to_string()),
            Just("closed".to_string()),
        ]
    }

    fn arb_patch() -> impl Strategy<Value = DisputePatch> {
        (
            proptest::option::of("[a-z ]{0,20}"),
            proptest::option::of(proptest::collection::vec(any::<u128>(), 0..3)),
            proptest::option::of(any::<bool>()),
            proptest::option::of(arb_status_name()),
        )
            .prop_map(|(description, opponent, add_opponent, status)| DisputePatch {
                description,
                opponent: opponent.map(|ids| {
                    ids.into_iter()
                        .map(|n| UserId::from_uuid(uuid::Uuid::from_u128(n)))
                        .collect()
                }),
                add_opponent,
                status,
            })
    }

    fn arb_role() -> impl Strategy<Value = Role> {
        prop_oneof![Just(Role::User), Just(Role::Mediator), Just(Role::Admin)]
    }

    fn dispute_with(creator: UserId, status: DisputeStatus) -> Dispute {
        let mut d = Dispute::new(
            creator,
            BTreeSet::from([UserId::new()]),
            FreeText::new("Property dispute").unwrap(),
            true,
        );
        d.status = status;
        if status == DisputeStatus::Closed {
            d.closed_at = Some(Utc::now());
        }
        d
    }

    proptest! {
        /// No patch, from anyone, changes a closed dispute.
        #[test]
        fn closed_dispute_never_changes(patch in arb_patch(), role in arb_role(), is_creator in any::<bool>()) {
            let actor = Actor::new(UserId::new(), role);
            let creator = if is_creator { actor.id } else { UserId::new() };
            let d = dispute_with(creator, DisputeStatus::Closed);
            prop_assert!(apply_patch(&d, &actor, &patch, |_| true, Utc::now()).is_err());
        }

        /// A creator patch that carries `status` is always rejected.
        #[test]
        fn creator_status_always_rejected(
            mut patch in arb_patch(),
            current in arb_status(),
            target in arb_status_name(),
        ) {
            let creator = Actor::new(UserId::new(), Role::User);
            let d = dispute_with(creator.id, current);
            patch.status = Some(target);
            prop_assert!(apply_patch(&d, &creator, &patch, |_| true, Utc::now()).is_err());
        }

        /// A mediator patch that carries `opponent` is always rejected.
        #[test]
        fn mediator_opponent_always_rejected(
            mut patch in arb_patch(),
            current in arb_status(),
            ids in proptest::collection::vec(any::<u128>(), 0..3),
        ) {
            let mediator = Actor::new(UserId::new(), Role::Mediator);
            let d = dispute_with(UserId::new(), current);
            patch.opponent = Some(ids.into_iter().map(|n| UserId::from_uuid(uuid::Uuid::from_u128(n))).collect());
            prop_assert!(apply_patch(&d, &mediator, &patch, |_| true, Utc::now()).is_err());
        }

        /// Every successful patch keeps `closed_at` in step with the status.
        #[test]
        fn closed_at_tracks_status(patch in arb_patch(), current in arb_status(), role in arb_role()) {
            let actor = Actor::new(UserId::new(), role);
            let d = dispute_with(actor.id, current);
            if let Ok(updated) = apply_patch(&d, &actor, &patch, |_| true, Utc::now()) {
                prop_assert_eq!(
                    updated.closed_at.is_some(),
                    updated.status == DisputeStatus::Closed
                );
            }
        }
    }
}
