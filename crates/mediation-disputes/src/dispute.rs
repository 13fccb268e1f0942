//! # Dispute Lifecycle
//!
//! A dispute moves through three statuses:
//!
//! ```text
//!   NotStarted ──────► Started ──────► Closed
//!        │                               ▲
//!        └───────────────────────────────┘
//! ```
//!
//! `Closed` is terminal. Moving back from `Started` to `NotStarted` is
//! rejected. Re-asserting the current status is a no-op.
//!
//! ## Validated Enum
//!
//! Status is a plain validated enum rather than a typestate: disputes are
//! stored and transmitted with the status unknown at compile time, and the
//! transition is driven by a PATCH body. [`DisputeStatus::can_transition_to`]
//! is the single runtime check.
//!
//! ## Legacy spelling
//!
//! Older records spell the in-progress status `stated`. It is accepted on
//! input (serde alias and [`DisputeStatus::parse`]) and always written back
//! as `started`.

use std::collections::BTreeSet;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use mediation_core::{DisputeId, FreeText, UserId};

use crate::error::DisputeError;

// ── Status ─────────────────────────────────────────────────────────────

/// Lifecycle status of a dispute.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DisputeStatus {
    /// Filed, mediation not yet begun. The creator may still edit.
    #[default]
    NotStarted,
    /// A mediator has taken the dispute up.
    #[serde(alias = "stated")]
    Started,
    /// Mediation finished. Terminal.
    Closed,
}

impl DisputeStatus {
    /// The canonical string name of this status.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::NotStarted => "not_started",
            Self::Started => "started",
            Self::Closed => "closed",
        }
    }

    /// Parse a status name, accepting the legacy `stated` spelling.
    ///
    /// # Errors
    ///
    /// Returns [`DisputeError::UnknownStatus`] for anything else.
    pub fn parse(s: &str) -> Result<Self, DisputeError> {
        match s {
            "not_started" => Ok(Self::NotStarted),
            "started" | "stated" => Ok(Self::Started),
            "closed" => Ok(Self::Closed),
            other => Err(DisputeError::UnknownStatus(other.to_string())),
        }
    }

    /// Whether this status is terminal (no further transitions allowed).
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Closed)
    }

    /// Valid target statuses from this status, excluding itself.
    pub fn valid_transitions(&self) -> &'static [DisputeStatus] {
        match self {
            Self::NotStarted => &[Self::Started, Self::Closed],
            Self::Started => &[Self::Closed],
            Self::Closed => &[],
        }
    }

    /// Whether moving to `target` is legal. Staying put is always legal.
    pub fn can_transition_to(&self, target: DisputeStatus) -> bool {
        *self == target || self.valid_transitions().contains(&target)
    }
}

impl std::fmt::Display for DisputeStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

// ── Dispute ────────────────────────────────────────────────────────────

/// A dispute between a creator and one or more opponents.
///
/// Invariants maintained by [`crate::patch::apply_patch`]:
/// - `closed_at.is_some()` exactly when `status == Closed`
/// - `creator` is never a member of `opponent`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Dispute {
    /// Unique identifier.
    pub id: DisputeId,
    /// The user who filed the dispute.
    pub creator: UserId,
    /// Counterparties named by the creator.
    pub opponent: BTreeSet<UserId>,
    /// What the dispute is about.
    pub description: String,
    /// Lifecycle status.
    pub status: DisputeStatus,
    /// Whether the named opponents are admitted to the dispute.
    pub add_opponent: bool,
    /// Filing time.
    pub created_at: DateTime<Utc>,
    /// Closing time, set when the status becomes `closed`.
    pub closed_at: Option<DateTime<Utc>>,
}

impl Dispute {
    /// File a new dispute in the `not_started` status.
    ///
    /// Callers run [`crate::policy::check_create`] on the opponent set first.
    pub fn new(
        creator: UserId,
        opponent: BTreeSet<UserId>,
        description: FreeText,
        add_opponent: bool,
    ) -> Self {
        Self {
            id: DisputeId::new(),
            creator,
            opponent,
            description: description.into_inner(),
            status: DisputeStatus::NotStarted,
            add_opponent,
            created_at: Utc::now(),
            closed_at: None,
        }
    }

    /// Whether the dispute is closed.
    pub fn is_closed(&self) -> bool {
        self.status.is_terminal()
    }

    /// Whether `user` filed this dispute.
    pub fn is_creator(&self, user: &UserId) -> bool {
        self.creator == *user
    }

    /// Whether `user` is a named opponent, admitted or not.
    pub fn is_listed_opponent(&self, user: &UserId) -> bool {
        self.opponent.contains(user)
    }

    /// Whether `user` is a named opponent and opponents are admitted.
    pub fn is_admitted_opponent(&self, user: &UserId) -> bool {
        self.add_opponent && self.is_listed_opponent(user)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn status_serialization() {
        assert_eq!(
            serde_json::to_string(&DisputeStatus::NotStarted).unwrap(),
            "\"not_started\""
        );
        let legacy: DisputeStatus = serde_json::from_str("\"stated\"").unwrap();
        assert_eq!(legacy, DisputeStatus::Started);
        assert_eq!(
            serde_json::to_string(&legacy).unwrap(),
            "\"started\""
        );
    }

    #[test]
    fn parse_accepts_legacy_and_rejects_unknown() {
        assert_eq!(DisputeStatus::parse("stated"), Ok(DisputeStatus::Started));
        assert_eq!(
            DisputeStatus::parse("open"),
            Err(DisputeError::UnknownStatus("open".to_string()))
        );
    }

    #[test]
    fn transitions() {
        use DisputeStatus::*;
        assert!(NotStarted.can_transition_to(Started));
        assert!(NotStarted.can_transition_to(Closed));
        assert!(Started.can_transition_to(Closed));
        assert!(Started.can_transition_to(Started));
        assert!(!Started.can_transition_to(NotStarted));
        assert!(!Closed.can_transition_to(Started));
        assert!(Closed.valid_transitions().is_empty());
        assert!(Closed.is_terminal());
    }

    #[test]
    fn new_dispute_defaults() {
        let creator = UserId::new();
        let opponent = UserId::new();
        let dispute = Dispute::new(
            creator,
            BTreeSet::from([opponent]),
            FreeText::new("Unpaid invoice").unwrap(),
            false,
        );
        assert_eq!(dispute.status, DisputeStatus::NotStarted);
        assert!(dispute.closed_at.is_none());
        assert!(dispute.is_creator(&creator));
        assert!(dispute.is_listed_opponent(&opponent));
        assert!(!dispute.is_admitted_opponent(&opponent));
    }

    #[test]
    fn dispute_json_shape() {
        let dispute = Dispute::new(
            UserId::new(),
            BTreeSet::new(),
            FreeText::new("Broken contract").unwrap(),
            true,
        );
        let json = serde_json::to_value(&dispute).unwrap();
        assert_eq!(json["status"], "not_started");
        assert!(json["opponent"].is_array());
        assert!(json["closed_at"].is_null());
    }
}
