//! # Users and Roles
//!
//! Account records and the role that gates every dispute permission.
//! The rule functions in [`crate::policy`] never see a full [`User`]; they
//! take an [`Actor`], the id/role pair resolved from a bearer token.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use mediation_core::{Email, PasswordHash, PersonName, PhoneNumber, UserId};

/// Account role.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Role {
    /// Ordinary participant: files disputes, is named as an opponent.
    #[default]
    User,
    /// Arbitrates disputes: sees all of them, controls status.
    Mediator,
    /// Manages accounts. Has no mediator powers over disputes.
    Admin,
}

impl Role {
    /// The canonical string name of this role.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::User => "user",
            Self::Mediator => "mediator",
            Self::Admin => "admin",
        }
    }

    /// Parse a stored role name.
    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "user" => Some(Self::User),
            "mediator" => Some(Self::Mediator),
            "admin" => Some(Self::Admin),
            _ => None,
        }
    }
}

impl std::fmt::Display for Role {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// The authenticated party performing an operation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Actor {
    /// The acting user.
    pub id: UserId,
    /// The acting user's role.
    pub role: Role,
}

impl Actor {
    /// Construct an actor.
    pub fn new(id: UserId, role: Role) -> Self {
        Self { id, role }
    }

    /// Whether the actor holds mediator powers.
    pub fn is_mediator(&self) -> bool {
        self.role == Role::Mediator
    }

    /// Whether the actor may manage other accounts.
    pub fn is_admin(&self) -> bool {
        self.role == Role::Admin
    }
}

/// A registered account.
#[derive(Debug, Clone)]
pub struct User {
    /// Unique identifier.
    pub id: UserId,
    /// Login name, unique case-insensitively.
    pub email: Email,
    /// Given name.
    pub first_name: PersonName,
    /// Family name.
    pub last_name: PersonName,
    /// Contact number, unique.
    pub phone_number: PhoneNumber,
    /// Account role.
    pub role: Role,
    /// Salted password digest.
    pub password_hash: PasswordHash,
    /// Inactive accounts cannot log in.
    pub is_active: bool,
    /// Account creation time.
    pub created_at: DateTime<Utc>,
}

impl User {
    /// Create an active account with a fresh id.
    pub fn new(
        email: Email,
        first_name: PersonName,
        last_name: PersonName,
        phone_number: PhoneNumber,
        role: Role,
        password_hash: PasswordHash,
    ) -> Self {
        Self {
            id: UserId::new(),
            email,
            first_name,
            last_name,
            phone_number,
            role,
            password_hash,
            is_active: true,
            created_at: Utc::now(),
        }
    }

    /// This user as an [`Actor`].
    pub fn actor(&self) -> Actor {
        Actor::new(self.id, self.role)
    }

    /// Case-insensitive substring match on first or last name.
    pub fn matches_search(&self, query: &str) -> bool {
        let query = query.trim().to_lowercase();
        if query.is_empty() {
            return true;
        }
        self.first_name.as_str().to_lowercase().contains(&query)
            || self.last_name.as_str().to_lowercase().contains(&query)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample(first: &str, last: &str) -> User {
        User::new(
            Email::new("anna@example.com").unwrap(),
            PersonName::new("first_name", first).unwrap(),
            PersonName::new("last_name", last).unwrap(),
            PhoneNumber::new("89123456789").unwrap(),
            Role::User,
            PasswordHash::hash("password1"),
        )
    }

    #[test]
    fn role_serialization() {
        assert_eq!(serde_json::to_string(&Role::Mediator).unwrap(), "\"mediator\"");
        let role: Role = serde_json::from_str("\"admin\"").unwrap();
        assert_eq!(role, Role::Admin);
        assert_eq!(Role::parse("user"), Some(Role::User));
        assert_eq!(Role::parse("root"), None);
    }

    #[test]
    fn search_matches_either_name_case_insensitively() {
        let user = sample("Анна", "Smith");
        assert!(user.matches_search("анн"));
        assert!(user.matches_search("SMI"));
        assert!(user.matches_search(""));
        assert!(!user.matches_search("jones"));
    }

    #[test]
    fn new_user_is_active() {
        let user = sample("Anna", "Smith");
        assert!(user.is_active);
        assert_eq!(user.actor(), Actor::new(user.id, Role::User));
    }
}
