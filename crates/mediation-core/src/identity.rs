//! # Identity Newtypes
//!
//! Domain-primitive newtypes for identifiers throughout the mediation stack.
//! Each identifier is a distinct type: you cannot pass a [`CommentId`]
//! where a [`DisputeId`] is expected.
//!
//! ## Validation
//!
//! String-based values ([`Email`], [`PhoneNumber`], [`PersonName`]) validate
//! and normalise at construction time. UUID-based identifiers ([`UserId`],
//! [`DisputeId`], [`CommentId`], [`FileId`]) are always valid by
//! construction.

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::ValidationError;

// ---------------------------------------------------------------------------
// UUID-based identifiers (always valid by construction)
// ---------------------------------------------------------------------------

macro_rules! uuid_id {
    ($(#[$meta:meta])* $name:ident, $what:literal) => {
        $(#[$meta])*
        #[derive(
            Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize,
        )]
        #[serde(transparent)]
        pub struct $name(Uuid);

        impl $name {
            #[doc = concat!("Create a new random ", $what, " identifier.")]
            pub fn new() -> Self {
                Self(Uuid::new_v4())
            }

            #[doc = concat!("Create a ", $what, " identifier from an existing UUID.")]
            pub fn from_uuid(id: Uuid) -> Self {
                Self(id)
            }

            /// Access the underlying UUID.
            pub fn as_uuid(&self) -> &Uuid {
                &self.0
            }
        }

        impl Default for $name {
            fn default() -> Self {
                Self::new()
            }
        }

        impl std::fmt::Display for $name {
            fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
                write!(f, "{}", self.0)
            }
        }

        impl From<Uuid> for $name {
            fn from(id: Uuid) -> Self {
                Self(id)
            }
        }
    };
}

uuid_id!(
    /// A unique identifier for a user account.
    UserId,
    "user"
);

uuid_id!(
    /// A unique identifier for a dispute.
    DisputeId,
    "dispute"
);

uuid_id!(
    /// A unique identifier for a comment posted on a dispute.
    CommentId,
    "comment"
);

uuid_id!(
    /// A unique identifier for an uploaded file attachment.
    FileId,
    "file"
);

// ---------------------------------------------------------------------------
// String-based values (validated at construction)
// ---------------------------------------------------------------------------

/// Maximum length of an email address (RFC 5321 path limit).
const MAX_EMAIL_LENGTH: usize = 254;

/// An email address, used as the login name of a user.
///
/// # Validation
///
/// - Exactly one `@`, with a non-empty local part and a domain
/// - Domain contains a `.` that is neither its first nor last character
/// - No whitespace, at most 254 characters
///
/// The domain is lowercased on construction. Uniqueness across users is
/// case-insensitive; compare with [`Email::normalized`].
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct Email(String);

impl Email {
    /// Create an email address from a string, validating format.
    ///
    /// # Errors
    ///
    /// Returns [`ValidationError::InvalidEmail`] if the string is not a
    /// plausible `local@domain.tld` address.
    pub fn new(value: impl Into<String>) -> Result<Self, ValidationError> {
        let s = value.into();
        let trimmed = s.trim();
        let invalid = || ValidationError::InvalidEmail(s.clone());

        if trimmed.is_empty()
            || trimmed.len() > MAX_EMAIL_LENGTH
            || trimmed.chars().any(char::is_whitespace)
        {
            return Err(invalid());
        }

        let (local, domain) = trimmed.rsplit_once('@').ok_or_else(invalid)?;
        if local.is_empty() || local.contains('@') || domain.is_empty() {
            return Err(invalid());
        }
        match domain.find('.') {
            Some(pos) if pos > 0 && !domain.ends_with('.') => {}
            _ => return Err(invalid()),
        }

        Ok(Self(format!("{local}@{}", domain.to_ascii_lowercase())))
    }

    /// Access the address as stored.
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Fully lowercased form, used for uniqueness checks and login lookup.
    pub fn normalized(&self) -> String {
        self.0.to_lowercase()
    }
}

impl TryFrom<String> for Email {
    type Error = ValidationError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::new(value)
    }
}

impl From<Email> for String {
    fn from(email: Email) -> Self {
        email.0
    }
}

impl std::fmt::Display for Email {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Maximum number of digits in a stored phone number.
const MAX_PHONE_DIGITS: usize = 12;

/// A contact phone number, stored as digits only.
///
/// Input may carry a leading `+` and the separators space, `-`, `(` and
/// `)`; these are stripped. What remains must be 1 to 12 ASCII digits.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct PhoneNumber(String);

impl PhoneNumber {
    /// Create a phone number from a string, normalising separators away.
    ///
    /// # Errors
    ///
    /// Returns [`ValidationError::InvalidPhoneNumber`] if anything other
    /// than digits and separators is present, or the digit count is out of
    /// range.
    pub fn new(value: impl Into<String>) -> Result<Self, ValidationError> {
        let s = value.into();
        let trimmed = s.trim();
        let body = trimmed.strip_prefix('+').unwrap_or(trimmed);

        let mut digits = String::with_capacity(body.len());
        for c in body.chars() {
            match c {
                '0'..='9' => digits.push(c),
                ' ' | '-' | '(' | ')' => {}
                _ => return Err(ValidationError::InvalidPhoneNumber(s)),
            }
        }

        if digits.is_empty() || digits.len() > MAX_PHONE_DIGITS {
            return Err(ValidationError::InvalidPhoneNumber(s));
        }
        Ok(Self(digits))
    }

    /// Access the normalised digit string.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl TryFrom<String> for PhoneNumber {
    type Error = ValidationError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::new(value)
    }
}

impl From<PhoneNumber> for String {
    fn from(phone: PhoneNumber) -> Self {
        phone.0
    }
}

impl std::fmt::Display for PhoneNumber {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Maximum length of a first or last name.
pub const MAX_NAME_LENGTH: usize = 150;

/// A first or last name: trimmed, non-empty, at most 150 characters.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct PersonName(String);

impl PersonName {
    /// Create a name for the given field, trimming surrounding whitespace.
    ///
    /// # Errors
    ///
    /// Returns [`ValidationError::InvalidName`] naming `field` if the
    /// trimmed value is empty or longer than [`MAX_NAME_LENGTH`].
    pub fn new(field: &'static str, value: impl Into<String>) -> Result<Self, ValidationError> {
        let s = value.into();
        let trimmed = s.trim();
        let len = trimmed.chars().count();
        if len == 0 || len > MAX_NAME_LENGTH {
            return Err(ValidationError::InvalidName {
                field,
                max: MAX_NAME_LENGTH,
            });
        }
        Ok(Self(trimmed.to_string()))
    }

    /// Access the name.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for PersonName {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn uuid_ids_are_unique() {
        assert_ne!(DisputeId::new(), DisputeId::new());
        let raw = Uuid::new_v4();
        assert_eq!(UserId::from_uuid(raw).as_uuid(), &raw);
    }

    #[test]
    fn uuid_id_serializes_as_bare_string() {
        let id = CommentId::new();
        let json = serde_json::to_string(&id).unwrap();
        assert_eq!(json, format!("\"{id}\""));
        let back: CommentId = serde_json::from_str(&json).unwrap();
        assert_eq!(back, id);
    }

    #[test]
    fn email_valid() {
        let email = Email::new("Alice@Example.COM").unwrap();
        assert_eq!(email.as_str(), "Alice@example.com");
        assert_eq!(email.normalized(), "alice@example.com");
    }

    #[test]
    fn email_rejects_malformed() {
        for bad in [
            "",
            "alice",
            "@example.com",
            "alice@",
            "alice@example",
            "alice@.com",
            "alice@example.",
            "al ice@example.com",
            "a@b@example.com",
        ] {
            assert!(Email::new(bad).is_err(), "accepted {bad:?}");
        }
    }

    #[test]
    fn email_deserialize_validates() {
        let err = serde_json::from_str::<Email>("\"nope\"");
        assert!(err.is_err());
    }

    #[test]
    fn phone_strips_separators() {
        let phone = PhoneNumber::new("+7 (912) 345-67-89").unwrap();
        assert_eq!(phone.as_str(), "79123456789");
    }

    #[test]
    fn phone_rejects_letters() {
        assert!(matches!(
            PhoneNumber::new("8912abc4567"),
            Err(ValidationError::InvalidPhoneNumber(_))
        ));
    }

    #[test]
    fn phone_rejects_too_long_and_empty() {
        assert!(PhoneNumber::new("1234567890123").is_err());
        assert!(PhoneNumber::new("+").is_err());
        assert!(PhoneNumber::new("").is_err());
        assert!(PhoneNumber::new("123456789012").is_ok());
    }

    #[test]
    fn person_name_trims_and_bounds() {
        assert_eq!(PersonName::new("first_name", "  Anna ").unwrap().as_str(), "Anna");
        assert!(PersonName::new("first_name", "   ").is_err());
        assert!(PersonName::new("last_name", "x".repeat(151)).is_err());
        assert!(PersonName::new("last_name", "я".repeat(150)).is_ok());
    }
}
