//! # Error Hierarchy
//!
//! Validation errors for the domain primitives defined in this crate.
//! Each variant carries the rejected input (where it is safe to echo) and
//! the expected format, so a client can fix its request without guesswork.

use thiserror::Error;

/// Validation errors for domain primitive newtypes.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ValidationError {
    /// Email address does not look like `local@domain.tld`.
    #[error("invalid email address: \"{0}\"")]
    InvalidEmail(String),

    /// Phone number contains characters other than digits and separators,
    /// or has the wrong number of digits.
    #[error("invalid phone number: \"{0}\" (expected at most 12 digits, optionally with a leading '+', spaces, dashes or parentheses)")]
    InvalidPhoneNumber(String),

    /// A personal name field is empty or too long.
    #[error("{field} must be between 1 and {max} characters")]
    InvalidName {
        /// The field that failed (`first_name`, `last_name`).
        field: &'static str,
        /// Maximum permitted length.
        max: usize,
    },

    /// Free text is shorter than the minimum length.
    #[error("text must be at least {min} characters, got {actual}")]
    TextTooShort {
        /// Minimum permitted length.
        min: usize,
        /// Length of the rejected input.
        actual: usize,
    },

    /// Free text is longer than the maximum length.
    #[error("text must be at most {max} characters, got {actual}")]
    TextTooLong {
        /// Maximum permitted length.
        max: usize,
        /// Length of the rejected input.
        actual: usize,
    },

    /// Free text contains characters outside the Latin and Cyrillic
    /// alphabets, digits, whitespace and ordinary punctuation.
    #[error("text may contain only Latin or Cyrillic letters, digits and punctuation (found '{0}')")]
    InvalidTextCharacter(char),

    /// Password does not satisfy the password policy.
    #[error("password must be 8-32 characters of Latin letters, digits and the symbols @№:;~#$%^!<>&+,.?/\\`()*|=-")]
    PasswordPolicy,

    /// Stored password hash is not in the `sha256$<salt>$<digest>` format.
    #[error("malformed password hash")]
    MalformedPasswordHash,
}
