#![deny(missing_docs)]

//! # mediation-core — Foundational Types for the Mediation Stack
//!
//! This crate defines the types every other crate in the workspace depends
//! on. It has no internal crate dependencies, only `serde`, `thiserror`,
//! `uuid`, `sha2`, `pbkdf2`, `rand` and `subtle` from the external ecosystem.
//!
//! ## Design Principles
//!
//! 1. **Newtype wrappers for identifiers.** Every identifier is a distinct
//!    type. You cannot pass a [`CommentId`] where a [`DisputeId`] is expected.
//!
//! 2. **Validate at construction.** [`Email`], [`PhoneNumber`] and
//!    [`FreeText`] reject malformed input in their constructors, so a value
//!    of the type is always well-formed.
//!
//! 3. **Passwords never travel in clear.** [`PasswordHash`], a salted
//!    PBKDF2-SHA256 key, is the only persisted form; verification is
//!    constant-time.
//!
//! 4. **[`ValidationError`] hierarchy.** Structured errors with `thiserror`,
//!    no `.unwrap()` outside tests.

pub mod error;
pub mod identity;
pub mod password;
pub mod text;

// Re-export primary types at crate root for ergonomic imports.
pub use error::ValidationError;
pub use identity::{CommentId, DisputeId, Email, FileId, PersonName, PhoneNumber, UserId};
pub use password::{digest_token, generate_token, validate_password, PasswordHash, PBKDF2_ROUNDS};
pub use text::{FreeText, MAX_TEXT_LENGTH, MIN_TEXT_LENGTH};
