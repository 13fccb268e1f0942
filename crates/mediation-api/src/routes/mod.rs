//! # API Route Handlers
//!
//! Each submodule owns one resource and exposes a `router()` that the
//! application assembles in [`crate::app`].
//!
//! - [`auth`]: token login and logout, self-registration.
//! - [`users`]: account listing, profiles, role management and password
//!   changes.
//! - [`disputes`]: role-filtered dispute CRUD with the gated PATCH pipeline.
//! - [`comments`]: the comment thread of a dispute.
//! - [`files`]: uploads to disputes and comments, downloads.

pub mod auth;
pub mod comments;
pub mod disputes;
pub mod files;
pub mod users;
