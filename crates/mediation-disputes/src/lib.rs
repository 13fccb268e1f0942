#![deny(missing_docs)]

//! # mediation-disputes — Dispute Domain Model and Rules
//!
//! Everything that decides *whether* an operation is allowed, with no I/O:
//!
//! - **User** ([`user`]): accounts, roles and the [`Actor`] performing an
//!   operation.
//!
//! - **Dispute** ([`dispute`]): the dispute record and its three-status
//!   lifecycle.
//!
//! - **Comment** ([`comment`]) and **Attachment** ([`attachment`]): the
//!   thread and uploaded files hanging off a dispute.
//!
//! - **Policy** ([`policy`]): view, write, delete, comment and attach
//!   predicates.
//!
//! - **Patch** ([`patch`]): the ordered field-gate pipeline behind a
//!   dispute PATCH.
//!
//! - **Error** ([`error`]): [`DisputeError`], which carries its field key
//!   and forbidden/invalid classification for the HTTP layer.

pub mod attachment;
pub mod comment;
pub mod dispute;
pub mod error;
pub mod patch;
pub mod policy;
pub mod user;

// Re-export primary types for ergonomic imports.
pub use attachment::{AttachmentOwner, FileAttachment};
pub use comment::Comment;
pub use dispute::{Dispute, DisputeStatus};
pub use error::DisputeError;
pub use patch::{apply_patch, DisputePatch};
pub use user::{Actor, Role, User};
