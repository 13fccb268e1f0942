//! # Authentication & Authorization Middleware
//!
//! Opaque bearer tokens with role-based access control.
//!
//! ## Token Format
//!
//! ```text
//! Authorization: Bearer {64 hex chars}
//! ```
//!
//! Tokens are issued by `POST /auth/token/login/`. The server keeps only
//! the SHA-256 digest of each token, mapped to the owning user, so a leaked
//! `auth_tokens` table cannot be replayed.
//!
//! ## CallerIdentity
//!
//! Every authenticated request gets a [`CallerIdentity`] injected into the
//! request extensions. Handlers extract it via the `FromRequestParts` impl.

use std::collections::HashMap;
use std::sync::Arc;

use axum::extract::{Request, State};
use axum::http::request::Parts;
use axum::http::{header, StatusCode};
use axum::middleware::Next;
use axum::response::{IntoResponse, Response};
use axum::Json;
use axum_extra::headers::authorization::Bearer;
use axum_extra::headers::{Authorization, HeaderMapExt};
use parking_lot::RwLock;

use mediation_core::{digest_token, UserId};
use mediation_disputes::{Actor, Role};

use crate::error::{AppError, ErrorBody};
use crate::state::AppState;

// ── Token Store ─────────────────────────────────────────────────────────────

/// Token digest → user map. Shared across clones.
#[derive(Debug, Clone, Default)]
pub struct TokenStore {
    inner: Arc<RwLock<HashMap<String, UserId>>>,
}

impl TokenStore {
    /// Create an empty token store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a token digest for `user`.
    pub fn insert(&self, digest: String, user: UserId) {
        self.inner.write().insert(digest, user);
    }

    /// Resolve a token digest to its user.
    pub fn resolve(&self, digest: &str) -> Option<UserId> {
        self.inner.read().get(digest).copied()
    }

    /// Revoke a token digest. Returns the user it belonged to.
    pub fn revoke(&self, digest: &str) -> Option<UserId> {
        self.inner.write().remove(digest)
    }

    /// Number of live tokens.
    pub fn len(&self) -> usize {
        self.inner.read().len()
    }

    /// Whether no tokens are live.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

// ── CallerIdentity ──────────────────────────────────────────────────────────

/// Identity of the authenticated caller, extracted from the auth context
/// and available to all route handlers via Axum's `FromRequestParts`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CallerIdentity {
    /// The authenticated user.
    pub user_id: UserId,
    /// The user's role at the time the request was authenticated.
    pub role: Role,
    /// Digest of the presented token, used by logout.
    pub token_digest: String,
}

impl CallerIdentity {
    /// The caller as a rule-set [`Actor`].
    pub fn actor(&self) -> Actor {
        Actor::new(self.user_id, self.role)
    }
}

/// Axum `FromRequestParts` implementation for `CallerIdentity`.
///
/// Extracts the identity that the auth middleware injected into extensions.
/// Returns 401 if no identity is present (middleware didn't run or failed).
impl<S: Send + Sync> axum::extract::FromRequestParts<S> for CallerIdentity {
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        parts
            .extensions
            .get::<CallerIdentity>()
            .cloned()
            .ok_or_else(|| AppError::Unauthorized("no caller identity in request context".into()))
    }
}

/// Check that the caller is an admin.
/// Returns 403 Forbidden otherwise.
pub fn require_admin(caller: &CallerIdentity) -> Result<(), AppError> {
    if caller.role == Role::Admin {
        Ok(())
    } else {
        Err(AppError::Forbidden(format!(
            "role 'admin' required, caller has '{}'",
            caller.role
        )))
    }
}

// ── Middleware ───────────────────────────────────────────────────────────────

/// Extract and validate the Bearer token from the Authorization header.
///
/// The token's digest must be registered and its user must still exist and
/// be active. On success a [`CallerIdentity`] is injected into request
/// extensions for downstream handlers.
pub async fn auth_middleware(
    State(state): State<AppState>,
    mut request: Request,
    next: Next,
) -> Response {
    let bearer = request.headers().typed_get::<Authorization<Bearer>>();

    let token = match bearer {
        Some(Authorization(bearer)) => bearer.token().to_string(),
        None if request.headers().contains_key(header::AUTHORIZATION) => {
            tracing::warn!("authentication failed: non-Bearer authorization scheme");
            return unauthorized_response("authorization header must use Bearer scheme");
        }
        None => {
            tracing::warn!("authentication failed: missing authorization header");
            return unauthorized_response("missing authorization header");
        }
    };

    let digest = digest_token(&token);
    let user = state
        .tokens
        .resolve(&digest)
        .and_then(|user_id| state.users.get(user_id.as_uuid()));

    match user {
        Some(user) if user.is_active => {
            request.extensions_mut().insert(CallerIdentity {
                user_id: user.id,
                role: user.role,
                token_digest: digest,
            });
            next.run(request).await
        }
        Some(user) => {
            tracing::warn!(user_id = %user.id, "authentication failed: user is inactive");
            unauthorized_response("user inactive or deleted")
        }
        None => {
            tracing::warn!("authentication failed: invalid bearer token");
            unauthorized_response("invalid bearer token")
        }
    }
}

fn unauthorized_response(message: &str) -> Response {
    (
        StatusCode::UNAUTHORIZED,
        Json(ErrorBody::new("UNAUTHORIZED", message)),
    )
        .into_response()
}
