//! # Disputes API
//!
//! Create, list, read, patch and delete disputes. Every handler resolves
//! the caller to an [`Actor`] and defers the decision to
//! `mediation_disputes::policy` and `mediation_disputes::apply_patch`:
//!
//! - disputes the caller cannot see are reported as 404, never 403
//! - write access is checked next (403)
//! - field gates run last (400, keyed by field)

use std::collections::BTreeSet;

use axum::extract::rejection::{JsonRejection, QueryRejection};
use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::routing::get;
use axum::{Json, Router};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;
use uuid::Uuid;

use mediation_core::{DisputeId, FreeText, UserId};
use mediation_disputes::policy::{can_view_dispute, can_write_dispute, check_create, check_delete};
use mediation_disputes::{
    apply_patch, Actor, AttachmentOwner, Dispute, DisputeError, DisputePatch,
};

use crate::auth::CallerIdentity;
use crate::error::AppError;
use crate::extractors::{extract_json, extract_query};
use crate::pagination::{Page, PageQuery};
use crate::routes::comments::CommentResponse;
use crate::routes::files::{files_of, FileResponse};
use crate::state::AppState;

// ── DTOs ────────────────────────────────────────────────────────────────────

/// Dispute creation request.
#[derive(Debug, Deserialize, ToSchema)]
pub struct CreateDisputeRequest {
    /// User ids of the counterparties. Must not include the caller.
    #[serde(default)]
    pub opponent: Vec<Uuid>,
    pub description: String,
    /// Whether the opponents are admitted to the dispute.
    #[serde(default)]
    pub add_opponent: bool,
}

/// Dispute partial update. Absent fields are left unchanged.
#[derive(Debug, Default, Deserialize, ToSchema)]
pub struct UpdateDisputeRequest {
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub opponent: Option<Vec<Uuid>>,
    #[serde(default)]
    pub add_opponent: Option<bool>,
    /// `not_started`, `started` or `closed`.
    #[serde(default)]
    pub status: Option<String>,
}

impl From<UpdateDisputeRequest> for DisputePatch {
    fn from(req: UpdateDisputeRequest) -> Self {
        Self {
            description: req.description,
            opponent: req
                .opponent
                .map(|ids| ids.into_iter().map(UserId::from_uuid).collect()),
            add_opponent: req.add_opponent,
            status: req.status,
        }
    }
}

/// A dispute with its derived comment projection and attached files.
#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct DisputeResponse {
    pub id: Uuid,
    pub creator: Uuid,
    pub opponent: Vec<Uuid>,
    pub description: String,
    /// `not_started`, `started` or `closed`.
    pub status: String,
    pub add_opponent: bool,
    pub created_at: DateTime<Utc>,
    pub closed_at: Option<DateTime<Utc>>,
    /// Newest comment, if any.
    pub last_comment: Option<CommentResponse>,
    pub comment_count: usize,
    pub files: Vec<FileResponse>,
}

impl DisputeResponse {
    /// Build the response view, reading comments and files from `state`.
    pub(crate) fn build(state: &AppState, dispute: &Dispute) -> Self {
        let comments = state.comments.filter(|c| c.dispute == dispute.id);
        let comment_count = comments.len();
        let last_comment = comments
            .into_iter()
            .max_by_key(|c| c.created_at)
            .map(|c| CommentResponse::build(state, &c));

        Self {
            id: *dispute.id.as_uuid(),
            creator: *dispute.creator.as_uuid(),
            opponent: dispute.opponent.iter().map(|id| *id.as_uuid()).collect(),
            description: dispute.description.clone(),
            status: dispute.status.as_str().to_string(),
            add_opponent: dispute.add_opponent,
            created_at: dispute.created_at,
            closed_at: dispute.closed_at,
            last_comment,
            comment_count,
            files: files_of(state, AttachmentOwner::Dispute(dispute.id)),
        }
    }
}

// ── Shared helpers ──────────────────────────────────────────────────────────

pub(crate) fn not_found(id: &Uuid) -> AppError {
    AppError::NotFound(format!("dispute {id} not found"))
}

/// Fetch a dispute the actor is allowed to see. Invisible disputes are
/// indistinguishable from missing ones.
pub(crate) fn visible_dispute(state: &AppState, actor: &Actor, id: &Uuid) -> Result<Dispute, AppError> {
    state
        .disputes
        .get(id)
        .filter(|d| can_view_dispute(actor, d))
        .ok_or_else(|| not_found(id))
}

/// Run `f` on a dispute the caller can see, holding the disputes read lock
/// for its duration. A concurrent close or delete waits for `f`, so a rule
/// checked in `f` still holds for whatever `f` inserts.
pub(crate) fn with_visible_dispute<R>(
    state: &AppState,
    actor: &Actor,
    id: &Uuid,
    f: impl FnOnce(&Dispute) -> Result<R, AppError>,
) -> Result<R, AppError> {
    state
        .disputes
        .with(id, |dispute| {
            if !can_view_dispute(actor, dispute) {
                return Err(not_found(id));
            }
            f(dispute)
        })
        .ok_or_else(|| not_found(id))?
}

// ── Router ──────────────────────────────────────────────────────────────────

/// Build the disputes router.
pub fn router() -> Router<AppState> {
    Router::new()
        .route("/v1/disputes/", get(list_disputes).post(create_dispute))
        .route(
            "/v1/disputes/{id}/",
            get(get_dispute).patch(update_dispute).delete(delete_dispute),
        )
}

/// GET /v1/disputes/ — Disputes visible to the caller, newest first.
#[utoipa::path(
    get,
    path = "/v1/disputes/",
    params(PageQuery),
    responses(
        (status = 200, description = "Page of disputes", body = serde_json::Value),
        (status = 404, description = "Invalid page", body = crate::error::ErrorBody),
    ),
    tag = "disputes"
)]
pub async fn list_disputes(
    State(state): State<AppState>,
    caller: CallerIdentity,
    page: Result<Query<PageQuery>, QueryRejection>,
) -> Result<Json<Page<DisputeResponse>>, AppError> {
    let page = extract_query(page)?;
    let actor = caller.actor();

    let mut disputes = state.disputes.filter(|d| can_view_dispute(&actor, d));
    disputes.sort_by(|a, b| b.created_at.cmp(&a.created_at));

    Ok(Json(
        page.paginate(disputes)?
            .map(|d| DisputeResponse::build(&state, &d)),
    ))
}

/// POST /v1/disputes/ — File a dispute.
#[utoipa::path(
    post,
    path = "/v1/disputes/",
    request_body = CreateDisputeRequest,
    responses(
        (status = 201, description = "Dispute created", body = DisputeResponse),
        (status = 400, description = "Validation error", body = crate::error::ErrorBody),
    ),
    tag = "disputes"
)]
pub async fn create_dispute(
    State(state): State<AppState>,
    caller: CallerIdentity,
    body: Result<Json<CreateDisputeRequest>, JsonRejection>,
) -> Result<(StatusCode, Json<DisputeResponse>), AppError> {
    let req = extract_json(body)?;
    let actor = caller.actor();

    let opponent: BTreeSet<UserId> = req.opponent.into_iter().map(UserId::from_uuid).collect();
    check_create(&actor, &opponent, |id| state.users.contains(id.as_uuid()))?;
    let description = FreeText::new(req.description).map_err(AppError::invalid("description"))?;

    let dispute = Dispute::new(actor.id, opponent, description, req.add_opponent);
    state.disputes.insert(*dispute.id.as_uuid(), dispute.clone());

    // Persist to database (write-through). Failure is surfaced to the client
    // because the in-memory record would be lost on restart.
    if let Some(pool) = &state.db_pool {
        if let Err(e) = crate::db::disputes::insert(pool, &dispute).await {
            tracing::error!(dispute_id = %dispute.id, error = %e, "failed to persist dispute to database");
            return Err(AppError::Internal(
                "dispute recorded in-memory but database persist failed".to_string(),
            ));
        }
    }

    tracing::info!(dispute_id = %dispute.id, user_id = %actor.id, "dispute created");
    Ok((
        StatusCode::CREATED,
        Json(DisputeResponse::build(&state, &dispute)),
    ))
}

/// GET /v1/disputes/{id}/ — A single dispute.
#[utoipa::path(
    get,
    path = "/v1/disputes/{id}/",
    params(("id" = Uuid, Path, description = "Dispute ID")),
    responses(
        (status = 200, description = "Dispute found", body = DisputeResponse),
        (status = 404, description = "Not found", body = crate::error::ErrorBody),
    ),
    tag = "disputes"
)]
pub async fn get_dispute(
    State(state): State<AppState>,
    caller: CallerIdentity,
    Path(id): Path<Uuid>,
) -> Result<Json<DisputeResponse>, AppError> {
    let dispute = visible_dispute(&state, &caller.actor(), &id)?;
    Ok(Json(DisputeResponse::build(&state, &dispute)))
}

/// PATCH /v1/disputes/{id}/ — Partial update under the dispute rules.
#[utoipa::path(
    patch,
    path = "/v1/disputes/{id}/",
    params(("id" = Uuid, Path, description = "Dispute ID")),
    request_body = UpdateDisputeRequest,
    responses(
        (status = 200, description = "Dispute updated", body = DisputeResponse),
        (status = 400, description = "Rule violation", body = crate::error::ErrorBody),
        (status = 403, description = "Read-only access", body = crate::error::ErrorBody),
        (status = 404, description = "Not found", body = crate::error::ErrorBody),
    ),
    tag = "disputes"
)]
pub async fn update_dispute(
    State(state): State<AppState>,
    caller: CallerIdentity,
    Path(id): Path<Uuid>,
    body: Result<Json<UpdateDisputeRequest>, JsonRejection>,
) -> Result<Json<DisputeResponse>, AppError> {
    let patch = DisputePatch::from(extract_json(body)?);
    let actor = caller.actor();
    let users = state.users.clone();

    // Read-validate-update under one write lock: either every field of the
    // patch lands or none does.
    let updated = state
        .disputes
        .try_update(&id, |dispute| {
            if !can_view_dispute(&actor, dispute) {
                return Err(not_found(&id));
            }
            if !can_write_dispute(&actor, dispute) {
                return Err(DisputeError::WriteForbidden.into());
            }
            let next = apply_patch(
                dispute,
                &actor,
                &patch,
                |user| users.contains(user.as_uuid()),
                Utc::now(),
            )?;
            *dispute = next.clone();
            Ok(next)
        })
        .ok_or_else(|| not_found(&id))??;

    if let Some(pool) = &state.db_pool {
        if let Err(e) = crate::db::disputes::update(pool, &updated).await {
            tracing::error!(dispute_id = %id, error = %e, "failed to persist dispute update to database");
            return Err(AppError::Internal(
                "dispute updated in-memory but database persist failed".to_string(),
            ));
        }
    }

    tracing::info!(
        dispute_id = %id,
        user_id = %actor.id,
        status = updated.status.as_str(),
        "dispute updated"
    );
    Ok(Json(DisputeResponse::build(&state, &updated)))
}

/// DELETE /v1/disputes/{id}/ — Delete a dispute with its comments and files.
#[utoipa::path(
    delete,
    path = "/v1/disputes/{id}/",
    params(("id" = Uuid, Path, description = "Dispute ID")),
    responses(
        (status = 204, description = "Dispute deleted"),
        (status = 400, description = "Dispute is closed", body = crate::error::ErrorBody),
        (status = 403, description = "Not allowed to delete", body = crate::error::ErrorBody),
        (status = 404, description = "Not found", body = crate::error::ErrorBody),
    ),
    tag = "disputes"
)]
pub async fn delete_dispute(
    State(state): State<AppState>,
    caller: CallerIdentity,
    Path(id): Path<Uuid>,
) -> Result<StatusCode, AppError> {
    let actor = caller.actor();
    let dispute_id = DisputeId::from_uuid(id);

    // The check and the cascade run under the disputes write lock, so no
    // close, comment or upload can land in between.
    state
        .disputes
        .try_remove(&id, |dispute| {
            if !can_view_dispute(&actor, dispute) {
                return Err(not_found(&id));
            }
            check_delete(&actor, dispute)?;
            let comments = state.comments.remove_where(|c| c.dispute == dispute_id);
            state.files.remove_where(|f| match f.owner {
                AttachmentOwner::Dispute(owner) => owner == dispute_id,
                AttachmentOwner::Comment(owner) => comments.iter().any(|c| c.id == owner),
            });
            Ok(())
        })
        .ok_or_else(|| not_found(&id))??;

    if let Some(pool) = &state.db_pool {
        if let Err(e) = crate::db::disputes::delete(pool, dispute_id).await {
            tracing::error!(dispute_id = %id, error = %e, "failed to delete dispute from database");
            return Err(AppError::Internal(
                "dispute deleted in-memory but database delete failed".to_string(),
            ));
        }
    }

    tracing::info!(dispute_id = %id, user_id = %actor.id, "dispute deleted");
    Ok(StatusCode::NO_CONTENT)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn update_request_converts_to_patch() {
        let opponent = Uuid::new_v4();
        let patch = DisputePatch::from(UpdateDisputeRequest {
            opponent: Some(vec![opponent]),
            status: Some("started".into()),
            ..Default::default()
        });
        assert_eq!(patch.opponent, Some(vec![UserId::from_uuid(opponent)]));
        assert_eq!(patch.status.as_deref(), Some("started"));
        assert!(patch.description.is_none());
    }

    #[test]
    fn empty_update_request_is_empty_patch() {
        assert!(DisputePatch::from(UpdateDisputeRequest::default()).is_empty());
    }

    #[test]
    fn response_reports_status_name_and_opponents() {
        let state = AppState::new();
        let creator = UserId::new();
        let opponent = UserId::new();
        let dispute = Dispute::new(
            creator,
            BTreeSet::from([opponent]),
            FreeText::new("Unpaid invoice").unwrap(),
            true,
        );
        let response = DisputeResponse::build(&state, &dispute);
        assert_eq!(response.status, "not_started");
        assert_eq!(response.opponent, vec![*opponent.as_uuid()]);
        assert_eq!(response.comment_count, 0);
        assert!(response.last_comment.is_none());
        assert!(response.closed_at.is_none());
    }
}
