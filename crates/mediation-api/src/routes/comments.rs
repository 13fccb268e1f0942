//! # Comments API
//!
//! The comment thread of a dispute. Readable by everyone who can see the
//! dispute; writable by the same people until the dispute closes.

use axum::extract::rejection::{JsonRejection, QueryRejection};
use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::routing::get;
use axum::{Json, Router};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;
use uuid::Uuid;

use mediation_core::FreeText;
use mediation_disputes::policy::{can_access_comments, check_comment_create};
use mediation_disputes::{AttachmentOwner, Comment};

use crate::auth::CallerIdentity;
use crate::error::AppError;
use crate::extractors::{extract_json, extract_query};
use crate::pagination::{Page, PageQuery};
use crate::routes::disputes::{not_found, visible_dispute, with_visible_dispute};
use crate::routes::files::{files_of, FileResponse};
use crate::state::AppState;

/// Comment creation request.
#[derive(Debug, Deserialize, ToSchema)]
pub struct CreateCommentRequest {
    pub content: String,
}

/// A comment with its attached files.
#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct CommentResponse {
    pub id: Uuid,
    pub sender: Uuid,
    pub content: String,
    pub dispute: Uuid,
    pub created_at: DateTime<Utc>,
    pub files: Vec<FileResponse>,
}

impl CommentResponse {
    pub(crate) fn build(state: &AppState, comment: &Comment) -> Self {
        Self {
            id: *comment.id.as_uuid(),
            sender: *comment.sender.as_uuid(),
            content: comment.content.clone(),
            dispute: *comment.dispute.as_uuid(),
            created_at: comment.created_at,
            files: files_of(state, AttachmentOwner::Comment(comment.id)),
        }
    }
}

/// Build the comments router.
pub fn router() -> Router<AppState> {
    Router::new().route(
        "/v1/disputes/{id}/comments/",
        get(list_comments).post(create_comment),
    )
}

/// GET /v1/disputes/{id}/comments/ — The thread, newest first.
#[utoipa::path(
    get,
    path = "/v1/disputes/{id}/comments/",
    params(("id" = Uuid, Path, description = "Dispute ID"), PageQuery),
    responses(
        (status = 200, description = "Page of comments", body = serde_json::Value),
        (status = 404, description = "Dispute not found or invalid page", body = crate::error::ErrorBody),
    ),
    tag = "comments"
)]
pub async fn list_comments(
    State(state): State<AppState>,
    caller: CallerIdentity,
    Path(id): Path<Uuid>,
    page: Result<Query<PageQuery>, QueryRejection>,
) -> Result<Json<Page<CommentResponse>>, AppError> {
    let page = extract_query(page)?;
    let actor = caller.actor();
    let dispute = visible_dispute(&state, &actor, &id)?;
    if !can_access_comments(&actor, &dispute) {
        return Err(not_found(&id));
    }

    let mut comments = state.comments.filter(|c| c.dispute == dispute.id);
    comments.sort_by(|a, b| b.created_at.cmp(&a.created_at));

    Ok(Json(
        page.paginate(comments)?
            .map(|c| CommentResponse::build(&state, &c)),
    ))
}

/// POST /v1/disputes/{id}/comments/ — Post a comment.
#[utoipa::path(
    post,
    path = "/v1/disputes/{id}/comments/",
    params(("id" = Uuid, Path, description = "Dispute ID")),
    request_body = CreateCommentRequest,
    responses(
        (status = 201, description = "Comment created", body = CommentResponse),
        (status = 400, description = "Dispute closed or invalid content", body = crate::error::ErrorBody),
        (status = 404, description = "Dispute not found", body = crate::error::ErrorBody),
    ),
    tag = "comments"
)]
pub async fn create_comment(
    State(state): State<AppState>,
    caller: CallerIdentity,
    Path(id): Path<Uuid>,
    body: Result<Json<CreateCommentRequest>, JsonRejection>,
) -> Result<(StatusCode, Json<CommentResponse>), AppError> {
    let req = extract_json(body)?;
    let actor = caller.actor();
    let comment = with_visible_dispute(&state, &actor, &id, |dispute| {
        check_comment_create(&actor, dispute)?;
        let content = FreeText::new(req.content).map_err(AppError::invalid("content"))?;
        let comment = Comment::new(actor.id, dispute.id, content);
        state.comments.insert(*comment.id.as_uuid(), comment.clone());
        Ok(comment)
    })?;

    if let Some(pool) = &state.db_pool {
        if let Err(e) = crate::db::comments::insert(pool, &comment).await {
            tracing::error!(comment_id = %comment.id, dispute_id = %id, error = %e, "failed to persist comment to database");
            return Err(AppError::Internal(
                "comment recorded in-memory but database persist failed".to_string(),
            ));
        }
    }

    tracing::info!(comment_id = %comment.id, dispute_id = %id, user_id = %actor.id, "comment created");
    Ok((
        StatusCode::CREATED,
        Json(CommentResponse::build(&state, &comment)),
    ))
}
