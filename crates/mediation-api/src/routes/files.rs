//! # File Attachments API
//!
//! Uploads take the raw request body; the file name comes from `?name=` and
//! the MIME type from `Content-Type`. Bodies above the configured upload
//! limit are cut off by `DefaultBodyLimit` and reported as 413.
//!
//! Downloads follow the visibility of the dispute that owns the file,
//! directly or through one of its comments.

use axum::body::Bytes;
use axum::extract::rejection::{BytesRejection, QueryRejection};
use axum::extract::{Path, Query, State};
use axum::http::{header, HeaderMap, HeaderValue, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::{Json, Router};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use utoipa::{IntoParams, ToSchema};
use uuid::Uuid;

use mediation_core::DisputeId;
use mediation_disputes::policy::{can_attach_to_comment, can_attach_to_dispute, can_view_dispute};
use mediation_disputes::{AttachmentOwner, FileAttachment};

use crate::auth::CallerIdentity;
use crate::error::AppError;
use crate::extractors::extract_query;
use crate::routes::disputes::with_visible_dispute;
use crate::state::AppState;

/// Metadata of an uploaded file. The bytes are served by the download
/// endpoint only.
#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct FileResponse {
    pub id: Uuid,
    /// `dispute` or `comment`.
    pub owner_kind: String,
    pub owner_id: Uuid,
    pub file_name: String,
    pub content_type: String,
    pub size: usize,
    pub uploaded_by: Uuid,
    pub created_at: DateTime<Utc>,
}

impl From<&FileAttachment> for FileResponse {
    fn from(file: &FileAttachment) -> Self {
        let owner_id = match file.owner {
            AttachmentOwner::Dispute(id) => *id.as_uuid(),
            AttachmentOwner::Comment(id) => *id.as_uuid(),
        };
        Self {
            id: *file.id.as_uuid(),
            owner_kind: file.owner.kind().to_string(),
            owner_id,
            file_name: file.file_name.clone(),
            content_type: file.content_type.clone(),
            size: file.size,
            uploaded_by: *file.uploaded_by.as_uuid(),
            created_at: file.created_at,
        }
    }
}

/// Upload query parameters.
#[derive(Debug, Default, Deserialize, IntoParams)]
#[into_params(parameter_in = Query)]
pub struct UploadQuery {
    /// File name to store the upload under.
    pub name: Option<String>,
}

/// Files attached to `owner`, oldest first.
pub(crate) fn files_of(state: &AppState, owner: AttachmentOwner) -> Vec<FileResponse> {
    let mut files = state.files.filter(|f| f.owner == owner);
    files.sort_by(|a, b| a.created_at.cmp(&b.created_at));
    files.iter().map(FileResponse::from).collect()
}

fn owning_dispute(state: &AppState, owner: AttachmentOwner) -> Option<DisputeId> {
    match owner {
        AttachmentOwner::Dispute(id) => Some(id),
        AttachmentOwner::Comment(id) => state.comments.get(id.as_uuid()).map(|c| c.dispute),
    }
}

fn upload_body(body: Result<Bytes, BytesRejection>) -> Result<Vec<u8>, AppError> {
    match body {
        Ok(bytes) => Ok(bytes.to_vec()),
        Err(rejection) if rejection.status() == StatusCode::PAYLOAD_TOO_LARGE => {
            Err(AppError::PayloadTooLarge(rejection.body_text()))
        }
        Err(rejection) => Err(AppError::BadRequest(rejection.body_text())),
    }
}

fn content_type(headers: &HeaderMap) -> Option<&str> {
    headers
        .get(header::CONTENT_TYPE)
        .and_then(|v| v.to_str().ok())
}

/// Write an attachment already inserted in memory through to the database.
async fn persist_upload(state: &AppState, file: FileAttachment) -> Result<FileResponse, AppError> {
    if let Some(pool) = &state.db_pool {
        if let Err(e) = crate::db::attachments::insert(pool, &file).await {
            tracing::error!(file_id = %file.id, error = %e, "failed to persist attachment to database");
            return Err(AppError::Internal(
                "attachment recorded in-memory but database persist failed".to_string(),
            ));
        }
    }

    tracing::info!(
        file_id = %file.id,
        owner = file.owner.kind(),
        size = file.size,
        user_id = %file.uploaded_by,
        "file attached"
    );
    Ok(FileResponse::from(&file))
}

/// `Content-Disposition` value with an RFC 5987 encoded file name.
fn content_disposition(file_name: &str) -> HeaderValue {
    let encoded: String = file_name
        .bytes()
        .map(|b| {
            if b.is_ascii_alphanumeric() || b"-._~".contains(&b) {
                (b as char).to_string()
            } else {
                format!("%{b:02X}")
            }
        })
        .collect();
    HeaderValue::from_str(&format!("attachment; filename*=UTF-8''{encoded}"))
        .unwrap_or_else(|_| HeaderValue::from_static("attachment"))
}

/// Build the files router.
pub fn router() -> Router<AppState> {
    Router::new()
        .route("/v1/disputes/{id}/files/", post(upload_dispute_file))
        .route(
            "/v1/disputes/{id}/comments/{comment_id}/files/",
            post(upload_comment_file),
        )
        .route("/v1/files/{id}/", get(download_file))
}

/// POST /v1/disputes/{id}/files/ — Attach a file to a dispute.
#[utoipa::path(
    post,
    path = "/v1/disputes/{id}/files/",
    params(("id" = Uuid, Path, description = "Dispute ID"), UploadQuery),
    request_body(content = Vec<u8>, content_type = "application/octet-stream"),
    responses(
        (status = 201, description = "File attached", body = FileResponse),
        (status = 400, description = "Invalid upload or dispute locked", body = crate::error::ErrorBody),
        (status = 403, description = "No write access", body = crate::error::ErrorBody),
        (status = 404, description = "Dispute not found", body = crate::error::ErrorBody),
        (status = 413, description = "Upload too large", body = crate::error::ErrorBody),
    ),
    tag = "files"
)]
pub async fn upload_dispute_file(
    State(state): State<AppState>,
    caller: CallerIdentity,
    Path(id): Path<Uuid>,
    query: Result<Query<UploadQuery>, QueryRejection>,
    headers: HeaderMap,
    body: Result<Bytes, BytesRejection>,
) -> Result<(StatusCode, Json<FileResponse>), AppError> {
    let query = extract_query(query)?;
    let actor = caller.actor();
    let data = upload_body(body);
    let file = with_visible_dispute(&state, &actor, &id, |dispute| {
        can_attach_to_dispute(&actor, dispute)?;
        let file = FileAttachment::new(
            AttachmentOwner::Dispute(dispute.id),
            query.name.as_deref().unwrap_or_default(),
            content_type(&headers),
            data?,
            actor.id,
            state.config.max_upload_bytes,
        )?;
        state.files.insert(*file.id.as_uuid(), file.clone());
        Ok(file)
    })?;

    Ok((StatusCode::CREATED, Json(persist_upload(&state, file).await?)))
}

/// POST /v1/disputes/{id}/comments/{comment_id}/files/ — Attach a file to
/// one of the caller's comments.
#[utoipa::path(
    post,
    path = "/v1/disputes/{id}/comments/{comment_id}/files/",
    params(
        ("id" = Uuid, Path, description = "Dispute ID"),
        ("comment_id" = Uuid, Path, description = "Comment ID"),
        UploadQuery
    ),
    request_body(content = Vec<u8>, content_type = "application/octet-stream"),
    responses(
        (status = 201, description = "File attached", body = FileResponse),
        (status = 400, description = "Invalid upload or dispute closed", body = crate::error::ErrorBody),
        (status = 403, description = "Not the comment's sender", body = crate::error::ErrorBody),
        (status = 404, description = "Dispute or comment not found", body = crate::error::ErrorBody),
        (status = 413, description = "Upload too large", body = crate::error::ErrorBody),
    ),
    tag = "files"
)]
pub async fn upload_comment_file(
    State(state): State<AppState>,
    caller: CallerIdentity,
    Path((id, comment_id)): Path<(Uuid, Uuid)>,
    query: Result<Query<UploadQuery>, QueryRejection>,
    headers: HeaderMap,
    body: Result<Bytes, BytesRejection>,
) -> Result<(StatusCode, Json<FileResponse>), AppError> {
    let query = extract_query(query)?;
    let actor = caller.actor();
    let data = upload_body(body);
    let file = with_visible_dispute(&state, &actor, &id, |dispute| {
        let comment = state
            .comments
            .get(&comment_id)
            .filter(|c| c.dispute == dispute.id)
            .ok_or_else(|| AppError::NotFound(format!("comment {comment_id} not found")))?;
        can_attach_to_comment(&actor, &comment, dispute)?;
        let file = FileAttachment::new(
            AttachmentOwner::Comment(comment.id),
            query.name.as_deref().unwrap_or_default(),
            content_type(&headers),
            data?,
            actor.id,
            state.config.max_upload_bytes,
        )?;
        state.files.insert(*file.id.as_uuid(), file.clone());
        Ok(file)
    })?;

    Ok((StatusCode::CREATED, Json(persist_upload(&state, file).await?)))
}

/// GET /v1/files/{id}/ — Download an attachment's bytes.
#[utoipa::path(
    get,
    path = "/v1/files/{id}/",
    params(("id" = Uuid, Path, description = "File ID")),
    responses(
        (status = 200, description = "File contents", content_type = "application/octet-stream"),
        (status = 404, description = "Not found", body = crate::error::ErrorBody),
    ),
    tag = "files"
)]
pub async fn download_file(
    State(state): State<AppState>,
    caller: CallerIdentity,
    Path(id): Path<Uuid>,
) -> Result<Response, AppError> {
    let actor = caller.actor();
    let not_found = || AppError::NotFound(format!("file {id} not found"));

    let file = state.files.get(&id).ok_or_else(not_found)?;
    let visible = owning_dispute(&state, file.owner)
        .and_then(|dispute_id| state.disputes.get(dispute_id.as_uuid()))
        .is_some_and(|dispute| can_view_dispute(&actor, &dispute));
    if !visible {
        return Err(not_found());
    }

    let content_type = HeaderValue::from_str(&file.content_type)
        .unwrap_or_else(|_| HeaderValue::from_static("application/octet-stream"));
    Ok((
        StatusCode::OK,
        [
            (header::CONTENT_TYPE, content_type),
            (header::CONTENT_DISPOSITION, content_disposition(&file.file_name)),
        ],
        file.data,
    )
        .into_response())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn content_disposition_encodes_name() {
        assert_eq!(
            content_disposition("report.pdf"),
            "attachment; filename*=UTF-8''report.pdf"
        );
        assert_eq!(
            content_disposition("my \"file\".txt"),
            "attachment; filename*=UTF-8''my%20%22file%22.txt"
        );
        assert_eq!(
            content_disposition("акт.pdf"),
            "attachment; filename*=UTF-8''%D0%B0%D0%BA%D1%82.pdf"
        );
    }

    #[test]
    fn content_type_header_is_optional() {
        let mut headers = HeaderMap::new();
        assert_eq!(content_type(&headers), None);
        headers.insert(header::CONTENT_TYPE, HeaderValue::from_static("image/png"));
        assert_eq!(content_type(&headers), Some("image/png"));
    }
}
