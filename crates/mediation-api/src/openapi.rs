//! # OpenAPI Specification Assembly
//!
//! Collects every utoipa-documented handler and DTO into one OpenAPI 3.1
//! document, served unauthenticated at `/openapi.json`.

use axum::routing::get;
use axum::{Json, Router};
use utoipa::openapi::security::{HttpAuthScheme, HttpBuilder, SecurityScheme};
use utoipa::{Modify, OpenApi};

use crate::state::AppState;

/// Registers the opaque bearer token scheme.
struct SecurityAddon;

impl Modify for SecurityAddon {
    fn modify(&self, openapi: &mut utoipa::openapi::OpenApi) {
        if let Some(components) = openapi.components.as_mut() {
            components.add_security_scheme(
                "bearer_auth",
                SecurityScheme::Http(
                    HttpBuilder::new()
                        .scheme(HttpAuthScheme::Bearer)
                        .description(Some(
                            "Opaque token issued by POST /auth/token/login/.",
                        ))
                        .build(),
                ),
            );
        }
    }
}

/// Assembled OpenAPI spec for the entire API surface.
#[derive(OpenApi)]
#[openapi(
    info(
        title = "Mediation API",
        version = "0.1.0",
        description = "Dispute mediation backend: accounts with user, mediator and admin roles, disputes with a not_started/started/closed lifecycle, comment threads and file attachments.\n\nAuthentication: `Authorization: Bearer <token>` from `POST /auth/token/login/`. Health probes, `/metrics` and this document are unauthenticated.",
        license(name = "AGPL-3.0-or-later")
    ),
    servers(
        (url = "http://localhost:8080", description = "Local development server"),
    ),
    security(
        ("bearer_auth" = [])
    ),
    paths(
        // ── Auth ─────────────────────────────────────────────────────────
        crate::routes::auth::login,
        crate::routes::auth::logout,
        crate::routes::auth::register,
        // ── Users ────────────────────────────────────────────────────────
        crate::routes::users::list_users,
        crate::routes::users::create_user,
        crate::routes::users::get_me,
        crate::routes::users::update_me,
        crate::routes::users::get_user,
        crate::routes::users::update_user,
        crate::routes::users::set_password,
        // ── Disputes ─────────────────────────────────────────────────────
        crate::routes::disputes::list_disputes,
        crate::routes::disputes::create_dispute,
        crate::routes::disputes::get_dispute,
        crate::routes::disputes::update_dispute,
        crate::routes::disputes::delete_dispute,
        // ── Comments ─────────────────────────────────────────────────────
        crate::routes::comments::list_comments,
        crate::routes::comments::create_comment,
        // ── Files ────────────────────────────────────────────────────────
        crate::routes::files::upload_dispute_file,
        crate::routes::files::upload_comment_file,
        crate::routes::files::download_file,
    ),
    components(
        schemas(
            crate::error::ErrorBody,
            crate::error::ErrorDetail,
            crate::routes::auth::LoginRequest,
            crate::routes::auth::TokenResponse,
            crate::routes::users::UserResponse,
            crate::routes::users::CreateUserRequest,
            crate::routes::users::UpdateMeRequest,
            crate::routes::users::AdminUpdateUserRequest,
            crate::routes::users::SetPasswordRequest,
            crate::routes::disputes::CreateDisputeRequest,
            crate::routes::disputes::UpdateDisputeRequest,
            crate::routes::disputes::DisputeResponse,
            crate::routes::comments::CreateCommentRequest,
            crate::routes::comments::CommentResponse,
            crate::routes::files::FileResponse,
        ),
    ),
    modifiers(&SecurityAddon),
    tags(
        (name = "auth", description = "Token login, logout and self-registration"),
        (name = "users", description = "Accounts, profiles, roles and passwords"),
        (name = "disputes", description = "Dispute records and their lifecycle"),
        (name = "comments", description = "Dispute comment threads"),
        (name = "files", description = "Attachments on disputes and comments"),
    )
)]
pub struct ApiDoc;

/// Build the OpenAPI router.
pub fn router() -> Router<AppState> {
    Router::new().route("/openapi.json", get(openapi_json))
}

/// GET /openapi.json — Return the generated OpenAPI specification.
async fn openapi_json() -> Json<utoipa::openapi::OpenApi> {
    Json(ApiDoc::openapi())
}
