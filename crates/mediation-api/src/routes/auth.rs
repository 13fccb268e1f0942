//! # Token Login, Logout and Registration
//!
//! `POST /auth/token/login/` trades an email and password for an opaque
//! bearer token. `POST /auth/token/logout/` revokes the presented token.
//! `POST /auth/register/` creates an ordinary account; it is only reachable
//! when the registration guard lets it through.

use axum::extract::rejection::JsonRejection;
use axum::extract::State;
use axum::http::StatusCode;
use axum::routing::post;
use axum::{Json, Router};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

use mediation_core::{digest_token, generate_token};
use mediation_disputes::{Role, User};

use crate::auth::CallerIdentity;
use crate::error::AppError;
use crate::extractors::extract_json;
use crate::routes::users::{
    build_user, hash_password, insert_user, verify_password, CreateUserRequest, UserResponse,
};
use crate::state::AppState;

const BAD_CREDENTIALS: &str = "Unable to log in with provided credentials.";

/// Login request.
#[derive(Debug, Deserialize, ToSchema)]
pub struct LoginRequest {
    pub email: String,
    pub password: String,
}

/// Issued bearer token.
#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct TokenResponse {
    pub auth_token: String,
}

/// Routes reachable without a token.
pub fn public_router() -> Router<AppState> {
    Router::new()
        .route("/auth/token/login/", post(login))
        .route("/auth/register/", post(register))
}

/// Routes that need the caller's token.
pub fn router() -> Router<AppState> {
    Router::new().route("/auth/token/logout/", post(logout))
}

/// POST /auth/token/login/ — Issue a bearer token.
#[utoipa::path(
    post,
    path = "/auth/token/login/",
    request_body = LoginRequest,
    responses(
        (status = 200, description = "Token issued", body = TokenResponse),
        (status = 400, description = "Bad credentials", body = crate::error::ErrorBody),
    ),
    security(()),
    tag = "auth"
)]
pub async fn login(
    State(state): State<AppState>,
    body: Result<Json<LoginRequest>, JsonRejection>,
) -> Result<Json<TokenResponse>, AppError> {
    let req = extract_json(body)?;
    let email = req.email.trim().to_lowercase();

    let candidate = state
        .users
        .filter(|u| u.email.normalized() == email)
        .into_iter()
        .next()
        .filter(|u| u.is_active);
    let user = match candidate {
        Some(user) => verify_password(user.password_hash.clone(), req.password.clone())
            .await?
            .then_some(user),
        None => None,
    };
    let Some(user) = user else {
        tracing::warn!("login failed: bad credentials");
        return Err(AppError::validation("non_field_errors", BAD_CREDENTIALS));
    };

    if user.password_hash.needs_rehash() {
        upgrade_password_hash(&state, &user, req.password).await;
    }

    let token = generate_token();
    let digest = digest_token(&token);
    state.tokens.insert(digest.clone(), user.id);

    if let Some(pool) = &state.db_pool {
        if let Err(e) = crate::db::tokens::insert(pool, &digest, user.id).await {
            state.tokens.revoke(&digest);
            tracing::error!(user_id = %user.id, error = %e, "failed to persist auth token to database");
            return Err(AppError::Internal(
                "token issued in-memory but database persist failed".to_string(),
            ));
        }
    }

    tracing::info!(user_id = %user.id, "token issued");
    Ok(Json(TokenResponse { auth_token: token }))
}

/// Replace an outdated password hash after a successful login. Failures are
/// logged and do not fail the login.
async fn upgrade_password_hash(state: &AppState, user: &User, password: String) {
    let password_hash = match hash_password(password).await {
        Ok(hash) => hash,
        Err(e) => {
            tracing::warn!(user_id = %user.id, error = %e, "password rehash failed");
            return;
        }
    };
    let updated = state.users.try_update(user.id.as_uuid(), |current| {
        if current.password_hash != user.password_hash {
            return Err(());
        }
        current.password_hash = password_hash;
        Ok(current.clone())
    });
    let Some(Ok(updated)) = updated else {
        return;
    };

    if let Some(pool) = &state.db_pool {
        if let Err(e) = crate::db::users::update(pool, &updated).await {
            tracing::warn!(user_id = %user.id, error = %e, "failed to persist upgraded password hash");
            return;
        }
    }
    tracing::info!(user_id = %user.id, "password hash upgraded");
}

/// POST /auth/token/logout/ — Revoke the presented token.
#[utoipa::path(
    post,
    path = "/auth/token/logout/",
    responses(
        (status = 204, description = "Token revoked"),
        (status = 401, description = "Missing or invalid token", body = crate::error::ErrorBody),
    ),
    tag = "auth"
)]
pub async fn logout(
    State(state): State<AppState>,
    caller: CallerIdentity,
) -> Result<StatusCode, AppError> {
    state.tokens.revoke(&caller.token_digest);

    if let Some(pool) = &state.db_pool {
        if let Err(e) = crate::db::tokens::delete(pool, &caller.token_digest).await {
            tracing::error!(user_id = %caller.user_id, error = %e, "failed to delete auth token from database");
            return Err(AppError::Internal(
                "token revoked in-memory but database delete failed".to_string(),
            ));
        }
    }

    tracing::info!(user_id = %caller.user_id, "token revoked");
    Ok(StatusCode::NO_CONTENT)
}

/// POST /auth/register/ — Self-registration as an ordinary user.
#[utoipa::path(
    post,
    path = "/auth/register/",
    request_body = CreateUserRequest,
    responses(
        (status = 201, description = "Account created", body = UserResponse),
        (status = 400, description = "Validation error", body = crate::error::ErrorBody),
        (status = 403, description = "Registration is disabled", body = crate::error::ErrorBody),
        (status = 409, description = "Email or phone number taken", body = crate::error::ErrorBody),
    ),
    security(()),
    tag = "auth"
)]
pub async fn register(
    State(state): State<AppState>,
    body: Result<Json<CreateUserRequest>, JsonRejection>,
) -> Result<(StatusCode, Json<UserResponse>), AppError> {
    let req = extract_json(body)?;
    let user = insert_user(&state, build_user(req, Role::User).await?).await?;
    Ok((StatusCode::CREATED, Json(UserResponse::from(&user))))
}
