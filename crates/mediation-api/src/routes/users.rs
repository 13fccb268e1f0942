//! # Users API
//!
//! Account listing, profile updates, password changes and admin account
//! management. Roles are never self-assigned: a user cannot change their
//! own role, and only an admin may create accounts with an elevated role or
//! change another account's role.

use axum::extract::rejection::{JsonRejection, QueryRejection};
use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::routing::{get, post};
use axum::{Json, Router};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use utoipa::{IntoParams, ToSchema};
use uuid::Uuid;

use mediation_core::{validate_password, Email, PasswordHash, PersonName, PhoneNumber};
use mediation_disputes::{Role, User};

use crate::auth::{require_admin, CallerIdentity};
use crate::error::AppError;
use crate::extractors::{extract_json, extract_query};
use crate::pagination::{Page, PageQuery};
use crate::state::AppState;

// ── DTOs ────────────────────────────────────────────────────────────────────

/// Public view of an account. Never carries the password digest.
#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct UserResponse {
    pub id: Uuid,
    pub email: String,
    pub first_name: String,
    pub last_name: String,
    pub phone_number: String,
    /// `user`, `mediator` or `admin`.
    pub role: String,
    pub is_active: bool,
    pub created_at: DateTime<Utc>,
}

impl From<&User> for UserResponse {
    fn from(user: &User) -> Self {
        Self {
            id: *user.id.as_uuid(),
            email: user.email.to_string(),
            first_name: user.first_name.to_string(),
            last_name: user.last_name.to_string(),
            phone_number: user.phone_number.to_string(),
            role: user.role.to_string(),
            is_active: user.is_active,
            created_at: user.created_at,
        }
    }
}

/// Account creation request, shared by registration and admin creation.
#[derive(Debug, Deserialize, ToSchema)]
pub struct CreateUserRequest {
    pub email: String,
    pub first_name: String,
    pub last_name: String,
    pub phone_number: String,
    pub password: String,
    /// Ignored on self-registration. Defaults to `user`.
    #[serde(default)]
    pub role: Option<String>,
}

/// Own-profile update. `role` is accepted only to be rejected.
#[derive(Debug, Deserialize, ToSchema)]
pub struct UpdateMeRequest {
    #[serde(default)]
    pub first_name: Option<String>,
    #[serde(default)]
    pub last_name: Option<String>,
    #[serde(default)]
    pub phone_number: Option<String>,
    #[serde(default)]
    pub role: Option<String>,
}

/// Admin update of another account.
#[derive(Debug, Deserialize, ToSchema)]
pub struct AdminUpdateUserRequest {
    #[serde(default)]
    pub first_name: Option<String>,
    #[serde(default)]
    pub last_name: Option<String>,
    #[serde(default)]
    pub phone_number: Option<String>,
    #[serde(default)]
    pub role: Option<String>,
    #[serde(default)]
    pub is_active: Option<bool>,
}

/// Password change request.
#[derive(Debug, Deserialize, ToSchema)]
pub struct SetPasswordRequest {
    pub current_password: String,
    pub new_password: String,
}

/// `?search=` filter on first or last name.
#[derive(Debug, Default, Deserialize, IntoParams)]
#[into_params(parameter_in = Query)]
pub struct UserSearchQuery {
    /// Case-insensitive substring of the first or last name.
    pub search: Option<String>,
}

// ── Shared helpers ──────────────────────────────────────────────────────────

fn parse_role(value: &str) -> Result<Role, AppError> {
    Role::parse(value)
        .ok_or_else(|| AppError::validation("role", format!("\"{value}\" is not a valid choice.")))
}

/// Hash `password` on the blocking pool. PBKDF2 is deliberately slow and
/// would otherwise stall an async worker.
pub(crate) async fn hash_password(password: String) -> Result<PasswordHash, AppError> {
    tokio::task::spawn_blocking(move || PasswordHash::hash(&password))
        .await
        .map_err(|e| AppError::Internal(format!("password hashing task failed: {e}")))
}

/// Check `password` against `hash` on the blocking pool.
pub(crate) async fn verify_password(hash: PasswordHash, password: String) -> Result<bool, AppError> {
    tokio::task::spawn_blocking(move || hash.verify(&password))
        .await
        .map_err(|e| AppError::Internal(format!("password check task failed: {e}")))
}

/// Validate a creation request into a fresh active [`User`] with `role`.
pub(crate) async fn build_user(req: CreateUserRequest, role: Role) -> Result<User, AppError> {
    let email = Email::new(req.email).map_err(AppError::invalid("email"))?;
    let first_name =
        PersonName::new("first_name", req.first_name).map_err(AppError::invalid("first_name"))?;
    let last_name =
        PersonName::new("last_name", req.last_name).map_err(AppError::invalid("last_name"))?;
    let phone_number =
        PhoneNumber::new(req.phone_number).map_err(AppError::invalid("phone_number"))?;
    validate_password(&req.password).map_err(AppError::invalid("password"))?;
    let password_hash = hash_password(req.password).await?;

    Ok(User::new(
        email,
        first_name,
        last_name,
        phone_number,
        role,
        password_hash,
    ))
}

/// Insert `user` if no other account holds its email or phone number,
/// then write it through to the database.
pub(crate) async fn insert_user(state: &AppState, user: User) -> Result<User, AppError> {
    let email = user.email.normalized();
    let phone = user.phone_number.clone();
    state
        .users
        .insert_unique(*user.id.as_uuid(), user.clone(), |existing| {
            if existing.email.normalized() == email {
                Err(AppError::Conflict(
                    "A user with this email already exists.".into(),
                ))
            } else if existing.phone_number == phone {
                Err(AppError::Conflict(
                    "A user with this phone number already exists.".into(),
                ))
            } else {
                Ok(())
            }
        })?;

    if let Some(pool) = &state.db_pool {
        if let Err(e) = crate::db::users::insert(pool, &user).await {
            tracing::error!(user_id = %user.id, error = %e, "failed to persist user to database");
            return Err(AppError::Internal(
                "user recorded in-memory but database persist failed".to_string(),
            ));
        }
    }

    tracing::info!(user_id = %user.id, role = %user.role, "user created");
    Ok(user)
}

async fn persist_user_update(state: &AppState, user: &User) -> Result<(), AppError> {
    if let Some(pool) = &state.db_pool {
        if let Err(e) = crate::db::users::update(pool, user).await {
            tracing::error!(user_id = %user.id, error = %e, "failed to persist user update to database");
            return Err(AppError::Internal(
                "user updated in-memory but database persist failed".to_string(),
            ));
        }
    }
    Ok(())
}

/// Validated profile fields from an update body.
struct ProfileChanges {
    first_name: Option<PersonName>,
    last_name: Option<PersonName>,
    phone_number: Option<PhoneNumber>,
}

impl ProfileChanges {
    fn parse(
        first_name: Option<String>,
        last_name: Option<String>,
        phone_number: Option<String>,
    ) -> Result<Self, AppError> {
        let first_name = first_name
            .map(|v| PersonName::new("first_name", v))
            .transpose()
            .map_err(AppError::invalid("first_name"))?;
        let last_name = last_name
            .map(|v| PersonName::new("last_name", v))
            .transpose()
            .map_err(AppError::invalid("last_name"))?;
        let phone_number = phone_number
            .map(PhoneNumber::new)
            .transpose()
            .map_err(AppError::invalid("phone_number"))?;
        Ok(Self {
            first_name,
            last_name,
            phone_number,
        })
    }

    /// Reject the change when `other` already holds the new phone number.
    fn check_against(&self, other: &User) -> Result<(), AppError> {
        match &self.phone_number {
            Some(phone) if &other.phone_number == phone => Err(AppError::Conflict(
                "A user with this phone number already exists.".into(),
            )),
            _ => Ok(()),
        }
    }

    fn apply(&self, user: &mut User) {
        if let Some(v) = &self.first_name {
            user.first_name = v.clone();
        }
        if let Some(v) = &self.last_name {
            user.last_name = v.clone();
        }
        if let Some(v) = &self.phone_number {
            user.phone_number = v.clone();
        }
    }
}

fn not_found(id: &Uuid) -> AppError {
    AppError::NotFound(format!("user {id} not found"))
}

// ── Router ──────────────────────────────────────────────────────────────────

/// Build the users router.
pub fn router() -> Router<AppState> {
    Router::new()
        .route("/v1/users/", get(list_users).post(create_user))
        .route("/v1/users/me/", get(get_me).patch(update_me))
        .route("/v1/users/set_password/", post(set_password))
        .route("/v1/users/{id}/", get(get_user).patch(update_user))
}

/// GET /v1/users/ — List users, optionally filtered by name.
#[utoipa::path(
    get,
    path = "/v1/users/",
    params(UserSearchQuery, PageQuery),
    responses(
        (status = 200, description = "Page of users", body = serde_json::Value),
        (status = 404, description = "Invalid page", body = crate::error::ErrorBody),
    ),
    tag = "users"
)]
pub async fn list_users(
    State(state): State<AppState>,
    _caller: CallerIdentity,
    search: Result<Query<UserSearchQuery>, QueryRejection>,
    page: Result<Query<PageQuery>, QueryRejection>,
) -> Result<Json<Page<UserResponse>>, AppError> {
    let search = extract_query(search)?;
    let page = extract_query(page)?;
    let query = search.search.unwrap_or_default();

    let mut users = state.users.filter(|u| u.matches_search(&query));
    users.sort_by(|a, b| {
        (a.last_name.as_str(), a.first_name.as_str(), a.created_at).cmp(&(
            b.last_name.as_str(),
            b.first_name.as_str(),
            b.created_at,
        ))
    });

    Ok(Json(page.paginate(users)?.map(|u| UserResponse::from(&u))))
}

/// POST /v1/users/ — Create an account with any role (admin only).
#[utoipa::path(
    post,
    path = "/v1/users/",
    request_body = CreateUserRequest,
    responses(
        (status = 201, description = "User created", body = UserResponse),
        (status = 400, description = "Validation error", body = crate::error::ErrorBody),
        (status = 403, description = "Caller is not an admin", body = crate::error::ErrorBody),
        (status = 409, description = "Email or phone number taken", body = crate::error::ErrorBody),
    ),
    tag = "users"
)]
pub async fn create_user(
    State(state): State<AppState>,
    caller: CallerIdentity,
    body: Result<Json<CreateUserRequest>, JsonRejection>,
) -> Result<(StatusCode, Json<UserResponse>), AppError> {
    require_admin(&caller)?;
    let req = extract_json(body)?;
    let role = match req.role.as_deref() {
        Some(role) => parse_role(role)?,
        None => Role::User,
    };
    let user = insert_user(&state, build_user(req, role).await?).await?;
    Ok((StatusCode::CREATED, Json(UserResponse::from(&user))))
}

/// GET /v1/users/me/ — The caller's own account.
#[utoipa::path(
    get,
    path = "/v1/users/me/",
    responses(
        (status = 200, description = "Own account", body = UserResponse),
    ),
    tag = "users"
)]
pub async fn get_me(
    State(state): State<AppState>,
    caller: CallerIdentity,
) -> Result<Json<UserResponse>, AppError> {
    let user = state
        .users
        .get(caller.user_id.as_uuid())
        .ok_or_else(|| not_found(caller.user_id.as_uuid()))?;
    Ok(Json(UserResponse::from(&user)))
}

/// PATCH /v1/users/me/ — Update own names and phone number.
#[utoipa::path(
    patch,
    path = "/v1/users/me/",
    request_body = UpdateMeRequest,
    responses(
        (status = 200, description = "Account updated", body = UserResponse),
        (status = 400, description = "Validation error or role change", body = crate::error::ErrorBody),
        (status = 409, description = "Phone number taken", body = crate::error::ErrorBody),
    ),
    tag = "users"
)]
pub async fn update_me(
    State(state): State<AppState>,
    caller: CallerIdentity,
    body: Result<Json<UpdateMeRequest>, JsonRejection>,
) -> Result<Json<UserResponse>, AppError> {
    let req = extract_json(body)?;
    if req.role.is_some() {
        return Err(AppError::validation("role", "You cannot change your own role."));
    }
    let id = *caller.user_id.as_uuid();
    let changes = ProfileChanges::parse(req.first_name, req.last_name, req.phone_number)?;

    let user = state
        .users
        .try_update_unique(
            &id,
            |other| changes.check_against(other),
            |user| {
                changes.apply(user);
                Ok(user.clone())
            },
        )
        .ok_or_else(|| not_found(&id))??;
    persist_user_update(&state, &user).await?;

    Ok(Json(UserResponse::from(&user)))
}

/// GET /v1/users/{id}/ — A single account.
#[utoipa::path(
    get,
    path = "/v1/users/{id}/",
    params(("id" = Uuid, Path, description = "User ID")),
    responses(
        (status = 200, description = "User found", body = UserResponse),
        (status = 404, description = "Not found", body = crate::error::ErrorBody),
    ),
    tag = "users"
)]
pub async fn get_user(
    State(state): State<AppState>,
    _caller: CallerIdentity,
    Path(id): Path<Uuid>,
) -> Result<Json<UserResponse>, AppError> {
    let user = state.users.get(&id).ok_or_else(|| not_found(&id))?;
    Ok(Json(UserResponse::from(&user)))
}

/// PATCH /v1/users/{id}/ — Admin update, including role and activation.
#[utoipa::path(
    patch,
    path = "/v1/users/{id}/",
    params(("id" = Uuid, Path, description = "User ID")),
    request_body = AdminUpdateUserRequest,
    responses(
        (status = 200, description = "User updated", body = UserResponse),
        (status = 400, description = "Validation error", body = crate::error::ErrorBody),
        (status = 403, description = "Caller is not an admin", body = crate::error::ErrorBody),
        (status = 404, description = "Not found", body = crate::error::ErrorBody),
    ),
    tag = "users"
)]
pub async fn update_user(
    State(state): State<AppState>,
    caller: CallerIdentity,
    Path(id): Path<Uuid>,
    body: Result<Json<AdminUpdateUserRequest>, JsonRejection>,
) -> Result<Json<UserResponse>, AppError> {
    require_admin(&caller)?;
    let req = extract_json(body)?;
    if !state.users.contains(&id) {
        return Err(not_found(&id));
    }

    let role = req.role.as_deref().map(parse_role).transpose()?;
    if role.is_some() && caller.user_id.as_uuid() == &id {
        return Err(AppError::validation("role", "You cannot change your own role."));
    }
    let changes = ProfileChanges::parse(req.first_name, req.last_name, req.phone_number)?;

    let user = state
        .users
        .try_update_unique(
            &id,
            |other| changes.check_against(other),
            |user| {
                changes.apply(user);
                if let Some(role) = role {
                    user.role = role;
                }
                if let Some(active) = req.is_active {
                    user.is_active = active;
                }
                Ok(user.clone())
            },
        )
        .ok_or_else(|| not_found(&id))??;
    persist_user_update(&state, &user).await?;

    tracing::info!(user_id = %id, role = %user.role, is_active = user.is_active, "user updated by admin");
    Ok(Json(UserResponse::from(&user)))
}

/// POST /v1/users/set_password/ — Change the caller's password.
#[utoipa::path(
    post,
    path = "/v1/users/set_password/",
    request_body = SetPasswordRequest,
    responses(
        (status = 204, description = "Password changed"),
        (status = 400, description = "Wrong current password or policy violation", body = crate::error::ErrorBody),
    ),
    tag = "users"
)]
pub async fn set_password(
    State(state): State<AppState>,
    caller: CallerIdentity,
    body: Result<Json<SetPasswordRequest>, JsonRejection>,
) -> Result<StatusCode, AppError> {
    let req = extract_json(body)?;
    let id = *caller.user_id.as_uuid();

    let current = state.users.get(&id).ok_or_else(|| not_found(&id))?;
    if !verify_password(current.password_hash.clone(), req.current_password.clone()).await? {
        return Err(AppError::validation("current_password", "Invalid password."));
    }
    if req.new_password == req.current_password {
        return Err(AppError::validation(
            "new_password",
            "The new password must differ from the current one.",
        ));
    }
    validate_password(&req.new_password).map_err(AppError::invalid("new_password"))?;
    let password_hash = hash_password(req.new_password).await?;

    let user = state
        .users
        .try_update(&id, |user| {
            // Hashing ran unlocked; refuse to overwrite a concurrent change.
            if user.password_hash != current.password_hash {
                return Err(AppError::Conflict(
                    "The password was changed by another request.".into(),
                ));
            }
            user.password_hash = password_hash;
            Ok(user.clone())
        })
        .ok_or_else(|| not_found(&id))??;
    persist_user_update(&state, &user).await?;

    tracing::info!(user_id = %id, "password changed");
    Ok(StatusCode::NO_CONTENT)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn request(email: &str, phone: &str, password: &str) -> CreateUserRequest {
        CreateUserRequest {
            email: email.to_string(),
            first_name: "Anna".to_string(),
            last_name: "Petrova".to_string(),
            phone_number: phone.to_string(),
            password: password.to_string(),
            role: None,
        }
    }

    fn field_of(err: AppError) -> String {
        match err {
            AppError::Validation { field, .. } => field,
            other => panic!("expected Validation, got: {other:?}"),
        }
    }

    #[tokio::test]
    async fn build_user_hashes_password() {
        let user = build_user(request("anna@example.com", "89001112233", "Secr3t!pass"), Role::User)
            .await
            .unwrap();
        assert!(user.password_hash.verify("Secr3t!pass"));
        assert!(user.is_active);
        assert_eq!(user.role, Role::User);
    }

    #[tokio::test]
    async fn build_user_reports_failing_field() {
        let err = build_user(request("not-an-email", "89001112233", "Secr3t!pass"), Role::User)
            .await
            .unwrap_err();
        assert_eq!(field_of(err), "email");
        let err = build_user(request("a@example.com", "phone", "Secr3t!pass"), Role::User)
            .await
            .unwrap_err();
        assert_eq!(field_of(err), "phone_number");
        let err = build_user(request("a@example.com", "89001112233", "short"), Role::User)
            .await
            .unwrap_err();
        assert_eq!(field_of(err), "password");
    }

    #[test]
    fn parse_role_rejects_unknown() {
        assert_eq!(parse_role("mediator").unwrap(), Role::Mediator);
        assert_eq!(field_of(parse_role("superuser").unwrap_err()), "role");
    }

    #[tokio::test]
    async fn insert_user_enforces_uniqueness() {
        let state = AppState::new();
        let first = build_user(request("Anna@Example.com", "89001112233", "Secr3t!pass"), Role::User)
            .await
            .unwrap();
        insert_user(&state, first).await.unwrap();

        let same_email = build_user(request("anna@example.COM", "89009998877", "Secr3t!pass"), Role::User)
            .await
            .unwrap();
        assert!(matches!(
            insert_user(&state, same_email).await,
            Err(AppError::Conflict(_))
        ));

        let same_phone = build_user(request("boris@example.com", "+8 900 111-22-33", "Secr3t!pass"), Role::User)
            .await
            .unwrap();
        assert!(matches!(
            insert_user(&state, same_phone).await,
            Err(AppError::Conflict(_))
        ));
        assert_eq!(state.users.len(), 1);
    }

    #[tokio::test]
    async fn response_omits_password() {
        let user = build_user(request("anna@example.com", "89001112233", "Secr3t!pass"), Role::Mediator)
            .await
            .unwrap();
        let json = serde_json::to_value(UserResponse::from(&user)).unwrap();
        assert_eq!(json["role"], "mediator");
        assert!(json.get("password_hash").is_none());
    }
}
