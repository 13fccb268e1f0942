//! User persistence operations.
//!
//! All functions take a `&PgPool` and operate on the `users` table.
//! Email and phone uniqueness are checked in memory before the write; the
//! unique indexes back that up.

use chrono::{DateTime, Utc};
use sqlx::PgPool;
use uuid::Uuid;

use mediation_core::{Email, PasswordHash, PersonName, PhoneNumber, UserId};
use mediation_disputes::{Role, User};

use super::{decode_error, invalid_column};

/// Insert a new user.
pub async fn insert(pool: &PgPool, user: &User) -> Result<(), sqlx::Error> {
    sqlx::query(
        "INSERT INTO users (id, email, first_name, last_name, phone_number, role, password_hash, is_active, created_at)
         VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9)",
    )
    .bind(user.id.as_uuid())
    .bind(user.email.as_str())
    .bind(user.first_name.as_str())
    .bind(user.last_name.as_str())
    .bind(user.phone_number.as_str())
    .bind(user.role.as_str())
    .bind(user.password_hash.as_str())
    .bind(user.is_active)
    .bind(user.created_at)
    .execute(pool)
    .await?;

    Ok(())
}

/// Overwrite every mutable column of an existing user.
pub async fn update(pool: &PgPool, user: &User) -> Result<bool, sqlx::Error> {
    let result = sqlx::query(
        "UPDATE users SET email = $1, first_name = $2, last_name = $3, phone_number = $4,
                role = $5, password_hash = $6, is_active = $7
         WHERE id = $8",
    )
    .bind(user.email.as_str())
    .bind(user.first_name.as_str())
    .bind(user.last_name.as_str())
    .bind(user.phone_number.as_str())
    .bind(user.role.as_str())
    .bind(user.password_hash.as_str())
    .bind(user.is_active)
    .bind(user.id.as_uuid())
    .execute(pool)
    .await?;

    Ok(result.rows_affected() > 0)
}

/// Load all users from the database into the in-memory store on startup.
pub async fn load_all(pool: &PgPool) -> Result<Vec<User>, sqlx::Error> {
    let rows = sqlx::query_as::<_, UserRow>(
        "SELECT id, email, first_name, last_name, phone_number, role, password_hash, is_active, created_at
         FROM users ORDER BY created_at",
    )
    .fetch_all(pool)
    .await?;

    rows.into_iter().map(UserRow::into_record).collect()
}

/// Internal row type for SQLx mapping.
#[derive(sqlx::FromRow)]
struct UserRow {
    id: Uuid,
    email: String,
    first_name: String,
    last_name: String,
    phone_number: String,
    role: String,
    password_hash: String,
    is_active: bool,
    created_at: DateTime<Utc>,
}

impl UserRow {
    fn into_record(self) -> Result<User, sqlx::Error> {
        let role = Role::parse(&self.role).ok_or_else(|| invalid_column("users.role", &self.role))?;
        Ok(User {
            id: UserId::from_uuid(self.id),
            email: Email::new(self.email).map_err(decode_error)?,
            first_name: PersonName::new("first_name", self.first_name).map_err(decode_error)?,
            last_name: PersonName::new("last_name", self.last_name).map_err(decode_error)?,
            phone_number: PhoneNumber::new(self.phone_number).map_err(decode_error)?,
            role,
            password_hash: PasswordHash::from_stored(self.password_hash).map_err(decode_error)?,
            is_active: self.is_active,
            created_at: self.created_at,
        })
    }
}
