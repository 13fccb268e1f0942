//! Bearer token persistence. Only token digests are stored.

use sqlx::PgPool;
use uuid::Uuid;

use mediation_core::UserId;

/// Record a newly issued token digest.
pub async fn insert(pool: &PgPool, digest: &str, user: UserId) -> Result<(), sqlx::Error> {
    sqlx::query("INSERT INTO auth_tokens (digest, user_id) VALUES ($1, $2)")
        .bind(digest)
        .bind(user.as_uuid())
        .execute(pool)
        .await?;
    Ok(())
}

/// Revoke a token digest.
pub async fn delete(pool: &PgPool, digest: &str) -> Result<bool, sqlx::Error> {
    let result = sqlx::query("DELETE FROM auth_tokens WHERE digest = $1")
        .bind(digest)
        .execute(pool)
        .await?;
    Ok(result.rows_affected() > 0)
}

/// Load every live token digest with its user.
pub async fn load_all(pool: &PgPool) -> Result<Vec<(String, UserId)>, sqlx::Error> {
    let rows = sqlx::query_as::<_, (String, Uuid)>("SELECT digest, user_id FROM auth_tokens")
        .fetch_all(pool)
        .await?;
    Ok(rows
        .into_iter()
        .map(|(digest, user)| (digest, UserId::from_uuid(user)))
        .collect())
}
