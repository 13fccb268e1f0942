//! # Database Persistence Layer
//!
//! Provides Postgres persistence for the mediation stack via SQLx.
//!
//! ## Architecture
//!
//! The database layer is **optional**. When `DATABASE_URL` is set, every
//! mutation is written through to PostgreSQL after the in-memory store is
//! updated, and [`crate::state::AppState::hydrate_from_db`] reloads the
//! stores on startup. When absent, the API operates in in-memory-only mode
//! (suitable for development and testing).
//!
//! ## What is persisted
//!
//! - Users and password digests
//! - Bearer token digests
//! - Disputes and their opponent sets
//! - Comments
//! - File attachments, including their bytes

pub mod attachments;
pub mod comments;
pub mod disputes;
pub mod tokens;
pub mod users;

use sqlx::postgres::{PgPool, PgPoolOptions};

/// Initialize the database connection pool and run migrations.
///
/// Returns `None` if no URL is configured (in-memory-only mode).
/// Returns `Err` if the URL is set but the connection or migration fails.
pub async fn init_pool(database_url: Option<&str>) -> Result<Option<PgPool>, sqlx::Error> {
    let Some(url) = database_url else {
        tracing::warn!(
            "DATABASE_URL not set, running in-memory only mode. \
             State will not survive restarts."
        );
        return Ok(None);
    };

    let pool = PgPoolOptions::new()
        .max_connections(20)
        .min_connections(2)
        .acquire_timeout(std::time::Duration::from_secs(5))
        .connect(url)
        .await?;

    tracing::info!("Connected to PostgreSQL");

    // Run embedded migrations.
    sqlx::migrate!("./migrations").run(&pool).await?;
    tracing::info!("Database migrations applied");

    Ok(Some(pool))
}

/// Wrap a row-level conversion failure as a decode error.
pub(crate) fn decode_error<E>(err: E) -> sqlx::Error
where
    E: std::error::Error + Send + Sync + 'static,
{
    sqlx::Error::Decode(Box::new(err))
}

/// Decode error for a column value no domain type accepts.
pub(crate) fn invalid_column(column: &str, value: &str) -> sqlx::Error {
    decode_error(std::io::Error::new(
        std::io::ErrorKind::InvalidData,
        format!("unexpected value in column {column}: {value:?}"),
    ))
}
