//! Dispute persistence operations.
//!
//! A dispute spans two tables: the `disputes` row and its
//! `dispute_opponents` set. Writes touching both run in one transaction.
//! Lifecycle constraints are enforced at the application layer (via
//! `mediation_disputes::apply_patch`), not in SQL.

use std::collections::{BTreeSet, HashMap};

use chrono::{DateTime, Utc};
use sqlx::{PgPool, Postgres, Transaction};
use uuid::Uuid;

use mediation_core::{DisputeId, UserId};
use mediation_disputes::{Dispute, DisputeStatus};

use super::decode_error;

async fn replace_opponents(
    tx: &mut Transaction<'_, Postgres>,
    dispute: &Dispute,
) -> Result<(), sqlx::Error> {
    sqlx::query("DELETE FROM dispute_opponents WHERE dispute_id = $1")
        .bind(dispute.id.as_uuid())
        .execute(&mut **tx)
        .await?;

    for opponent in &dispute.opponent {
        sqlx::query("INSERT INTO dispute_opponents (dispute_id, user_id) VALUES ($1, $2)")
            .bind(dispute.id.as_uuid())
            .bind(opponent.as_uuid())
            .execute(&mut **tx)
            .await?;
    }
    Ok(())
}

/// Insert a new dispute with its opponent set.
pub async fn insert(pool: &PgPool, dispute: &Dispute) -> Result<(), sqlx::Error> {
    let mut tx = pool.begin().await?;

    sqlx::query(
        "INSERT INTO disputes (id, creator_id, description, status, add_opponent, created_at, closed_at)
         VALUES ($1, $2, $3, $4, $5, $6, $7)",
    )
    .bind(dispute.id.as_uuid())
    .bind(dispute.creator.as_uuid())
    .bind(&dispute.description)
    .bind(dispute.status.as_str())
    .bind(dispute.add_opponent)
    .bind(dispute.created_at)
    .bind(dispute.closed_at)
    .execute(&mut *tx)
    .await?;

    replace_opponents(&mut tx, dispute).await?;
    tx.commit().await
}

/// Overwrite a dispute's mutable columns and its opponent set.
pub async fn update(pool: &PgPool, dispute: &Dispute) -> Result<bool, sqlx::Error> {
    let mut tx = pool.begin().await?;

    let result = sqlx::query(
        "UPDATE disputes SET description = $1, status = $2, add_opponent = $3, closed_at = $4
         WHERE id = $5",
    )
    .bind(&dispute.description)
    .bind(dispute.status.as_str())
    .bind(dispute.add_opponent)
    .bind(dispute.closed_at)
    .bind(dispute.id.as_uuid())
    .execute(&mut *tx)
    .await?;

    replace_opponents(&mut tx, dispute).await?;
    tx.commit().await?;

    Ok(result.rows_affected() > 0)
}

/// Delete a dispute. Opponents, comments and attachments cascade.
pub async fn delete(pool: &PgPool, id: DisputeId) -> Result<bool, sqlx::Error> {
    let result = sqlx::query("DELETE FROM disputes WHERE id = $1")
        .bind(id.as_uuid())
        .execute(pool)
        .await?;
    Ok(result.rows_affected() > 0)
}

/// Load all disputes from the database into the in-memory store on startup.
pub async fn load_all(pool: &PgPool) -> Result<Vec<Dispute>, sqlx::Error> {
    let rows = sqlx::query_as::<_, DisputeRow>(
        "SELECT id, creator_id, description, status, add_opponent, created_at, closed_at
         FROM disputes ORDER BY created_at",
    )
    .fetch_all(pool)
    .await?;

    let links =
        sqlx::query_as::<_, (Uuid, Uuid)>("SELECT dispute_id, user_id FROM dispute_opponents")
            .fetch_all(pool)
            .await?;

    let mut opponents: HashMap<Uuid, BTreeSet<UserId>> = HashMap::new();
    for (dispute_id, user_id) in links {
        opponents
            .entry(dispute_id)
            .or_default()
            .insert(UserId::from_uuid(user_id));
    }

    rows.into_iter()
        .map(|row| {
            let opponent = opponents.remove(&row.id).unwrap_or_default();
            row.into_record(opponent)
        })
        .collect()
}

/// Internal row type for SQLx mapping.
#[derive(sqlx::FromRow)]
struct DisputeRow {
    id: Uuid,
    creator_id: Uuid,
    description: String,
    status: String,
    add_opponent: bool,
    created_at: DateTime<Utc>,
    closed_at: Option<DateTime<Utc>>,
}

impl DisputeRow {
    /// Legacy `stated` rows are normalised to `started` here.
    fn into_record(self, opponent: BTreeSet<UserId>) -> Result<Dispute, sqlx::Error> {
        let status = DisputeStatus::parse(&self.status).map_err(decode_error)?;
        if status.is_terminal() != self.closed_at.is_some() {
            tracing::error!(
                dispute_id = %self.id,
                status = %self.status,
                "closed_at does not match status in database; investigate"
            );
        }
        Ok(Dispute {
            id: DisputeId::from_uuid(self.id),
            creator: UserId::from_uuid(self.creator_id),
            opponent,
            description: self.description,
            status,
            add_opponent: self.add_opponent,
            created_at: self.created_at,
            closed_at: self.closed_at,
        })
    }
}
