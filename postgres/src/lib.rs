//! `PostgreSQL` record store for eventday.
//!
//! Implements the `RecordStore` trait from `eventday-core`. Each event is one
//! row: the full record as JSONB plus the scalar columns that listing and
//! analytics filter on. A `save` is a single upsert, so a transition is
//! persisted atomically and concurrent writers resolve as last-writer-wins.
//!
//! # Example
//!
//! ```ignore
//! use eventday_postgres::PostgresRecordStore;
//!
//! async fn example() -> Result<(), Box<dyn std::error::Error>> {
//!     let store = PostgresRecordStore::connect("postgres://localhost/eventday").await?;
//!     store.migrate().await?;
//!     Ok(())
//! }
//! ```

use eventday_core::analytics::{empty_status_counts, from_completed};
use eventday_core::environment::{BoxFuture, RecordStore, StoreError};
use eventday_core::{DeletedFilter, Event, EventId, EventStatus, VendorAnalytics, VendorId};
use sqlx::postgres::PgPoolOptions;
use sqlx::types::Json;
use sqlx::{PgPool, Row};
use std::time::Duration;
use thiserror::Error;

/// Connection or schema setup failure.
#[derive(Error, Debug)]
pub enum PostgresError {
    /// Could not open the pool.
    #[error("Failed to connect to database: {0}")]
    Connect(#[from] sqlx::Error),

    /// A migration failed.
    #[error("Failed to run migrations: {0}")]
    Migrate(#[from] sqlx::migrate::MigrateError),
}

/// Record store backed by a `PostgreSQL` table.
#[derive(Clone, Debug)]
pub struct PostgresRecordStore {
    pool: PgPool,
}

impl PostgresRecordStore {
    /// Open a pool against `database_url`.
    ///
    /// # Errors
    ///
    /// Returns [`PostgresError::Connect`] if the database is unreachable.
    pub async fn connect(database_url: &str) -> Result<Self, PostgresError> {
        Self::connect_with(database_url, 10).await
    }

    /// Open a pool with at most `max_connections` connections.
    ///
    /// # Errors
    ///
    /// Returns [`PostgresError::Connect`] if the database is unreachable.
    pub async fn connect_with(
        database_url: &str,
        max_connections: u32,
    ) -> Result<Self, PostgresError> {
        let pool = PgPoolOptions::new()
            .max_connections(max_connections)
            .acquire_timeout(Duration::from_secs(5))
            .connect(database_url)
            .await?;
        tracing::info!("Connected to PostgreSQL");
        Ok(Self { pool })
    }

    /// Wrap an existing pool.
    #[must_use]
    pub const fn from_pool(pool: PgPool) -> Self {
        Self { pool }
    }

    /// The underlying pool.
    #[must_use]
    pub const fn pool(&self) -> &PgPool {
        &self.pool
    }

    /// Apply the bundled migrations.
    ///
    /// # Errors
    ///
    /// Returns [`PostgresError::Migrate`] if a migration fails.
    pub async fn migrate(&self) -> Result<(), PostgresError> {
        sqlx::migrate!("./migrations").run(&self.pool).await?;
        tracing::info!("Database migrations applied");
        Ok(())
    }

    async fn fetch_analytics(&self, vendor: VendorId) -> Result<VendorAnalytics, StoreError> {
        let vendor = *vendor.as_uuid();

        let totals = sqlx::query(
            r"
            SELECT COUNT(*) AS total,
                   COUNT(*) FILTER (WHERE is_deleted) AS deleted
            FROM events
            WHERE vendor_id = $1
            ",
        )
        .bind(vendor)
        .fetch_one(&self.pool)
        .await
        .map_err(backend)?;
        let total = count(totals.try_get("total").map_err(backend)?);
        let deleted = count(totals.try_get("deleted").map_err(backend)?);

        let rows = sqlx::query(
            r"
            SELECT status, COUNT(*) AS n
            FROM events
            WHERE vendor_id = $1 AND NOT is_deleted
            GROUP BY status
            ",
        )
        .bind(vendor)
        .fetch_all(&self.pool)
        .await
        .map_err(backend)?;
        let mut status_counts = empty_status_counts();
        for row in rows {
            let status: String = row.try_get("status").map_err(backend)?;
            let status: EventStatus = status
                .parse()
                .map_err(|e| StoreError::Serialization(format!("Unknown status: {e}")))?;
            status_counts.insert(status, count(row.try_get("n").map_err(backend)?));
        }

        let completed = sqlx::query(
            r"
            SELECT document
            FROM events
            WHERE vendor_id = $1 AND NOT is_deleted AND status = $2
            ",
        )
        .bind(vendor)
        .bind(EventStatus::Completed.as_str())
        .fetch_all(&self.pool)
        .await
        .map_err(backend)?
        .into_iter()
        .map(|row| decode(&row))
        .collect::<Result<Vec<Event>, StoreError>>()?;

        Ok(VendorAnalytics {
            total_events: total,
            active_events: total.saturating_sub(deleted),
            deleted_events: deleted,
            status_counts,
            completed_events: completed.len() as u64,
            average_durations: from_completed(&completed),
        })
    }
}

fn backend(e: sqlx::Error) -> StoreError {
    metrics::counter!("eventday_store_errors_total", "store" => "postgres").increment(1);
    StoreError::Backend(e.to_string())
}

fn count(n: i64) -> u64 {
    u64::try_from(n).unwrap_or(0)
}

fn decode(row: &sqlx::postgres::PgRow) -> Result<Event, StoreError> {
    let Json(event): Json<Event> = row
        .try_get("document")
        .map_err(|e| StoreError::Serialization(e.to_string()))?;
    Ok(event)
}

/// `None` means "either".
const fn deleted_param(filter: DeletedFilter) -> Option<bool> {
    match filter {
        DeletedFilter::ExcludeDeleted => Some(false),
        DeletedFilter::IncludeDeleted => None,
        DeletedFilter::OnlyDeleted => Some(true),
    }
}

impl RecordStore for PostgresRecordStore {
    fn get(&self, id: EventId) -> BoxFuture<'_, Result<Option<Event>, StoreError>> {
        Box::pin(async move {
            let row = sqlx::query("SELECT document FROM events WHERE id = $1")
                .bind(*id.as_uuid())
                .fetch_optional(&self.pool)
                .await
                .map_err(backend)?;
            row.as_ref().map(decode).transpose()
        })
    }

    fn find_by_vendor(
        &self,
        vendor: VendorId,
        filter: DeletedFilter,
    ) -> BoxFuture<'_, Result<Vec<Event>, StoreError>> {
        Box::pin(async move {
            let rows = sqlx::query(
                r"
                SELECT document
                FROM events
                WHERE vendor_id = $1 AND ($2::BOOLEAN IS NULL OR is_deleted = $2)
                ORDER BY created_at DESC
                ",
            )
            .bind(*vendor.as_uuid())
            .bind(deleted_param(filter))
            .fetch_all(&self.pool)
            .await
            .map_err(backend)?;
            rows.iter().map(decode).collect()
        })
    }

    fn save(&self, event: Event) -> BoxFuture<'_, Result<(), StoreError>> {
        Box::pin(async move {
            sqlx::query(
                r"
                INSERT INTO events (id, vendor_id, status, is_deleted, created_at, updated_at, document)
                VALUES ($1, $2, $3, $4, $5, $6, $7)
                ON CONFLICT (id) DO UPDATE SET
                    status = EXCLUDED.status,
                    is_deleted = EXCLUDED.is_deleted,
                    updated_at = EXCLUDED.updated_at,
                    document = EXCLUDED.document
                ",
            )
            .bind(*event.id.as_uuid())
            .bind(*event.vendor_id.as_uuid())
            .bind(event.status.as_str())
            .bind(event.is_deleted)
            .bind(event.created_at)
            .bind(event.updated_at)
            .bind(Json(&event))
            .execute(&self.pool)
            .await
            .map_err(backend)?;
            tracing::debug!(event_id = %event.id, status = %event.status, "Event saved");
            Ok(())
        })
    }

    fn count_and_aggregate(
        &self,
        vendor: VendorId,
    ) -> BoxFuture<'_, Result<VendorAnalytics, StoreError>> {
        Box::pin(self.fetch_analytics(vendor))
    }

    fn name(&self) -> &'static str {
        "postgres"
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn deleted_filter_maps_to_nullable_flag() {
        assert_eq!(deleted_param(DeletedFilter::ExcludeDeleted), Some(false));
        assert_eq!(deleted_param(DeletedFilter::IncludeDeleted), None);
        assert_eq!(deleted_param(DeletedFilter::OnlyDeleted), Some(true));
    }

    #[test]
    fn negative_counts_clamp_to_zero() {
        assert_eq!(count(-1), 0);
        assert_eq!(count(7), 7);
    }
}
