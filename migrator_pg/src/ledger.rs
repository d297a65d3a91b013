use async_trait::async_trait;
use chrono::{DateTime, Utc};
use migrator_core::prelude::*;
use sqlx::{FromRow, PgPool, Postgres, QueryBuilder};
use uuid::Uuid;

const COLUMNS: &str = "legacy_id, challenge_id, status, source_modified_at, started_at, ended_at, error_message, updated_at";

/// Errors raised by [`PgStatusLedger`].
#[derive(Debug, thiserror::Error)]
pub enum PgStatusLedgerError {
    /// Error from the database
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),
    /// A stored status literal is not a known status
    #[error("Invalid status '{0}' stored in the ledger")]
    InvalidStatus(String),
}

impl From<PgStatusLedgerError> for MigrationError {
    fn from(err: PgStatusLedgerError) -> Self {
        MigrationError::transient(err)
    }
}

#[derive(Debug, FromRow)]
struct StatusRow {
    legacy_id: i64,
    challenge_id: Option<Uuid>,
    status: String,
    source_modified_at: Option<DateTime<Utc>>,
    started_at: Option<DateTime<Utc>>,
    ended_at: Option<DateTime<Utc>>,
    error_message: Option<String>,
    updated_at: DateTime<Utc>,
}

impl TryFrom<StatusRow> for MigrationStatusRecord {
    type Error = PgStatusLedgerError;

    fn try_from(row: StatusRow) -> Result<Self, Self::Error> {
        let status = row
            .status
            .parse()
            .map_err(|_| PgStatusLedgerError::InvalidStatus(row.status.clone()))?;
        Ok(MigrationStatusRecord {
            legacy_id: row.legacy_id,
            challenge_id: row.challenge_id,
            status,
            source_modified_at: row.source_modified_at,
            started_at: row.started_at,
            ended_at: row.ended_at,
            error_message: row.error_message,
            updated_at: row.updated_at,
        })
    }
}

/// Status ledger stored in the `challenge_migration_status` table.
///
/// The table is created by [`SchemaMigrator`](crate::SchemaMigrator).
#[derive(Clone, Debug)]
pub struct PgStatusLedger {
    pg: PgPool,
}

impl PgStatusLedger {
    /// Creates a ledger over the pool.
    pub fn new(pool: PgPool) -> Self {
        Self { pg: pool }
    }

    fn push_filters<'a>(builder: &mut QueryBuilder<'a, Postgres>, filter: &StatusFilter) {
        let mut separator = " WHERE ";
        if let Some(legacy_id) = filter.legacy_id {
            builder.push(separator).push("legacy_id = ").push_bind(legacy_id);
            separator = " AND ";
        }
        if let Some(challenge_id) = filter.challenge_id {
            builder
                .push(separator)
                .push("challenge_id = ")
                .push_bind(challenge_id);
            separator = " AND ";
        }
        if let Some(status) = filter.status {
            builder
                .push(separator)
                .push("status = ")
                .push_bind(status.as_str());
        }
    }

    async fn count(&self, filter: &StatusFilter) -> Result<u64, PgStatusLedgerError> {
        let mut builder = QueryBuilder::new("SELECT COUNT(*) FROM challenge_migration_status");
        Self::push_filters(&mut builder, filter);
        let total: i64 = builder.build_query_scalar().fetch_one(&self.pg).await?;
        Ok(u64::try_from(total).unwrap_or_default())
    }

    async fn page(
        &self,
        filter: &StatusFilter,
        page: u32,
        per_page: u32,
    ) -> Result<Vec<MigrationStatusRecord>, PgStatusLedgerError> {
        let mut builder = QueryBuilder::new(format!(
            "SELECT {COLUMNS} FROM challenge_migration_status"
        ));
        Self::push_filters(&mut builder, filter);
        builder
            .push(" ORDER BY updated_at DESC, legacy_id DESC LIMIT ")
            .push_bind(i64::from(per_page))
            .push(" OFFSET ")
            .push_bind(i64::from(page) * i64::from(per_page));

        let rows: Vec<StatusRow> = builder.build_query_as().fetch_all(&self.pg).await?;
        rows.into_iter().map(MigrationStatusRecord::try_from).collect()
    }
}

#[async_trait]
impl StatusLedger for PgStatusLedger {
    async fn record_queued(&self, legacy_id: i64) -> Result<(), MigrationError> {
        sqlx::query(
            r#"
            INSERT INTO challenge_migration_status (legacy_id, status, updated_at)
            VALUES ($1, $2, $3)
            ON CONFLICT (legacy_id) DO UPDATE SET
                status = EXCLUDED.status,
                updated_at = EXCLUDED.updated_at
            "#,
        )
        .bind(legacy_id)
        .bind(MigrationStatus::Queued.as_str())
        .bind(Utc::now())
        .execute(&self.pg)
        .await
        .map_err(PgStatusLedgerError::from)?;
        Ok(())
    }

    async fn record_start(
        &self,
        legacy_id: i64,
        source_modified_at: Option<DateTime<Utc>>,
    ) -> Result<(), MigrationError> {
        sqlx::query(
            r#"
            INSERT INTO challenge_migration_status
                (legacy_id, status, source_modified_at, started_at, updated_at)
            VALUES ($1, $2, $3, $4, $4)
            ON CONFLICT (legacy_id) DO UPDATE SET
                status = EXCLUDED.status,
                source_modified_at = EXCLUDED.source_modified_at,
                started_at = EXCLUDED.started_at,
                ended_at = NULL,
                error_message = NULL,
                updated_at = EXCLUDED.updated_at
            "#,
        )
        .bind(legacy_id)
        .bind(MigrationStatus::InProgress.as_str())
        .bind(source_modified_at)
        .bind(Utc::now())
        .execute(&self.pg)
        .await
        .map_err(PgStatusLedgerError::from)?;
        Ok(())
    }

    async fn record_end(
        &self,
        legacy_id: i64,
        challenge_id: Option<Uuid>,
        status: MigrationStatus,
        error_message: Option<String>,
    ) -> Result<(), MigrationError> {
        sqlx::query(
            r#"
            INSERT INTO challenge_migration_status
                (legacy_id, challenge_id, status, ended_at, error_message, updated_at)
            VALUES ($1, $2, $3, $4, $5, $4)
            ON CONFLICT (legacy_id) DO UPDATE SET
                challenge_id = COALESCE(EXCLUDED.challenge_id, challenge_migration_status.challenge_id),
                status = EXCLUDED.status,
                ended_at = EXCLUDED.ended_at,
                error_message = EXCLUDED.error_message,
                updated_at = EXCLUDED.updated_at
            "#,
        )
        .bind(legacy_id)
        .bind(challenge_id)
        .bind(status.as_str())
        .bind(Utc::now())
        .bind(error_message)
        .execute(&self.pg)
        .await
        .map_err(PgStatusLedgerError::from)?;
        Ok(())
    }

    async fn query(
        &self,
        filter: &StatusFilter,
        page: u32,
        per_page: u32,
    ) -> Result<StatusPage, MigrationError> {
        let total = self.count(filter).await?;
        let items = self
            .page(filter, page, per_page)
            .await?
            .into_iter()
            .map(StatusView::from)
            .collect();
        Ok(StatusPage { total, items })
    }

    async fn get(&self, legacy_id: i64) -> Result<Option<MigrationStatusRecord>, MigrationError> {
        let row: Option<StatusRow> = sqlx::query_as(&format!(
            "SELECT {COLUMNS} FROM challenge_migration_status WHERE legacy_id = $1"
        ))
        .bind(legacy_id)
        .fetch_optional(&self.pg)
        .await
        .map_err(PgStatusLedgerError::from)?;
        Ok(row.map(MigrationStatusRecord::try_from).transpose()?)
    }
}
