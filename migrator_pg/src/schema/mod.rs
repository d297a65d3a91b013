//! Embedded schema migrations for the postgres status ledger.
//!
//! Steps are versioned, checksummed and tracked in `_migrator_schema_migrations`. Each step
//! runs in its own transaction; there is no rollback.
//!
//! ```rust,ignore
//! use migrator_pg::{PgStatusLedger, SchemaMigrator};
//!
//! let pool = PgPool::connect("postgres://...").await?;
//! SchemaMigrator::new(pool.clone()).run().await?;
//! let ledger = PgStatusLedger::new(pool);
//! ```

mod m001_create_migration_status_table;
mod m002_add_status_lookup_indexes;

use std::collections::HashSet;

use async_trait::async_trait;
use sha2::{Digest, Sha256};
use sqlx::{PgPool, Postgres, Row, Transaction};

use m001_create_migration_status_table::CreateMigrationStatusTable;
use m002_add_status_lookup_indexes::AddStatusLookupIndexes;

/// Every step, oldest first. New steps go at the end.
const STEPS: &[&dyn SchemaMigration] = &[&CreateMigrationStatusTable, &AddStatusLookupIndexes];

/// Errors raised while migrating the ledger schema.
#[derive(Debug, thiserror::Error)]
pub enum MigrationSchemaError {
    /// A database error occurred.
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    /// An applied step no longer matches its definition.
    #[error("Schema step {version} ({name}) checksum mismatch: applied {applied}, defined {defined}")]
    ChecksumMismatch {
        /// Step version
        version: i64,
        /// Step name
        name: String,
        /// Checksum stored when the step was applied
        applied: String,
        /// Checksum of the step as defined now
        defined: String,
    },

    /// The database holds a step this build does not know, written by a newer migrator.
    #[error("Schema step {version} ({name}) is not known to this build; refusing to touch a newer ledger schema")]
    UnknownStep {
        /// Step version
        version: i64,
        /// Step name
        name: String,
    },

    /// A step failed; its transaction was rolled back.
    #[error("Schema step {version} ({name}) failed: {reason}")]
    StepFailed {
        /// Step version
        version: i64,
        /// Step name
        name: String,
        /// Underlying error
        reason: String,
    },
}

/// A single schema step.
#[async_trait]
pub trait SchemaMigration: Send + Sync {
    /// Unique, increasing version.
    fn version(&self) -> i64;

    /// Short snake_case name.
    fn name(&self) -> &'static str;

    /// Applies the step inside `tx`. The runner commits.
    async fn up<'a>(&self, tx: &mut Transaction<'a, Postgres>) -> Result<(), MigrationSchemaError>;

    /// SHA-256 of version and name.
    fn checksum(&self) -> String {
        let mut hasher = Sha256::new();
        hasher.update(self.version().to_le_bytes());
        hasher.update(self.name().as_bytes());
        format!("{:x}", hasher.finalize())
    }
}

/// A step recorded as applied.
#[derive(Debug, Clone)]
pub struct AppliedSchemaMigration {
    /// Step version
    pub version: i64,
    /// Step name
    pub name: String,
    /// When it was applied
    pub applied_at: chrono::DateTime<chrono::Utc>,
    /// Checksum at the time
    pub checksum: String,
}

/// Applies the ledger schema steps.
#[derive(Debug, Clone)]
pub struct SchemaMigrator {
    pool: PgPool,
}

impl SchemaMigrator {
    /// Creates a runner over the pool.
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    async fn ensure_tracking_table(&self) -> Result<(), MigrationSchemaError> {
        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS _migrator_schema_migrations (
                version BIGINT PRIMARY KEY,
                name VARCHAR(255) NOT NULL,
                applied_at TIMESTAMPTZ NOT NULL DEFAULT NOW(),
                checksum VARCHAR(64) NOT NULL
            )
            "#,
        )
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    fn verify(applied: &[AppliedSchemaMigration]) -> Result<(), MigrationSchemaError> {
        for record in applied {
            let Some(step) = STEPS.iter().find(|s| s.version() == record.version) else {
                return Err(MigrationSchemaError::UnknownStep {
                    version: record.version,
                    name: record.name.clone(),
                });
            };
            let defined = step.checksum();
            if defined != record.checksum {
                return Err(MigrationSchemaError::ChecksumMismatch {
                    version: record.version,
                    name: record.name.clone(),
                    applied: record.checksum.clone(),
                    defined,
                });
            }
        }
        Ok(())
    }

    /// Applies every pending step and returns how many were applied.
    ///
    /// Stops at the first failing step; steps applied before it stay committed.
    pub async fn run(&self) -> Result<usize, MigrationSchemaError> {
        let applied = self.applied().await?;
        Self::verify(&applied)?;
        let done: HashSet<i64> = applied.iter().map(|a| a.version).collect();

        let mut count = 0;
        for step in STEPS.iter().filter(|s| !done.contains(&s.version())) {
            log::info!("Applying schema step {} ({})", step.version(), step.name());

            let mut tx = self.pool.begin().await?;
            step.up(&mut tx).await.map_err(|err| match err {
                MigrationSchemaError::Database(db) => MigrationSchemaError::StepFailed {
                    version: step.version(),
                    name: step.name().to_string(),
                    reason: db.to_string(),
                },
                other => other,
            })?;
            sqlx::query(
                "INSERT INTO _migrator_schema_migrations (version, name, checksum) VALUES ($1, $2, $3)",
            )
            .bind(step.version())
            .bind(step.name())
            .bind(step.checksum())
            .execute(&mut *tx)
            .await?;
            tx.commit().await?;

            count += 1;
        }

        if count > 0 {
            log::info!("Applied {count} schema steps");
        } else {
            log::debug!("Ledger schema is up to date");
        }
        Ok(count)
    }

    /// Version of the latest applied step, 0 when none.
    pub async fn current_version(&self) -> Result<i64, MigrationSchemaError> {
        self.ensure_tracking_table().await?;
        let (version,): (i64,) =
            sqlx::query_as("SELECT COALESCE(MAX(version), 0) FROM _migrator_schema_migrations")
                .fetch_one(&self.pool)
                .await?;
        Ok(version)
    }

    /// Steps not applied yet, oldest first.
    pub async fn pending(&self) -> Result<Vec<&'static dyn SchemaMigration>, MigrationSchemaError> {
        let done: HashSet<i64> = self.applied().await?.iter().map(|a| a.version).collect();
        Ok(STEPS
            .iter()
            .filter(|s| !done.contains(&s.version()))
            .copied()
            .collect())
    }

    /// Applied steps, oldest first.
    pub async fn applied(&self) -> Result<Vec<AppliedSchemaMigration>, MigrationSchemaError> {
        self.ensure_tracking_table().await?;
        let rows = sqlx::query(
            "SELECT version, name, applied_at, checksum FROM _migrator_schema_migrations ORDER BY version",
        )
        .fetch_all(&self.pool)
        .await?;

        Ok(rows
            .into_iter()
            .map(|row| AppliedSchemaMigration {
                version: row.get("version"),
                name: row.get("name"),
                applied_at: row.get("applied_at"),
                checksum: row.get("checksum"),
            })
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn checksums_are_stable_and_distinct() {
        assert_eq!(
            CreateMigrationStatusTable.checksum(),
            CreateMigrationStatusTable.checksum()
        );
        assert_ne!(
            CreateMigrationStatusTable.checksum(),
            AddStatusLookupIndexes.checksum()
        );
    }

    #[test]
    fn steps_are_strictly_increasing() {
        let versions: Vec<i64> = STEPS.iter().map(|s| s.version()).collect();
        assert!(versions.windows(2).all(|w| w[0] < w[1]));
        let names: HashSet<&str> = STEPS.iter().map(|s| s.name()).collect();
        assert_eq!(names.len(), STEPS.len());
    }

    #[test]
    fn tampered_step_is_detected() {
        let applied = vec![AppliedSchemaMigration {
            version: 1,
            name: "create_migration_status_table".to_string(),
            applied_at: chrono::Utc::now(),
            checksum: "0".repeat(64),
        }];
        let err = SchemaMigrator::verify(&applied).unwrap_err();
        assert!(matches!(
            err,
            MigrationSchemaError::ChecksumMismatch { version: 1, .. }
        ));

        let applied = vec![AppliedSchemaMigration {
            checksum: CreateMigrationStatusTable.checksum(),
            ..applied[0].clone()
        }];
        assert!(SchemaMigrator::verify(&applied).is_ok());
    }

    #[test]
    fn ledger_schema_from_a_newer_build_is_refused() {
        let applied = vec![AppliedSchemaMigration {
            version: 99,
            name: "add_future_column".to_string(),
            applied_at: chrono::Utc::now(),
            checksum: "0".repeat(64),
        }];
        let err = SchemaMigrator::verify(&applied).unwrap_err();
        assert!(matches!(
            err,
            MigrationSchemaError::UnknownStep { version: 99, .. }
        ));
    }
}
