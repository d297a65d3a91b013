//! Step 001: the per-legacy-id migration status table.

use async_trait::async_trait;
use sqlx::{Postgres, Transaction};

use super::{MigrationSchemaError, SchemaMigration};

/// Creates `challenge_migration_status`, one row per legacy challenge.
pub struct CreateMigrationStatusTable;

#[async_trait]
impl SchemaMigration for CreateMigrationStatusTable {
    fn version(&self) -> i64 {
        1
    }

    fn name(&self) -> &'static str {
        "create_migration_status_table"
    }

    async fn up<'a>(&self, tx: &mut Transaction<'a, Postgres>) -> Result<(), MigrationSchemaError> {
        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS challenge_migration_status (
                legacy_id BIGINT PRIMARY KEY,
                challenge_id UUID,
                status VARCHAR(32) NOT NULL,
                source_modified_at TIMESTAMPTZ,
                started_at TIMESTAMPTZ,
                ended_at TIMESTAMPTZ,
                error_message TEXT,
                updated_at TIMESTAMPTZ NOT NULL DEFAULT NOW(),
                CONSTRAINT challenge_migration_status_status_check
                    CHECK (status IN ('Queued', 'InProgress', 'Success', 'Failed'))
            )
            "#,
        )
        .execute(&mut **tx)
        .await?;

        Ok(())
    }
}
