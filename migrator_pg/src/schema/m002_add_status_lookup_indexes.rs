//! Step 002: indexes backing the filtered, most-recent-first status query.

use async_trait::async_trait;
use sqlx::{Postgres, Transaction};

use super::{MigrationSchemaError, SchemaMigration};

/// Indexes `updated_at`, `status` and `challenge_id`.
pub struct AddStatusLookupIndexes;

#[async_trait]
impl SchemaMigration for AddStatusLookupIndexes {
    fn version(&self) -> i64 {
        2
    }

    fn name(&self) -> &'static str {
        "add_status_lookup_indexes"
    }

    async fn up<'a>(&self, tx: &mut Transaction<'a, Postgres>) -> Result<(), MigrationSchemaError> {
        for statement in [
            "CREATE INDEX IF NOT EXISTS idx_challenge_migration_status_updated_at ON challenge_migration_status (updated_at DESC)",
            "CREATE INDEX IF NOT EXISTS idx_challenge_migration_status_status ON challenge_migration_status (status)",
            "CREATE INDEX IF NOT EXISTS idx_challenge_migration_status_challenge_id ON challenge_migration_status (challenge_id)",
        ] {
            sqlx::query(statement).execute(&mut **tx).await?;
        }

        Ok(())
    }
}
