//! # Migrator postgres backend

#![deny(missing_docs)]

/// The status ledger implementation for postgres
pub mod ledger;

/// Schema migrations for the ledger tables
pub mod schema;

pub use ledger::{PgStatusLedger, PgStatusLedgerError};
pub use schema::{AppliedSchemaMigration, MigrationSchemaError, SchemaMigration, SchemaMigrator};
