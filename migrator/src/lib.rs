//! # Migrator
//!
//! Incremental, idempotent migration of legacy challenge records into the canonical
//! challenge store. The core crate holds the translation rules, the record builder and the
//! orchestrator; backends are enabled with features:
//!
//! - `in-memory`: collaborators and a status ledger kept in process memory.
//! - `postgres`: a status ledger stored in postgres, with embedded schema steps.

#![deny(missing_docs)]

#[cfg(feature = "in-memory")]
/// In-memory backends.
pub mod mem {
    //! Re-exports `migrator_mem`.
    pub use migrator_mem::*;
}

#[cfg(feature = "postgres")]
/// Postgres backends.
pub mod pg {
    //! Re-exports `migrator_pg`.
    pub use migrator_pg::*;
}

pub mod prelude {
    //! The prelude module for the `migrator` crate.
    pub use migrator_core::prelude::*;

    #[cfg(feature = "in-memory")]
    pub use super::mem::*;
    #[cfg(feature = "postgres")]
    pub use super::pg::*;
}
