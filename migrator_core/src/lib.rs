//! # Migrator core
//!
//! Moves challenges from the legacy system into the canonical schema. The
//! [`Orchestrator`](orchestrator::Orchestrator) decides which legacy challenges need work, the
//! [`ChallengeBuilder`](builder::ChallengeBuilder) assembles canonical records using the
//! [translation table](translation) and the [`Resolver`](resolver::Resolver), and a
//! [`StatusLedger`](ledger::StatusLedger) keeps the outcome of the latest attempt per legacy id.

#![deny(missing_docs)]

pub mod builder;
pub mod challenge;
pub mod config;
pub mod error;
pub mod ledger;
pub mod legacy;
pub mod orchestrator;
pub mod pagination;
pub mod ports;
pub mod resolver;
pub mod translation;

pub mod prelude {
    //! The prelude module for the `migrator_core` crate.
    pub use super::builder::ChallengeBuilder;
    pub use super::challenge::*;
    pub use super::config::MigratorConfig;
    pub use super::error::{BoxError, MigrationError};
    pub use super::ledger::{
        MigrationStatus, MigrationStatusRecord, StatusFilter, StatusLedger, StatusPage, StatusView,
    };
    pub use super::legacy::*;
    pub use super::orchestrator::{
        Decision, Orchestrator, OrchestratorStatus, RecordOutcome, RunState, RunSummary,
    };
    pub use super::ports::*;
    pub use super::resolver::Resolver;
    pub use super::translation::{
        CanonicalCategory, CanonicalTrack, CanonicalType, LegacyCategory, LegacySubtrack,
        LegacyTrack, canonical_ids_to_legacy, canonical_to_legacy, legacy_to_canonical,
        translate_legacy,
    };
}
