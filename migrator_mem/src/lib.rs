//! # Migrator memory backend
//!
//! In-memory implementations of the status ledger and of every outbound port, primarily for
//! testing and local runs.
//!
//! ```ignore
//! use std::sync::Arc;
//! use migrator_core::prelude::*;
//! use migrator_mem::*;
//!
//! let source = InMemoryLegacySource::new();
//! source.insert(listing, Some(detail), None).await;
//!
//! let ports = InMemoryPorts::new().with_legacy(source);
//! let orchestrator = Orchestrator::new(ports.collaborators(), Arc::new(InMemoryStatusLedger::new()));
//! orchestrator.process_all().await?;
//! ```

#![deny(missing_docs)]

mod ledger;
mod ports;

pub use ledger::*;
pub use ports::*;
