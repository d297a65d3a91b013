//! Drives migrations: decides which legacy challenges need work, builds and saves them and
//! keeps the status ledger current.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, PoisonError};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tokio::task::JoinHandle;
use tokio_stream::StreamExt;
use uuid::Uuid;

use crate::builder::ChallengeBuilder;
use crate::config::MigratorConfig;
use crate::error::MigrationError;
use crate::ledger::{MigrationStatus, StatusFilter, StatusLedger, StatusPage};
use crate::legacy::LegacyChallengeSnapshot;
use crate::pagination;
use crate::ports::Collaborators;
use crate::resolver::Resolver;

const RUNNING_MESSAGE: &str = "The migration is running.";

/// Whether a legacy challenge needs to be migrated.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Decision {
    /// The canonical record is current.
    Skip,
    /// Migrate, updating `existing` when the challenge was migrated before.
    Migrate {
        /// Canonical id of the previous migration
        existing: Option<Uuid>,
        /// Legacy last-modified timestamp read while deciding
        source_modified_at: Option<DateTime<Utc>>,
    },
}

/// Outcome of processing one legacy id.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RecordOutcome {
    /// Already current, nothing written.
    Skipped,
    /// Migrated to the canonical record with this id.
    Migrated(Uuid),
    /// Migration failed; the ledger holds the error.
    Failed {
        /// Canonical id obtained before the failure, if any
        challenge_id: Option<Uuid>,
        /// Failure reason
        error: String,
    },
}

/// Counters of a finished full run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RunSummary {
    /// Run start
    pub started_at: DateTime<Utc>,
    /// Run end
    pub ended_at: DateTime<Utc>,
    /// Legacy ids processed
    pub processed: u64,
    /// Skipped as current
    pub skipped: u64,
    /// Migrated
    pub succeeded: u64,
    /// Failed
    pub failed: u64,
}

impl RunSummary {
    fn start() -> Self {
        let now = Utc::now();
        Self {
            started_at: now,
            ended_at: now,
            processed: 0,
            skipped: 0,
            succeeded: 0,
            failed: 0,
        }
    }

    fn count(&mut self, outcome: &RecordOutcome) {
        self.processed += 1;
        match outcome {
            RecordOutcome::Skipped => self.skipped += 1,
            RecordOutcome::Migrated(_) => self.succeeded += 1,
            RecordOutcome::Failed { .. } => self.failed += 1,
        }
    }
}

/// Whether a run is in flight.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum RunState {
    /// Nothing running
    Idle,
    /// A full run or a retry is in flight
    Running,
}

/// Snapshot returned by [`Orchestrator::get_status`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OrchestratorStatus {
    /// Current state
    pub state: RunState,
    /// Last finished full run
    pub last_run: Option<RunSummary>,
}

/// Releases the in-flight flag when dropped.
struct RunGuard(Arc<AtomicBool>);

impl RunGuard {
    fn claim(flag: &Arc<AtomicBool>) -> Result<Self, MigrationError> {
        flag.compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .map_err(|_| MigrationError::Conflict(RUNNING_MESSAGE.to_string()))?;
        Ok(Self(Arc::clone(flag)))
    }
}

impl Drop for RunGuard {
    fn drop(&mut self) {
        self.0.store(false, Ordering::Release);
    }
}

/// Single-flight migration driver.
///
/// At most one full run or retry is in flight at any time; any other start request is
/// rejected with [`MigrationError::Conflict`] before anything is read or written. Records of
/// a run are processed one after the other.
pub struct Orchestrator {
    ports: Collaborators,
    ledger: Arc<dyn StatusLedger>,
    config: MigratorConfig,
    resolver: Resolver,
    running: Arc<AtomicBool>,
    last_run: Mutex<Option<RunSummary>>,
}

impl Orchestrator {
    /// Creates an orchestrator with the default configuration.
    pub fn new(ports: Collaborators, ledger: Arc<dyn StatusLedger>) -> Self {
        Self::with_config(ports, ledger, MigratorConfig::default())
    }

    /// Creates an orchestrator with a custom configuration.
    pub fn with_config(
        ports: Collaborators,
        ledger: Arc<dyn StatusLedger>,
        config: MigratorConfig,
    ) -> Self {
        let resolver = Resolver::new(
            Arc::clone(&ports.groups),
            Arc::clone(&ports.terms),
            config.terms_page_size,
            config.max_pages,
        );
        Self {
            ports,
            ledger,
            config,
            resolver,
            running: Arc::new(AtomicBool::new(false)),
            last_run: Mutex::new(None),
        }
    }

    /// Returns the current configuration.
    pub fn config(&self) -> &MigratorConfig {
        &self.config
    }

    /// The resolver shared by every migration of this orchestrator.
    pub fn resolver(&self) -> &Resolver {
        &self.resolver
    }

    /// Decides whether `legacy_id` needs (re)migration.
    ///
    /// A challenge never migrated always needs it. A migrated one is skipped unless `force` is
    /// set or the legacy last-modified timestamp is strictly newer than the one recorded on the
    /// canonical record.
    pub async fn decide(&self, legacy_id: i64, force: bool) -> Result<Decision, MigrationError> {
        let existing = self.ports.store.find_by_legacy_id(legacy_id).await?;
        let source_modified_at = self.ports.legacy.get_last_modified(legacy_id).await?;

        let Some(existing) = existing else {
            return Ok(Decision::Migrate {
                existing: None,
                source_modified_at,
            });
        };

        let recorded = existing.legacy.source_modified_at;
        let newer = match (source_modified_at, recorded) {
            (Some(current), Some(recorded)) => current > recorded,
            (Some(_), None) => true,
            (None, _) => false,
        };
        if force || newer {
            Ok(Decision::Migrate {
                existing: existing.id,
                source_modified_at,
            })
        } else {
            Ok(Decision::Skip)
        }
    }

    /// Processes a single legacy id, claiming the in-flight flag for its duration.
    pub async fn process_one(
        &self,
        legacy_id: i64,
        force: bool,
    ) -> Result<RecordOutcome, MigrationError> {
        let _guard = RunGuard::claim(&self.running)?;
        self.process_record(legacy_id, force).await
    }

    /// Migrates `legacy_id` even when it is current.
    pub async fn retry_one(&self, legacy_id: i64) -> Result<RecordOutcome, MigrationError> {
        self.process_one(legacy_id, true).await
    }

    /// Walks every legacy id matching the configured filter, one at a time.
    ///
    /// Per-record failures end up in the ledger and never stop the run; a record whose ledger
    /// write fails is counted as failed. The run stops early only when the id listing fails.
    pub async fn process_all(&self) -> Result<RunSummary, MigrationError> {
        let _guard = RunGuard::claim(&self.running)?;
        self.run_all().await
    }

    /// Starts [`Orchestrator::process_all`] on the runtime.
    ///
    /// Rejected with [`MigrationError::Conflict`] when a run is already in flight.
    pub fn trigger_migration(
        self: &Arc<Self>,
    ) -> Result<JoinHandle<Result<RunSummary, MigrationError>>, MigrationError> {
        let guard = RunGuard::claim(&self.running)?;
        let this = Arc::clone(self);
        Ok(tokio::spawn(async move {
            let _guard = guard;
            this.run_all().await
        }))
    }

    /// Starts [`Orchestrator::retry_one`] on the runtime.
    ///
    /// Rejected with [`MigrationError::Conflict`] when a run is already in flight.
    pub fn trigger_retry(
        self: &Arc<Self>,
        legacy_id: i64,
    ) -> Result<JoinHandle<Result<RecordOutcome, MigrationError>>, MigrationError> {
        let guard = RunGuard::claim(&self.running)?;
        let this = Arc::clone(self);
        Ok(tokio::spawn(async move {
            let _guard = guard;
            this.process_record(legacy_id, true).await
        }))
    }

    /// Queries the status ledger. `page` is zero-indexed.
    pub async fn query_status(
        &self,
        filter: &StatusFilter,
        page: u32,
        per_page: u32,
    ) -> Result<StatusPage, MigrationError> {
        self.ledger.query(filter, page, per_page).await
    }

    /// Whether a run is in flight.
    pub fn is_running(&self) -> bool {
        self.running.load(Ordering::Acquire)
    }

    /// Run state and the counters of the last finished run.
    pub fn get_status(&self) -> OrchestratorStatus {
        let state = if self.is_running() {
            RunState::Running
        } else {
            RunState::Idle
        };
        let last_run = self
            .last_run
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone();
        OrchestratorStatus { state, last_run }
    }

    /// Always true once constructed.
    pub fn is_healthy(&self) -> bool {
        true
    }

    async fn run_all(&self) -> Result<RunSummary, MigrationError> {
        if self.config.reset_caches_per_run {
            self.resolver.reset().await;
        }
        let mut summary = RunSummary::start();
        log::info!("Starting migration run");

        let result = self.walk_ids(&mut summary).await;

        summary.ended_at = Utc::now();
        log::info!(
            "Migration run finished: {} processed, {} skipped, {} migrated, {} failed",
            summary.processed,
            summary.skipped,
            summary.succeeded,
            summary.failed
        );
        *self.last_run.lock().unwrap_or_else(PoisonError::into_inner) = Some(summary.clone());

        result.map(|_| summary)
    }

    async fn walk_ids(&self, summary: &mut RunSummary) -> Result<(), MigrationError> {
        let ids = pagination::legacy_ids(
            self.ports.legacy.as_ref(),
            &self.config.legacy_id_filter,
            self.config.legacy_ids_page_size,
            self.config.max_pages,
        );
        tokio::pin!(ids);

        while let Some(legacy_id) = ids.next().await {
            let legacy_id = legacy_id.inspect_err(|err| {
                log::error!("Listing legacy challenges failed: {err}");
            })?;
            let outcome = match self.process_record(legacy_id, false).await {
                Ok(outcome) => outcome,
                Err(err) => {
                    log::error!("Recording the status of challenge {legacy_id} failed: {err}");
                    RecordOutcome::Failed {
                        challenge_id: None,
                        error: err.to_string(),
                    }
                }
            };
            summary.count(&outcome);
        }
        Ok(())
    }

    async fn process_record(
        &self,
        legacy_id: i64,
        force: bool,
    ) -> Result<RecordOutcome, MigrationError> {
        let (existing, source_modified_at) = match self.decide(legacy_id, force).await {
            Ok(Decision::Skip) => {
                log::debug!("Challenge {legacy_id} is current, skipping");
                return Ok(RecordOutcome::Skipped);
            }
            Ok(Decision::Migrate {
                existing,
                source_modified_at,
            }) => (existing, source_modified_at),
            Err(err) => {
                log::error!("Could not decide on challenge {legacy_id}: {err}");
                let error = err.to_string();
                self.ledger.record_start(legacy_id, None).await?;
                self.ledger
                    .record_end(legacy_id, None, MigrationStatus::Failed, Some(error.clone()))
                    .await?;
                return Ok(RecordOutcome::Failed {
                    challenge_id: None,
                    error,
                });
            }
        };

        self.ledger.record_queued(legacy_id).await?;
        self.ledger.record_start(legacy_id, source_modified_at).await?;

        let mut challenge_id = existing;
        match self
            .migrate(legacy_id, source_modified_at, &mut challenge_id)
            .await
        {
            Ok(id) => {
                self.ledger
                    .record_end(legacy_id, Some(id), MigrationStatus::Success, None)
                    .await?;
                log::info!("Migrated challenge {legacy_id} to {id}");
                Ok(RecordOutcome::Migrated(id))
            }
            Err(err) => {
                log::error!("Migration of challenge {legacy_id} failed: {err}");
                let error = err.to_string();
                self.ledger
                    .record_end(
                        legacy_id,
                        challenge_id,
                        MigrationStatus::Failed,
                        Some(error.clone()),
                    )
                    .await?;
                Ok(RecordOutcome::Failed {
                    challenge_id,
                    error,
                })
            }
        }
    }

    async fn migrate(
        &self,
        legacy_id: i64,
        source_modified_at: Option<DateTime<Utc>>,
        challenge_id: &mut Option<Uuid>,
    ) -> Result<Uuid, MigrationError> {
        let snapshot = self.load_snapshot(legacy_id).await?;
        let builder = ChallengeBuilder::new(&self.ports, &self.resolver, &self.config);
        let mut record = builder.build(&snapshot).await?;
        record.id = *challenge_id;
        record.legacy.source_modified_at = source_modified_at;

        let id = self.ports.store.save(&record).await?;
        *challenge_id = Some(id);

        let resources = self
            .ports
            .resources
            .migrate_for_challenge(legacy_id, id)
            .await?;
        log::debug!("Migrated {resources} resources of challenge {legacy_id}");
        Ok(id)
    }

    async fn load_snapshot(&self, legacy_id: i64) -> Result<LegacyChallengeSnapshot, MigrationError> {
        let listing = self
            .ports
            .legacy
            .get_listing(legacy_id)
            .await?
            .ok_or_else(|| {
                MigrationError::NotFound(format!(
                    "Legacy challenge {legacy_id} not found in the listing index"
                ))
            })?;
        let detail = self.ports.legacy.get_detail(legacy_id).await?;
        let audit = self.ports.audit.get_audit_info(legacy_id).await?;
        Ok(LegacyChallengeSnapshot {
            legacy_id,
            listing,
            detail,
            audit,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn guard_is_exclusive_and_released_on_drop() {
        let flag = Arc::new(AtomicBool::new(false));
        let guard = RunGuard::claim(&flag).unwrap();
        assert!(flag.load(Ordering::Acquire));

        let err = RunGuard::claim(&flag).err().unwrap();
        assert!(err.is_conflict());
        assert_eq!(err.to_string(), "Conflict: The migration is running.");

        drop(guard);
        assert!(!flag.load(Ordering::Acquire));
        assert!(RunGuard::claim(&flag).is_ok());
    }

    #[test]
    fn summary_counts_outcomes() {
        let mut summary = RunSummary::start();
        summary.count(&RecordOutcome::Skipped);
        summary.count(&RecordOutcome::Migrated(Uuid::new_v4()));
        summary.count(&RecordOutcome::Failed {
            challenge_id: None,
            error: "boom".into(),
        });
        summary.count(&RecordOutcome::Skipped);
        assert_eq!(
            (summary.processed, summary.skipped, summary.succeeded, summary.failed),
            (4, 2, 1, 1)
        );
    }
}
