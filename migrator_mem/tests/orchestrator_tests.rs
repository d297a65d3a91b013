mod common;

use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use common::*;
use migrator_core::prelude::*;
use migrator_mem::*;
use uuid::Uuid;

/// Delegates to an in-memory ledger but refuses to queue one legacy id.
struct FlakyLedger {
    inner: InMemoryStatusLedger,
    broken: i64,
}

#[async_trait]
impl StatusLedger for FlakyLedger {
    async fn record_queued(&self, legacy_id: i64) -> Result<(), MigrationError> {
        if legacy_id == self.broken {
            return Err(MigrationError::transient(InjectedFailure(
                "ledger offline".to_string(),
            )));
        }
        self.inner.record_queued(legacy_id).await
    }

    async fn record_start(
        &self,
        legacy_id: i64,
        source_modified_at: Option<DateTime<Utc>>,
    ) -> Result<(), MigrationError> {
        self.inner.record_start(legacy_id, source_modified_at).await
    }

    async fn record_end(
        &self,
        legacy_id: i64,
        challenge_id: Option<Uuid>,
        status: MigrationStatus,
        error_message: Option<String>,
    ) -> Result<(), MigrationError> {
        self.inner
            .record_end(legacy_id, challenge_id, status, error_message)
            .await
    }

    async fn query(
        &self,
        filter: &StatusFilter,
        page: u32,
        per_page: u32,
    ) -> Result<StatusPage, MigrationError> {
        self.inner.query(filter, page, per_page).await
    }

    async fn get(&self, legacy_id: i64) -> Result<Option<MigrationStatusRecord>, MigrationError> {
        self.inner.get(legacy_id).await
    }
}

#[tokio::test]
async fn test_process_one_migrates_and_records_success() {
    init_logger();
    let ports = ports_with(vec![code_listing(1)]).await;
    let ledger = InMemoryStatusLedger::new();
    let orchestrator = orchestrator(&ports, &ledger);

    let outcome = orchestrator.process_one(1, false).await.unwrap();

    let RecordOutcome::Migrated(id) = outcome else {
        panic!("expected a migration, got {outcome:?}");
    };
    let record = ledger.get(1).await.unwrap().unwrap();
    assert_eq!(record.status, MigrationStatus::Success);
    assert_eq!(record.challenge_id, Some(id));
    assert_eq!(record.source_modified_at, Some(at(2, 0)));
    assert!(record.error_message.is_none());
    assert!(record.duration_ms().is_some());

    let stored = ports.store.find_by_legacy_id(1).await.unwrap().unwrap();
    assert_eq!(stored.id, Some(id));
    assert_eq!(stored.legacy.source_modified_at, Some(at(2, 0)));
    assert_eq!(ports.resources.calls().await, vec![(1, id)]);
}

#[tokio::test]
async fn test_unchanged_source_is_skipped() {
    let ports = ports_with(vec![code_listing(1)]).await;
    let ledger = InMemoryStatusLedger::new();
    let orchestrator = orchestrator(&ports, &ledger);

    orchestrator.process_one(1, false).await.unwrap();
    let writes = ledger.writes();
    let before = ledger.get(1).await.unwrap();

    let outcome = orchestrator.process_one(1, false).await.unwrap();

    assert_eq!(outcome, RecordOutcome::Skipped);
    assert_eq!(ledger.writes(), writes);
    assert_eq!(ledger.get(1).await.unwrap(), before);
    assert_eq!((ports.store.creates(), ports.store.updates()), (1, 0));
    assert_eq!(ports.resources.calls().await.len(), 1);
}

#[tokio::test]
async fn test_newer_source_is_migrated_in_place() {
    let ports = ports_with(vec![code_listing(1)]).await;
    let ledger = InMemoryStatusLedger::new();
    let orchestrator = orchestrator(&ports, &ledger);

    let RecordOutcome::Migrated(first) = orchestrator.process_one(1, false).await.unwrap() else {
        panic!("expected a migration");
    };
    ports.legacy.touch(1, at(10, 0)).await;

    let outcome = orchestrator.process_one(1, false).await.unwrap();

    assert_eq!(outcome, RecordOutcome::Migrated(first));
    assert_eq!((ports.store.creates(), ports.store.updates()), (1, 1));
    let record = ledger.get(1).await.unwrap().unwrap();
    assert_eq!(record.source_modified_at, Some(at(10, 0)));
}

#[tokio::test]
async fn test_retry_bypasses_the_timestamp_check() {
    let ports = ports_with(vec![code_listing(1)]).await;
    let ledger = InMemoryStatusLedger::new();
    let orchestrator = orchestrator(&ports, &ledger);

    orchestrator.process_one(1, false).await.unwrap();
    let outcome = orchestrator.retry_one(1).await.unwrap();

    assert!(matches!(outcome, RecordOutcome::Migrated(_)));
    assert_eq!((ports.store.creates(), ports.store.updates()), (1, 1));
    assert_eq!(ports.resources.calls().await.len(), 2);
}

#[tokio::test]
async fn test_builder_failure_is_recorded_and_the_run_continues() {
    let mut broken = code_listing(2);
    broken.sub_track = "NOT_A_SUBTRACK".to_string();
    broken.updated_at = Some(at(2, 5));
    let ports = ports_with(vec![code_listing(1), broken, code_listing(3)]).await;
    let ledger = InMemoryStatusLedger::new();
    let orchestrator = orchestrator(&ports, &ledger);

    let summary = orchestrator.process_all().await.unwrap();

    assert_eq!(summary.processed, 3);
    assert_eq!(summary.succeeded, 2);
    assert_eq!(summary.failed, 1);

    let failed = ledger.get(2).await.unwrap().unwrap();
    assert_eq!(failed.status, MigrationStatus::Failed);
    assert_eq!(failed.challenge_id, None);
    assert!(!failed.error_message.unwrap_or_default().is_empty());
    for id in [1, 3] {
        let record = ledger.get(id).await.unwrap().unwrap();
        assert_eq!(record.status, MigrationStatus::Success);
    }
}

#[tokio::test]
async fn test_save_failure_is_recorded() {
    let ports = ports_with(vec![code_listing(1)]).await;
    ports.store.fail_writes_for(1).await;
    let ledger = InMemoryStatusLedger::new();
    let orchestrator = orchestrator(&ports, &ledger);

    let outcome = orchestrator.process_one(1, false).await.unwrap();

    let RecordOutcome::Failed { challenge_id, error } = outcome else {
        panic!("expected a failure");
    };
    assert_eq!(challenge_id, None);
    assert!(error.contains("Injected failure"));
    let record = ledger.get(1).await.unwrap().unwrap();
    assert_eq!(record.status, MigrationStatus::Failed);
    assert_eq!(record.error_message.as_deref(), Some(error.as_str()));
    assert!(ports.resources.calls().await.is_empty());
}

#[tokio::test]
async fn test_missing_listing_is_recorded_as_failed() {
    let ports = ports_with(vec![]).await;
    let ledger = InMemoryStatusLedger::new();
    let orchestrator = orchestrator(&ports, &ledger);

    let outcome = orchestrator.process_one(404, false).await.unwrap();

    assert!(matches!(outcome, RecordOutcome::Failed { .. }));
    let record = ledger.get(404).await.unwrap().unwrap();
    assert_eq!(record.status, MigrationStatus::Failed);
    assert!(record.error_message.unwrap_or_default().contains("404"));
}

#[tokio::test]
async fn test_concurrent_starts_are_rejected() {
    let ports = ports_with((1..=20).map(code_listing).collect()).await;
    let ledger = InMemoryStatusLedger::new();
    let orchestrator = Arc::new(orchestrator(&ports, &ledger));

    let run = orchestrator.trigger_migration().unwrap();
    assert!(orchestrator.is_running());
    assert_eq!(orchestrator.get_status().state, RunState::Running);

    let err = orchestrator.trigger_migration().err().unwrap();
    assert!(err.is_conflict());
    let err = orchestrator.trigger_retry(999).err().unwrap();
    assert!(err.is_conflict());
    assert_eq!(err.to_string(), "Conflict: The migration is running.");
    let err = orchestrator.retry_one(999).await.unwrap_err();
    assert!(err.is_conflict());
    let err = orchestrator.process_all().await.unwrap_err();
    assert!(err.is_conflict());

    let summary = run.await.unwrap().unwrap();
    assert_eq!(summary.processed, 20);
    assert!(ledger.get(999).await.unwrap().is_none());
    assert!(!orchestrator.is_running());

    let status = orchestrator.get_status();
    assert_eq!(status.state, RunState::Idle);
    assert_eq!(status.last_run, Some(summary));
}

#[tokio::test]
async fn test_trigger_retry_runs_in_the_background() {
    let ports = ports_with(vec![code_listing(1)]).await;
    let ledger = InMemoryStatusLedger::new();
    let orchestrator = Arc::new(orchestrator(&ports, &ledger));

    orchestrator.process_one(1, false).await.unwrap();
    let outcome = orchestrator.trigger_retry(1).unwrap().await.unwrap().unwrap();

    assert!(matches!(outcome, RecordOutcome::Migrated(_)));
    assert_eq!(ports.store.updates(), 1);
    assert!(!orchestrator.is_running());
}

#[tokio::test]
async fn test_second_full_run_skips_everything() {
    let ports = ports_with((1..=5).map(code_listing).collect()).await;
    let ledger = InMemoryStatusLedger::new();
    let orchestrator = orchestrator(&ports, &ledger);

    orchestrator.process_all().await.unwrap();
    let writes = ledger.writes();
    let summary = orchestrator.process_all().await.unwrap();

    assert_eq!(summary.processed, 5);
    assert_eq!(summary.skipped, 5);
    assert_eq!(ledger.writes(), writes);
    assert_eq!(ports.store.creates(), 5);
}

#[tokio::test]
async fn test_full_run_respects_the_id_filter() {
    let mut completed = code_listing(2);
    completed.status = "Completed".to_string();
    let ports = ports_with(vec![code_listing(1), completed]).await;
    let ledger = InMemoryStatusLedger::new();
    let orchestrator = Orchestrator::with_config(
        ports.collaborators(),
        Arc::new(ledger.clone()),
        MigratorConfig {
            legacy_ids_page_size: 1,
            legacy_id_filter: LegacyIdFilter {
                status: Some("Completed".to_string()),
                ..Default::default()
            },
            ..Default::default()
        },
    );

    let summary = orchestrator.process_all().await.unwrap();

    assert_eq!(summary.processed, 1);
    assert!(ledger.get(1).await.unwrap().is_none());
    assert!(ledger.get(2).await.unwrap().is_some());
}

#[tokio::test]
async fn test_groups_are_looked_up_once_per_run() {
    let groups = InMemoryGroupDirectory::new([(10, "g-10".to_string())]);
    let listings = (1..=4)
        .map(|id| {
            let mut listing = code_listing(id);
            listing.group_ids = vec![10];
            listing
        })
        .collect();
    let ports = ports_with(listings).await.with_groups(groups.clone());
    let ledger = InMemoryStatusLedger::new();
    let orchestrator = orchestrator(&ports, &ledger);

    let summary = orchestrator.process_all().await.unwrap();

    assert_eq!(summary.succeeded, 4);
    assert_eq!(groups.lookups(), 1);
}

#[tokio::test]
async fn test_query_status_pages_the_ledger() {
    let mut broken = code_listing(3);
    broken.track = "UNKNOWN".to_string();
    let ports = ports_with(vec![code_listing(1), code_listing(2), broken]).await;
    let ledger = InMemoryStatusLedger::new();
    let orchestrator = orchestrator(&ports, &ledger);
    orchestrator.process_all().await.unwrap();

    let page = orchestrator
        .query_status(&StatusFilter::default(), 0, 2)
        .await
        .unwrap();
    assert_eq!(page.total, 3);
    assert_eq!(page.items.len(), 2);

    let failed = orchestrator
        .query_status(
            &StatusFilter {
                status: Some(MigrationStatus::Failed),
                ..Default::default()
            },
            0,
            10,
        )
        .await
        .unwrap();
    assert_eq!(failed.total, 1);
    assert_eq!(failed.items[0].record.legacy_id, 3);
    assert!(orchestrator.is_healthy());
}

#[tokio::test]
async fn test_ledger_failure_fails_only_that_record() {
    let ports = ports_with((1..=3).map(code_listing).collect()).await;
    let inner = InMemoryStatusLedger::new();
    let orchestrator = Orchestrator::new(
        ports.collaborators(),
        Arc::new(FlakyLedger {
            inner: inner.clone(),
            broken: 2,
        }),
    );

    let summary = orchestrator.process_all().await.unwrap();
    assert_eq!((summary.succeeded, summary.failed), (2, 1));
    assert!(inner.get(2).await.unwrap().is_none());

    let err = orchestrator.process_one(2, true).await.unwrap_err();
    assert!(matches!(err, MigrationError::Transient(_)));
    assert!(err.to_string().contains("ledger offline"));
}

#[tokio::test]
async fn test_failed_decision_starts_a_new_attempt() {
    let ports = ports_with(vec![code_listing(1)]).await;
    let ledger = InMemoryStatusLedger::new();
    let orchestrator = orchestrator(&ports, &ledger);

    orchestrator.process_one(1, false).await.unwrap();
    let first = ledger.get(1).await.unwrap().unwrap();
    tokio::time::sleep(std::time::Duration::from_millis(50)).await;
    ports.legacy.fail_reads_for(1).await;

    let outcome = orchestrator.process_one(1, false).await.unwrap();

    assert!(matches!(outcome, RecordOutcome::Failed { .. }));
    let record = ledger.get(1).await.unwrap().unwrap();
    assert_eq!(record.status, MigrationStatus::Failed);
    assert!(record.started_at > first.started_at);
    assert_eq!(record.source_modified_at, None);
    assert_eq!(record.challenge_id, first.challenge_id);
    assert!(record.duration_ms().is_some_and(|ms| ms < 50));
    assert!(
        record
            .error_message
            .unwrap_or_default()
            .contains("last-modified read of challenge 1")
    );
}
