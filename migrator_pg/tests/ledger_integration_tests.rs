mod common;

use chrono::{TimeZone, Utc};
use migrator_core::prelude::*;
use migrator_pg::{PgStatusLedger, SchemaMigrator};
use serial_test::serial;
use sqlx::PgPool;
use uuid::Uuid;

async fn setup() -> (PgPool, PgStatusLedger) {
    let _ = env_logger::builder().is_test(true).try_init();
    let pool = common::get_pg_pool().await;
    common::teardown(&pool).await;
    SchemaMigrator::new(pool.clone())
        .run()
        .await
        .expect("Failed to migrate the ledger schema");
    let ledger = PgStatusLedger::new(pool.clone());
    (pool, ledger)
}

#[tokio::test]
#[serial]
#[ignore = "requires a running postgres (DATABASE_URL)"]
async fn test_record_lifecycle() {
    let (pool, ledger) = setup().await;
    let modified = Utc.with_ymd_and_hms(2020, 3, 2, 0, 0, 0).unwrap();
    let challenge_id = Uuid::new_v4();

    ledger.record_queued(30001).await.unwrap();
    let queued = ledger.get(30001).await.unwrap().unwrap();
    assert_eq!(queued.status, MigrationStatus::Queued);
    assert!(queued.started_at.is_none());

    ledger.record_start(30001, Some(modified)).await.unwrap();
    let started = ledger.get(30001).await.unwrap().unwrap();
    assert_eq!(started.status, MigrationStatus::InProgress);
    assert_eq!(started.source_modified_at, Some(modified));
    assert!(started.started_at.is_some());

    ledger
        .record_end(30001, Some(challenge_id), MigrationStatus::Success, None)
        .await
        .unwrap();
    let ended = ledger.get(30001).await.unwrap().unwrap();
    assert_eq!(ended.status, MigrationStatus::Success);
    assert_eq!(ended.challenge_id, Some(challenge_id));
    assert!(ended.duration_ms().is_some());

    common::teardown(&pool).await;
}

#[tokio::test]
#[serial]
#[ignore = "requires a running postgres (DATABASE_URL)"]
async fn test_restart_clears_previous_outcome_but_keeps_challenge_id() {
    let (pool, ledger) = setup().await;
    let challenge_id = Uuid::new_v4();

    ledger.record_start(1, None).await.unwrap();
    ledger
        .record_end(1, Some(challenge_id), MigrationStatus::Failed, Some("boom".to_string()))
        .await
        .unwrap();

    ledger.record_start(1, None).await.unwrap();
    let restarted = ledger.get(1).await.unwrap().unwrap();
    assert!(restarted.ended_at.is_none());
    assert!(restarted.error_message.is_none());

    ledger
        .record_end(1, None, MigrationStatus::Failed, Some("again".to_string()))
        .await
        .unwrap();
    let record = ledger.get(1).await.unwrap().unwrap();
    assert_eq!(record.challenge_id, Some(challenge_id));
    assert_eq!(record.error_message.as_deref(), Some("again"));

    common::teardown(&pool).await;
}

#[tokio::test]
#[serial]
#[ignore = "requires a running postgres (DATABASE_URL)"]
async fn test_query_filters_and_pages() {
    let (pool, ledger) = setup().await;

    for id in 1..=5 {
        ledger.record_start(id, None).await.unwrap();
        let status = if id % 2 == 0 {
            MigrationStatus::Failed
        } else {
            MigrationStatus::Success
        };
        ledger.record_end(id, None, status, None).await.unwrap();
    }

    let all = ledger.query(&StatusFilter::default(), 0, 2).await.unwrap();
    assert_eq!(all.total, 5);
    assert_eq!(all.items.len(), 2);
    assert_eq!(all.items[0].record.legacy_id, 5);

    let last = ledger.query(&StatusFilter::default(), 2, 2).await.unwrap();
    assert_eq!(last.items.len(), 1);
    assert_eq!(last.items[0].record.legacy_id, 1);

    let failed = ledger
        .query(
            &StatusFilter {
                status: Some(MigrationStatus::Failed),
                ..Default::default()
            },
            0,
            10,
        )
        .await
        .unwrap();
    assert_eq!(failed.total, 2);
    assert!(
        failed
            .items
            .iter()
            .all(|v| v.record.status == MigrationStatus::Failed)
    );

    let single = ledger
        .query(
            &StatusFilter {
                legacy_id: Some(3),
                ..Default::default()
            },
            0,
            10,
        )
        .await
        .unwrap();
    assert_eq!(single.total, 1);
    assert_eq!(single.items[0].record.legacy_id, 3);

    common::teardown(&pool).await;
}

#[tokio::test]
#[serial]
#[ignore = "requires a running postgres (DATABASE_URL)"]
async fn test_get_unknown_record() {
    let (pool, ledger) = setup().await;
    assert!(ledger.get(404).await.unwrap().is_none());
    common::teardown(&pool).await;
}
