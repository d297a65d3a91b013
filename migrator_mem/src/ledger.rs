use std::collections::HashMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use tokio::sync::Mutex;
use uuid::Uuid;

use migrator_core::prelude::*;

/// An in-memory status ledger.
///
/// Records live as long as the ledger; every write bumps a counter tests can inspect.
#[derive(Clone, Debug, Default)]
pub struct InMemoryStatusLedger {
    records: Arc<Mutex<HashMap<i64, MigrationStatusRecord>>>,
    writes: Arc<AtomicUsize>,
}

impl InMemoryStatusLedger {
    /// Creates an empty ledger.
    pub fn new() -> Self {
        log::debug!("Creating a new InMemoryStatusLedger");
        Self::default()
    }

    /// Number of writes performed so far.
    pub fn writes(&self) -> usize {
        self.writes.load(Ordering::SeqCst)
    }

    /// Every record, in no particular order.
    pub async fn records(&self) -> Vec<MigrationStatusRecord> {
        self.records.lock().await.values().cloned().collect()
    }

    async fn upsert(&self, legacy_id: i64, update: impl FnOnce(&mut MigrationStatusRecord)) {
        let mut records = self.records.lock().await;
        let record = records
            .entry(legacy_id)
            .or_insert_with(|| MigrationStatusRecord::new(legacy_id, MigrationStatus::Queued));
        update(record);
        self.writes.fetch_add(1, Ordering::SeqCst);
    }
}

#[async_trait]
impl StatusLedger for InMemoryStatusLedger {
    async fn record_queued(&self, legacy_id: i64) -> Result<(), MigrationError> {
        self.upsert(legacy_id, |r| r.mark_queued()).await;
        Ok(())
    }

    async fn record_start(
        &self,
        legacy_id: i64,
        source_modified_at: Option<DateTime<Utc>>,
    ) -> Result<(), MigrationError> {
        self.upsert(legacy_id, |r| r.mark_started(source_modified_at))
            .await;
        Ok(())
    }

    async fn record_end(
        &self,
        legacy_id: i64,
        challenge_id: Option<Uuid>,
        status: MigrationStatus,
        error_message: Option<String>,
    ) -> Result<(), MigrationError> {
        self.upsert(legacy_id, |r| r.mark_ended(challenge_id, status, error_message))
            .await;
        Ok(())
    }

    async fn query(
        &self,
        filter: &StatusFilter,
        page: u32,
        per_page: u32,
    ) -> Result<StatusPage, MigrationError> {
        let records = self.records.lock().await;
        let mut matching: Vec<&MigrationStatusRecord> =
            records.values().filter(|r| filter.matches(r)).collect();
        matching.sort_by(|a, b| {
            b.updated_at
                .cmp(&a.updated_at)
                .then(b.legacy_id.cmp(&a.legacy_id))
        });

        let skip = page as usize * per_page as usize;
        Ok(StatusPage {
            total: matching.len() as u64,
            items: matching
                .into_iter()
                .skip(skip)
                .take(per_page as usize)
                .cloned()
                .map(StatusView::from)
                .collect(),
        })
    }

    async fn get(&self, legacy_id: i64) -> Result<Option<MigrationStatusRecord>, MigrationError> {
        Ok(self.records.lock().await.get(&legacy_id).cloned())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn attempts_overwrite_the_single_record() {
        let ledger = InMemoryStatusLedger::new();
        let challenge = Uuid::new_v4();

        ledger.record_queued(1).await.unwrap();
        ledger.record_start(1, Some(Utc::now())).await.unwrap();
        ledger
            .record_end(1, None, MigrationStatus::Failed, Some("boom".into()))
            .await
            .unwrap();
        ledger.record_queued(1).await.unwrap();
        ledger.record_start(1, Some(Utc::now())).await.unwrap();
        ledger
            .record_end(1, Some(challenge), MigrationStatus::Success, None)
            .await
            .unwrap();

        let records = ledger.records().await;
        assert_eq!(records.len(), 1);
        let record = &records[0];
        assert_eq!(record.status, MigrationStatus::Success);
        assert_eq!(record.challenge_id, Some(challenge));
        assert_eq!(record.error_message, None);
        assert!(record.duration_ms().is_some());
        assert_eq!(ledger.writes(), 6);
    }

    #[tokio::test]
    async fn query_filters_and_pages() {
        let ledger = InMemoryStatusLedger::new();
        for id in 1..=5 {
            let status = if id % 2 == 0 {
                MigrationStatus::Failed
            } else {
                MigrationStatus::Success
            };
            ledger.record_start(id, None).await.unwrap();
            ledger.record_end(id, None, status, None).await.unwrap();
        }

        let all = ledger
            .query(&StatusFilter::default(), 0, 2)
            .await
            .unwrap();
        assert_eq!(all.total, 5);
        assert_eq!(all.items.len(), 2);

        let last = ledger
            .query(&StatusFilter::default(), 2, 2)
            .await
            .unwrap();
        assert_eq!(last.items.len(), 1);

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
                .all(|v| v.record.status == MigrationStatus::Failed && v.duration_ms.is_some())
        );

        let none = ledger
            .query(
                &StatusFilter {
                    legacy_id: Some(2),
                    status: Some(MigrationStatus::Success),
                    ..Default::default()
                },
                0,
                10,
            )
            .await
            .unwrap();
        assert_eq!(none.total, 0);
    }
}
