//! Status ledger contract: one record per legacy id holding the latest migration attempt.

use std::fmt;
use std::str::FromStr;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::MigrationError;

/// Status of the latest migration attempt of a legacy challenge.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum MigrationStatus {
    /// Selected for migration, not started yet
    Queued,
    /// Migration running
    InProgress,
    /// Migrated
    Success,
    /// Migration failed, see the error message
    Failed,
}

impl MigrationStatus {
    /// Storage literal.
    pub fn as_str(&self) -> &'static str {
        match self {
            MigrationStatus::Queued => "Queued",
            MigrationStatus::InProgress => "InProgress",
            MigrationStatus::Success => "Success",
            MigrationStatus::Failed => "Failed",
        }
    }

    /// Success and Failed end an attempt.
    pub fn is_terminal(&self) -> bool {
        matches!(self, MigrationStatus::Success | MigrationStatus::Failed)
    }
}

impl fmt::Display for MigrationStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for MigrationStatus {
    type Err = MigrationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "Queued" => Ok(MigrationStatus::Queued),
            "InProgress" => Ok(MigrationStatus::InProgress),
            "Success" => Ok(MigrationStatus::Success),
            "Failed" => Ok(MigrationStatus::Failed),
            other => Err(MigrationError::Validation(format!(
                "Unknown migration status '{other}'"
            ))),
        }
    }
}

/// The latest migration attempt of one legacy challenge.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MigrationStatusRecord {
    /// Key
    pub legacy_id: i64,
    /// Canonical id, once known
    pub challenge_id: Option<Uuid>,
    /// Status
    pub status: MigrationStatus,
    /// Legacy last-modified timestamp captured when the attempt started
    pub source_modified_at: Option<DateTime<Utc>>,
    /// Attempt start
    pub started_at: Option<DateTime<Utc>>,
    /// Attempt end
    pub ended_at: Option<DateTime<Utc>>,
    /// Failure reason
    pub error_message: Option<String>,
    /// Last write to this record
    pub updated_at: DateTime<Utc>,
}

impl MigrationStatusRecord {
    /// A fresh record in the given status.
    pub fn new(legacy_id: i64, status: MigrationStatus) -> Self {
        Self {
            legacy_id,
            challenge_id: None,
            status,
            source_modified_at: None,
            started_at: None,
            ended_at: None,
            error_message: None,
            updated_at: Utc::now(),
        }
    }

    /// `ended_at - started_at` in milliseconds, when both are known.
    pub fn duration_ms(&self) -> Option<i64> {
        match (self.started_at, self.ended_at) {
            (Some(started), Some(ended)) => Some((ended - started).num_milliseconds()),
            _ => None,
        }
    }

    /// Marks the record queued. The previous attempt's timestamps are kept until it starts.
    pub fn mark_queued(&mut self) {
        self.status = MigrationStatus::Queued;
        self.updated_at = Utc::now();
    }

    /// Marks the record in progress, starting a new attempt.
    pub fn mark_started(&mut self, source_modified_at: Option<DateTime<Utc>>) {
        let now = Utc::now();
        self.status = MigrationStatus::InProgress;
        self.source_modified_at = source_modified_at;
        self.started_at = Some(now);
        self.ended_at = None;
        self.error_message = None;
        self.updated_at = now;
    }

    /// Ends the current attempt.
    pub fn mark_ended(
        &mut self,
        challenge_id: Option<Uuid>,
        status: MigrationStatus,
        error_message: Option<String>,
    ) {
        let now = Utc::now();
        if challenge_id.is_some() {
            self.challenge_id = challenge_id;
        }
        self.status = status;
        self.ended_at = Some(now);
        self.error_message = error_message;
        self.updated_at = now;
    }
}

/// Query filter. Present fields are ANDed; absent ones are unconstrained.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StatusFilter {
    /// Only this legacy id
    pub legacy_id: Option<i64>,
    /// Only this canonical id
    pub challenge_id: Option<Uuid>,
    /// Only this status
    pub status: Option<MigrationStatus>,
}

impl StatusFilter {
    /// Whether the record satisfies every present field.
    pub fn matches(&self, record: &MigrationStatusRecord) -> bool {
        self.legacy_id.is_none_or(|id| record.legacy_id == id)
            && self
                .challenge_id
                .is_none_or(|id| record.challenge_id == Some(id))
            && self.status.is_none_or(|status| record.status == status)
    }
}

/// A record as returned by [`StatusLedger::query`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StatusView {
    /// The record
    #[serde(flatten)]
    pub record: MigrationStatusRecord,
    /// `endedAt - startedAt` in milliseconds
    pub duration_ms: Option<i64>,
}

impl From<MigrationStatusRecord> for StatusView {
    fn from(record: MigrationStatusRecord) -> Self {
        let duration_ms = record.duration_ms();
        Self {
            record,
            duration_ms,
        }
    }
}

/// One page of ledger records.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct StatusPage {
    /// Number of records matching the filter
    pub total: u64,
    /// Records on the requested page, most recently updated first
    pub items: Vec<StatusView>,
}

/// Durable per-legacy-id migration status.
///
/// Every write is an upsert of the single record of the legacy id. Persistence failures are
/// returned as [`MigrationError::Transient`].
#[async_trait]
pub trait StatusLedger: Send + Sync {
    /// Marks the legacy id as queued.
    async fn record_queued(&self, legacy_id: i64) -> Result<(), MigrationError>;
    /// Marks the legacy id as in progress, capturing the legacy last-modified timestamp.
    async fn record_start(
        &self,
        legacy_id: i64,
        source_modified_at: Option<DateTime<Utc>>,
    ) -> Result<(), MigrationError>;
    /// Ends the current attempt.
    async fn record_end(
        &self,
        legacy_id: i64,
        challenge_id: Option<Uuid>,
        status: MigrationStatus,
        error_message: Option<String>,
    ) -> Result<(), MigrationError>;
    /// Filtered query. `page` is zero-indexed.
    async fn query(
        &self,
        filter: &StatusFilter,
        page: u32,
        per_page: u32,
    ) -> Result<StatusPage, MigrationError>;
    /// The record of a legacy id.
    async fn get(&self, legacy_id: i64) -> Result<Option<MigrationStatusRecord>, MigrationError>;
}

#[cfg(test)]
mod tests {
    use super::*;

    use chrono::Duration;

    #[test]
    fn status_literals_parse_back() {
        for status in [
            MigrationStatus::Queued,
            MigrationStatus::InProgress,
            MigrationStatus::Success,
            MigrationStatus::Failed,
        ] {
            assert_eq!(status.as_str().parse::<MigrationStatus>().unwrap(), status);
        }
        assert!("Done".parse::<MigrationStatus>().is_err());
    }

    #[test]
    fn duration_needs_both_ends() {
        let mut record = MigrationStatusRecord::new(1, MigrationStatus::Queued);
        assert_eq!(record.duration_ms(), None);

        let started = Utc::now();
        record.started_at = Some(started);
        assert_eq!(record.duration_ms(), None);

        record.ended_at = Some(started + Duration::milliseconds(1500));
        assert_eq!(record.duration_ms(), Some(1500));
        assert_eq!(StatusView::from(record).duration_ms, Some(1500));
    }

    #[test]
    fn starting_clears_the_previous_outcome() {
        let mut record = MigrationStatusRecord::new(1, MigrationStatus::Queued);
        record.mark_started(None);
        record.mark_ended(None, MigrationStatus::Failed, Some("boom".into()));
        assert!(record.ended_at.is_some());

        record.mark_queued();
        record.mark_started(Some(Utc::now()));
        assert_eq!(record.status, MigrationStatus::InProgress);
        assert!(record.ended_at.is_none());
        assert!(record.error_message.is_none());
        assert!(record.source_modified_at.is_some());
    }

    #[test]
    fn ending_without_id_keeps_a_known_id() {
        let id = Uuid::new_v4();
        let mut record = MigrationStatusRecord::new(1, MigrationStatus::Queued);
        record.mark_ended(Some(id), MigrationStatus::Success, None);
        record.mark_ended(None, MigrationStatus::Failed, Some("boom".into()));
        assert_eq!(record.challenge_id, Some(id));
        assert_eq!(record.status, MigrationStatus::Failed);
    }

    #[test]
    fn filter_fields_are_anded() {
        let id = Uuid::new_v4();
        let mut record = MigrationStatusRecord::new(5, MigrationStatus::Success);
        record.challenge_id = Some(id);

        assert!(StatusFilter::default().matches(&record));
        assert!(
            StatusFilter {
                legacy_id: Some(5),
                status: Some(MigrationStatus::Success),
                ..Default::default()
            }
            .matches(&record)
        );
        assert!(
            !StatusFilter {
                legacy_id: Some(5),
                status: Some(MigrationStatus::Failed),
                ..Default::default()
            }
            .matches(&record)
        );
        assert!(
            !StatusFilter {
                challenge_id: Some(Uuid::new_v4()),
                ..Default::default()
            }
            .matches(&record)
        );
    }
}
