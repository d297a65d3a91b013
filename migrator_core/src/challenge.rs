//! The canonical challenge record written to the target store.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// A challenge in the canonical schema.
///
/// `id` is assigned by the canonical store on first creation and never changes afterwards;
/// `legacy_id` links the record to exactly one legacy challenge.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CanonicalChallenge {
    /// Canonical id, `None` until the record is created
    pub id: Option<Uuid>,
    /// The legacy id
    pub legacy_id: i64,
    /// Status literal carried over from the legacy listing
    pub status: String,
    /// Canonical track id
    pub track_id: Uuid,
    /// Canonical type id
    pub type_id: Uuid,
    /// Track display name
    pub track: String,
    /// Type display name
    #[serde(rename = "type")]
    pub challenge_type: String,
    /// Legacy categorisation and references
    pub legacy: LegacyInfo,
    /// Task assignment
    pub task: TaskInfo,
    /// Name
    pub name: String,
    /// Description, HTML
    pub description: String,
    /// Format of `description`
    pub description_format: String,
    /// Canonical project id
    pub project_id: Option<i64>,
    /// Timeline template
    pub timeline_template_id: Uuid,
    /// Creation date
    pub created: Option<DateTime<Utc>>,
    /// Creator
    pub created_by: String,
    /// Last update date
    pub updated: Option<DateTime<Utc>>,
    /// Last updater
    pub updated_by: String,
    /// Start of the challenge (registration start)
    pub start_date: DateTime<Utc>,
    /// End of the challenge (last scheduled phase end)
    pub end_date: DateTime<Utc>,
    /// Registration window start
    pub registration_start_date: Option<DateTime<Utc>>,
    /// Registration window end
    pub registration_end_date: Option<DateTime<Utc>>,
    /// Submission window start
    pub submission_start_date: Option<DateTime<Utc>>,
    /// Submission window end
    pub submission_end_date: Option<DateTime<Utc>>,
    /// Names of the open phases
    pub current_phase_names: Vec<String>,
    /// Number of submissions
    pub num_of_submissions: u32,
    /// Number of registrants
    pub num_of_registrants: u32,
    /// Phases ordered by scheduled start
    pub phases: Vec<Phase>,
    /// Prize sets
    pub prize_sets: Vec<PrizeSet>,
    /// Tags
    pub tags: Vec<String>,
    /// Canonical group ids
    pub groups: Vec<String>,
    /// Winners, in legacy order
    pub winners: Vec<Winner>,
    /// Metadata name/value pairs
    pub metadata: Vec<Metadata>,
    /// Terms
    pub terms: Vec<ChallengeTerm>,
    /// Events
    pub events: Vec<ChallengeEvent>,
}

/// Legacy references kept on the canonical record.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LegacyInfo {
    /// Legacy track literal
    pub track: String,
    /// Legacy subtrack literal
    pub sub_track: String,
    /// Legacy forum id
    pub forum_id: Option<i64>,
    /// Legacy (direct) project id
    pub direct_project_id: Option<i64>,
    /// Review type
    pub review_type: String,
    /// Screening scorecard
    pub screening_scorecard_id: Option<i64>,
    /// Review scorecard
    pub review_scorecard_id: Option<i64>,
    /// Legacy last-modified timestamp at the time of the migration
    #[serde(rename = "informixModified")]
    pub source_modified_at: Option<DateTime<Utc>>,
}

/// Task assignment.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TaskInfo {
    /// Whether the challenge is a task
    pub is_task: bool,
    /// Whether somebody is assigned
    pub is_assigned: bool,
    /// The assignee, when exactly one member is assigned
    pub member_id: String,
}

/// A challenge phase.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Phase {
    /// Instance id
    pub id: Uuid,
    /// Phase name
    pub name: String,
    /// Canonical phase definition, resolved by name
    pub phase_id: Option<Uuid>,
    /// Duration in seconds
    pub duration: i64,
    /// Scheduled start
    pub scheduled_start_date: Option<DateTime<Utc>>,
    /// Scheduled end
    pub scheduled_end_date: Option<DateTime<Utc>>,
    /// Actual start
    pub actual_start_date: Option<DateTime<Utc>>,
    /// Actual end
    pub actual_end_date: Option<DateTime<Utc>>,
    /// Whether the phase is running
    pub is_open: bool,
}

impl Phase {
    /// Actual start when known, scheduled start otherwise.
    pub fn effective_start(&self) -> Option<DateTime<Utc>> {
        self.actual_start_date.or(self.scheduled_start_date)
    }

    /// Actual end when known, scheduled end otherwise.
    pub fn effective_end(&self) -> Option<DateTime<Utc>> {
        self.actual_end_date.or(self.scheduled_end_date)
    }
}

/// Kind of prize set.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PrizeSetType {
    /// Placement prizes
    Placement,
    /// Copilot payment
    Copilot,
    /// Reviewer payment
    Reviewer,
    /// Checkpoint prizes
    Checkpoint,
}

/// A set of prizes of one kind.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PrizeSet {
    /// Kind of set
    #[serde(rename = "type")]
    pub set_type: PrizeSetType,
    /// Description
    pub description: String,
    /// Prizes
    pub prizes: Vec<Prize>,
}

/// A single prize.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Prize {
    /// Amount
    pub value: f64,
    /// Currency
    #[serde(rename = "type")]
    pub prize_type: String,
}

impl Prize {
    /// A prize in US dollars.
    pub fn usd(value: f64) -> Self {
        Self {
            value,
            prize_type: "USD".to_string(),
        }
    }
}

/// A winner.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Winner {
    /// Member handle
    pub handle: String,
    /// Placement
    pub placement: u32,
}

/// A metadata entry.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Metadata {
    /// Name
    pub name: String,
    /// Value, stringified
    pub value: String,
}

/// A term the challenge is bound to, for a resource role.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChallengeTerm {
    /// Canonical term id
    pub id: String,
    /// Canonical resource role id
    pub role_id: String,
}

/// An event the challenge is part of.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChallengeEvent {
    /// Legacy event id
    pub id: i64,
    /// Description
    pub name: String,
    /// Short key
    pub key: String,
}
