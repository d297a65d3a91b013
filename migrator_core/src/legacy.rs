//! Read-only shapes of the legacy system: the search-index listing, the detail record and the
//! relational audit row.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// A challenge as it appears in the legacy listing index.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct LegacyChallengeListing {
    /// The legacy id
    pub id: i64,
    /// Title
    pub challenge_title: String,
    /// Legacy status literal (`Active`, `Completed`, ...)
    pub status: String,
    /// Legacy track literal
    pub track: String,
    /// Legacy subtrack literal
    pub sub_track: String,
    /// Whether the challenge is a task
    pub is_task: bool,
    /// Tags attached in the legacy system
    pub tags: Vec<String>,
    /// Technologies, may contain nulls
    pub technologies: Vec<Option<String>>,
    /// Platforms, may contain nulls
    pub platforms: Vec<Option<String>>,
    /// Legacy (direct) project id
    pub project_id: Option<i64>,
    /// Legacy forum id
    pub forum_id: Option<i64>,
    /// Review type, `COMMUNITY` when absent
    pub review_type: Option<String>,
    /// Screening scorecard
    pub screening_scorecard_id: Option<i64>,
    /// Review scorecard
    pub review_scorecard_id: Option<i64>,
    /// Creation date
    pub created_at: Option<DateTime<Utc>>,
    /// Last update date
    pub updated_at: Option<DateTime<Utc>>,
    /// Registration start date
    pub registration_start_date: Option<DateTime<Utc>>,
    /// Placement prizes, first place first
    pub prize: Vec<f64>,
    /// Number of checkpoint prizes
    pub number_of_checkpoint_prizes: u32,
    /// Value of each checkpoint prize
    pub top_check_point_prize: Option<f64>,
    /// Number of submissions
    pub number_of_submissions: u32,
    /// Number of registrants
    pub number_of_registrants: u32,
    /// Members assigned as submitters
    pub submitter_ids: Vec<i64>,
    /// Legacy group ids
    pub group_ids: Vec<i64>,
    /// Phases
    pub phases: Vec<LegacyPhase>,
    /// Winners
    pub winners: Vec<LegacyWinner>,
    /// Events, may contain duplicates
    pub events: Vec<LegacyEvent>,
    /// Accepted file types
    pub file_types: Vec<LegacyFileType>,
    /// Metadata: stock art allowed
    pub allow_stock_art: Option<bool>,
    /// Metadata: digital run points
    pub dr_points: Option<f64>,
    /// Metadata: submissions are viewable
    pub submission_viewable: Option<bool>,
    /// Metadata: submission limit
    pub submission_limit: Option<i64>,
    /// Metadata: code repository
    pub code_repo: Option<String>,
    /// Metadata: environment
    pub environment: Option<String>,
}

/// A phase entry of the legacy listing.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct LegacyPhase {
    /// Phase name (`Registration`, `Submission`, ...)
    #[serde(rename = "type")]
    pub phase_type: String,
    /// Phase status literal, `Open` for running phases
    pub status: String,
    /// Duration in milliseconds
    pub duration: i64,
    /// Scheduled start
    pub scheduled_start_time: Option<DateTime<Utc>>,
    /// Scheduled end
    pub scheduled_end_time: Option<DateTime<Utc>>,
    /// Actual start
    pub actual_start_time: Option<DateTime<Utc>>,
    /// Actual end
    pub actual_end_time: Option<DateTime<Utc>>,
}

/// A submitter/rank pair.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct LegacyWinner {
    /// Handle of the submitter
    pub submitter: String,
    /// Final rank
    pub rank: u32,
}

/// An event the challenge is part of.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct LegacyEvent {
    /// Legacy event id
    pub id: i64,
    /// Long description
    pub event_description: String,
    /// Short key
    pub event_short_desc: String,
}

/// An accepted file type.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct LegacyFileType {
    /// Human readable description
    pub description: String,
}

/// The legacy detail record.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct LegacyChallengeDetail {
    /// Introduction
    pub introduction: Option<String>,
    /// Requirements
    pub detail_requirements: Option<String>,
    /// Final submission guidelines
    pub final_submission_guidelines: Option<String>,
    /// Terms the challenge is bound to
    pub terms: Vec<LegacyTermRef>,
}

/// A reference to a legacy terms-of-use document for a given role.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct LegacyTermRef {
    /// Legacy terms-of-use id
    pub terms_of_use_id: i64,
    /// Resource role name
    pub role: String,
}

/// Who created and last updated the challenge, from the relational audit store.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AuditInfo {
    /// Creator
    pub created_by: String,
    /// Last updater
    pub updated_by: String,
}

/// Everything read from the legacy system for one challenge.
#[derive(Debug, Clone, PartialEq)]
pub struct LegacyChallengeSnapshot {
    /// The legacy id
    pub legacy_id: i64,
    /// Listing index entry
    pub listing: LegacyChallengeListing,
    /// Detail record, if any
    pub detail: Option<LegacyChallengeDetail>,
    /// Audit row, if any
    pub audit: Option<AuditInfo>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn listing_deserializes_from_index_document() {
        let listing: LegacyChallengeListing = serde_json::from_value(serde_json::json!({
            "id": 30001234,
            "challengeTitle": "Build it",
            "track": "DEVELOP",
            "subTrack": "CODE",
            "isTask": false,
            "technologies": ["Rust", null],
            "prize": [500.0, 250.0],
            "numberOfCheckpointPrizes": 0,
            "phases": [{
                "type": "Registration",
                "status": "Open",
                "duration": 3600000,
                "scheduledStartTime": "2020-01-01T00:00:00Z"
            }],
            "updatedAt": "2020-01-02T10:00:00Z"
        }))
        .unwrap();

        assert_eq!(listing.id, 30001234);
        assert_eq!(listing.sub_track, "CODE");
        assert_eq!(listing.technologies, vec![Some("Rust".to_string()), None]);
        assert_eq!(listing.phases[0].phase_type, "Registration");
        assert_eq!(listing.phases[0].duration, 3_600_000);
        assert!(listing.group_ids.is_empty());
        assert!(listing.updated_at.is_some());
    }
}
