#![allow(dead_code)]

use std::sync::Arc;

use chrono::{DateTime, TimeZone, Utc};
use migrator_core::prelude::*;
use migrator_mem::*;

pub fn init_logger() {
    let _ = env_logger::builder().is_test(true).try_init();
}

pub fn at(day: u32, hour: u32) -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2020, 3, day, hour, 0, 0).unwrap()
}

pub fn phase(name: &str, status: &str, start: DateTime<Utc>, hours: i64) -> LegacyPhase {
    LegacyPhase {
        phase_type: name.to_string(),
        status: status.to_string(),
        duration: hours * 3_600_000,
        scheduled_start_time: Some(start),
        scheduled_end_time: Some(start + chrono::Duration::hours(hours)),
        actual_start_time: None,
        actual_end_time: None,
    }
}

/// A DEVELOP/CODE challenge with two phases, no groups and no terms.
pub fn code_listing(id: i64) -> LegacyChallengeListing {
    LegacyChallengeListing {
        id,
        challenge_title: format!("Challenge {id}"),
        status: "Active".to_string(),
        track: "DEVELOP".to_string(),
        sub_track: "CODE".to_string(),
        technologies: vec![Some("Rust".to_string())],
        platforms: vec![Some("Linux".to_string())],
        project_id: Some(8000),
        forum_id: Some(100),
        created_at: Some(at(1, 0)),
        updated_at: Some(at(2, 0)),
        registration_start_date: Some(at(3, 0)),
        prize: vec![1000.0, 500.0],
        number_of_submissions: 4,
        number_of_registrants: 12,
        phases: vec![
            phase("Submission", "Scheduled", at(3, 12), 48),
            phase("Registration", "Open", at(3, 0), 24),
        ],
        ..Default::default()
    }
}

pub fn detail() -> LegacyChallengeDetail {
    LegacyChallengeDetail {
        introduction: Some("Intro".to_string()),
        detail_requirements: Some("Requirements".to_string()),
        final_submission_guidelines: Some("Guidelines".to_string()),
        terms: vec![],
    }
}

pub fn audit() -> AuditInfo {
    AuditInfo {
        created_by: "creator".to_string(),
        updated_by: "updater".to_string(),
    }
}

pub fn term(id: i64) -> Term {
    Term {
        id: format!("term-{id}"),
        legacy_id: Some(id),
        title: format!("Term {id}"),
    }
}

pub async fn ports_with(listings: Vec<LegacyChallengeListing>) -> InMemoryPorts {
    let legacy = InMemoryLegacySource::new();
    for listing in listings {
        legacy.insert(listing, Some(detail()), Some(audit())).await;
    }
    InMemoryPorts::new()
        .with_legacy(legacy)
        .with_projects(StaticProjectDirectory::new([(
            8000,
            Project {
                id: 16000,
                name: "Project".to_string(),
            },
        )]))
}

pub fn orchestrator(ports: &InMemoryPorts, ledger: &InMemoryStatusLedger) -> Orchestrator {
    Orchestrator::new(ports.collaborators(), Arc::new(ledger.clone()))
}
