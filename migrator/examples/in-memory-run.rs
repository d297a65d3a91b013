//! # In-memory migration run
//!
//! Loads three legacy challenges into the in-memory backend, runs a full migration, edits one
//! challenge in the legacy system and runs again. The second run only touches the edited
//! challenge; the one with an unmapped subtrack fails on both runs without stopping them.
//!
//! ```text
//! RUST_LOG=debug cargo run --example in-memory-run
//! ```

use std::sync::Arc;

use chrono::{Duration, Utc};
use migrator::prelude::*;

fn listing(id: i64, track: &str, sub_track: &str) -> Result<LegacyChallengeListing, serde_json::Error> {
    let start = Utc::now() - Duration::days(1);
    serde_json::from_value(serde_json::json!({
        "id": id,
        "challengeTitle": format!("Legacy challenge {id}"),
        "status": "Active",
        "track": track,
        "subTrack": sub_track,
        "technologies": ["Rust", null],
        "platforms": ["Linux"],
        "updatedAt": start,
        "registrationStartDate": start,
        "prize": [750.0, 250.0],
        "numberOfRegistrants": 8,
        "phases": [
            {
                "type": "Registration",
                "status": "Open",
                "duration": 172_800_000,
                "scheduledStartTime": start,
                "scheduledEndTime": start + Duration::days(2),
            },
            {
                "type": "Submission",
                "status": "Open",
                "duration": 172_800_000,
                "scheduledStartTime": start,
                "scheduledEndTime": start + Duration::days(2),
            }
        ]
    }))
}

fn detail() -> LegacyChallengeDetail {
    LegacyChallengeDetail {
        introduction: Some("<p>Build a parser.</p>".to_string()),
        detail_requirements: Some("<ul><li>No panics</li></ul>".to_string()),
        final_submission_guidelines: Some("Zip the crate.".to_string()),
        terms: vec![],
    }
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    env_logger::init();

    let legacy = InMemoryLegacySource::new();
    legacy.insert(listing(30001, "DEVELOP", "CODE")?, Some(detail()), None).await;
    legacy
        .insert(listing(30002, "DESIGN", "WEB_DESIGNS")?, Some(detail()), None)
        .await;
    legacy
        .insert(listing(30003, "DEVELOP", "NOT_A_SUBTRACK")?, None, None)
        .await;

    let ports = InMemoryPorts::new().with_legacy(legacy.clone());
    let ledger = Arc::new(InMemoryStatusLedger::new());
    let orchestrator = Arc::new(Orchestrator::new(ports.collaborators(), ledger));

    let summary = orchestrator.trigger_migration()?.await??;
    log::info!("First run: {summary:?}");

    legacy.touch(30001, Utc::now()).await;
    let summary = orchestrator.process_all().await?;
    log::info!("Second run: {summary:?}");

    let page = orchestrator
        .query_status(&StatusFilter::default(), 0, 10)
        .await?;
    println!("{}", serde_json::to_string_pretty(&page)?);

    for challenge in ports.store.records().await {
        println!(
            "{} -> {:?} ({} phases, tags {:?})",
            challenge.legacy_id,
            challenge.id,
            challenge.phases.len(),
            challenge.tags
        );
    }

    Ok(())
}
