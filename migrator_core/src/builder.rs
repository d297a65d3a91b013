//! Assembles a canonical challenge from a legacy snapshot.

use std::collections::HashSet;

use chrono::Utc;
use uuid::Uuid;

use crate::challenge::{
    CanonicalChallenge, ChallengeEvent, ChallengeTerm, LegacyInfo, Metadata, Phase, Prize,
    PrizeSet, PrizeSetType, TaskInfo, Winner,
};
use crate::config::MigratorConfig;
use crate::error::MigrationError;
use crate::legacy::{
    LegacyChallengeDetail, LegacyChallengeListing, LegacyChallengeSnapshot, LegacyEvent,
    LegacyPhase, LegacyWinner,
};
use crate::ports::Collaborators;
use crate::resolver::Resolver;
use crate::translation::translate_legacy;

const REGISTRATION_PHASE: &str = "Registration";
const SUBMISSION_PHASE: &str = "Submission";
const OPEN_PHASE_STATUS: &str = "Open";
const GUIDELINES_HEADING: &str = "<br /><br /><h2>Final Submission Guidelines</h2>";

/// Builds [`CanonicalChallenge`]s from legacy snapshots.
pub struct ChallengeBuilder<'a> {
    ports: &'a Collaborators,
    resolver: &'a Resolver,
    config: &'a MigratorConfig,
}

impl<'a> ChallengeBuilder<'a> {
    /// Creates a builder over the given collaborators.
    pub fn new(ports: &'a Collaborators, resolver: &'a Resolver, config: &'a MigratorConfig) -> Self {
        Self {
            ports,
            resolver,
            config,
        }
    }

    /// Builds the canonical record of a legacy challenge.
    ///
    /// The returned record has no `id` and no `legacy.source_modified_at`; both belong to the
    /// caller. Fails with [`MigrationError::Validation`] on an unmappable category, a missing
    /// timeline template or an unknown term, and with [`MigrationError::NotFound`] on an unknown
    /// group.
    pub async fn build(
        &self,
        snapshot: &LegacyChallengeSnapshot,
    ) -> Result<CanonicalChallenge, MigrationError> {
        let legacy_id = snapshot.legacy_id;
        let listing = &snapshot.listing;
        log::info!(
            "Building challenge {legacy_id} - last modified {:?}",
            listing.updated_at
        );

        let groups = if listing.group_ids.is_empty() {
            vec![]
        } else {
            self.resolver.resolve_groups(&listing.group_ids).await?
        };

        let description = match &snapshot.detail {
            Some(detail) => compose_description(detail),
            None => {
                log::warn!("No detail record for challenge {legacy_id}, description and terms will be empty");
                String::new()
            }
        };

        let project_id = self.resolve_project(legacy_id, listing.project_id).await;

        let category = translate_legacy(
            &listing.track,
            &listing.sub_track,
            listing.is_task,
            &listing.tags,
        )?;
        let (track_id, type_id) = (category.track_id(), category.type_id());

        let timeline_template_id = self
            .ports
            .timelines
            .lookup(track_id, type_id)
            .await
            .map_err(MigrationError::from)?
            .ok_or_else(|| {
                MigrationError::Validation(format!(
                    "No timeline template for track {} and type {} (legacy id {legacy_id})",
                    category.track.name(),
                    category.challenge_type.name()
                ))
            })?;

        let phases = build_phases(&listing.phases, self.config);
        let start_date = listing.registration_start_date.unwrap_or_else(Utc::now);
        let end_date = phases
            .iter()
            .filter_map(|p| p.scheduled_end_date)
            .max()
            .unwrap_or(start_date);
        let registration = find_phase(&phases, REGISTRATION_PHASE);
        let submission = find_phase(&phases, SUBMISSION_PHASE);
        let current_phase_names = phases
            .iter()
            .filter(|p| p.is_open)
            .map(|p| p.name.clone())
            .collect();

        let terms = match &snapshot.detail {
            Some(detail) if !detail.terms.is_empty() => self.resolve_terms(legacy_id, detail).await?,
            _ => vec![],
        };

        let (created_by, updated_by) = match &snapshot.audit {
            Some(audit) => (audit.created_by.clone(), audit.updated_by.clone()),
            None => (
                self.config.default_actor.clone(),
                self.config.default_actor.clone(),
            ),
        };

        Ok(CanonicalChallenge {
            id: None,
            legacy_id,
            status: listing.status.clone(),
            track_id,
            type_id,
            track: category.track.name().to_string(),
            challenge_type: category.challenge_type.name().to_string(),
            legacy: LegacyInfo {
                track: listing.track.clone(),
                sub_track: listing.sub_track.clone(),
                forum_id: listing.forum_id,
                direct_project_id: listing.project_id,
                review_type: listing
                    .review_type
                    .clone()
                    .filter(|r| !r.trim().is_empty())
                    .unwrap_or_else(|| self.config.default_review_type.clone()),
                screening_scorecard_id: listing.screening_scorecard_id,
                review_scorecard_id: listing.review_scorecard_id,
                source_modified_at: None,
            },
            task: task_info(listing),
            name: listing.challenge_title.clone(),
            description,
            description_format: "HTML".to_string(),
            project_id,
            timeline_template_id,
            created: listing.created_at,
            created_by,
            updated: listing.updated_at,
            updated_by,
            start_date,
            end_date,
            registration_start_date: registration.and_then(Phase::effective_start),
            registration_end_date: registration.and_then(Phase::effective_end),
            submission_start_date: submission.and_then(Phase::effective_start),
            submission_end_date: submission.and_then(Phase::effective_end),
            current_phase_names,
            num_of_submissions: listing.number_of_submissions,
            num_of_registrants: listing.number_of_registrants,
            phases,
            prize_sets: build_prize_sets(listing),
            tags: merge_tags(listing, &category.tags),
            groups,
            winners: build_winners(&listing.winners),
            metadata: build_metadata(listing)?,
            terms,
            events: dedupe_events(legacy_id, &listing.events),
        })
    }

    async fn resolve_project(&self, legacy_id: i64, project_id: Option<i64>) -> Option<i64> {
        let Some(project_id) = project_id else {
            log::warn!("Challenge {legacy_id} has no direct project id");
            return None;
        };
        match self
            .ports
            .projects
            .lookup_by_legacy_project_id(project_id)
            .await
        {
            Ok(Some(project)) => Some(project.id),
            Ok(None) => {
                log::warn!("Project {project_id} of challenge {legacy_id} not found");
                None
            }
            Err(err) => {
                log::warn!("Project {project_id} of challenge {legacy_id} could not be resolved: {err}");
                None
            }
        }
    }

    async fn resolve_terms(
        &self,
        legacy_id: i64,
        detail: &LegacyChallengeDetail,
    ) -> Result<Vec<ChallengeTerm>, MigrationError> {
        let catalog = self.resolver.fetch_all_terms().await?;
        let mut terms = Vec::with_capacity(detail.terms.len());
        for term_ref in &detail.terms {
            let term = catalog
                .iter()
                .find(|t| t.legacy_id == Some(term_ref.terms_of_use_id))
                .ok_or_else(|| {
                    MigrationError::Validation(format!(
                        "Term {} not found for legacy id {legacy_id}",
                        term_ref.terms_of_use_id
                    ))
                })?;
            match self.ports.roles.role_id_by_name(&term_ref.role).await {
                Ok(Some(role_id)) => terms.push(ChallengeTerm {
                    id: term.id.clone(),
                    role_id,
                }),
                Ok(None) => {
                    log::warn!(
                        "Resource role '{}' not found, term {} not linked to challenge {legacy_id}",
                        term_ref.role,
                        term.id
                    );
                }
                Err(err) => {
                    log::warn!(
                        "Resource role '{}' could not be resolved ({err}), term {} not linked to challenge {legacy_id}",
                        term_ref.role,
                        term.id
                    );
                }
            }
        }
        Ok(terms)
    }
}

/// Introduction, requirements and submission guidelines joined as HTML. Blank introduction and
/// guidelines are left out.
pub fn compose_description(detail: &LegacyChallengeDetail) -> String {
    let mut description = detail.detail_requirements.clone().unwrap_or_default();
    if let Some(intro) = non_blank(&detail.introduction) {
        description = format!("{intro}<br />{description}");
    }
    if let Some(guidelines) = non_blank(&detail.final_submission_guidelines) {
        description.push_str(GUIDELINES_HEADING);
        description.push_str(guidelines);
    }
    description
}

fn non_blank(value: &Option<String>) -> Option<&str> {
    value.as_deref().filter(|v| !v.trim().is_empty())
}

/// Converts legacy phases, ordered by scheduled start. Phases with no scheduled start go last.
pub fn build_phases(phases: &[LegacyPhase], config: &MigratorConfig) -> Vec<Phase> {
    let mut built: Vec<Phase> = phases
        .iter()
        .map(|phase| Phase {
            id: Uuid::new_v4(),
            name: phase.phase_type.clone(),
            phase_id: config.phase_id(&phase.phase_type),
            duration: phase.duration / 1000,
            scheduled_start_date: phase.scheduled_start_time,
            scheduled_end_date: phase.scheduled_end_time,
            actual_start_date: phase.actual_start_time,
            actual_end_date: phase.actual_end_time,
            is_open: phase.status == OPEN_PHASE_STATUS,
        })
        .collect();
    built.sort_by_key(|p| (p.scheduled_start_date.is_none(), p.scheduled_start_date));
    built
}

fn find_phase<'p>(phases: &'p [Phase], name: &str) -> Option<&'p Phase> {
    phases.iter().find(|p| p.name == name)
}

/// Task block: assigned when there is at least one submitter, with a member id only when
/// there is exactly one.
pub fn task_info(listing: &LegacyChallengeListing) -> TaskInfo {
    TaskInfo {
        is_task: listing.is_task,
        is_assigned: !listing.submitter_ids.is_empty(),
        member_id: match listing.submitter_ids.as_slice() {
            [only] => only.to_string(),
            _ => String::new(),
        },
    }
}

/// Placement prizes, plus checkpoint prizes when the listing has any.
pub fn build_prize_sets(listing: &LegacyChallengeListing) -> Vec<PrizeSet> {
    let mut sets = vec![PrizeSet {
        set_type: PrizeSetType::Placement,
        description: "Challenge Prizes".to_string(),
        prizes: listing.prize.iter().copied().map(Prize::usd).collect(),
    }];
    if listing.number_of_checkpoint_prizes > 0 {
        let value = listing.top_check_point_prize.unwrap_or_default();
        sets.push(PrizeSet {
            set_type: PrizeSetType::Checkpoint,
            description: "Checkpoint Prizes".to_string(),
            prizes: (0..listing.number_of_checkpoint_prizes)
                .map(|_| Prize::usd(value))
                .collect(),
        });
    }
    sets
}

/// Technologies, platforms and translation tags, without blanks or duplicates. First
/// occurrence order is kept.
pub fn merge_tags(listing: &LegacyChallengeListing, translation_tags: &[String]) -> Vec<String> {
    let candidates = listing
        .technologies
        .iter()
        .chain(listing.platforms.iter())
        .flatten()
        .chain(translation_tags.iter());

    let mut seen = HashSet::new();
    let mut tags = Vec::new();
    for tag in candidates {
        if tag.trim().is_empty() || !seen.insert(tag.as_str()) {
            continue;
        }
        tags.push(tag.clone());
    }
    tags
}

/// Submitter/rank pairs as handle/placement, order preserved.
pub fn build_winners(winners: &[LegacyWinner]) -> Vec<Winner> {
    winners
        .iter()
        .map(|w| Winner {
            handle: w.submitter.clone(),
            placement: w.rank,
        })
        .collect()
}

/// File types plus the allow-listed scalar fields that are set.
pub fn build_metadata(listing: &LegacyChallengeListing) -> Result<Vec<Metadata>, MigrationError> {
    let mut metadata = Vec::new();
    if !listing.file_types.is_empty() {
        let descriptions: Vec<&str> = listing
            .file_types
            .iter()
            .map(|f| f.description.as_str())
            .collect();
        metadata.push(Metadata {
            name: "fileTypes".to_string(),
            value: serde_json::to_string(&descriptions).map_err(MigrationError::transient)?,
        });
    }

    let scalars = [
        ("allowStockArt", listing.allow_stock_art.filter(|v| *v).map(|v| v.to_string())),
        ("drPoints", listing.dr_points.filter(|v| *v != 0.0).map(|v| v.to_string())),
        (
            "submissionViewable",
            listing.submission_viewable.filter(|v| *v).map(|v| v.to_string()),
        ),
        (
            "submissionLimit",
            listing.submission_limit.filter(|v| *v != 0).map(|v| v.to_string()),
        ),
        ("codeRepo", listing.code_repo.clone().filter(|v| !v.is_empty())),
        ("environment", listing.environment.clone().filter(|v| !v.is_empty())),
    ];
    metadata.extend(scalars.into_iter().filter_map(|(name, value)| {
        value.map(|value| Metadata {
            name: name.to_string(),
            value,
        })
    }));
    Ok(metadata)
}

/// Events deduplicated by id; the first occurrence wins.
pub fn dedupe_events(legacy_id: i64, events: &[LegacyEvent]) -> Vec<ChallengeEvent> {
    let mut seen = HashSet::new();
    let mut deduped = Vec::with_capacity(events.len());
    for event in events {
        if !seen.insert(event.id) {
            log::debug!("Duplicate event {} on challenge {legacy_id}", event.id);
            continue;
        }
        deduped.push(ChallengeEvent {
            id: event.id,
            name: event.event_description.clone(),
            key: event.event_short_desc.clone(),
        });
    }
    deduped
}
