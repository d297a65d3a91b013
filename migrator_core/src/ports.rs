//! Outbound ports: the external collaborators the migrator reads from and writes to.
//!
//! Every port returns [`BoxError`] on failure; callers in this crate treat those as
//! transient.

use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::challenge::CanonicalChallenge;
use crate::error::BoxError;
use crate::legacy::{AuditInfo, LegacyChallengeDetail, LegacyChallengeListing};

/// Restricts which legacy ids a full run enumerates.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct LegacyIdFilter {
    /// Only ids updated at or after this instant
    pub updated_since: Option<DateTime<Utc>>,
    /// Only ids updated at or before this instant
    pub updated_until: Option<DateTime<Utc>>,
    /// Only ids whose legacy status matches
    pub status: Option<String>,
}

/// One page of legacy ids.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct IdPage {
    /// Total number of ids matching the filter
    pub total: u64,
    /// The ids on this page
    pub ids: Vec<i64>,
}

/// Reads challenges from the legacy search index and detail store.
#[async_trait]
pub trait LegacySourceReader: Send + Sync {
    /// Lists legacy ids matching `filter`, most recently updated first. `page` is 1-based.
    async fn list_ids(
        &self,
        filter: &LegacyIdFilter,
        page: u32,
        per_page: u32,
    ) -> Result<IdPage, BoxError>;
    /// Fetches the listing entry of a challenge.
    async fn get_listing(&self, legacy_id: i64) -> Result<Option<LegacyChallengeListing>, BoxError>;
    /// Fetches the detail record of a challenge.
    async fn get_detail(&self, legacy_id: i64) -> Result<Option<LegacyChallengeDetail>, BoxError>;
    /// Current last-modified timestamp of a challenge in the legacy system.
    async fn get_last_modified(&self, legacy_id: i64) -> Result<Option<DateTime<Utc>>, BoxError>;
}

/// Reads audit fields from the legacy relational store.
#[async_trait]
pub trait LegacyAuditReader: Send + Sync {
    /// Who created and last updated the challenge.
    async fn get_audit_info(&self, legacy_id: i64) -> Result<Option<AuditInfo>, BoxError>;
}

/// The canonical challenge store.
#[async_trait]
pub trait CanonicalStore: Send + Sync {
    /// Creates a record and returns its newly assigned id.
    async fn create(&self, record: &CanonicalChallenge) -> Result<Uuid, BoxError>;
    /// Overwrites the record with the given id.
    async fn update(&self, id: Uuid, record: &CanonicalChallenge) -> Result<(), BoxError>;
    /// Deletes a record.
    async fn delete(&self, id: Uuid) -> Result<(), BoxError>;
    /// Finds the record migrated from a legacy id.
    async fn find_by_legacy_id(&self, legacy_id: i64)
    -> Result<Option<CanonicalChallenge>, BoxError>;
    /// Finds every record migrated from any of the given legacy ids.
    async fn find_all_by_legacy_ids(
        &self,
        legacy_ids: &[i64],
    ) -> Result<Vec<CanonicalChallenge>, BoxError>;

    /// Creates the record when it has no id yet, updates it otherwise. Returns the id.
    async fn save(&self, record: &CanonicalChallenge) -> Result<Uuid, BoxError> {
        match record.id {
            Some(id) => {
                self.update(id, record).await?;
                Ok(id)
            }
            None => self.create(record).await,
        }
    }
}

/// Resolves legacy group ids.
#[async_trait]
pub trait GroupDirectory: Send + Sync {
    /// Canonical id of the group with the given legacy id.
    async fn lookup_by_legacy_id(&self, legacy_id: i64) -> Result<Option<String>, BoxError>;
}

/// A canonical terms-of-use document.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Term {
    /// Canonical id
    pub id: String,
    /// Legacy terms-of-use id, when the term was migrated
    pub legacy_id: Option<i64>,
    /// Title
    pub title: String,
}

/// One page of the terms catalog.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TermsPage {
    /// Terms on this page
    pub items: Vec<Term>,
    /// Total number of pages, when the catalog reports it
    pub total_pages: Option<u32>,
}

/// The canonical terms catalog.
#[async_trait]
pub trait TermsCatalog: Send + Sync {
    /// Fetches one page. `page` is 1-based.
    async fn list_page(&self, page: u32, per_page: u32) -> Result<TermsPage, BoxError>;
}

/// A canonical project.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Project {
    /// Canonical project id
    pub id: i64,
    /// Name
    pub name: String,
}

/// Resolves legacy project ids.
#[async_trait]
pub trait ProjectDirectory: Send + Sync {
    /// Project linked to the given legacy (direct) project id.
    async fn lookup_by_legacy_project_id(
        &self,
        legacy_project_id: i64,
    ) -> Result<Option<Project>, BoxError>;
}

/// Resolves the timeline template of a canonical track/type pair.
#[async_trait]
pub trait TimelineTemplateCatalog: Send + Sync {
    /// Template id for the pair.
    async fn lookup(&self, track_id: Uuid, type_id: Uuid) -> Result<Option<Uuid>, BoxError>;
}

/// Migrates the resources (role/member assignments) of a challenge.
#[async_trait]
pub trait ResourceMigrator: Send + Sync {
    /// Migrates every resource of the legacy challenge onto the canonical one. Returns the
    /// number of resources migrated.
    async fn migrate_for_challenge(
        &self,
        legacy_id: i64,
        challenge_id: Uuid,
    ) -> Result<u32, BoxError>;
}

/// Resolves resource role names.
#[async_trait]
pub trait ResourceRoleDirectory: Send + Sync {
    /// Canonical id of the role with the given name.
    async fn role_id_by_name(&self, name: &str) -> Result<Option<String>, BoxError>;
}

/// Every collaborator the migrator needs, shared across tasks.
#[derive(Clone)]
pub struct Collaborators {
    /// Legacy listing/detail reader
    pub legacy: Arc<dyn LegacySourceReader>,
    /// Legacy audit reader
    pub audit: Arc<dyn LegacyAuditReader>,
    /// Canonical challenge store
    pub store: Arc<dyn CanonicalStore>,
    /// Group directory
    pub groups: Arc<dyn GroupDirectory>,
    /// Terms catalog
    pub terms: Arc<dyn TermsCatalog>,
    /// Project directory
    pub projects: Arc<dyn ProjectDirectory>,
    /// Timeline template catalog
    pub timelines: Arc<dyn TimelineTemplateCatalog>,
    /// Resource migrator
    pub resources: Arc<dyn ResourceMigrator>,
    /// Resource role directory
    pub roles: Arc<dyn ResourceRoleDirectory>,
}
