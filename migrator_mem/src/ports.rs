use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use tokio::sync::Mutex;
use uuid::Uuid;

use migrator_core::prelude::*;

/// Error returned by a collaborator told to fail.
#[derive(Debug, thiserror::Error)]
#[error("Injected failure: {0}")]
pub struct InjectedFailure(pub String);

#[derive(Debug, Default)]
struct LegacyData {
    listings: HashMap<i64, LegacyChallengeListing>,
    details: HashMap<i64, LegacyChallengeDetail>,
    audits: HashMap<i64, AuditInfo>,
    last_modified: HashMap<i64, DateTime<Utc>>,
    unreadable: HashSet<i64>,
}

/// An in-memory legacy system serving listings, detail records and audit rows.
#[derive(Clone, Debug, Default)]
pub struct InMemoryLegacySource {
    data: Arc<Mutex<LegacyData>>,
}

impl InMemoryLegacySource {
    /// Creates an empty legacy system.
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds or replaces a challenge. The listing id is the legacy id.
    pub async fn insert(
        &self,
        listing: LegacyChallengeListing,
        detail: Option<LegacyChallengeDetail>,
        audit: Option<AuditInfo>,
    ) {
        let mut data = self.data.lock().await;
        let legacy_id = listing.id;
        match detail {
            Some(detail) => data.details.insert(legacy_id, detail),
            None => data.details.remove(&legacy_id),
        };
        match audit {
            Some(audit) => data.audits.insert(legacy_id, audit),
            None => data.audits.remove(&legacy_id),
        };
        data.listings.insert(legacy_id, listing);
    }

    /// Moves the last-modified timestamp of a challenge, as an edit in the legacy system would.
    pub async fn touch(&self, legacy_id: i64, at: DateTime<Utc>) {
        let mut data = self.data.lock().await;
        if let Some(listing) = data.listings.get_mut(&legacy_id) {
            listing.updated_at = Some(at);
        }
        data.last_modified.insert(legacy_id, at);
    }

    /// Makes every later last-modified read of `legacy_id` fail.
    pub async fn fail_reads_for(&self, legacy_id: i64) {
        self.data.lock().await.unreadable.insert(legacy_id);
    }
}

fn matches_filter(listing: &LegacyChallengeListing, filter: &LegacyIdFilter) -> bool {
    let updated = listing.updated_at;
    filter
        .updated_since
        .is_none_or(|since| updated.is_some_and(|u| u >= since))
        && filter
            .updated_until
            .is_none_or(|until| updated.is_some_and(|u| u <= until))
        && filter
            .status
            .as_ref()
            .is_none_or(|status| &listing.status == status)
}

#[async_trait]
impl LegacySourceReader for InMemoryLegacySource {
    async fn list_ids(
        &self,
        filter: &LegacyIdFilter,
        page: u32,
        per_page: u32,
    ) -> Result<IdPage, BoxError> {
        let data = self.data.lock().await;
        let mut matching: Vec<&LegacyChallengeListing> = data
            .listings
            .values()
            .filter(|l| matches_filter(l, filter))
            .collect();
        matching.sort_by(|a, b| b.updated_at.cmp(&a.updated_at).then(b.id.cmp(&a.id)));

        let skip = page.saturating_sub(1) as usize * per_page as usize;
        Ok(IdPage {
            total: matching.len() as u64,
            ids: matching
                .into_iter()
                .skip(skip)
                .take(per_page as usize)
                .map(|l| l.id)
                .collect(),
        })
    }

    async fn get_listing(&self, legacy_id: i64) -> Result<Option<LegacyChallengeListing>, BoxError> {
        Ok(self.data.lock().await.listings.get(&legacy_id).cloned())
    }

    async fn get_detail(&self, legacy_id: i64) -> Result<Option<LegacyChallengeDetail>, BoxError> {
        Ok(self.data.lock().await.details.get(&legacy_id).cloned())
    }

    async fn get_last_modified(&self, legacy_id: i64) -> Result<Option<DateTime<Utc>>, BoxError> {
        let data = self.data.lock().await;
        if data.unreadable.contains(&legacy_id) {
            return Err(Box::new(InjectedFailure(format!(
                "last-modified read of challenge {legacy_id}"
            ))));
        }
        Ok(data
            .last_modified
            .get(&legacy_id)
            .copied()
            .or_else(|| data.listings.get(&legacy_id).and_then(|l| l.updated_at)))
    }
}

#[async_trait]
impl LegacyAuditReader for InMemoryLegacySource {
    async fn get_audit_info(&self, legacy_id: i64) -> Result<Option<AuditInfo>, BoxError> {
        Ok(self.data.lock().await.audits.get(&legacy_id).cloned())
    }
}

/// An in-memory canonical store.
#[derive(Clone, Debug, Default)]
pub struct InMemoryCanonicalStore {
    records: Arc<Mutex<HashMap<Uuid, CanonicalChallenge>>>,
    failing_legacy_ids: Arc<Mutex<HashSet<i64>>>,
    creates: Arc<AtomicUsize>,
    updates: Arc<AtomicUsize>,
}

impl InMemoryCanonicalStore {
    /// Creates an empty store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Makes every write of the given legacy id fail.
    pub async fn fail_writes_for(&self, legacy_id: i64) {
        self.failing_legacy_ids.lock().await.insert(legacy_id);
    }

    /// Number of records created so far.
    pub fn creates(&self) -> usize {
        self.creates.load(Ordering::SeqCst)
    }

    /// Number of records updated so far.
    pub fn updates(&self) -> usize {
        self.updates.load(Ordering::SeqCst)
    }

    /// Every stored record.
    pub async fn records(&self) -> Vec<CanonicalChallenge> {
        self.records.lock().await.values().cloned().collect()
    }

    async fn check_writable(&self, legacy_id: i64) -> Result<(), BoxError> {
        if self.failing_legacy_ids.lock().await.contains(&legacy_id) {
            return Err(Box::new(InjectedFailure(format!(
                "write of challenge {legacy_id} rejected"
            ))));
        }
        Ok(())
    }
}

#[async_trait]
impl CanonicalStore for InMemoryCanonicalStore {
    async fn create(&self, record: &CanonicalChallenge) -> Result<Uuid, BoxError> {
        self.check_writable(record.legacy_id).await?;
        let id = Uuid::new_v4();
        let mut stored = record.clone();
        stored.id = Some(id);
        self.records.lock().await.insert(id, stored);
        self.creates.fetch_add(1, Ordering::SeqCst);
        Ok(id)
    }

    async fn update(&self, id: Uuid, record: &CanonicalChallenge) -> Result<(), BoxError> {
        self.check_writable(record.legacy_id).await?;
        let mut records = self.records.lock().await;
        let Some(existing) = records.get_mut(&id) else {
            return Err(Box::new(InjectedFailure(format!("challenge {id} does not exist"))));
        };
        let legacy_id = existing.legacy_id;
        *existing = record.clone();
        existing.id = Some(id);
        existing.legacy_id = legacy_id;
        self.updates.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }

    async fn delete(&self, id: Uuid) -> Result<(), BoxError> {
        self.records.lock().await.remove(&id);
        Ok(())
    }

    async fn find_by_legacy_id(
        &self,
        legacy_id: i64,
    ) -> Result<Option<CanonicalChallenge>, BoxError> {
        Ok(self
            .records
            .lock()
            .await
            .values()
            .find(|r| r.legacy_id == legacy_id)
            .cloned())
    }

    async fn find_all_by_legacy_ids(
        &self,
        legacy_ids: &[i64],
    ) -> Result<Vec<CanonicalChallenge>, BoxError> {
        Ok(self
            .records
            .lock()
            .await
            .values()
            .filter(|r| legacy_ids.contains(&r.legacy_id))
            .cloned()
            .collect())
    }
}

/// An in-memory group directory counting its lookups.
#[derive(Clone, Debug, Default)]
pub struct InMemoryGroupDirectory {
    groups: Arc<Mutex<HashMap<i64, String>>>,
    lookups: Arc<AtomicUsize>,
}

impl InMemoryGroupDirectory {
    /// Creates a directory knowing the given `(legacy id, canonical id)` pairs.
    pub fn new(groups: impl IntoIterator<Item = (i64, String)>) -> Self {
        Self {
            groups: Arc::new(Mutex::new(groups.into_iter().collect())),
            lookups: Arc::default(),
        }
    }

    /// Number of lookups served so far.
    pub fn lookups(&self) -> usize {
        self.lookups.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl GroupDirectory for InMemoryGroupDirectory {
    async fn lookup_by_legacy_id(&self, legacy_id: i64) -> Result<Option<String>, BoxError> {
        self.lookups.fetch_add(1, Ordering::SeqCst);
        Ok(self.groups.lock().await.get(&legacy_id).cloned())
    }
}

/// An in-memory, paginated terms catalog.
#[derive(Clone, Debug, Default)]
pub struct InMemoryTermsCatalog {
    terms: Arc<Vec<Term>>,
    report_total_pages: bool,
    pages_served: Arc<AtomicUsize>,
}

impl InMemoryTermsCatalog {
    /// Creates a catalog that reports its page count.
    pub fn new(terms: Vec<Term>) -> Self {
        Self {
            terms: Arc::new(terms),
            report_total_pages: true,
            pages_served: Arc::default(),
        }
    }

    /// Stops reporting the page count; callers must detect the end by an empty page.
    pub fn without_total_pages(mut self) -> Self {
        self.report_total_pages = false;
        self
    }

    /// Number of pages served so far.
    pub fn pages_served(&self) -> usize {
        self.pages_served.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl TermsCatalog for InMemoryTermsCatalog {
    async fn list_page(&self, page: u32, per_page: u32) -> Result<TermsPage, BoxError> {
        self.pages_served.fetch_add(1, Ordering::SeqCst);
        let per_page = per_page.max(1) as usize;
        let skip = page.saturating_sub(1) as usize * per_page;
        let total_pages = self.terms.len().div_ceil(per_page);
        Ok(TermsPage {
            items: self.terms.iter().skip(skip).take(per_page).cloned().collect(),
            total_pages: self
                .report_total_pages
                .then(|| u32::try_from(total_pages).unwrap_or(u32::MAX)),
        })
    }
}

/// A fixed project directory.
#[derive(Clone, Debug, Default)]
pub struct StaticProjectDirectory {
    projects: Arc<HashMap<i64, Project>>,
    unavailable: bool,
}

impl StaticProjectDirectory {
    /// Creates a directory mapping legacy project ids to projects.
    pub fn new(projects: impl IntoIterator<Item = (i64, Project)>) -> Self {
        Self {
            projects: Arc::new(projects.into_iter().collect()),
            unavailable: false,
        }
    }

    /// A directory whose every lookup fails.
    pub fn unavailable() -> Self {
        Self {
            projects: Arc::default(),
            unavailable: true,
        }
    }
}

#[async_trait]
impl ProjectDirectory for StaticProjectDirectory {
    async fn lookup_by_legacy_project_id(
        &self,
        legacy_project_id: i64,
    ) -> Result<Option<Project>, BoxError> {
        if self.unavailable {
            return Err(Box::new(InjectedFailure("project directory unavailable".into())));
        }
        Ok(self.projects.get(&legacy_project_id).cloned())
    }
}

/// A fixed timeline template catalog.
#[derive(Clone, Debug, Default)]
pub struct StaticTimelineTemplateCatalog {
    templates: Arc<HashMap<(Uuid, Uuid), Uuid>>,
    fallback: Option<Uuid>,
}

impl StaticTimelineTemplateCatalog {
    /// Creates a catalog keyed by `(track id, type id)`.
    pub fn new(templates: impl IntoIterator<Item = ((Uuid, Uuid), Uuid)>) -> Self {
        Self {
            templates: Arc::new(templates.into_iter().collect()),
            fallback: None,
        }
    }

    /// A catalog answering `template` for every pair.
    pub fn with_fallback(template: Uuid) -> Self {
        Self {
            templates: Arc::default(),
            fallback: Some(template),
        }
    }
}

#[async_trait]
impl TimelineTemplateCatalog for StaticTimelineTemplateCatalog {
    async fn lookup(&self, track_id: Uuid, type_id: Uuid) -> Result<Option<Uuid>, BoxError> {
        Ok(self
            .templates
            .get(&(track_id, type_id))
            .copied()
            .or(self.fallback))
    }
}

/// A resource migrator recording the challenges it was called for.
#[derive(Clone, Debug, Default)]
pub struct InMemoryResourceMigrator {
    calls: Arc<Mutex<Vec<(i64, Uuid)>>>,
    resources_per_challenge: u32,
}

impl InMemoryResourceMigrator {
    /// Creates a migrator reporting `resources_per_challenge` resources on each call.
    pub fn new(resources_per_challenge: u32) -> Self {
        Self {
            calls: Arc::default(),
            resources_per_challenge,
        }
    }

    /// Every `(legacy id, canonical id)` pair migrated so far.
    pub async fn calls(&self) -> Vec<(i64, Uuid)> {
        self.calls.lock().await.clone()
    }
}

#[async_trait]
impl ResourceMigrator for InMemoryResourceMigrator {
    async fn migrate_for_challenge(
        &self,
        legacy_id: i64,
        challenge_id: Uuid,
    ) -> Result<u32, BoxError> {
        self.calls.lock().await.push((legacy_id, challenge_id));
        Ok(self.resources_per_challenge)
    }
}

/// A fixed resource role directory.
#[derive(Clone, Debug, Default)]
pub struct StaticRoleDirectory {
    roles: Arc<HashMap<String, String>>,
}

impl StaticRoleDirectory {
    /// Creates a directory mapping role names to ids.
    pub fn new(roles: impl IntoIterator<Item = (String, String)>) -> Self {
        Self {
            roles: Arc::new(roles.into_iter().collect()),
        }
    }
}

#[async_trait]
impl ResourceRoleDirectory for StaticRoleDirectory {
    async fn role_id_by_name(&self, name: &str) -> Result<Option<String>, BoxError> {
        Ok(self.roles.get(name).cloned())
    }
}

/// Every in-memory collaborator, kept concrete so tests can inspect them.
#[derive(Clone, Debug, Default)]
pub struct InMemoryPorts {
    /// Legacy system
    pub legacy: InMemoryLegacySource,
    /// Canonical store
    pub store: InMemoryCanonicalStore,
    /// Group directory
    pub groups: InMemoryGroupDirectory,
    /// Terms catalog
    pub terms: InMemoryTermsCatalog,
    /// Project directory
    pub projects: StaticProjectDirectory,
    /// Timeline template catalog
    pub timelines: StaticTimelineTemplateCatalog,
    /// Resource migrator
    pub resources: InMemoryResourceMigrator,
    /// Resource role directory
    pub roles: StaticRoleDirectory,
}

impl InMemoryPorts {
    /// Empty collaborators, with a timeline template for every track/type pair.
    pub fn new() -> Self {
        Self {
            timelines: StaticTimelineTemplateCatalog::with_fallback(Uuid::new_v4()),
            ..Default::default()
        }
    }

    /// Replaces the legacy system.
    pub fn with_legacy(mut self, legacy: InMemoryLegacySource) -> Self {
        self.legacy = legacy;
        self
    }

    /// Replaces the group directory.
    pub fn with_groups(mut self, groups: InMemoryGroupDirectory) -> Self {
        self.groups = groups;
        self
    }

    /// Replaces the terms catalog.
    pub fn with_terms(mut self, terms: InMemoryTermsCatalog) -> Self {
        self.terms = terms;
        self
    }

    /// Replaces the project directory.
    pub fn with_projects(mut self, projects: StaticProjectDirectory) -> Self {
        self.projects = projects;
        self
    }

    /// Replaces the timeline template catalog.
    pub fn with_timelines(mut self, timelines: StaticTimelineTemplateCatalog) -> Self {
        self.timelines = timelines;
        self
    }

    /// Replaces the role directory.
    pub fn with_roles(mut self, roles: StaticRoleDirectory) -> Self {
        self.roles = roles;
        self
    }

    /// The collaborators as the orchestrator consumes them. State is shared with `self`.
    pub fn collaborators(&self) -> Collaborators {
        Collaborators {
            legacy: Arc::new(self.legacy.clone()),
            audit: Arc::new(self.legacy.clone()),
            store: Arc::new(self.store.clone()),
            groups: Arc::new(self.groups.clone()),
            terms: Arc::new(self.terms.clone()),
            projects: Arc::new(self.projects.clone()),
            timelines: Arc::new(self.timelines.clone()),
            resources: Arc::new(self.resources.clone()),
            roles: Arc::new(self.roles.clone()),
        }
    }
}
