//! Configuration for the migration orchestrator and builder.

use std::collections::HashMap;

use uuid::Uuid;

use crate::ports::LegacyIdFilter;

/// Configuration for a migrator instance.
///
/// Every field has a sensible default; deployments usually only supply
/// `phase_name_mappings` and, for partial runs, `legacy_id_filter`.
#[derive(Debug, Clone)]
pub struct MigratorConfig {
    /// Page size used when walking the terms catalog.
    pub terms_page_size: u32,

    /// Page size used when enumerating legacy ids for a full run.
    pub legacy_ids_page_size: u32,

    /// Upper bound on the number of pages any paginated walk will request.
    ///
    /// Keeps a misbehaving collaborator (one that never returns an empty page
    /// nor a page count) from looping forever.
    ///
    /// Default: 10,000 pages
    pub max_pages: u32,

    /// Actor written to `createdBy`/`updatedBy` when the legacy audit row is missing.
    pub default_actor: String,

    /// Review type used when the legacy listing carries none.
    pub default_review_type: String,

    /// Phase name to canonical phase id.
    ///
    /// Phases whose name isn't present are migrated with no `phase_id`.
    pub phase_name_mappings: HashMap<String, Uuid>,

    /// Restricts the legacy ids enumerated by a full run.
    pub legacy_id_filter: LegacyIdFilter,

    /// Clear the group and terms caches at the start of every full run.
    pub reset_caches_per_run: bool,
}

impl Default for MigratorConfig {
    fn default() -> Self {
        Self {
            terms_page_size: 100,
            legacy_ids_page_size: 100,
            max_pages: 10_000,
            default_actor: "v5migration".to_string(),
            default_review_type: "COMMUNITY".to_string(),
            phase_name_mappings: HashMap::new(),
            legacy_id_filter: LegacyIdFilter::default(),
            reset_caches_per_run: true,
        }
    }
}

impl MigratorConfig {
    /// Canonical phase id for a legacy phase name, if one is configured.
    pub fn phase_id(&self, name: &str) -> Option<Uuid> {
        self.phase_name_mappings.get(name).copied()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config_values() {
        let config = MigratorConfig::default();
        assert_eq!(config.terms_page_size, 100);
        assert_eq!(config.legacy_ids_page_size, 100);
        assert_eq!(config.max_pages, 10_000);
        assert_eq!(config.default_actor, "v5migration");
        assert_eq!(config.default_review_type, "COMMUNITY");
        assert!(config.phase_name_mappings.is_empty());
        assert!(config.reset_caches_per_run);
    }

    #[test]
    fn custom_config() {
        let registration = Uuid::new_v4();
        let config = MigratorConfig {
            terms_page_size: 10,
            phase_name_mappings: HashMap::from([("Registration".to_string(), registration)]),
            ..Default::default()
        };
        assert_eq!(config.terms_page_size, 10);
        assert_eq!(config.legacy_ids_page_size, 100);
        assert_eq!(config.phase_id("Registration"), Some(registration));
        assert_eq!(config.phase_id("Submission"), None);
    }
}
