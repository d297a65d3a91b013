//! Memoized resolution of legacy group ids and the terms catalog.

use std::collections::HashMap;
use std::sync::Arc;

use tokio::sync::Mutex;

use crate::error::MigrationError;
use crate::pagination::PageCursor;
use crate::ports::{GroupDirectory, Term, TermsCatalog};

/// Resolves legacy group ids and loads the terms catalog, caching both.
///
/// The caches live as long as the resolver. The orchestrator owns one instance and clears it
/// with [`Resolver::reset`] at the start of each full run.
pub struct Resolver {
    groups: Arc<dyn GroupDirectory>,
    terms: Arc<dyn TermsCatalog>,
    terms_page_size: u32,
    max_pages: u32,
    group_cache: Mutex<HashMap<i64, String>>,
    terms_cache: Mutex<Option<Arc<Vec<Term>>>>,
}

impl Resolver {
    /// Creates a resolver with empty caches.
    pub fn new(
        groups: Arc<dyn GroupDirectory>,
        terms: Arc<dyn TermsCatalog>,
        terms_page_size: u32,
        max_pages: u32,
    ) -> Self {
        Self {
            groups,
            terms,
            terms_page_size: terms_page_size.max(1),
            max_pages,
            group_cache: Mutex::new(HashMap::new()),
            terms_cache: Mutex::new(None),
        }
    }

    /// Maps legacy group ids to canonical ids, keeping length and order.
    ///
    /// Misses are looked up one at a time. The whole resolution fails with
    /// [`MigrationError::NotFound`] on the first id the directory doesn't know.
    pub async fn resolve_groups(&self, legacy_ids: &[i64]) -> Result<Vec<String>, MigrationError> {
        // Held for the whole resolution so concurrent callers never look up the same id twice.
        let mut cache = self.group_cache.lock().await;
        let mut resolved = Vec::with_capacity(legacy_ids.len());
        for legacy_id in legacy_ids {
            if let Some(id) = cache.get(legacy_id) {
                resolved.push(id.clone());
                continue;
            }
            log::debug!("Looking up legacy group {legacy_id}");
            let found = self
                .groups
                .lookup_by_legacy_id(*legacy_id)
                .await
                .map_err(MigrationError::from)?;
            match found {
                Some(id) => {
                    cache.insert(*legacy_id, id.clone());
                    resolved.push(id);
                }
                None => {
                    return Err(MigrationError::NotFound(format!(
                        "Legacy group id {legacy_id} not found"
                    )));
                }
            }
        }
        Ok(resolved)
    }

    /// Every term in the catalog, in catalog order. Loaded at most once per cache lifetime.
    pub async fn fetch_all_terms(&self) -> Result<Arc<Vec<Term>>, MigrationError> {
        let mut cache = self.terms_cache.lock().await;
        if let Some(terms) = cache.as_ref() {
            return Ok(Arc::clone(terms));
        }

        let mut all = Vec::new();
        let mut cursor = PageCursor::new(self.max_pages);
        while let Some(page) = cursor.next_page() {
            let result = self
                .terms
                .list_page(page, self.terms_page_size)
                .await
                .map_err(MigrationError::from)?;
            cursor.advance(result.items.len(), result.total_pages);
            all.extend(result.items);
        }
        log::info!("Loaded {} terms from the terms catalog", all.len());

        let terms = Arc::new(all);
        *cache = Some(Arc::clone(&terms));
        Ok(terms)
    }

    /// Clears both caches.
    pub async fn reset(&self) {
        self.group_cache.lock().await.clear();
        *self.terms_cache.lock().await = None;
    }
}
