//! Bounded, sequential walks over paginated collaborators.

use futures_core::Stream;

use crate::error::MigrationError;
use crate::ports::{LegacyIdFilter, LegacySourceReader};

/// Cursor over 1-based pages.
///
/// The walk ends at the first empty page, once the reported page count is exceeded, or after
/// `max_pages` pages, whichever comes first.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PageCursor {
    next: u32,
    max_pages: u32,
    finished: bool,
}

impl PageCursor {
    /// A cursor positioned on page 1.
    pub fn new(max_pages: u32) -> Self {
        Self {
            next: 1,
            max_pages,
            finished: false,
        }
    }

    /// The page to request next, or `None` when the walk is over.
    pub fn next_page(&mut self) -> Option<u32> {
        if self.finished || self.next > self.max_pages {
            self.finished = true;
            return None;
        }
        Some(self.next)
    }

    /// Records the outcome of the page returned by [`PageCursor::next_page`].
    pub fn advance(&mut self, items: usize, total_pages: Option<u32>) {
        if items == 0 {
            self.finished = true;
            return;
        }
        self.next += 1;
        if let Some(total) = total_pages {
            if self.next > total {
                self.finished = true;
            }
        }
    }

    /// Whether the walk is over.
    pub fn is_finished(&self) -> bool {
        self.finished
    }
}

/// Streams every legacy id matching `filter`, one page at a time.
pub fn legacy_ids<'a>(
    reader: &'a dyn LegacySourceReader,
    filter: &'a LegacyIdFilter,
    per_page: u32,
    max_pages: u32,
) -> impl Stream<Item = Result<i64, MigrationError>> + Send + 'a {
    let per_page = per_page.max(1);
    async_stream::try_stream! {
        let mut cursor = PageCursor::new(max_pages);
        while let Some(page) = cursor.next_page() {
            let result = reader
                .list_ids(filter, page, per_page)
                .await
                .map_err(MigrationError::from)?;
            let total_pages = result.total.div_ceil(u64::from(per_page));
            let total_pages = u32::try_from(total_pages).unwrap_or(u32::MAX);
            log::debug!(
                "Listed {} legacy ids on page {}/{}",
                result.ids.len(),
                page,
                total_pages
            );
            cursor.advance(result.ids.len(), Some(total_pages));
            for id in result.ids {
                yield id;
            }
        }
    }
}
