//! Ordered set of pages with a single active selection.

use tracing::debug;

use crate::history::DEFAULT_HISTORY_CAPACITY;
use crate::page::{Page, PageId, PageImage};
use crate::store::PersistedHistoryRecord;

/// Pages in upload order plus the id of the page being edited.
///
/// Invariant: `active` is `None` exactly when `pages` is empty, and
/// otherwise names a page in `pages`.
#[derive(Debug)]
pub struct PageCollection {
    pages: Vec<Page>,
    active: Option<PageId>,
    history_capacity: usize,
}

impl Default for PageCollection {
    fn default() -> Self {
        Self::new()
    }
}

impl PageCollection {
    pub const fn new() -> Self {
        Self::with_history_capacity(DEFAULT_HISTORY_CAPACITY)
    }

    /// Collection whose pages keep at most `capacity` history snapshots.
    pub const fn with_history_capacity(capacity: usize) -> Self {
        Self {
            pages: Vec::new(),
            active: None,
            history_capacity: capacity,
        }
    }

    /// Append a new analyzing page and make it active.
    pub fn add_page(&mut self, image: PageImage, file_name: impl Into<String>) -> &mut Page {
        let page = Page::with_history_capacity(
            PageId::generate(),
            image,
            file_name,
            self.history_capacity,
        );
        debug!("Added page {} ({})", page.id(), page.source_file_name());
        self.push_active(page)
    }

    /// Append a page rebuilt from persisted history and make it active.
    pub fn restore_page(&mut self, record: &PersistedHistoryRecord) -> &mut Page {
        let page = Page::restored(
            PageId::restored(),
            record.file_name.clone(),
            record.translations.clone(),
            self.history_capacity,
        );
        debug!("Restored page {} from record {}", page.id(), record.id);
        self.push_active(page)
    }

    /// Make `id` the active page. Unknown ids are ignored.
    pub fn select_page(&mut self, id: &PageId) -> bool {
        if self.contains(id) {
            self.active = Some(id.clone());
            true
        } else {
            false
        }
    }

    /// Remove a page and drop its image.
    ///
    /// If it was active, the new last page becomes active (or none if empty).
    pub fn delete_page(&mut self, id: &PageId) -> Option<Page> {
        let index = self.pages.iter().position(|p| p.id() == id)?;
        let mut page = self.pages.remove(index);
        page.release_image();

        if self.active.as_ref() == Some(id) || self.pages.is_empty() {
            self.active = self.pages.last().map(|p| p.id().clone());
        }

        debug!(
            "Deleted page {}, active is now {:?}",
            id,
            self.active.as_ref().map(PageId::as_str)
        );
        Some(page)
    }

    pub fn get(&self, id: &PageId) -> Option<&Page> {
        self.pages.iter().find(|p| p.id() == id)
    }

    pub fn get_mut(&mut self, id: &PageId) -> Option<&mut Page> {
        self.pages.iter_mut().find(|p| p.id() == id)
    }

    pub fn contains(&self, id: &PageId) -> bool {
        self.get(id).is_some()
    }

    pub const fn active_id(&self) -> Option<&PageId> {
        self.active.as_ref()
    }

    pub fn active(&self) -> Option<&Page> {
        self.active.as_ref().and_then(|id| self.get(id))
    }

    pub fn active_mut(&mut self) -> Option<&mut Page> {
        let id = self.active.clone()?;
        self.get_mut(&id)
    }

    /// 1-based position of a page, for display.
    pub fn position(&self, id: &PageId) -> Option<usize> {
        self.pages.iter().position(|p| p.id() == id).map(|i| i + 1)
    }

    /// Page at a 1-based position.
    pub fn at_position(&self, position: usize) -> Option<&Page> {
        position.checked_sub(1).and_then(|i| self.pages.get(i))
    }

    pub fn iter(&self) -> impl Iterator<Item = &Page> {
        self.pages.iter()
    }

    pub const fn len(&self) -> usize {
        self.pages.len()
    }

    pub const fn is_empty(&self) -> bool {
        self.pages.is_empty()
    }

    fn push_active(&mut self, page: Page) -> &mut Page {
        self.active = Some(page.id().clone());
        self.pages.push(page);
        let last = self.pages.len() - 1;
        &mut self.pages[last]
    }
}
