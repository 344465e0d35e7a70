use std::sync::Arc;
use tracing::{debug, info};

use crate::collection::PageCollection;
use crate::error::Result;
use crate::page::PageId;
use crate::settings::Genre;
use crate::store::{HistoryStore, PersistedHistoryRecord};

/// A page brought back from persisted history.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RestoredPage {
    pub page_id: PageId,
    /// Genre the page was saved with; the editor adopts it
    pub genre: Genre,
}

/// Rebuilds pages from persisted history records.
pub struct RestorePath {
    history: Arc<HistoryStore>,
}

impl RestorePath {
    pub const fn new(history: Arc<HistoryStore>) -> Self {
        Self { history }
    }

    /// Saved records, newest first.
    pub fn list(&self) -> Vec<PersistedHistoryRecord> {
        self.history.list()
    }

    pub fn find(&self, id: &str) -> Option<PersistedHistoryRecord> {
        self.history.find(id)
    }

    /// Delete a record from durable history. Open pages are not affected.
    pub fn remove(&self, id: &str) -> Result<bool> {
        let removed = self.history.remove(id)?;
        if removed {
            debug!("Removed history record {}", id);
        }
        Ok(removed)
    }

    /// Add the record `id` to the collection as a new, active page.
    ///
    /// The page gets a fresh id; the record itself is left in history.
    pub fn restore(&self, collection: &mut PageCollection, id: &str) -> Option<RestoredPage> {
        let record = self.history.find(id)?;
        let page = collection.restore_page(&record);
        info!(
            "Restored {} ({} items) as page {}",
            record.file_name,
            record.translations.len(),
            page.id()
        );

        Some(RestoredPage {
            page_id: page.id().clone(),
            genre: record.genre,
        })
    }

    pub fn history(&self) -> &HistoryStore {
        &self.history
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{ToneType, TranslationItem, TranslationType};
    use crate::page::PageImage;
    use crate::store::MemoryStore;

    fn restore_path() -> RestorePath {
        let history = HistoryStore::new(Arc::new(MemoryStore::new()));
        history
            .upsert(PersistedHistoryRecord {
                id: "old-page".to_string(),
                file_name: "chapter1-01.png".to_string(),
                timestamp: 1_700_000_000_000,
                genre: Genre::Royal,
                translations: vec![TranslationItem::new(
                    1,
                    "Your Majesty",
                    "اعلی‌حضرت",
                    TranslationType::Bubble,
                    ToneType::Formal,
                )],
            })
            .unwrap();
        RestorePath::new(Arc::new(history))
    }

    #[test]
    fn test_restore_adds_active_page() {
        let restore = restore_path();
        let mut collection = PageCollection::new();
        collection.add_page(PageImage::new(vec![1], "image/png"), "new.png");

        let restored = restore.restore(&mut collection, "old-page").unwrap();
        assert_eq!(restored.genre, Genre::Royal);
        assert_ne!(restored.page_id.as_str(), "old-page");
        assert_eq!(collection.len(), 2);
        assert_eq!(collection.active_id(), Some(&restored.page_id));

        let page = collection.active().unwrap();
        assert!(page.image().is_none());
        assert!(!page.is_analyzing());
        assert_eq!(page.translations().len(), 1);
        assert_eq!(page.history().len(), 1);
        assert!(!page.can_undo());
    }

    #[test]
    fn test_restore_unknown_record() {
        let restore = restore_path();
        let mut collection = PageCollection::new();
        assert!(restore.restore(&mut collection, "missing").is_none());
        assert!(collection.is_empty());
    }

    #[test]
    fn test_restoring_twice_gives_distinct_pages() {
        let restore = restore_path();
        let mut collection = PageCollection::new();
        let a = restore.restore(&mut collection, "old-page").unwrap();
        let b = restore.restore(&mut collection, "old-page").unwrap();
        assert_ne!(a.page_id, b.page_id);
        assert_eq!(collection.len(), 2);
    }

    #[test]
    fn test_remove_record() {
        let restore = restore_path();
        assert!(restore.remove("old-page").unwrap());
        assert!(!restore.remove("old-page").unwrap());
        assert!(restore.list().is_empty());
    }
}
