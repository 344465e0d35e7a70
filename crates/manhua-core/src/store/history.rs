use serde::{Deserialize, Serialize};
use std::sync::{Arc, Mutex};
use tracing::{debug, warn};

use super::{HISTORY_KEY, KeyValueStore};
use crate::error::{Error, Result};
use crate::model::TranslationItem;
use crate::settings::Genre;

/// Number of pages kept in persisted history
pub const DEFAULT_MAX_RECORDS: usize = 20;

/// A page's translations as saved to durable history. Carries no image.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PersistedHistoryRecord {
    /// Id of the page this snapshot came from
    pub id: String,
    pub file_name: String,
    /// Save time, milliseconds since the Unix epoch
    pub timestamp: i64,
    pub genre: Genre,
    pub translations: Vec<TranslationItem>,
}

/// Typed view over the `history` key: newest first, bounded, one record per page id.
///
/// Each write is a read-modify-write of the whole list. Writes made through
/// the same `HistoryStore` are serialized so none of them is lost; writers
/// in other processes are not coordinated (last writer wins).
pub struct HistoryStore {
    store: Arc<dyn KeyValueStore>,
    max_records: usize,
    write_lock: Mutex<()>,
}

impl HistoryStore {
    pub fn new(store: Arc<dyn KeyValueStore>) -> Self {
        Self::with_max_records(store, DEFAULT_MAX_RECORDS)
    }

    pub fn with_max_records(store: Arc<dyn KeyValueStore>, max_records: usize) -> Self {
        Self {
            store,
            max_records: max_records.max(1),
            write_lock: Mutex::new(()),
        }
    }

    /// All records, newest first. Unreadable data counts as no history.
    pub fn list(&self) -> Vec<PersistedHistoryRecord> {
        match self.read() {
            Ok(records) => records,
            Err(e) => {
                warn!("Ignoring persisted history: {}", e);
                Vec::new()
            }
        }
    }

    pub fn find(&self, id: &str) -> Option<PersistedHistoryRecord> {
        self.list().into_iter().find(|record| record.id == id)
    }

    /// Insert `record` at the front, replacing any record with the same id,
    /// and drop the oldest beyond the limit.
    pub fn upsert(&self, record: PersistedHistoryRecord) -> Result<()> {
        let _guard = self
            .write_lock
            .lock()
            .map_err(|e| Error::StoreWrite(e.to_string()))?;

        let mut records = self.read_for_update()?;
        records.retain(|existing| existing.id != record.id);
        debug!("Saving history record {} ({})", record.id, record.file_name);
        records.insert(0, record);
        records.truncate(self.max_records);

        self.write(&records)
    }

    /// Delete a record by id. Returns whether it existed.
    pub fn remove(&self, id: &str) -> Result<bool> {
        let _guard = self
            .write_lock
            .lock()
            .map_err(|e| Error::StoreWrite(e.to_string()))?;

        let mut records = self.read_for_update()?;
        let before = records.len();
        records.retain(|record| record.id != id);
        if records.len() == before {
            return Ok(false);
        }

        self.write(&records)?;
        Ok(true)
    }

    pub const fn max_records(&self) -> usize {
        self.max_records
    }

    fn read(&self) -> Result<Vec<PersistedHistoryRecord>> {
        let Some(json) = self.store.get(HISTORY_KEY)? else {
            return Ok(Vec::new());
        };

        serde_json::from_str(&json).map_err(|e| Error::StoreParse {
            key: HISTORY_KEY.to_string(),
            reason: e.to_string(),
        })
    }

    /// Like [`Self::list`], but only unparsable data counts as empty. A
    /// failed read must not be written back as an empty history.
    fn read_for_update(&self) -> Result<Vec<PersistedHistoryRecord>> {
        match self.read() {
            Err(e @ Error::StoreParse { .. }) => {
                warn!("Replacing unreadable history: {}", e);
                Ok(Vec::new())
            }
            other => other,
        }
    }

    fn write(&self, records: &[PersistedHistoryRecord]) -> Result<()> {
        let json = serde_json::to_string(records).map_err(|e| Error::StoreWrite(e.to_string()))?;
        self.store.set(HISTORY_KEY, &json)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{ToneType, TranslationType};
    use crate::store::{MemoryStore, UnreadableStore};

    fn record(id: &str, timestamp: i64) -> PersistedHistoryRecord {
        PersistedHistoryRecord {
            id: id.to_string(),
            file_name: format!("{id}.png"),
            timestamp,
            genre: Genre::System,
            translations: vec![TranslationItem::new(
                1,
                "Level up!",
                "ارتقای سطح!",
                TranslationType::Other,
                ToneType::Casual,
            )],
        }
    }

    fn ids(store: &HistoryStore) -> Vec<String> {
        store.list().into_iter().map(|r| r.id).collect()
    }

    #[test]
    fn test_upsert_is_newest_first() {
        let history = HistoryStore::new(Arc::new(MemoryStore::new()));
        history.upsert(record("a", 1)).unwrap();
        history.upsert(record("b", 2)).unwrap();
        assert_eq!(ids(&history), vec!["b", "a"]);
    }

    #[test]
    fn test_upsert_replaces_same_id() {
        let history = HistoryStore::new(Arc::new(MemoryStore::new()));
        history.upsert(record("a", 1)).unwrap();
        history.upsert(record("b", 2)).unwrap();
        history.upsert(record("a", 3)).unwrap();

        assert_eq!(ids(&history), vec!["a", "b"]);
        assert_eq!(history.find("a").map(|r| r.timestamp), Some(3));
    }

    #[test]
    fn test_upsert_truncates() {
        let history = HistoryStore::new(Arc::new(MemoryStore::new()));
        for i in 0..25 {
            history.upsert(record(&format!("p{i}"), i)).unwrap();
        }

        let ids = ids(&history);
        assert_eq!(ids.len(), DEFAULT_MAX_RECORDS);
        assert_eq!(ids.first().map(String::as_str), Some("p24"));
        assert_eq!(ids.last().map(String::as_str), Some("p5"));
    }

    #[test]
    fn test_remove() {
        let history = HistoryStore::new(Arc::new(MemoryStore::new()));
        history.upsert(record("a", 1)).unwrap();
        assert!(history.remove("a").unwrap());
        assert!(!history.remove("a").unwrap());
        assert!(history.list().is_empty());
    }

    #[test]
    fn test_unparsable_history_is_empty() {
        let store = Arc::new(MemoryStore::new());
        store.set(HISTORY_KEY, "{not json").unwrap();

        let history = HistoryStore::new(store.clone());
        assert!(history.list().is_empty());

        // The next save starts over from an empty list
        history.upsert(record("a", 1)).unwrap();
        assert_eq!(ids(&history), vec!["a"]);
    }

    #[test]
    fn test_failed_read_keeps_history() {
        let store = Arc::new(UnreadableStore::default());
        let history = HistoryStore::new(store.clone());
        for i in 0..5 {
            history.upsert(record(&format!("p{i}"), i)).unwrap();
        }

        store.set_failing(true);
        assert!(matches!(history.upsert(record("new", 9)), Err(Error::StoreRead(_))));
        assert!(matches!(history.remove("p0"), Err(Error::StoreRead(_))));

        store.set_failing(false);
        assert_eq!(ids(&history), vec!["p4", "p3", "p2", "p1", "p0"]);
    }

    #[test]
    fn test_record_json_shape() {
        let json = serde_json::to_value(record("a", 42)).unwrap();
        assert_eq!(json["fileName"], "a.png");
        assert_eq!(json["timestamp"], 42);
        assert_eq!(json["genre"], "SYSTEM");
        assert_eq!(json["translations"][0]["translatedText"], "ارتقای سطح!");
    }
}
