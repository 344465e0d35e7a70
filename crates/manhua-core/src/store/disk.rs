use sled::Db;
use std::path::Path;
use tracing::debug;

use super::KeyValueStore;
use crate::error::{Error, Result};

/// Durable store backed by sled
pub struct SledStore {
    db: Db,
}

impl SledStore {
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();

        // Ensure parent directory exists
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).map_err(|e| {
                Error::StoreOpen(format!(
                    "Failed to create store directory {}: {}",
                    parent.display(),
                    e
                ))
            })?;
        }

        let db = sled::open(path).map_err(|e| {
            let err_str = e.to_string();
            // Detect lock errors and provide actionable fix
            if err_str.contains("WouldBlock") || err_str.contains("lock") {
                Error::StoreOpen(format!(
                    "Store locked at {}\n\n\
                    Another editor session is using it, or a previous one crashed.\n\
                    To fix: close the other session or rm {}/db/LOCK",
                    path.display(),
                    path.display()
                ))
            } else {
                Error::StoreOpen(format!("Failed to open store at {}: {}", path.display(), e))
            }
        })?;

        debug!("Opened store at {}", path.display());

        Ok(Self { db })
    }

    pub fn len(&self) -> usize {
        self.db.len()
    }

    pub fn is_empty(&self) -> bool {
        self.db.is_empty()
    }
}

impl KeyValueStore for SledStore {
    fn get(&self, key: &str) -> Result<Option<String>> {
        let Some(value) = self
            .db
            .get(key.as_bytes())
            .map_err(|e| Error::StoreRead(e.to_string()))?
        else {
            return Ok(None);
        };

        String::from_utf8(value.to_vec())
            .map(Some)
            .map_err(|e| Error::StoreParse {
                key: key.to_string(),
                reason: e.to_string(),
            })
    }

    fn set(&self, key: &str, value: &str) -> Result<()> {
        self.db
            .insert(key.as_bytes(), value.as_bytes())
            .map_err(|e| Error::StoreWrite(e.to_string()))?;

        // Flush to ensure persistence
        self.db
            .flush()
            .map_err(|e| Error::StoreWrite(format!("Flush failed: {e}")))?;

        Ok(())
    }

    fn remove(&self, key: &str) -> Result<()> {
        self.db
            .remove(key.as_bytes())
            .map_err(|e| Error::StoreWrite(e.to_string()))?;
        self.db
            .flush()
            .map_err(|e| Error::StoreWrite(format!("Flush failed: {e}")))?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_set_get_remove() {
        let dir = tempfile::tempdir().unwrap();
        let store = SledStore::open(dir.path().join("store")).unwrap();

        assert_eq!(store.get("history").unwrap(), None);
        store.set("history", "[]").unwrap();
        assert_eq!(store.get("history").unwrap().as_deref(), Some("[]"));

        store.remove("history").unwrap();
        assert_eq!(store.get("history").unwrap(), None);
        assert!(store.is_empty());
    }

    #[test]
    fn test_values_survive_reopen() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("store");

        {
            let store = SledStore::open(&path).unwrap();
            store.set("credential", "secret-key").unwrap();
        }

        let store = SledStore::open(&path).unwrap();
        assert_eq!(store.get("credential").unwrap().as_deref(), Some("secret-key"));
    }
}
