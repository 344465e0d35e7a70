use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::{debug, warn};

use super::{CREDENTIAL_KEY, CREDENTIAL_SET_KEY, KeyValueStore};
use crate::error::{Error, Result};

/// A saved API key with a user-chosen alias.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CredentialEntry {
    pub alias: String,
    pub key: String,
    /// Milliseconds since the Unix epoch
    pub added_at: i64,
}

/// Typed view over the `credential` and `credential-set` keys.
#[derive(Clone)]
pub struct CredentialStore {
    store: Arc<dyn KeyValueStore>,
}

impl CredentialStore {
    pub fn new(store: Arc<dyn KeyValueStore>) -> Self {
        Self { store }
    }

    /// The key used for new analyses, if one is set.
    pub fn active(&self) -> Option<String> {
        match self.store.get(CREDENTIAL_KEY) {
            Ok(key) => key.filter(|k| !k.trim().is_empty()),
            Err(e) => {
                warn!("Ignoring stored credential: {}", e);
                None
            }
        }
    }

    /// Save `key` (trimmed) as the active credential.
    pub fn set_active(&self, key: &str) -> Result<()> {
        let key = key.trim();
        if key.is_empty() {
            return Err(Error::InvalidInput("API key must not be blank".to_string()));
        }
        self.store.set(CREDENTIAL_KEY, key)
    }

    pub fn clear_active(&self) -> Result<()> {
        self.store.remove(CREDENTIAL_KEY)
    }

    /// Saved credentials, in the order they were added.
    pub fn list(&self) -> Vec<CredentialEntry> {
        self.read().unwrap_or_else(|e| {
            warn!("Ignoring stored credential set: {}", e);
            Vec::new()
        })
    }

    /// Save a credential under `alias`, replacing any entry with that alias.
    pub fn add(&self, alias: &str, key: &str) -> Result<CredentialEntry> {
        let (alias, key) = (alias.trim(), key.trim());
        if alias.is_empty() || key.is_empty() {
            return Err(Error::InvalidInput(
                "credential alias and key must not be blank".to_string(),
            ));
        }

        let entry = CredentialEntry {
            alias: alias.to_string(),
            key: key.to_string(),
            added_at: crate::util::now_millis(),
        };

        let mut entries = self.read_for_update()?;
        entries.retain(|e| e.alias != alias);
        entries.push(entry.clone());
        self.write(&entries)?;

        debug!("Saved credential '{}'", alias);
        Ok(entry)
    }

    /// Make the credential saved under `alias` the active one.
    pub fn activate(&self, alias: &str) -> Result<()> {
        let entry = self
            .list()
            .into_iter()
            .find(|e| e.alias == alias)
            .ok_or_else(|| Error::InvalidInput(format!("no credential named '{alias}'")))?;
        self.store.set(CREDENTIAL_KEY, &entry.key)
    }

    /// Forget the credential saved under `alias`.
    ///
    /// If it was the active key, the active key is cleared too.
    pub fn remove(&self, alias: &str) -> Result<bool> {
        let mut entries = self.read_for_update()?;
        let Some(index) = entries.iter().position(|e| e.alias == alias) else {
            return Ok(false);
        };

        let removed = entries.remove(index);
        self.write(&entries)?;

        if self.active().as_deref() == Some(removed.key.as_str()) {
            self.clear_active()?;
        }
        Ok(true)
    }

    fn read(&self) -> Result<Vec<CredentialEntry>> {
        let Some(json) = self.store.get(CREDENTIAL_SET_KEY)? else {
            return Ok(Vec::new());
        };

        serde_json::from_str(&json).map_err(|e| Error::StoreParse {
            key: CREDENTIAL_SET_KEY.to_string(),
            reason: e.to_string(),
        })
    }

    /// Only unparsable data may be overwritten; a failed read is an error.
    fn read_for_update(&self) -> Result<Vec<CredentialEntry>> {
        match self.read() {
            Err(e @ Error::StoreParse { .. }) => {
                warn!("Replacing unreadable credential set: {}", e);
                Ok(Vec::new())
            }
            other => other,
        }
    }

    fn write(&self, entries: &[CredentialEntry]) -> Result<()> {
        let json = serde_json::to_string(entries).map_err(|e| Error::StoreWrite(e.to_string()))?;
        self.store.set(CREDENTIAL_SET_KEY, &json)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::{MemoryStore, UnreadableStore};

    fn credentials() -> CredentialStore {
        CredentialStore::new(Arc::new(MemoryStore::new()))
    }

    #[test]
    fn test_active_key() {
        let creds = credentials();
        assert_eq!(creds.active(), None);

        creds.set_active("  key-1  ").unwrap();
        assert_eq!(creds.active().as_deref(), Some("key-1"));

        assert!(creds.set_active("   ").is_err());
        creds.clear_active().unwrap();
        assert_eq!(creds.active(), None);
    }

    #[test]
    fn test_add_replaces_alias() {
        let creds = credentials();
        creds.add("work", "key-1").unwrap();
        creds.add("home", "key-2").unwrap();
        creds.add("work", "key-3").unwrap();

        let entries = creds.list();
        let aliases: Vec<&str> = entries.iter().map(|e| e.alias.as_str()).collect();
        assert_eq!(aliases, vec!["home", "work"]);
        assert_eq!(entries[1].key, "key-3");
    }

    #[test]
    fn test_activate_and_remove() {
        let creds = credentials();
        creds.add("work", "key-1").unwrap();
        creds.activate("work").unwrap();
        assert_eq!(creds.active().as_deref(), Some("key-1"));

        assert!(creds.activate("missing").is_err());

        assert!(creds.remove("work").unwrap());
        assert_eq!(creds.active(), None);
        assert!(!creds.remove("work").unwrap());
    }

    #[test]
    fn test_unreadable_set_is_empty() {
        let store = Arc::new(MemoryStore::new());
        store.set(CREDENTIAL_SET_KEY, "[{").unwrap();
        let creds = CredentialStore::new(store);
        assert!(creds.list().is_empty());
    }

    #[test]
    fn test_failed_read_keeps_set() {
        let store = Arc::new(UnreadableStore::default());
        let creds = CredentialStore::new(store.clone());
        creds.add("work", "key-1").unwrap();
        creds.add("home", "key-2").unwrap();

        store.set_failing(true);
        assert!(matches!(creds.add("other", "key-3"), Err(Error::StoreRead(_))));
        assert!(matches!(creds.remove("work"), Err(Error::StoreRead(_))));

        store.set_failing(false);
        let aliases: Vec<String> = creds.list().into_iter().map(|e| e.alias).collect();
        assert_eq!(aliases, vec!["work", "home"]);
    }

    #[test]
    fn test_unreadable_set_is_replaced_on_add() {
        let store = Arc::new(MemoryStore::new());
        store.set(CREDENTIAL_SET_KEY, "[{").unwrap();
        let creds = CredentialStore::new(store);
        creds.add("work", "key-1").unwrap();
        assert_eq!(creds.list().len(), 1);
    }
}
