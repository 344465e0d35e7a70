//! Durable key-value persistence.
//!
//! Everything that outlives a session goes through one narrow gateway,
//! [`KeyValueStore`]: string keys, string values, synchronous calls. The
//! typed views on top ([`HistoryStore`], [`CredentialStore`]) own the JSON
//! encoding of their keys and treat unparsable data as empty.

mod credentials;
mod disk;
mod history;
mod memory;

pub use credentials::{CredentialEntry, CredentialStore};
pub use disk::SledStore;
pub use history::{DEFAULT_MAX_RECORDS, HistoryStore, PersistedHistoryRecord};
pub use memory::MemoryStore;

use std::sync::Arc;

use crate::config::StoreConfig;
use crate::error::Result;

/// Key holding the persisted page history (JSON array, newest first)
pub const HISTORY_KEY: &str = "history";
/// Key holding the active API credential
pub const CREDENTIAL_KEY: &str = "credential";
/// Key holding the set of saved credentials (JSON array)
pub const CREDENTIAL_SET_KEY: &str = "credential-set";

/// Persistence gateway shared by every component that writes durable state.
pub trait KeyValueStore: Send + Sync {
    fn get(&self, key: &str) -> Result<Option<String>>;

    fn set(&self, key: &str, value: &str) -> Result<()>;

    fn remove(&self, key: &str) -> Result<()>;
}

/// Open the store described by the configuration.
pub fn open_store(config: &StoreConfig) -> Result<Arc<dyn KeyValueStore>> {
    if config.in_memory {
        return Ok(Arc::new(MemoryStore::new()));
    }

    let path = config
        .path
        .clone()
        .unwrap_or_else(crate::util::default_store_path);
    Ok(Arc::new(SledStore::open(path)?))
}

/// Store wrapper whose reads can be made to fail on demand.
#[cfg(test)]
#[derive(Default)]
pub(crate) struct UnreadableStore {
    inner: MemoryStore,
    fail_reads: std::sync::atomic::AtomicBool,
}

#[cfg(test)]
impl UnreadableStore {
    pub(crate) fn set_failing(&self, failing: bool) {
        self.fail_reads
            .store(failing, std::sync::atomic::Ordering::SeqCst);
    }
}

#[cfg(test)]
impl KeyValueStore for UnreadableStore {
    fn get(&self, key: &str) -> Result<Option<String>> {
        if self.fail_reads.load(std::sync::atomic::Ordering::SeqCst) {
            return Err(crate::error::Error::StoreRead("disk unavailable".to_string()));
        }
        self.inner.get(key)
    }

    fn set(&self, key: &str, value: &str) -> Result<()> {
        self.inner.set(key, value)
    }

    fn remove(&self, key: &str) -> Result<()> {
        self.inner.remove(key)
    }
}
